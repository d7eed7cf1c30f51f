//! Goal-predicate evaluation for `achieve` mode (spec §4.5 step 8): a
//! substring match of the goal in the response URL or HTML content, with a
//! small table mapping common goal names to the marker that actually
//! proves them (e.g. "admin" only really proves itself by landing on
//! `wp-admin`).

const GOAL_MARKERS: &[(&str, &str)] = &[("admin", "wp-admin"), ("login", "sign in"), ("checkout", "order-confirmation")];

/// `true` once `goal` is considered achieved for the given `url`/`body`.
pub fn goal_achieved(goal: &str, url: &str, body: &str) -> bool {
    let lower_goal = goal.to_lowercase();
    let marker = GOAL_MARKERS
        .iter()
        .find(|(name, _)| *name == lower_goal)
        .map(|(_, marker)| *marker)
        .unwrap_or(goal);

    let lower_marker = marker.to_lowercase();
    url.to_lowercase().contains(&lower_marker) || body.to_lowercase().contains(&lower_marker)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_goal_requires_wp_admin_marker() {
        assert!(goal_achieved("admin", "https://example.com/wp-admin/", ""));
        assert!(!goal_achieved("admin", "https://example.com/administrator/", ""));
    }

    #[test]
    fn unmapped_goal_falls_back_to_literal_substring_match() {
        assert!(goal_achieved("dashboard", "https://example.com/dashboard", ""));
        assert!(goal_achieved("dashboard", "https://example.com/", "<title>Dashboard</title>"));
        assert!(!goal_achieved("dashboard", "https://example.com/", "<title>Home</title>"));
    }

    #[test]
    fn matching_is_case_insensitive() {
        assert!(goal_achieved("ADMIN", "https://example.com/WP-ADMIN", ""));
    }
}
