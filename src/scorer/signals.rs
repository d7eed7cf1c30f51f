//! The five signal groups, each a small set of boolean checks averaged into
//! a `[0, 100]` score (spec §4.3). Mirrors the shape of
//! `rlm-core::complexity::TaskComplexitySignals::score` — named boolean
//! checks folded into one number — generalized from an additive integer
//! score to a fractional-pass-rate score, since here the five groups are
//! combined with their own weights rather than summed directly.

use crate::dna::Dna;
use crate::scorer::types::SignalScores;
use crate::store::RequestLog;

fn pass_rate(checks: &[bool]) -> f64 {
    if checks.is_empty() {
        return 100.0;
    }
    let passed = checks.iter().filter(|c| **c).count();
    (passed as f64 / checks.len() as f64) * 100.0
}

fn fingerprint_score(dna: &Dna, recent: &[RequestLog]) -> f64 {
    let tls_consistent = !recent.iter().any(|r| {
        r.was_blocked
            && r.block_reason
                .as_deref()
                .map(|reason| reason.to_lowercase().contains("fingerprint"))
                .unwrap_or(false)
    });
    let header_order_preserved = !dna.network.header_order.is_empty()
        && dna.network.header_order.len()
            == dna
                .network
                .header_order
                .iter()
                .collect::<std::collections::HashSet<_>>()
                .len();
    let ja3_valid = dna
        .network
        .ja3_hash
        .as_ref()
        .map(|hash| !hash.is_empty())
        .unwrap_or(true);
    let http2_supported = dna.network.http_version == "h2";

    pass_rate(&[tls_consistent, header_order_preserved, ja3_valid, http2_supported])
}

fn behavior_score(recent: &[RequestLog]) -> f64 {
    let mut timestamps: Vec<_> = recent.iter().map(|r| r.created_at).collect();
    timestamps.sort();
    let intervals_ms: Vec<i64> = timestamps
        .windows(2)
        .map(|w| (w[1] - w[0]).num_milliseconds())
        .collect();

    let timing_human_like = if intervals_ms.is_empty() {
        true
    } else {
        let avg = intervals_ms.iter().sum::<i64>() as f64 / intervals_ms.len() as f64;
        avg >= 500.0
    };
    let no_bursts = intervals_ms.iter().all(|ms| *ms >= 100);
    // Mouse/scroll movement is simulated outside the core; the core only
    // tracks that a movement model is configured.
    let movement_placeholder = true;

    pass_rate(&[timing_human_like, no_bursts, movement_placeholder])
}

fn challenge_response_score(recent: &[RequestLog]) -> f64 {
    let no_unsolved_challenges = !recent
        .iter()
        .any(|r| r.challenge_detected && r.was_blocked);
    let blocked_challenge_count = recent
        .iter()
        .filter(|r| r.was_blocked && r.challenge_detected)
        .count();
    let acceptable_failure_count = blocked_challenge_count <= 2;
    // No per-request solve-duration is tracked on `RequestLog`; treated as
    // passing until that telemetry exists.
    let solution_time_acceptable = true;

    pass_rate(&[no_unsolved_challenges, acceptable_failure_count, solution_time_acceptable])
}

fn session_score(recent: &[RequestLog]) -> f64 {
    let cookies_accepted = recent.iter().any(|r| r.response_status == Some(200));
    let has_derivable_duration = recent.iter().any(|r| r.response_status == Some(200));
    // Session-cookie churn isn't tracked per request; treated as passing
    // until refresh-loop detection is added.
    let no_token_refresh_loop = true;

    pass_rate(&[cookies_accepted, has_derivable_duration, no_token_refresh_loop])
}

fn network_score(recent: &[RequestLog]) -> f64 {
    let no_rate_limit = !recent.iter().any(|r| r.response_status == Some(429));
    let no_ip_blacklist = !recent.iter().any(|r| {
        r.block_reason
            .as_deref()
            .map(|reason| reason.contains("ip_blacklist"))
            .unwrap_or(false)
    });
    let timings: Vec<u64> = recent.iter().filter_map(|r| r.timing_ms).collect();
    let response_time_ok = if timings.is_empty() {
        true
    } else {
        let avg = timings.iter().sum::<u64>() as f64 / timings.len() as f64;
        avg <= 10_000.0
    };

    pass_rate(&[no_rate_limit, no_ip_blacklist, response_time_ok])
}

/// Computes all five signal groups for the given DNA and request history.
/// Pure: identical inputs always produce identical scores.
pub fn compute_signals(dna: &Dna, recent: &[RequestLog]) -> SignalScores {
    SignalScores {
        fingerprint: fingerprint_score(dna, recent),
        behavior: behavior_score(recent),
        challenge_response: challenge_response_score(recent),
        session: session_score(recent),
        network: network_score(recent),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::{DnaId, TargetId};
    use serde_json::json;

    fn log(target_id: TargetId, dna_id: DnaId) -> RequestLog {
        RequestLog::new(target_id, dna_id, "GET", "https://example.com", json!({}))
    }

    #[test]
    fn empty_session_reports_no_cookies_accepted() {
        let dna = Dna::default();
        let signals = compute_signals(&dna, &[]);
        // cookies_accepted fails but the other two vacuous checks pass: 2/3.
        assert!((signals.session - (200.0 / 3.0)).abs() < 0.01);
    }

    #[test]
    fn empty_behavior_checks_pass_by_vacuity() {
        let dna = Dna::default();
        let signals = compute_signals(&dna, &[]);
        assert_eq!(signals.behavior, 100.0);
    }

    #[test]
    fn rate_limited_response_depresses_network_score() {
        let dna = Dna::default();
        let target_id = TargetId::new();
        let dna_id = DnaId::new();
        let mut blocked = log(target_id, dna_id);
        blocked.response_status = Some(429);
        let signals = compute_signals(&dna, std::slice::from_ref(&blocked));
        assert!(signals.network < 100.0);
    }

    #[test]
    fn fingerprint_blocked_reason_depresses_score() {
        let dna = Dna::default();
        let target_id = TargetId::new();
        let dna_id = DnaId::new();
        let mut blocked = log(target_id, dna_id);
        blocked.was_blocked = true;
        blocked.block_reason = Some("TLS fingerprint mismatch".to_string());
        let signals = compute_signals(&dna, std::slice::from_ref(&blocked));
        assert!(signals.fingerprint < 100.0);
    }
}
