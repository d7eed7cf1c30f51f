//! Value types shared by the signal computation and the hysteresis state
//! machine (spec §4.3).

use serde::{Deserialize, Serialize};

use crate::store::GreenLightStatus;

/// One score per signal group, each in `[0, 100]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SignalScores {
    pub fingerprint: f64,
    pub behavior: f64,
    pub challenge_response: f64,
    pub session: f64,
    pub network: f64,
}

impl SignalScores {
    const FINGERPRINT_WEIGHT: f64 = 0.25;
    const BEHAVIOR_WEIGHT: f64 = 0.25;
    const CHALLENGE_WEIGHT: f64 = 0.20;
    const SESSION_WEIGHT: f64 = 0.15;
    const NETWORK_WEIGHT: f64 = 0.15;

    /// `round(Σ weight × score)`, clamped to `[0, 100]`.
    pub fn aggregate(&self) -> i32 {
        let weighted = self.fingerprint * Self::FINGERPRINT_WEIGHT
            + self.behavior * Self::BEHAVIOR_WEIGHT
            + self.challenge_response * Self::CHALLENGE_WEIGHT
            + self.session * Self::SESSION_WEIGHT
            + self.network * Self::NETWORK_WEIGHT;
        weighted.round().clamp(0.0, 100.0) as i32
    }
}

/// Capability record a session uses to decide whether and how aggressively
/// it may continue issuing requests.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NavigationRecommendation {
    pub can_navigate: bool,
    /// Requests allowed per `window_secs`. `None` means unrestricted.
    pub max_requests: Option<u32>,
    pub window_secs: Option<u32>,
    pub read_only: bool,
    pub simple_forms_allowed: bool,
}

impl NavigationRecommendation {
    pub fn for_status(status: GreenLightStatus) -> Self {
        match status {
            GreenLightStatus::Red => Self {
                can_navigate: false,
                max_requests: None,
                window_secs: None,
                read_only: true,
                simple_forms_allowed: false,
            },
            GreenLightStatus::Yellow => Self {
                can_navigate: true,
                max_requests: Some(1),
                window_secs: Some(3),
                read_only: true,
                simple_forms_allowed: false,
            },
            GreenLightStatus::Green => Self {
                can_navigate: true,
                max_requests: Some(3),
                window_secs: Some(1),
                read_only: false,
                simple_forms_allowed: true,
            },
            GreenLightStatus::Established => Self {
                can_navigate: true,
                max_requests: None,
                window_secs: None,
                read_only: false,
                simple_forms_allowed: true,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aggregate_weights_sum_to_full_scale_at_max() {
        let scores = SignalScores {
            fingerprint: 100.0,
            behavior: 100.0,
            challenge_response: 100.0,
            session: 100.0,
            network: 100.0,
        };
        assert_eq!(scores.aggregate(), 100);
    }

    #[test]
    fn aggregate_is_zero_at_min() {
        let scores = SignalScores {
            fingerprint: 0.0,
            behavior: 0.0,
            challenge_response: 0.0,
            session: 0.0,
            network: 0.0,
        };
        assert_eq!(scores.aggregate(), 0);
    }

    #[test]
    fn red_forbids_navigation() {
        let rec = NavigationRecommendation::for_status(GreenLightStatus::Red);
        assert!(!rec.can_navigate);
    }

    #[test]
    fn established_is_unrestricted() {
        let rec = NavigationRecommendation::for_status(GreenLightStatus::Established);
        assert!(rec.max_requests.is_none());
        assert!(rec.simple_forms_allowed);
    }
}
