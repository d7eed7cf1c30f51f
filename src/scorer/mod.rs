//! Turns recent request history into a trust score and a hysteresis state
//! transition (spec §4.3).

pub mod signals;
pub mod state_machine;
pub mod types;

pub use types::{NavigationRecommendation, SignalScores};

use crate::dna::Dna;
use crate::ids::GreenLightStateId;
use crate::store::{GreenLightState, GreenLightStatus, RequestLog, Target};

/// Stateless signal/score computation. Holds no store handle — the caller
/// supplies the target's current status and trust score, and the signals
/// are derived purely from the DNA and request window passed in.
pub struct Scorer;

impl Scorer {
    /// Computes the next [`GreenLightState`] for `target` given its active
    /// `dna` and a recent window of request logs. Pure given its inputs:
    /// the only "clock" involved is `Utc::now()` used to stamp the row,
    /// which callers should treat as metadata rather than as an input to
    /// the score itself.
    pub fn calculate(target: &Target, dna: &Dna, recent_requests: &[RequestLog]) -> GreenLightState {
        let scores = signals::compute_signals(dna, recent_requests);
        let trust_score = scores.aggregate();
        let next_status = state_machine::transition(target.green_light_status, trust_score);

        let entering_established =
            next_status == GreenLightStatus::Established && target.green_light_status != GreenLightStatus::Established;
        let leaving_established =
            target.green_light_status == GreenLightStatus::Established && next_status != GreenLightStatus::Established;

        let now = chrono::Utc::now();

        let established_at = if entering_established {
            Some(now)
        } else if leaving_established {
            None
        } else {
            target.established_at
        };

        let maintained_for = if next_status == GreenLightStatus::Established {
            if target.green_light_status == GreenLightStatus::Established {
                target.maintained_for + 1
            } else {
                0
            }
        } else {
            0
        };

        let (lost_at, reason_lost) = if leaving_established {
            (
                Some(now),
                Some(format!("trust score dropped to {trust_score}")),
            )
        } else {
            (None, None)
        };

        let decay = state_machine::decay_rate(target.trust_score, trust_score);
        let signals_json = serde_json::json!({
            "fingerprint": scores.fingerprint,
            "behavior": scores.behavior,
            "challenge_response": scores.challenge_response,
            "session": scores.session,
            "network": scores.network,
            "decay_rate": decay,
        });

        GreenLightState {
            id: GreenLightStateId::new(),
            target_id: target.id,
            status: next_status,
            trust_score,
            signals: signals_json,
            established_at,
            maintained_for,
            lost_at,
            reason_lost,
            created_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use crate::store::TargetType;

    fn target_with(status: GreenLightStatus, trust_score: i32, maintained_for: i64) -> Target {
        Target {
            id: crate::ids::TargetId::new(),
            url: "https://example.com".to_string(),
            target_type: TargetType::Web,
            status: crate::store::TargetStatus::Learning,
            green_light_status: status,
            trust_score,
            established_at: None,
            maintained_for,
            is_authenticated: false,
            auth_endpoint: None,
            auth_username: None,
            session_cookie: None,
            current_dna_id: None,
            created_at: chrono::Utc::now(),
            last_seen: None,
        }
    }

    #[test]
    fn promotion_to_established_stamps_timestamp_and_zeroes_maintained_for() {
        let dna = Dna::default();
        let target = target_with(GreenLightStatus::Green, 74, 0);
        let mut log = RequestLog::new(
            target.id,
            crate::ids::DnaId::new(),
            "GET",
            "https://example.com",
            serde_json::json!({}),
        );
        log.response_status = Some(200);
        log.timing_ms = Some(200);

        // Force a high score by supplying a clean request window across all
        // five signal groups' checks.
        let state = Scorer::calculate(&target, &dna, &[log]);
        assert!(state.trust_score >= 75);
        assert_eq!(state.status, GreenLightStatus::Established);
        assert!(state.established_at.is_some());
        assert_eq!(state.maintained_for, 0);
    }

    #[test]
    fn demotion_from_established_resets_maintained_for() {
        let dna = Dna::default();
        let target = target_with(GreenLightStatus::Established, 76, 120);
        let blocked: Vec<RequestLog> = (0..3)
            .map(|_| {
                let mut log = RequestLog::new(
                    target.id,
                    crate::ids::DnaId::new(),
                    "GET",
                    "https://example.com",
                    serde_json::json!({}),
                );
                log.response_status = Some(429);
                log.was_blocked = true;
                log.block_reason = Some("ip_blacklist rule matched".to_string());
                log.challenge_detected = true;
                log
            })
            .collect();

        let state = Scorer::calculate(&target, &dna, &blocked);
        assert!(state.trust_score < 70);
        assert_eq!(state.status, GreenLightStatus::Green);
        assert_eq!(state.maintained_for, 0);
        assert!(state.lost_at.is_some());
    }

    #[test]
    fn remaining_established_accumulates_maintained_for() {
        let dna = Dna::default();
        let target = target_with(GreenLightStatus::Established, 90, 120);
        let mut log = RequestLog::new(
            target.id,
            crate::ids::DnaId::new(),
            "GET",
            "https://example.com",
            serde_json::json!({}),
        );
        log.response_status = Some(200);
        log.timing_ms = Some(200);

        let state = Scorer::calculate(&target, &dna, &[log]);
        assert_eq!(state.status, GreenLightStatus::Established);
        assert_eq!(state.maintained_for, 121);
    }

    #[test]
    fn calculation_is_pure_across_repeated_calls() {
        let dna = Dna::default();
        let target = target_with(GreenLightStatus::Yellow, 40, 0);
        let log = RequestLog::new(
            target.id,
            crate::ids::DnaId::new(),
            "GET",
            "https://example.com",
            serde_json::json!({}),
        );
        let a = Scorer::calculate(&target, &dna, &[log.clone()]);
        let b = Scorer::calculate(&target, &dna, &[log]);
        assert_eq!(a.trust_score, b.trust_score);
        assert_eq!(a.status, b.status);
        assert_eq!(a.signals, b.signals);
    }

    proptest::proptest! {
        #[test]
        fn calculation_is_pure_for_arbitrary_status_codes(
            status_code in 200u16..600,
            count in 1usize..8,
        ) {
            let dna = Dna::default();
            let target = target_with(GreenLightStatus::Yellow, 40, 0);
            let logs: Vec<RequestLog> = (0..count)
                .map(|_| {
                    let mut log = RequestLog::new(
                        target.id,
                        crate::ids::DnaId::new(),
                        "GET",
                        "https://example.com",
                        serde_json::json!({}),
                    );
                    log.response_status = Some(status_code);
                    log
                })
                .collect();

            let a = Scorer::calculate(&target, &dna, &logs);
            let b = Scorer::calculate(&target, &dna, &logs);
            prop_assert_eq!(a.trust_score, b.trust_score);
            prop_assert_eq!(a.status, b.status);
            prop_assert_eq!(a.signals, b.signals);
        }
    }
}
