//! Hysteresis transitions over the trust score (spec §4.3). One level per
//! call in either direction; `ESTABLISHED`'s exit threshold (70) is lower
//! than `GREEN`'s entry threshold (75) by design, giving the top state a
//! wider band before it's lost.

use crate::store::GreenLightStatus;

const RED_TO_YELLOW: i32 = 25;
const YELLOW_TO_GREEN: i32 = 50;
const GREEN_TO_ESTABLISHED: i32 = 75;
const ESTABLISHED_EXIT: i32 = 70;

/// Computes the next state for one tick. Never moves more than one level
/// away from `current`, in either direction.
pub fn transition(current: GreenLightStatus, score: i32) -> GreenLightStatus {
    match current {
        GreenLightStatus::Red => {
            if score >= RED_TO_YELLOW {
                GreenLightStatus::Yellow
            } else {
                GreenLightStatus::Red
            }
        }
        GreenLightStatus::Yellow => {
            if score >= YELLOW_TO_GREEN {
                GreenLightStatus::Green
            } else if score < RED_TO_YELLOW {
                GreenLightStatus::Red
            } else {
                GreenLightStatus::Yellow
            }
        }
        GreenLightStatus::Green => {
            if score >= GREEN_TO_ESTABLISHED {
                GreenLightStatus::Established
            } else if score < YELLOW_TO_GREEN {
                GreenLightStatus::Yellow
            } else {
                GreenLightStatus::Green
            }
        }
        GreenLightStatus::Established => {
            if score < ESTABLISHED_EXIT {
                GreenLightStatus::Green
            } else {
                GreenLightStatus::Established
            }
        }
    }
}

/// Decay telemetry: how much the score regressed this tick, in arbitrary
/// units used only for reporting (spec §4.3: "reported for telemetry").
pub fn decay_rate(previous_score: i32, current_score: i32) -> f64 {
    (previous_score - current_score).max(0) as f64 * 0.1
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn exact_boundary_scores_advance_one_level() {
        assert_eq!(transition(GreenLightStatus::Red, 25), GreenLightStatus::Yellow);
        assert_eq!(transition(GreenLightStatus::Yellow, 50), GreenLightStatus::Green);
        assert_eq!(transition(GreenLightStatus::Green, 75), GreenLightStatus::Established);
    }

    #[test]
    fn established_demotes_below_seventy_not_seventy_five() {
        assert_eq!(transition(GreenLightStatus::Established, 69), GreenLightStatus::Green);
        assert_eq!(transition(GreenLightStatus::Established, 74), GreenLightStatus::Established);
    }

    #[test]
    fn seventy_six_to_sixty_nine_demotes_one_level_and_would_zero_maintained_for() {
        let established = transition(GreenLightStatus::Green, 76);
        assert_eq!(established, GreenLightStatus::Established);
        let demoted = transition(established, 69);
        assert_eq!(demoted, GreenLightStatus::Green);
    }

    #[test]
    fn never_skips_a_level_on_a_large_score_jump() {
        // RED jumping straight to a score that would justify ESTABLISHED
        // still only advances to YELLOW in one call.
        assert_eq!(transition(GreenLightStatus::Red, 99), GreenLightStatus::Yellow);
    }

    #[test]
    fn low_score_never_descends_more_than_one_level() {
        assert_eq!(transition(GreenLightStatus::Established, 0), GreenLightStatus::Green);
    }

    #[test]
    fn decay_rate_is_zero_on_improvement() {
        assert_eq!(decay_rate(50, 80), 0.0);
    }

    #[test]
    fn decay_rate_scales_with_drop() {
        assert!((decay_rate(80, 50) - 3.0).abs() < f64::EPSILON);
    }

    fn level(status: GreenLightStatus) -> i32 {
        match status {
            GreenLightStatus::Red => 0,
            GreenLightStatus::Yellow => 1,
            GreenLightStatus::Green => 2,
            GreenLightStatus::Established => 3,
        }
    }

    proptest::proptest! {
        #[test]
        fn never_moves_more_than_one_level_per_tick(
            current in 0u8..4,
            score in 0i32..=100,
        ) {
            let current = match current {
                0 => GreenLightStatus::Red,
                1 => GreenLightStatus::Yellow,
                2 => GreenLightStatus::Green,
                _ => GreenLightStatus::Established,
            };
            let next = transition(current, score);
            prop_assert!((level(next) - level(current)).abs() <= 1);
        }
    }
}
