//! Deterministic offline response, used whenever no advisor credentials
//! are configured (spec §4.4). Never fails the core.

use serde_json::{Map, Value};

use crate::advisor::types::{AdvisorResponse, StrategyAction, StrategyDetermination, SuggestedMutation, TrustStatusEvaluation};
use crate::dna::mutator::MutationSeverity;
use crate::dna::{Gene, Range};

/// Widen the delay range by +1-2s relative to the target's current range
/// (not an absolute value — a target already widened past any fixed
/// baseline must keep widening, never snap back down) and nudge the trust
/// score up by 5 (clamped to 100 by the caller), recommending `continue`.
pub fn synthesize(current_trust_score: i32, current_delay: Range<u64>) -> AdvisorResponse {
    let mut change = Map::new();
    change.insert(
        "delay_range_ms".to_string(),
        serde_json::json!({
            "min": current_delay.min + 1_000,
            "max": current_delay.max + 1_500,
        }),
    );

    let mutation = SuggestedMutation {
        gene: Gene::Timing,
        change,
        reason: "Offline fallback: widen inter-request delay as a conservative default.".to_string(),
        confidence: 0.5,
        risk_level: MutationSeverity::Low,
    };

    let evaluated_score = (current_trust_score + 5).min(100);
    let trust_status = TrustStatusEvaluation {
        trust_score: evaluated_score,
        signals: vec!["offline-fallback".to_string()],
        recommendation: "No advisor credentials configured; applying a conservative local nudge.".to_string(),
        should_continue: true,
    };

    let strategy = StrategyDetermination {
        action: StrategyAction::Continue,
        reason: "Offline fallback always recommends continuing at reduced risk.".to_string(),
        parameters: None as Option<Value>,
    };

    AdvisorResponse {
        mutations: vec![mutation],
        trust_status: Some(trust_status),
        strategy: Some(strategy),
        mock: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn synthesizes_exactly_one_low_risk_timing_mutation() {
        let response = synthesize(50, Range::new(1_500, 4_000));
        assert!(response.mock);
        assert_eq!(response.mutations.len(), 1);
        assert_eq!(response.mutations[0].gene, Gene::Timing);
        assert_eq!(response.mutations[0].risk_level, MutationSeverity::Low);
    }

    #[test]
    fn widens_relative_to_current_range_rather_than_a_fixed_absolute() {
        let response = synthesize(50, Range::new(3_000, 6_000));
        let change = &response.mutations[0].change;
        assert_eq!(change["delay_range_ms"]["min"], 4_000);
        assert_eq!(change["delay_range_ms"]["max"], 7_500);
    }

    #[test]
    fn trust_delta_clamps_at_one_hundred() {
        let response = synthesize(98, Range::new(1_500, 4_000));
        assert_eq!(response.trust_status.unwrap().trust_score, 100);
    }

    #[test]
    fn strategy_is_always_continue() {
        let response = synthesize(10, Range::new(1_500, 4_000));
        assert_eq!(response.strategy.unwrap().action, StrategyAction::Continue);
    }
}
