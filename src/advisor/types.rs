//! Context envelope and tool-call response shapes for the Advisor Bridge
//! (spec §4.4).

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::dna::{Dna, Gene};
use crate::dna::mutator::MutationSeverity;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObservationKind {
    Blocked,
    Challenge,
    Success,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Observation {
    pub kind: ObservationKind,
    pub summary: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearningEventSummary {
    pub event_type: String,
    pub outcome: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChallengeInfo {
    pub challenge_type: String,
    pub difficulty: String,
    pub attempts: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LastRequestView {
    pub method: String,
    pub url: String,
    pub status: Option<u16>,
    pub timing_ms: Option<u64>,
}

/// Everything the advisor is told about a target before being asked for a
/// recommendation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Context {
    pub target_summary: String,
    pub dna: Dna,
    pub observations: Vec<Observation>,
    pub learning_events: Vec<LearningEventSummary>,
    pub current_challenge: Option<ChallengeInfo>,
    pub last_request: Option<LastRequestView>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyAction {
    Continue,
    Pause,
    Adapt,
    Retreat,
    Accelerate,
}

impl StrategyAction {
    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "continue" => Self::Continue,
            "pause" => Self::Pause,
            "adapt" => Self::Adapt,
            "retreat" => Self::Retreat,
            "accelerate" => Self::Accelerate,
            _ => return None,
        })
    }
}

/// One `suggest_dna_mutation` tool invocation. Zero or more per response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuggestedMutation {
    pub gene: Gene,
    pub change: Map<String, Value>,
    pub reason: String,
    pub confidence: f64,
    pub risk_level: MutationSeverity,
}

/// At most one `evaluate_trust_status` tool invocation per response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrustStatusEvaluation {
    pub trust_score: i32,
    pub signals: Vec<String>,
    pub recommendation: String,
    pub should_continue: bool,
}

/// At most one `determine_strategy` tool invocation per response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyDetermination {
    pub action: StrategyAction,
    pub reason: String,
    pub parameters: Option<Value>,
}

/// The packaged, validated result of an `Analyze` call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdvisorResponse {
    pub mutations: Vec<SuggestedMutation>,
    pub trust_status: Option<TrustStatusEvaluation>,
    pub strategy: Option<StrategyDetermination>,
    /// `true` when this response was synthesized locally because no
    /// advisor credentials are configured.
    pub mock: bool,
}
