//! External LLM advisor integration: context envelope, tool-call protocol,
//! short-TTL response cache, and the deterministic offline fallback (spec
//! §4.4).

pub mod bridge;
pub mod cache;
pub mod fallback;
pub mod protocol;
pub mod types;

pub use bridge::AdvisorBridge;
pub use types::{
    AdvisorResponse, ChallengeInfo, Context, LastRequestView, LearningEventSummary, Observation,
    ObservationKind, StrategyAction, StrategyDetermination, SuggestedMutation,
    TrustStatusEvaluation,
};
