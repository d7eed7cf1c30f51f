//! Observable crawl-session events, grounded on
//! `rlm-core::trajectory::TrajectoryEvent` — the same "one append-only
//! stream describing what happened" shape, with the variant set replaced
//! by crawl-relevant occurrences (spec §4.5, §9's "scoped resource
//! release" note: the event stream is how a caller without its own logger
//! watches a session run).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use crate::ids::{SessionId, TargetId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CrawlEventType {
    IterationStart,
    RequestSent,
    ResponseObserved,
    ChallengeDetected,
    ScoreUpdated,
    StateTransition,
    AdvisorConsulted,
    MutationApplied,
    GoalAchieved,
    SessionEnded,
}

/// One entry in a session's observable trajectory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlEvent {
    pub event_type: CrawlEventType,
    pub session_id: SessionId,
    pub target_id: TargetId,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<HashMap<String, Value>>,
    pub timestamp: DateTime<Utc>,
}

impl CrawlEvent {
    pub fn new(
        event_type: CrawlEventType,
        session_id: SessionId,
        target_id: TargetId,
        content: impl Into<String>,
    ) -> Self {
        Self {
            event_type,
            session_id,
            target_id,
            content: content.into(),
            metadata: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata
            .get_or_insert_with(HashMap::new)
            .insert(key.into(), value.into());
        self
    }
}
