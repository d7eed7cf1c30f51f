//! Request/response value types for the Crawl Engine (spec §4.5).

use serde::{Deserialize, Serialize};

use crate::ids::TargetId;

/// The interaction pattern a session drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrawlMode {
    /// Cycle through a small fixed path list, gathering signal.
    Explore,
    /// Issue the minimum traffic needed to keep scoring fresh.
    Observe,
    /// Explore until a goal predicate matches, then stop.
    Achieve,
}

/// `Start(request) -> session` input (spec §4.5).
#[derive(Debug, Clone)]
pub struct CrawlRequest {
    pub target_id: TargetId,
    pub seed_url: String,
    pub mode: CrawlMode,
    pub goal: Option<String>,
    pub max_duration_secs: Option<u64>,
    pub max_iterations: Option<u64>,
}

impl CrawlRequest {
    pub fn new(target_id: TargetId, seed_url: impl Into<String>, mode: CrawlMode) -> Self {
        Self {
            target_id,
            seed_url: seed_url.into(),
            mode,
            goal: None,
            max_duration_secs: None,
            max_iterations: None,
        }
    }

    pub fn with_goal(mut self, goal: impl Into<String>) -> Self {
        self.goal = Some(goal.into());
        self
    }

    pub fn with_max_duration_secs(mut self, secs: u64) -> Self {
        self.max_duration_secs = Some(secs);
        self
    }

    pub fn with_max_iterations(mut self, n: u64) -> Self {
        self.max_iterations = Some(n);
        self
    }
}

/// Session lifecycle status (spec §4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Starting,
    Running,
    Paused,
    Completed,
    Failed,
}

/// Internal control signal carried over the session's `watch` channel
/// (spec §5: "every session honors a cooperative cancel signal").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SessionControl {
    Run,
    Pause,
    Stop,
}

/// Why a session's loop exited, recorded on the final `CrawlEvent` and used
/// to pick the target's resting status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    MaxIterationsReached,
    MaxDurationElapsed,
    Stopped,
    GoalAchieved,
    Failed,
}
