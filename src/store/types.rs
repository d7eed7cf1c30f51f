//! Persisted entity types (spec §3).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::dna::Dna;
use crate::ids::{DnaId, GreenLightStateId, LearningEventId, RequestLogId, TargetId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetType {
    Web,
    /// Reserved for future target kinds; carried forward rather than
    /// rejected so older rows stay loadable.
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetStatus {
    Discovering,
    Learning,
    Established,
    Paused,
    Failed,
}

impl TargetStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Discovering => "discovering",
            Self::Learning => "learning",
            Self::Established => "established",
            Self::Paused => "paused",
            Self::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "discovering" => Self::Discovering,
            "learning" => Self::Learning,
            "established" => Self::Established,
            "paused" => Self::Paused,
            "failed" => Self::Failed,
            _ => return None,
        })
    }
}

/// Green-light state, a closed enumeration per spec §9's design note — not
/// a free string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GreenLightStatus {
    Red,
    Yellow,
    Green,
    Established,
}

impl GreenLightStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Red => "red",
            Self::Yellow => "yellow",
            Self::Green => "green",
            Self::Established => "established",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "red" => Self::Red,
            "yellow" => Self::Yellow,
            "green" => Self::Green,
            "established" => Self::Established,
            _ => return None,
        })
    }
}

/// The unit of adaptation (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Target {
    pub id: TargetId,
    pub url: String,
    pub target_type: TargetType,
    pub status: TargetStatus,
    pub green_light_status: GreenLightStatus,
    pub trust_score: i32,
    pub established_at: Option<DateTime<Utc>>,
    pub maintained_for: i64,
    pub is_authenticated: bool,
    pub auth_endpoint: Option<String>,
    pub auth_username: Option<String>,
    pub session_cookie: Option<String>,
    pub current_dna_id: Option<DnaId>,
    pub created_at: DateTime<Utc>,
    pub last_seen: Option<DateTime<Utc>>,
}

impl Target {
    /// A freshly operator-created target, not yet crawled.
    pub fn new(url: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: TargetId::new(),
            url: url.into(),
            target_type: TargetType::Web,
            status: TargetStatus::Discovering,
            green_light_status: GreenLightStatus::Red,
            trust_score: 0,
            established_at: None,
            maintained_for: 0,
            is_authenticated: false,
            auth_endpoint: None,
            auth_username: None,
            session_cookie: None,
            current_dna_id: None,
            created_at: now,
            last_seen: None,
        }
    }
}

/// A sparse set of target-field updates. `None` means "leave unchanged".
#[derive(Debug, Clone, Default)]
pub struct TargetPatch {
    pub status: Option<TargetStatus>,
    pub green_light_status: Option<GreenLightStatus>,
    pub trust_score: Option<i32>,
    pub established_at: Option<Option<DateTime<Utc>>>,
    pub maintained_for: Option<i64>,
    pub is_authenticated: Option<bool>,
    pub auth_endpoint: Option<Option<String>>,
    pub auth_username: Option<Option<String>>,
    pub session_cookie: Option<Option<String>>,
    pub current_dna_id: Option<Option<DnaId>>,
    pub last_seen: Option<Option<DateTime<Utc>>>,
}

impl TargetPatch {
    pub fn apply(self, target: &mut Target) {
        if let Some(v) = self.status {
            target.status = v;
        }
        if let Some(v) = self.green_light_status {
            target.green_light_status = v;
        }
        if let Some(v) = self.trust_score {
            target.trust_score = v.clamp(0, 100);
        }
        if let Some(v) = self.established_at {
            target.established_at = v;
        }
        if let Some(v) = self.maintained_for {
            target.maintained_for = v;
        }
        if let Some(v) = self.is_authenticated {
            target.is_authenticated = v;
        }
        if let Some(v) = self.auth_endpoint {
            target.auth_endpoint = v;
        }
        if let Some(v) = self.auth_username {
            target.auth_username = v;
        }
        if let Some(v) = self.session_cookie {
            target.session_cookie = v;
        }
        if let Some(v) = self.current_dna_id {
            target.current_dna_id = v;
        }
        if let Some(v) = self.last_seen {
            target.last_seen = v;
        }
    }
}

/// An immutable versioned DNA profile (spec §3). Never mutated or deleted
/// after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DnaSnapshot {
    pub id: DnaId,
    pub target_id: TargetId,
    pub version: String,
    pub dna: Dna,
    pub parent_id: Option<DnaId>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LearningEventType {
    Birth,
    Mutation,
    Milestone,
    Challenge,
    Discovery,
    GreenLight,
    Other,
}

impl LearningEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Birth => "birth",
            Self::Mutation => "mutation",
            Self::Milestone => "milestone",
            Self::Challenge => "challenge",
            Self::Discovery => "discovery",
            Self::GreenLight => "green_light",
            Self::Other => "other",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "birth" => Self::Birth,
            "mutation" => Self::Mutation,
            "milestone" => Self::Milestone,
            "challenge" => Self::Challenge,
            "discovery" => Self::Discovery,
            "green_light" => Self::GreenLight,
            _ => Self::Other,
        }
    }
}

/// Append-only audit entry (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearningEvent {
    pub id: LearningEventId,
    pub target_id: TargetId,
    pub dna_version_id: Option<DnaId>,
    pub event_type: LearningEventType,
    pub title: String,
    pub description: String,
    pub mcp_insight: Option<String>,
    pub mcp_confidence: Option<f64>,
    pub mcp_model: Option<String>,
    pub dna_changes: Option<Value>,
    pub before_state: Option<Value>,
    pub after_state: Option<Value>,
    pub trust_impact: i32,
    pub challenge_type: Option<String>,
    pub challenge_solved: Option<bool>,
    pub created_at: DateTime<Utc>,
}

impl LearningEvent {
    pub fn new(
        target_id: TargetId,
        event_type: LearningEventType,
        title: impl Into<String>,
        description: impl Into<String>,
        trust_impact: i32,
    ) -> Self {
        Self {
            id: LearningEventId::new(),
            target_id,
            dna_version_id: None,
            event_type,
            title: title.into(),
            description: description.into(),
            mcp_insight: None,
            mcp_confidence: None,
            mcp_model: None,
            dna_changes: None,
            before_state: None,
            after_state: None,
            trust_impact,
            challenge_type: None,
            challenge_solved: None,
            created_at: Utc::now(),
        }
    }
}

/// One row per outbound request (spec §3). Response fields start `None`
/// and are filled in exactly once via `update_request_log_response`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestLog {
    pub id: RequestLogId,
    pub target_id: TargetId,
    pub dna_id: Option<DnaId>,
    pub method: String,
    pub url: String,
    pub request_headers: Value,
    pub body_preview: Option<String>,
    pub response_status: Option<u16>,
    pub response_headers: Option<Value>,
    pub response_body_preview: Option<String>,
    pub was_blocked: bool,
    pub block_reason: Option<String>,
    pub challenge_detected: bool,
    pub challenge_type: Option<String>,
    pub timing_ms: Option<u64>,
    pub created_at: DateTime<Utc>,
}

impl RequestLog {
    pub fn new(target_id: TargetId, dna_id: DnaId, method: impl Into<String>, url: impl Into<String>, request_headers: Value) -> Self {
        Self {
            id: RequestLogId::new(),
            target_id,
            dna_id: Some(dna_id),
            method: method.into(),
            url: url.into(),
            request_headers,
            body_preview: None,
            response_status: None,
            response_headers: None,
            response_body_preview: None,
            was_blocked: false,
            block_reason: None,
            challenge_detected: false,
            challenge_type: None,
            timing_ms: None,
            created_at: Utc::now(),
        }
    }
}

/// Fields filled in once a response completes.
#[derive(Debug, Clone, Default)]
pub struct RequestLogResponse {
    pub response_status: Option<u16>,
    pub response_headers: Option<Value>,
    pub response_body_preview: Option<String>,
    pub was_blocked: bool,
    pub block_reason: Option<String>,
    pub challenge_detected: bool,
    pub challenge_type: Option<String>,
    pub timing_ms: Option<u64>,
}

/// History row capturing the outcome of a Scorer computation that produced
/// a transition (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GreenLightState {
    pub id: GreenLightStateId,
    pub target_id: TargetId,
    pub status: GreenLightStatus,
    pub trust_score: i32,
    pub signals: Value,
    pub established_at: Option<DateTime<Utc>>,
    pub maintained_for: i64,
    pub lost_at: Option<DateTime<Utc>>,
    pub reason_lost: Option<String>,
    pub created_at: DateTime<Utc>,
}
