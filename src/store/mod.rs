//! Durable persistence for targets, DNA lineage, learning history, request
//! logs, and green-light state (spec §3, §4.1).

pub mod cache;
pub mod schema;
pub mod sqlite;
pub mod types;

pub use cache::GreenLightCache;
pub use sqlite::SqliteStore;
pub use types::{
    DnaSnapshot, GreenLightState, GreenLightStatus, LearningEvent, LearningEventType, RequestLog,
    RequestLogResponse, Target, TargetPatch, TargetStatus, TargetType,
};

use crate::error::Result;
use crate::ids::{RequestLogId, TargetId};

/// The persistence seam every higher-level module depends on. Kept
/// synchronous (plain `&self` methods over a guarded `rusqlite::Connection`)
/// rather than `async_trait`, mirroring how `rlm-core`'s memory store is
/// called inline from async orchestration code — a local SQLite round trip
/// is fast enough not to need its own executor.
pub trait Store: Send + Sync {
    fn create_target(&self, target: &Target) -> Result<()>;
    fn get_target(&self, id: TargetId) -> Result<Option<Target>>;
    fn update_target_fields(&self, id: TargetId, patch: TargetPatch) -> Result<()>;
    fn delete_target(&self, id: TargetId) -> Result<bool>;

    fn get_active_dna(&self, target_id: TargetId) -> Result<Option<DnaSnapshot>>;
    fn create_dna_snapshot(&self, snapshot: &DnaSnapshot, deactivate_prior_active: bool) -> Result<()>;
    fn get_dna_lineage(&self, target_id: TargetId) -> Result<Vec<DnaSnapshot>>;

    fn append_learning_event(&self, event: &LearningEvent) -> Result<()>;

    fn append_request_log(&self, log: &RequestLog) -> Result<()>;
    fn update_request_log_response(&self, id: RequestLogId, response: RequestLogResponse) -> Result<()>;
    fn recent_request_logs(&self, target_id: TargetId, n: usize) -> Result<Vec<RequestLog>>;

    fn put_green_light_state(&self, state: &GreenLightState) -> Result<()>;
    fn get_cached_green_light_state(&self, target_id: TargetId) -> Result<Option<GreenLightState>>;
}
