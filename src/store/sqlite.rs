//! SQLite-backed implementation of [`Store`].

use std::path::Path;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

use crate::dna::Dna;
use crate::error::{Error, Result};
use crate::ids::{DnaId, GreenLightStateId, LearningEventId, RequestLogId, TargetId};
use crate::store::cache::GreenLightCache;
use crate::store::schema::{initialize_schema, is_initialized};
use crate::store::types::{
    DnaSnapshot, GreenLightState, GreenLightStatus, LearningEvent, LearningEventType, RequestLog,
    RequestLogResponse, Target, TargetPatch, TargetStatus, TargetType,
};
use crate::store::Store;

/// SQLite-backed durable store, mirroring `rlm-core::memory::SqliteMemoryStore`'s
/// `Arc<Mutex<Connection>>` + `with_conn` shape.
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
    green_light_cache: GreenLightCache,
}

impl SqliteStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path).map_err(|e| Error::store(e.to_string()))?;
        if !is_initialized(&conn) {
            initialize_schema(&conn).map_err(|e| Error::store(e.to_string()))?;
        }
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            green_light_cache: GreenLightCache::with_default_ttl(),
        })
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| Error::store(e.to_string()))?;
        initialize_schema(&conn).map_err(|e| Error::store(e.to_string()))?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            green_light_cache: GreenLightCache::with_default_ttl(),
        })
    }

    fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> rusqlite::Result<T>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|e| Error::Internal(format!("failed to lock connection: {e}")))?;
        f(&conn).map_err(|e| Error::store(e.to_string()))
    }

    fn row_to_target(row: &rusqlite::Row) -> rusqlite::Result<Target> {
        let target_type_str: String = row.get(2)?;
        let status_str: String = row.get(3)?;
        let green_light_str: String = row.get(4)?;
        let current_dna_id: Option<String> = row.get(12)?;
        Ok(Target {
            id: TargetId::parse(&row.get::<_, String>(0)?).unwrap_or_default(),
            url: row.get(1)?,
            target_type: serde_json::from_value(serde_json::Value::String(target_type_str))
                .unwrap_or(TargetType::Web),
            status: TargetStatus::parse(&status_str).unwrap_or(TargetStatus::Discovering),
            green_light_status: GreenLightStatus::parse(&green_light_str)
                .unwrap_or(GreenLightStatus::Red),
            trust_score: row.get(5)?,
            established_at: parse_opt_datetime(row.get(6)?),
            maintained_for: row.get(7)?,
            is_authenticated: row.get::<_, i64>(8)? != 0,
            auth_endpoint: row.get(9)?,
            auth_username: row.get(10)?,
            session_cookie: row.get(11)?,
            current_dna_id: current_dna_id.and_then(|s| DnaId::parse(&s).ok()),
            created_at: parse_datetime(row.get::<_, String>(13)?),
            last_seen: parse_opt_datetime(row.get(14)?),
        })
    }

    fn row_to_dna_snapshot(row: &rusqlite::Row) -> rusqlite::Result<DnaSnapshot> {
        let dna_json: String = row.get(3)?;
        let parent_id: Option<String> = row.get(4)?;
        let dna: Dna = serde_json::from_str(&dna_json).unwrap_or_default();
        Ok(DnaSnapshot {
            id: DnaId::parse(&row.get::<_, String>(0)?).unwrap_or_default(),
            target_id: TargetId::parse(&row.get::<_, String>(1)?).unwrap_or_default(),
            version: row.get(2)?,
            dna,
            parent_id: parent_id.and_then(|s| DnaId::parse(&s).ok()),
            is_active: row.get::<_, i64>(5)? != 0,
            created_at: parse_datetime(row.get::<_, String>(6)?),
        })
    }

    fn row_to_learning_event(row: &rusqlite::Row) -> rusqlite::Result<LearningEvent> {
        let dna_version_id: Option<String> = row.get(2)?;
        let event_type_str: String = row.get(3)?;
        let dna_changes: Option<String> = row.get(9)?;
        let before_state: Option<String> = row.get(10)?;
        let after_state: Option<String> = row.get(11)?;
        Ok(LearningEvent {
            id: LearningEventId::parse(&row.get::<_, String>(0)?).unwrap_or_default(),
            target_id: TargetId::parse(&row.get::<_, String>(1)?).unwrap_or_default(),
            dna_version_id: dna_version_id.and_then(|s| DnaId::parse(&s).ok()),
            event_type: LearningEventType::parse(&event_type_str),
            title: row.get(4)?,
            description: row.get(5)?,
            mcp_insight: row.get(6)?,
            mcp_confidence: row.get(7)?,
            mcp_model: row.get(8)?,
            dna_changes: dna_changes.and_then(|s| serde_json::from_str(&s).ok()),
            before_state: before_state.and_then(|s| serde_json::from_str(&s).ok()),
            after_state: after_state.and_then(|s| serde_json::from_str(&s).ok()),
            trust_impact: row.get(12)?,
            challenge_type: row.get(13)?,
            challenge_solved: row.get::<_, Option<i64>>(14)?.map(|v| v != 0),
            created_at: parse_datetime(row.get::<_, String>(15)?),
        })
    }

    fn row_to_request_log(row: &rusqlite::Row) -> rusqlite::Result<RequestLog> {
        let dna_id: Option<String> = row.get(2)?;
        let request_headers: String = row.get(5)?;
        let response_headers: Option<String> = row.get(8)?;
        Ok(RequestLog {
            id: RequestLogId::parse(&row.get::<_, String>(0)?).unwrap_or_default(),
            target_id: TargetId::parse(&row.get::<_, String>(1)?).unwrap_or_default(),
            dna_id: dna_id.and_then(|s| DnaId::parse(&s).ok()),
            method: row.get(3)?,
            url: row.get(4)?,
            request_headers: serde_json::from_str(&request_headers).unwrap_or(serde_json::Value::Null),
            body_preview: row.get(6)?,
            response_status: row.get::<_, Option<i64>>(7)?.map(|v| v as u16),
            response_headers: response_headers.and_then(|s| serde_json::from_str(&s).ok()),
            response_body_preview: row.get(9)?,
            was_blocked: row.get::<_, i64>(10)? != 0,
            block_reason: row.get(11)?,
            challenge_detected: row.get::<_, i64>(12)? != 0,
            challenge_type: row.get(13)?,
            timing_ms: row.get::<_, Option<i64>>(14)?.map(|v| v as u64),
            created_at: parse_datetime(row.get::<_, String>(16)?),
        })
    }

    fn row_to_green_light_state(row: &rusqlite::Row) -> rusqlite::Result<GreenLightState> {
        let status_str: String = row.get(2)?;
        let signals_json: String = row.get(4)?;
        Ok(GreenLightState {
            id: GreenLightStateId::parse(&row.get::<_, String>(0)?).unwrap_or_default(),
            target_id: TargetId::parse(&row.get::<_, String>(1)?).unwrap_or_default(),
            status: GreenLightStatus::parse(&status_str).unwrap_or(GreenLightStatus::Red),
            trust_score: row.get(3)?,
            signals: serde_json::from_str(&signals_json).unwrap_or(serde_json::Value::Null),
            established_at: parse_opt_datetime(row.get(5)?),
            maintained_for: row.get(6)?,
            lost_at: parse_opt_datetime(row.get(7)?),
            reason_lost: row.get(8)?,
            created_at: parse_datetime(row.get::<_, String>(9)?),
        })
    }
}

fn parse_datetime(s: String) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn parse_opt_datetime(s: Option<String>) -> Option<DateTime<Utc>> {
    s.map(parse_datetime)
}

fn target_type_str(t: TargetType) -> &'static str {
    match t {
        TargetType::Web => "web",
        TargetType::Other => "other",
    }
}

impl Store for SqliteStore {
    fn create_target(&self, target: &Target) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO targets (
                    id, url, target_type, status, green_light_status, trust_score,
                    established_at, maintained_for, is_authenticated, auth_endpoint,
                    auth_username, session_cookie, current_dna_id, created_at, last_seen
                ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15)",
                params![
                    target.id.to_string(),
                    target.url,
                    target_type_str(target.target_type),
                    target.status.as_str(),
                    target.green_light_status.as_str(),
                    target.trust_score,
                    target.established_at.map(|d| d.to_rfc3339()),
                    target.maintained_for,
                    target.is_authenticated as i64,
                    target.auth_endpoint,
                    target.auth_username,
                    target.session_cookie,
                    target.current_dna_id.map(|id| id.to_string()),
                    target.created_at.to_rfc3339(),
                    target.last_seen.map(|d| d.to_rfc3339()),
                ],
            )?;
            Ok(())
        })
    }

    fn get_target(&self, id: TargetId) -> Result<Option<Target>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, url, target_type, status, green_light_status, trust_score,
                        established_at, maintained_for, is_authenticated, auth_endpoint,
                        auth_username, session_cookie, current_dna_id, created_at, last_seen
                 FROM targets WHERE id = ?1",
                params![id.to_string()],
                Self::row_to_target,
            )
            .optional()
        })
    }

    fn update_target_fields(&self, id: TargetId, patch: TargetPatch) -> Result<()> {
        let mut target = self
            .get_target(id)?
            .ok_or_else(|| Error::invariant_violation(format!("target {id} not found")))?;
        patch.apply(&mut target);
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE targets SET
                    status = ?2, green_light_status = ?3, trust_score = ?4,
                    established_at = ?5, maintained_for = ?6, is_authenticated = ?7,
                    auth_endpoint = ?8, auth_username = ?9, session_cookie = ?10,
                    current_dna_id = ?11, last_seen = ?12
                 WHERE id = ?1",
                params![
                    target.id.to_string(),
                    target.status.as_str(),
                    target.green_light_status.as_str(),
                    target.trust_score,
                    target.established_at.map(|d| d.to_rfc3339()),
                    target.maintained_for,
                    target.is_authenticated as i64,
                    target.auth_endpoint,
                    target.auth_username,
                    target.session_cookie,
                    target.current_dna_id.map(|id| id.to_string()),
                    target.last_seen.map(|d| d.to_rfc3339()),
                ],
            )?;
            Ok(())
        })
    }

    fn delete_target(&self, id: TargetId) -> Result<bool> {
        self.with_conn(|conn| {
            let rows = conn.execute("DELETE FROM targets WHERE id = ?1", params![id.to_string()])?;
            Ok(rows > 0)
        })
    }

    fn get_active_dna(&self, target_id: TargetId) -> Result<Option<DnaSnapshot>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, target_id, version, dna_json, parent_id, is_active, created_at
                 FROM dna_snapshots WHERE target_id = ?1 AND is_active = 1",
                params![target_id.to_string()],
                Self::row_to_dna_snapshot,
            )
            .optional()
        })
    }

    fn create_dna_snapshot(&self, snapshot: &DnaSnapshot, deactivate_prior_active: bool) -> Result<()> {
        self.with_conn(|conn| {
            let tx = conn.unchecked_transaction()?;
            if deactivate_prior_active {
                tx.execute(
                    "UPDATE dna_snapshots SET is_active = 0 WHERE target_id = ?1 AND is_active = 1",
                    params![snapshot.target_id.to_string()],
                )?;
            }
            let dna_json = serde_json::to_string(&snapshot.dna).unwrap_or_default();
            tx.execute(
                "INSERT INTO dna_snapshots (id, target_id, version, dna_json, parent_id, is_active, created_at)
                 VALUES (?1,?2,?3,?4,?5,?6,?7)",
                params![
                    snapshot.id.to_string(),
                    snapshot.target_id.to_string(),
                    snapshot.version,
                    dna_json,
                    snapshot.parent_id.map(|id| id.to_string()),
                    snapshot.is_active as i64,
                    snapshot.created_at.to_rfc3339(),
                ],
            )?;
            tx.execute(
                "UPDATE targets SET current_dna_id = ?2 WHERE id = ?1",
                params![snapshot.target_id.to_string(), snapshot.id.to_string()],
            )?;
            tx.commit()?;
            Ok(())
        })?;
        debug!(
            target_id = %snapshot.target_id,
            dna_id = %snapshot.id,
            version = %snapshot.version,
            deactivated_prior = deactivate_prior_active,
            "DNA snapshot committed"
        );
        Ok(())
    }

    fn get_dna_lineage(&self, target_id: TargetId) -> Result<Vec<DnaSnapshot>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, target_id, version, dna_json, parent_id, is_active, created_at
                 FROM dna_snapshots WHERE target_id = ?1 ORDER BY created_at ASC",
            )?;
            let rows = stmt
                .query_map(params![target_id.to_string()], Self::row_to_dna_snapshot)?
                .filter_map(|r| r.ok())
                .collect();
            Ok(rows)
        })
    }

    fn append_learning_event(&self, event: &LearningEvent) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO learning_events (
                    id, target_id, dna_version_id, event_type, title, description,
                    mcp_insight, mcp_confidence, mcp_model, dna_changes, before_state,
                    after_state, trust_impact, challenge_type, challenge_solved, created_at
                ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?16)",
                params![
                    event.id.to_string(),
                    event.target_id.to_string(),
                    event.dna_version_id.map(|id| id.to_string()),
                    event.event_type.as_str(),
                    event.title,
                    event.description,
                    event.mcp_insight,
                    event.mcp_confidence,
                    event.mcp_model,
                    event.dna_changes.as_ref().map(|v| v.to_string()),
                    event.before_state.as_ref().map(|v| v.to_string()),
                    event.after_state.as_ref().map(|v| v.to_string()),
                    event.trust_impact,
                    event.challenge_type,
                    event.challenge_solved.map(|b| b as i64),
                    event.created_at.to_rfc3339(),
                ],
            )?;
            Ok(())
        })
    }

    fn append_request_log(&self, log: &RequestLog) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO request_logs (
                    id, target_id, dna_id, method, url, request_headers, body_preview,
                    response_status, response_headers, response_body_preview, was_blocked,
                    block_reason, challenge_detected, challenge_type, timing_ms,
                    response_recorded, created_at
                ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,0,?16)",
                params![
                    log.id.to_string(),
                    log.target_id.to_string(),
                    log.dna_id.map(|id| id.to_string()),
                    log.method,
                    log.url,
                    log.request_headers.to_string(),
                    log.body_preview,
                    log.response_status.map(|v| v as i64),
                    log.response_headers.as_ref().map(|v| v.to_string()),
                    log.response_body_preview,
                    log.was_blocked as i64,
                    log.block_reason,
                    log.challenge_detected as i64,
                    log.challenge_type,
                    log.timing_ms.map(|v| v as i64),
                    log.created_at.to_rfc3339(),
                ],
            )?;
            Ok(())
        })
    }

    fn update_request_log_response(&self, id: RequestLogId, response: RequestLogResponse) -> Result<()> {
        self.with_conn(|conn| {
            let already_recorded: i64 = conn.query_row(
                "SELECT response_recorded FROM request_logs WHERE id = ?1",
                params![id.to_string()],
                |row| row.get(0),
            )?;
            if already_recorded != 0 {
                return Err(rusqlite::Error::QueryReturnedNoRows);
            }
            conn.execute(
                "UPDATE request_logs SET
                    response_status = ?2, response_headers = ?3, response_body_preview = ?4,
                    was_blocked = ?5, block_reason = ?6, challenge_detected = ?7,
                    challenge_type = ?8, timing_ms = ?9, response_recorded = 1
                 WHERE id = ?1",
                params![
                    id.to_string(),
                    response.response_status.map(|v| v as i64),
                    response.response_headers.as_ref().map(|v| v.to_string()),
                    response.response_body_preview,
                    response.was_blocked as i64,
                    response.block_reason,
                    response.challenge_detected as i64,
                    response.challenge_type,
                    response.timing_ms.map(|v| v as i64),
                ],
            )?;
            Ok(())
        })
    }

    fn recent_request_logs(&self, target_id: TargetId, n: usize) -> Result<Vec<RequestLog>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, target_id, dna_id, method, url, request_headers, body_preview,
                        response_status, response_headers, response_body_preview, was_blocked,
                        block_reason, challenge_detected, challenge_type, timing_ms,
                        response_recorded, created_at
                 FROM request_logs WHERE target_id = ?1 ORDER BY created_at DESC LIMIT ?2",
            )?;
            let mut rows: Vec<RequestLog> = stmt
                .query_map(params![target_id.to_string(), n as i64], Self::row_to_request_log)?
                .filter_map(|r| r.ok())
                .collect();
            rows.reverse();
            Ok(rows)
        })
    }

    fn put_green_light_state(&self, state: &GreenLightState) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO green_light_states (
                    id, target_id, status, trust_score, signals_json, established_at,
                    maintained_for, lost_at, reason_lost, created_at
                ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10)",
                params![
                    state.id.to_string(),
                    state.target_id.to_string(),
                    state.status.as_str(),
                    state.trust_score,
                    state.signals.to_string(),
                    state.established_at.map(|d| d.to_rfc3339()),
                    state.maintained_for,
                    state.lost_at.map(|d| d.to_rfc3339()),
                    state.reason_lost,
                    state.created_at.to_rfc3339(),
                ],
            )?;
            Ok(())
        })?;
        self.green_light_cache.put(state.clone());
        Ok(())
    }

    fn get_cached_green_light_state(&self, target_id: TargetId) -> Result<Option<GreenLightState>> {
        if let Some(cached) = self.green_light_cache.get(target_id) {
            return Ok(Some(cached));
        }
        let state = self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, target_id, status, trust_score, signals_json, established_at,
                        maintained_for, lost_at, reason_lost, created_at
                 FROM green_light_states WHERE target_id = ?1 ORDER BY created_at DESC LIMIT 1",
                params![target_id.to_string()],
                Self::row_to_green_light_state,
            )
            .optional()
        })?;
        if let Some(ref s) = state {
            self.green_light_cache.put(s.clone());
        }
        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dna::Dna;

    fn new_store() -> SqliteStore {
        SqliteStore::in_memory().unwrap()
    }

    #[test]
    fn create_and_get_target() {
        let store = new_store();
        let target = Target::new("https://example.com");
        store.create_target(&target).unwrap();
        let loaded = store.get_target(target.id).unwrap().unwrap();
        assert_eq!(loaded.url, "https://example.com");
        assert_eq!(loaded.status, TargetStatus::Discovering);
    }

    #[test]
    fn dna_snapshot_activation_is_atomic() {
        let store = new_store();
        let target = Target::new("https://example.com");
        store.create_target(&target).unwrap();

        let first = DnaSnapshot {
            id: DnaId::new(),
            target_id: target.id,
            version: "1.0.0".to_string(),
            dna: Dna::default(),
            parent_id: None,
            is_active: true,
            created_at: Utc::now(),
        };
        store.create_dna_snapshot(&first, false).unwrap();

        let second = DnaSnapshot {
            id: DnaId::new(),
            target_id: target.id,
            version: "1.0.1".to_string(),
            dna: Dna::default(),
            parent_id: Some(first.id),
            is_active: true,
            created_at: Utc::now(),
        };
        store.create_dna_snapshot(&second, true).unwrap();

        let active = store.get_active_dna(target.id).unwrap().unwrap();
        assert_eq!(active.id, second.id);

        let lineage = store.get_dna_lineage(target.id).unwrap();
        assert_eq!(lineage.len(), 2);
        assert_eq!(lineage.iter().filter(|s| s.is_active).count(), 1);
    }

    #[test]
    fn request_log_response_can_only_be_recorded_once() {
        let store = new_store();
        let target = Target::new("https://example.com");
        store.create_target(&target).unwrap();
        let dna_id = DnaId::new();
        let log = RequestLog::new(target.id, dna_id, "GET", "https://example.com", serde_json::json!({}));
        store.append_request_log(&log).unwrap();

        store
            .update_request_log_response(
                log.id,
                RequestLogResponse {
                    response_status: Some(200),
                    ..Default::default()
                },
            )
            .unwrap();

        let second = store.update_request_log_response(
            log.id,
            RequestLogResponse {
                response_status: Some(403),
                ..Default::default()
            },
        );
        assert!(second.is_err());
    }

    #[test]
    fn recent_request_logs_respects_limit_and_order() {
        let store = new_store();
        let target = Target::new("https://example.com");
        store.create_target(&target).unwrap();
        let dna_id = DnaId::new();
        for i in 0..5 {
            let log = RequestLog::new(
                target.id,
                dna_id,
                "GET",
                format!("https://example.com/{i}"),
                serde_json::json!({}),
            );
            store.append_request_log(&log).unwrap();
        }
        let recent = store.recent_request_logs(target.id, 3).unwrap();
        assert_eq!(recent.len(), 3);
        assert!(recent[2].url.ends_with('4'));
    }

    #[test]
    fn green_light_cache_serves_latest_state() {
        let store = new_store();
        let target = Target::new("https://example.com");
        store.create_target(&target).unwrap();
        assert!(store.get_cached_green_light_state(target.id).unwrap().is_none());

        let state = GreenLightState {
            id: GreenLightStateId::new(),
            target_id: target.id,
            status: GreenLightStatus::Yellow,
            trust_score: 30,
            signals: serde_json::json!({}),
            established_at: None,
            maintained_for: 0,
            lost_at: None,
            reason_lost: None,
            created_at: Utc::now(),
        };
        store.put_green_light_state(&state).unwrap();
        let cached = store.get_cached_green_light_state(target.id).unwrap().unwrap();
        assert_eq!(cached.trust_score, 30);
    }

    /// Exercises the on-disk path (`SqliteStore::open`, WAL-journaled by
    /// `initialize_schema`) rather than `in_memory()`: writes through one
    /// handle, drops it, reopens the same file, and confirms the rows and
    /// schema survive the reopen.
    #[test]
    fn on_disk_store_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.sqlite3");

        let target_id = {
            let store = SqliteStore::open(&path).unwrap();
            let target = Target::new("https://example.com");
            store.create_target(&target).unwrap();
            target.id
        };

        let store = SqliteStore::open(&path).unwrap();
        let loaded = store.get_target(target_id).unwrap().unwrap();
        assert_eq!(loaded.url, "https://example.com");
        assert!(is_initialized(&store.conn.lock().unwrap()));
    }
}
