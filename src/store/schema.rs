//! SQLite schema and migrations for the durable store.

use rusqlite::{Connection, Result as SqliteResult};

/// Current schema version.
pub const SCHEMA_VERSION: i32 = 1;

/// Initialize the database schema.
pub fn initialize_schema(conn: &Connection) -> SqliteResult<()> {
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
        [],
    )?;

    let current_version: i32 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_version",
            [],
            |row| row.get(0),
        )
        .unwrap_or(0);

    if current_version < 1 {
        apply_v1_schema(conn)?;
    }

    Ok(())
}

fn apply_v1_schema(conn: &Connection) -> SqliteResult<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS targets (
            id TEXT PRIMARY KEY,
            url TEXT NOT NULL,
            target_type TEXT NOT NULL,
            status TEXT NOT NULL,
            green_light_status TEXT NOT NULL,
            trust_score INTEGER NOT NULL DEFAULT 0,
            established_at TEXT,
            maintained_for INTEGER NOT NULL DEFAULT 0,
            is_authenticated INTEGER NOT NULL DEFAULT 0,
            auth_endpoint TEXT,
            auth_username TEXT,
            session_cookie TEXT,
            current_dna_id TEXT,
            created_at TEXT NOT NULL,
            last_seen TEXT
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS dna_snapshots (
            id TEXT PRIMARY KEY,
            target_id TEXT NOT NULL,
            version TEXT NOT NULL,
            dna_json TEXT NOT NULL,
            parent_id TEXT,
            is_active INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            FOREIGN KEY (target_id) REFERENCES targets(id) ON DELETE CASCADE
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS learning_events (
            id TEXT PRIMARY KEY,
            target_id TEXT NOT NULL,
            dna_version_id TEXT,
            event_type TEXT NOT NULL,
            title TEXT NOT NULL,
            description TEXT NOT NULL,
            mcp_insight TEXT,
            mcp_confidence REAL,
            mcp_model TEXT,
            dna_changes TEXT,
            before_state TEXT,
            after_state TEXT,
            trust_impact INTEGER NOT NULL DEFAULT 0,
            challenge_type TEXT,
            challenge_solved INTEGER,
            created_at TEXT NOT NULL,
            FOREIGN KEY (target_id) REFERENCES targets(id) ON DELETE CASCADE
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS request_logs (
            id TEXT PRIMARY KEY,
            target_id TEXT NOT NULL,
            dna_id TEXT,
            method TEXT NOT NULL,
            url TEXT NOT NULL,
            request_headers TEXT NOT NULL,
            body_preview TEXT,
            response_status INTEGER,
            response_headers TEXT,
            response_body_preview TEXT,
            was_blocked INTEGER NOT NULL DEFAULT 0,
            block_reason TEXT,
            challenge_detected INTEGER NOT NULL DEFAULT 0,
            challenge_type TEXT,
            timing_ms INTEGER,
            response_recorded INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            FOREIGN KEY (target_id) REFERENCES targets(id) ON DELETE CASCADE
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS green_light_states (
            id TEXT PRIMARY KEY,
            target_id TEXT NOT NULL,
            status TEXT NOT NULL,
            trust_score INTEGER NOT NULL,
            signals_json TEXT NOT NULL,
            established_at TEXT,
            maintained_for INTEGER NOT NULL DEFAULT 0,
            lost_at TEXT,
            reason_lost TEXT,
            created_at TEXT NOT NULL,
            FOREIGN KEY (target_id) REFERENCES targets(id) ON DELETE CASCADE
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_dna_target ON dna_snapshots(target_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_dna_active ON dna_snapshots(target_id, is_active)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_learning_target ON learning_events(target_id, created_at)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_requests_target ON request_logs(target_id, created_at)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_green_light_target ON green_light_states(target_id, created_at)",
        [],
    )?;

    conn.execute("INSERT INTO schema_version (version) VALUES (1)", [])?;

    Ok(())
}

/// Get the current schema version.
pub fn get_schema_version(conn: &Connection) -> SqliteResult<i32> {
    conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |row| row.get(0),
    )
}

/// Check if the schema is initialized.
pub fn is_initialized(conn: &Connection) -> bool {
    conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='targets'",
        [],
        |row| row.get::<_, i32>(0),
    )
    .map(|count| count > 0)
    .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initializes_schema() {
        let conn = Connection::open_in_memory().unwrap();
        initialize_schema(&conn).unwrap();
        assert!(is_initialized(&conn));
        assert_eq!(get_schema_version(&conn).unwrap(), 1);
    }

    #[test]
    fn idempotent_initialization() {
        let conn = Connection::open_in_memory().unwrap();
        initialize_schema(&conn).unwrap();
        initialize_schema(&conn).unwrap();
        assert_eq!(get_schema_version(&conn).unwrap(), 1);
    }
}
