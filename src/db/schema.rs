//! Database schema and migrations

use rusqlite::Connection;

use crate::Result;

/// Current schema version
pub const SCHEMA_VERSION: i32 = 2;

/// Initialize the database schema
///
/// # Errors
///
/// Returns error if migration fails
pub fn init(conn: &Connection) -> Result<()> {
    let version: i32 = conn
        .query_row("PRAGMA user_version", [], |row| row.get(0))
        .unwrap_or(0);

    if version < 1 {
        migrate_v1(conn)?;
    }
    if version < 2 {
        migrate_v2(conn)?;
    }

    Ok(())
}

fn migrate_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r"
        -- Registered users, matched by phone number or display name
        CREATE TABLE IF NOT EXISTS api_profile (
            id TEXT PRIMARY KEY,
            first_name TEXT NOT NULL,
            display_name TEXT,
            phone_no TEXT,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_profile_phone ON api_profile(phone_no);
        CREATE INDEX IF NOT EXISTS idx_profile_display_name ON api_profile(display_name);

        -- Carbon-footprint records extracted from chat messages
        CREATE TABLE IF NOT EXISTS api_activity (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            category TEXT,
            description TEXT,
            value REAL,
            unit TEXT,
            carbon_footprint_kg REAL,
            source TEXT NOT NULL,
            timestamp TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_activity_user ON api_activity(user_id);

        -- Generic summary/intent records extracted from chat messages
        CREATE TABLE IF NOT EXISTS message_log (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            sender_id TEXT NOT NULL,
            platform TEXT NOT NULL,
            message_type TEXT NOT NULL,
            summary TEXT,
            intent TEXT,
            details TEXT,
            raw TEXT NOT NULL,
            timestamp TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_message_log_user ON message_log(user_id);

        PRAGMA user_version = 1;
        ",
    )?;

    tracing::info!("migrated to schema v1");
    Ok(())
}

fn migrate_v2(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r"
        -- Durable conversation -> profile bindings
        CREATE TABLE IF NOT EXISTS chat_sessions (
            conversation_key TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        PRAGMA user_version = 2;
        ",
    )?;

    tracing::info!("migrated to schema v2 (durable sessions)");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table_exists(conn: &Connection, name: &str) -> bool {
        conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
            [name],
            |row| row.get::<_, i32>(0),
        )
        .unwrap()
            == 1
    }

    #[test]
    fn test_schema_init() {
        let conn = Connection::open_in_memory().unwrap();
        init(&conn).unwrap();

        for table in ["api_profile", "api_activity", "message_log", "chat_sessions"] {
            assert!(table_exists(&conn, table), "missing table {table}");
        }

        let version: i32 = conn
            .query_row("PRAGMA user_version", [], |row| row.get(0))
            .unwrap();
        assert_eq!(version, SCHEMA_VERSION);
    }

    #[test]
    fn test_schema_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        init(&conn).unwrap();
        init(&conn).unwrap(); // Should not fail
    }
}
