//! Message log repository for the generic summary/intent schema

use rusqlite::Connection;
use uuid::Uuid;

use super::{DbPool, now_rfc3339};
use crate::{Error, Result};

/// A message log row
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageLogEntry {
    pub user_id: String,
    pub sender_id: String,
    pub platform: String,
    pub message_type: String,
    pub summary: Option<String>,
    pub intent: Option<String>,
    /// Free-form details, stored as JSON text when the model returns a structure
    pub details: Option<String>,
    /// The full normalized record as JSON text
    pub raw: String,
}

/// Message log repository
#[derive(Debug, Clone)]
pub struct MessageLogRepo {
    pool: DbPool,
}

impl MessageLogRepo {
    /// Create a new message log repository
    #[must_use]
    pub const fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Insert a log row, returning its ID
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn insert(&self, entry: &MessageLogEntry) -> Result<String> {
        let conn = self.pool.get().map_err(|e| Error::Database(e.to_string()))?;
        insert_entry(&conn, entry)
    }

    /// List a user's log rows, oldest first
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn list_for_user(&self, user_id: &str) -> Result<Vec<MessageLogEntry>> {
        let conn = self.pool.get().map_err(|e| Error::Database(e.to_string()))?;

        let mut stmt = conn.prepare(
            "SELECT user_id, sender_id, platform, message_type, summary, intent, details, raw
             FROM message_log WHERE user_id = ?1 ORDER BY rowid",
        )?;

        let rows = stmt
            .query_map([user_id], |row| {
                Ok(MessageLogEntry {
                    user_id: row.get(0)?,
                    sender_id: row.get(1)?,
                    platform: row.get(2)?,
                    message_type: row.get(3)?,
                    summary: row.get(4)?,
                    intent: row.get(5)?,
                    details: row.get(6)?,
                    raw: row.get(7)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(rows)
    }
}

/// Insert a log row on an existing connection or transaction
///
/// # Errors
///
/// Returns error if the insert fails
pub fn insert_entry(conn: &Connection, entry: &MessageLogEntry) -> Result<String> {
    let id = Uuid::new_v4().to_string();

    conn.execute(
        "INSERT INTO message_log
            (id, user_id, sender_id, platform, message_type, summary, intent, details, raw, timestamp)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        rusqlite::params![
            id,
            entry.user_id,
            entry.sender_id,
            entry.platform,
            entry.message_type,
            entry.summary,
            entry.intent,
            entry.details,
            entry.raw,
            now_rfc3339(),
        ],
    )?;

    Ok(id)
}
