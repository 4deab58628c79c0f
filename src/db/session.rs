//! Durable conversation session repository

use rusqlite::OptionalExtension;

use super::DbPool;
use crate::{Error, Result};

/// Repository binding conversation keys to profile IDs
#[derive(Debug, Clone)]
pub struct SessionRepo {
    pool: DbPool,
}

impl SessionRepo {
    /// Create a new session repository
    #[must_use]
    pub const fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Get the profile ID bound to a conversation
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn get(&self, conversation_key: &str) -> Result<Option<String>> {
        let conn = self.pool.get().map_err(|e| Error::Database(e.to_string()))?;

        let user_id = conn
            .query_row(
                "SELECT user_id FROM chat_sessions WHERE conversation_key = ?1",
                [conversation_key],
                |row| row.get(0),
            )
            .optional()?;

        Ok(user_id)
    }

    /// Bind a conversation to a profile ID, replacing any previous binding
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn set(&self, conversation_key: &str, user_id: &str) -> Result<()> {
        let conn = self.pool.get().map_err(|e| Error::Database(e.to_string()))?;

        conn.execute(
            "INSERT INTO chat_sessions (conversation_key, user_id) VALUES (?1, ?2)
             ON CONFLICT(conversation_key) DO UPDATE SET user_id = excluded.user_id",
            [conversation_key, user_id],
        )?;

        Ok(())
    }

    /// Remove a conversation binding
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn delete(&self, conversation_key: &str) -> Result<bool> {
        let conn = self.pool.get().map_err(|e| Error::Database(e.to_string()))?;

        let deleted = conn.execute(
            "DELETE FROM chat_sessions WHERE conversation_key = ?1",
            [conversation_key],
        )?;

        Ok(deleted > 0)
    }
}
