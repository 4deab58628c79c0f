//! Carbon activity repository

use rusqlite::{Connection, Row};
use uuid::Uuid;

use super::{DbPool, now_rfc3339};
use crate::{Error, Result};

/// Source tag written on every chatbot-originated activity row
pub const CHATBOT_SOURCE: &str = "chatbot_pending";

/// A carbon activity row to insert
///
/// Fields other than `user_id` and `source` come straight from model output
/// and may be absent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewActivity {
    pub user_id: String,
    pub category: Option<String>,
    pub description: Option<String>,
    pub value: Option<f64>,
    pub unit: Option<String>,
    pub carbon_footprint_kg: Option<f64>,
    pub source: String,
}

/// A stored carbon activity row
#[derive(Debug, Clone, PartialEq)]
pub struct Activity {
    pub id: String,
    pub record: NewActivity,
    pub timestamp: String,
}

impl Activity {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            record: NewActivity {
                user_id: row.get(1)?,
                category: row.get(2)?,
                description: row.get(3)?,
                value: row.get(4)?,
                unit: row.get(5)?,
                carbon_footprint_kg: row.get(6)?,
                source: row.get(7)?,
            },
            timestamp: row.get(8)?,
        })
    }
}

/// Activity repository
#[derive(Debug, Clone)]
pub struct ActivityRepo {
    pool: DbPool,
}

impl ActivityRepo {
    /// Create a new activity repository
    #[must_use]
    pub const fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Insert an activity row, returning its ID
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn insert(&self, activity: &NewActivity) -> Result<String> {
        let conn = self.pool.get().map_err(|e| Error::Database(e.to_string()))?;
        insert_activity(&conn, activity)
    }

    /// List a user's activities, oldest first
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn list_for_user(&self, user_id: &str) -> Result<Vec<Activity>> {
        let conn = self.pool.get().map_err(|e| Error::Database(e.to_string()))?;

        let mut stmt = conn.prepare(
            "SELECT id, user_id, category, description, value, unit, carbon_footprint_kg, source, timestamp
             FROM api_activity WHERE user_id = ?1 ORDER BY rowid",
        )?;

        let rows = stmt
            .query_map([user_id], Activity::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(rows)
    }

    /// Count all activity rows
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn count(&self) -> Result<i64> {
        let conn = self.pool.get().map_err(|e| Error::Database(e.to_string()))?;
        let count = conn.query_row("SELECT COUNT(*) FROM api_activity", [], |row| row.get(0))?;
        Ok(count)
    }
}

/// Insert an activity row on an existing connection or transaction
///
/// # Errors
///
/// Returns error if the insert fails
pub fn insert_activity(conn: &Connection, activity: &NewActivity) -> Result<String> {
    let id = Uuid::new_v4().to_string();

    conn.execute(
        "INSERT INTO api_activity
            (id, user_id, category, description, value, unit, carbon_footprint_kg, source, timestamp)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        rusqlite::params![
            id,
            activity.user_id,
            activity.category,
            activity.description,
            activity.value,
            activity.unit,
            activity.carbon_footprint_kg,
            activity.source,
            now_rfc3339(),
        ],
    )?;

    Ok(id)
}
