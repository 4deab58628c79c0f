//! Profile repository (the registered-user table)

use rusqlite::{OptionalExtension, Row};
use uuid::Uuid;

use super::DbPool;
use crate::{Error, Result};

/// A registered user profile
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    pub id: String,
    pub first_name: String,
    pub display_name: Option<String>,
    pub phone_no: Option<String>,
}

impl Profile {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            first_name: row.get(1)?,
            display_name: row.get(2)?,
            phone_no: row.get(3)?,
        })
    }
}

/// Prefix a phone number with `+` if it doesn't already have one
#[must_use]
pub fn normalize_phone(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.starts_with('+') {
        trimmed.to_string()
    } else {
        format!("+{trimmed}")
    }
}

/// Profile repository
#[derive(Debug, Clone)]
pub struct ProfileRepo {
    pool: DbPool,
}

impl ProfileRepo {
    /// Create a new profile repository
    #[must_use]
    pub const fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Find a profile by phone number
    ///
    /// Matches by exact equality against both the `+`-prefixed and the raw
    /// form. The oldest matching row wins.
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn find_by_phone(&self, raw: &str) -> Result<Option<Profile>> {
        let conn = self.pool.get().map_err(|e| Error::Database(e.to_string()))?;
        let normalized = normalize_phone(raw);

        let profile = conn
            .query_row(
                "SELECT id, first_name, display_name, phone_no FROM api_profile
                 WHERE phone_no = ?1 OR phone_no = ?2
                 ORDER BY rowid LIMIT 1",
                [normalized.as_str(), raw],
                Profile::from_row,
            )
            .optional()?;

        Ok(profile)
    }

    /// Find a profile by display name (verbatim match)
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn find_by_display_name(&self, name: &str) -> Result<Option<Profile>> {
        let conn = self.pool.get().map_err(|e| Error::Database(e.to_string()))?;

        let profile = conn
            .query_row(
                "SELECT id, first_name, display_name, phone_no FROM api_profile
                 WHERE display_name = ?1
                 ORDER BY rowid LIMIT 1",
                [name],
                Profile::from_row,
            )
            .optional()?;

        Ok(profile)
    }

    /// Insert a new profile
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn create(
        &self,
        first_name: &str,
        phone_no: Option<&str>,
        display_name: Option<&str>,
    ) -> Result<Profile> {
        let conn = self.pool.get().map_err(|e| Error::Database(e.to_string()))?;
        let id = Uuid::new_v4().to_string();

        conn.execute(
            "INSERT INTO api_profile (id, first_name, display_name, phone_no) VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![id, first_name, display_name, phone_no],
        )?;

        Ok(Profile {
            id,
            first_name: first_name.to_string(),
            display_name: display_name.map(String::from),
            phone_no: phone_no.map(String::from),
        })
    }
}
