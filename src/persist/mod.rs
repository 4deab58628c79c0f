//! Persistence of extracted records
//!
//! One insert per processed message, or a structured log line in log mode.
//! There is no duplicate detection here and no transaction around the model
//! call.

use std::fmt;
use std::str::FromStr;

use crate::channels::InboundMessage;
use crate::db::activity::{CHATBOT_SOURCE, insert_activity};
use crate::db::message_log::insert_entry;
use crate::db::{ActivityRepo, DbPool, MessageLogEntry, MessageLogRepo, NewActivity};
use crate::extraction::{ExtractedRecord, ExtractionSchema};
use crate::{Error, Result};

/// Where extracted records go
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PersistMode {
    /// Insert into the schema's table
    #[default]
    Database,
    /// Log only
    Log,
}

impl fmt::Display for PersistMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Database => "database",
            Self::Log => "log",
        })
    }
}

impl FromStr for PersistMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "database" | "db" => Ok(Self::Database),
            "log" | "testing" => Ok(Self::Log),
            other => Err(Error::Config(format!(
                "unknown persist mode '{other}' (expected 'database' or 'log')"
            ))),
        }
    }
}

/// What happened to a record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Persisted {
    /// Inserted; `id` is the primary row
    Stored { table: &'static str, id: String },
    Logged,
}

/// Writes extracted records for one schema
#[derive(Debug, Clone)]
pub struct Persister {
    mode: PersistMode,
    schema: ExtractionSchema,
    pool: DbPool,
    activities: ActivityRepo,
    messages: MessageLogRepo,
}

impl Persister {
    #[must_use]
    pub fn new(mode: PersistMode, schema: ExtractionSchema, pool: DbPool) -> Self {
        Self {
            mode,
            schema,
            activities: ActivityRepo::new(pool.clone()),
            messages: MessageLogRepo::new(pool.clone()),
            pool,
        }
    }

    #[must_use]
    pub const fn mode(&self) -> PersistMode {
        self.mode
    }

    /// Persist one record for an identified user
    ///
    /// A fallback record is still written: its fields are NULL and the raw
    /// model text lands in `message_log`.
    ///
    /// # Errors
    ///
    /// Returns error if an insert fails
    pub fn persist(
        &self,
        user_id: &str,
        msg: &InboundMessage,
        record: &ExtractedRecord,
    ) -> Result<Persisted> {
        if self.mode == PersistMode::Log {
            tracing::info!(
                user_id,
                platform = %msg.platform,
                message_type = msg.kind.as_str(),
                schema = %self.schema,
                record = %record.to_value(),
                "extracted record (log mode)"
            );
            return Ok(Persisted::Logged);
        }

        match self.schema {
            ExtractionSchema::Carbon => {
                let id = if record.is_fallback() {
                    self.store_fallback(user_id, msg, record)?
                } else {
                    self.activities.insert(&carbon_row(user_id, record))?
                };
                tracing::info!(user_id, activity_id = %id, "activity stored");
                Ok(Persisted::Stored {
                    table: "api_activity",
                    id,
                })
            }
            ExtractionSchema::Summary => {
                let id = self.messages.insert(&log_row(user_id, msg, record))?;
                tracing::info!(user_id, log_id = %id, "message log stored");
                Ok(Persisted::Stored {
                    table: "message_log",
                    id,
                })
            }
        }
    }

    /// Activity row and raw log row, committed together
    fn store_fallback(
        &self,
        user_id: &str,
        msg: &InboundMessage,
        record: &ExtractedRecord,
    ) -> Result<String> {
        let mut conn = self.pool.get().map_err(|e| Error::Database(e.to_string()))?;
        let tx = conn.transaction()?;

        let id = insert_activity(&tx, &carbon_row(user_id, record))?;
        insert_entry(&tx, &log_row(user_id, msg, record))?;
        tx.commit()?;

        Ok(id)
    }
}

fn carbon_row(user_id: &str, record: &ExtractedRecord) -> NewActivity {
    NewActivity {
        user_id: user_id.to_string(),
        category: record.str_field("category"),
        description: record.str_field("description"),
        value: record.f64_field("value"),
        unit: record.str_field("unit"),
        carbon_footprint_kg: record.f64_field("carbon_footprint_kg"),
        source: CHATBOT_SOURCE.to_string(),
    }
}

fn log_row(user_id: &str, msg: &InboundMessage, record: &ExtractedRecord) -> MessageLogEntry {
    MessageLogEntry {
        user_id: user_id.to_string(),
        sender_id: msg.sender_id.clone(),
        platform: msg.platform.as_str().to_string(),
        message_type: msg.kind.as_str().to_string(),
        summary: record.str_field("summary"),
        intent: record.str_field("intent"),
        details: record.text_or_json_field("details"),
        raw: record.to_value().to_string(),
    }
}
