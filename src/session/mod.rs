//! Conversation sessions
//!
//! A session binds a conversation key (`platform:conversation_id`) to the
//! profile ID established during identification. At most one binding exists
//! per key; setting it again replaces the previous one.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::db::{DbPool, SessionRepo};
use crate::{Error, Result};

/// Session store backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionStoreKind {
    /// Process memory; lost on restart
    #[default]
    Memory,
    /// `chat_sessions` table; survives restarts
    Database,
}

impl fmt::Display for SessionStoreKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Memory => "memory",
            Self::Database => "database",
        })
    }
}

impl FromStr for SessionStoreKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "database" | "db" => Ok(Self::Database),
            other => Err(Error::Config(format!(
                "unknown session store '{other}' (expected 'memory' or 'database')"
            ))),
        }
    }
}

/// Storage for conversation sessions
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Profile ID bound to the conversation, if identified
    async fn get(&self, conversation_key: &str) -> Result<Option<String>>;

    /// Bind the conversation to a profile ID
    async fn set(&self, conversation_key: &str, user_id: &str) -> Result<()>;

    /// Drop the binding; returns whether one existed
    async fn delete(&self, conversation_key: &str) -> Result<bool>;
}

/// Build the configured session store
#[must_use]
pub fn build_store(kind: SessionStoreKind, pool: DbPool) -> Arc<dyn SessionStore> {
    match kind {
        SessionStoreKind::Memory => Arc::new(MemorySessionStore::new()),
        SessionStoreKind::Database => Arc::new(SqliteSessionStore::new(pool)),
    }
}

/// In-memory session store
#[derive(Debug, Default, Clone)]
pub struct MemorySessionStore {
    sessions: Arc<RwLock<HashMap<String, String>>>,
}

impl MemorySessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn get(&self, conversation_key: &str) -> Result<Option<String>> {
        Ok(self.sessions.read().await.get(conversation_key).cloned())
    }

    async fn set(&self, conversation_key: &str, user_id: &str) -> Result<()> {
        self.sessions
            .write()
            .await
            .insert(conversation_key.to_string(), user_id.to_string());
        Ok(())
    }

    async fn delete(&self, conversation_key: &str) -> Result<bool> {
        Ok(self.sessions.write().await.remove(conversation_key).is_some())
    }
}

/// Durable session store backed by `SQLite`
#[derive(Debug, Clone)]
pub struct SqliteSessionStore {
    repo: SessionRepo,
}

impl SqliteSessionStore {
    #[must_use]
    pub const fn new(pool: DbPool) -> Self {
        Self {
            repo: SessionRepo::new(pool),
        }
    }
}

#[async_trait]
impl SessionStore for SqliteSessionStore {
    async fn get(&self, conversation_key: &str) -> Result<Option<String>> {
        self.repo.get(conversation_key)
    }

    async fn set(&self, conversation_key: &str, user_id: &str) -> Result<()> {
        self.repo.set(conversation_key, user_id)
    }

    async fn delete(&self, conversation_key: &str) -> Result<bool> {
        self.repo.delete(conversation_key)
    }
}
