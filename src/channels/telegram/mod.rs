//! Telegram channel adapter
//!
//! Updates arrive by webhook; replies and file downloads go through the Bot API.

mod api;
mod types;

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::SecretString;

use super::{Channel, MediaRef, OutgoingMessage, Platform};
use crate::media::{InlineMedia, resolve_mime};
use crate::{Error, Result};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Telegram channel adapter
#[derive(Clone)]
pub struct TelegramChannel {
    token: SecretString,
    client: Client,
    api_base: String,
}

impl TelegramChannel {
    /// Create a new Telegram channel adapter
    #[must_use]
    pub fn new(token: SecretString) -> Self {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();

        Self {
            token,
            client,
            api_base: types::API_HOST.to_string(),
        }
    }

    /// Point the adapter at a different Bot API host
    #[must_use]
    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into().trim_end_matches('/').to_string();
        self
    }
}

impl std::fmt::Debug for TelegramChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramChannel")
            .field("api_base", &self.api_base)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Channel for TelegramChannel {
    fn platform(&self) -> Platform {
        Platform::Telegram
    }

    async fn send(&self, message: OutgoingMessage) -> Result<()> {
        let chat_id: i64 = message.conversation_id.parse().map_err(|_| {
            Error::Channel(format!(
                "invalid Telegram chat id: {}",
                message.conversation_id
            ))
        })?;

        self.send_message(chat_id, &message.content, message.keyboard.as_ref())
            .await
    }

    async fn fetch_media(&self, media: &MediaRef) -> Result<InlineMedia> {
        let (bytes, file_path) = self.download_file(&media.id).await?;
        let mime = resolve_mime(
            media.declared_mime.as_deref(),
            Some(&file_path),
            media.kind.default_mime(),
        );

        tracing::debug!(file_path, mime, size = bytes.len(), "Telegram media downloaded");
        Ok(InlineMedia::encode(&bytes, mime))
    }
}
