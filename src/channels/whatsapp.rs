//! `WhatsApp` channel adapter
//!
//! Uses the `WhatsApp` Cloud API for sending and media download. Inbound
//! events arrive on the `/webhook` endpoint and are decoded here.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use super::{Channel, InboundMessage, MediaRef, MessageKind, OutgoingMessage, Platform};
use crate::media::{InlineMedia, resolve_mime};
use crate::{Error, Result};

/// Graph API host
const GRAPH_BASE: &str = "https://graph.facebook.com";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// `WhatsApp` channel adapter
pub struct WhatsAppChannel {
    /// Cloud API access token
    access_token: SecretString,
    /// Phone number ID for sending messages
    phone_number_id: String,
    api_version: String,
    graph_base: String,
    client: Client,
}

impl WhatsAppChannel {
    /// Create a new `WhatsApp` channel adapter
    #[must_use]
    pub fn new(
        access_token: SecretString,
        phone_number_id: impl Into<String>,
        api_version: impl Into<String>,
    ) -> Self {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();

        Self {
            access_token,
            phone_number_id: phone_number_id.into(),
            api_version: api_version.into(),
            graph_base: GRAPH_BASE.to_string(),
            client,
        }
    }

    /// Point the adapter at a different Graph API host
    #[must_use]
    pub fn with_graph_base(mut self, base: impl Into<String>) -> Self {
        self.graph_base = base.into().trim_end_matches('/').to_string();
        self
    }

    fn bearer(&self) -> String {
        format!("Bearer {}", self.access_token.expose_secret())
    }

    /// Send a text message to a `WhatsApp` number
    ///
    /// # Errors
    ///
    /// Returns error if the API request fails
    pub async fn send_text(&self, to: &str, text: &str) -> Result<()> {
        let url = format!(
            "{}/{}/{}/messages",
            self.graph_base, self.api_version, self.phone_number_id
        );

        let body = serde_json::json!({
            "messaging_product": "whatsapp",
            "to": to,
            "type": "text",
            "text": { "body": text }
        });

        let response = self
            .client
            .post(&url)
            .header("Authorization", self.bearer())
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Channel(format!("WhatsApp API error: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Channel(format!("WhatsApp API error: {status} - {body}")));
        }

        tracing::debug!(to, "WhatsApp message sent");
        Ok(())
    }

    /// Resolve a media ID to its download URL and declared MIME type
    async fn resolve_media(&self, media_id: &str) -> Result<MediaLocation> {
        let url = format!("{}/{}/{media_id}", self.graph_base, self.api_version);

        let response = self
            .client
            .get(&url)
            .header("Authorization", self.bearer())
            .send()
            .await
            .map_err(|e| Error::Media(format!("WhatsApp media lookup error: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Media(format!(
                "WhatsApp media lookup error: {status} - {body}"
            )));
        }

        response
            .json()
            .await
            .map_err(|e| Error::Media(format!("WhatsApp media lookup parse error: {e}")))
    }
}

#[async_trait]
impl Channel for WhatsAppChannel {
    fn platform(&self) -> Platform {
        Platform::WhatsApp
    }

    async fn send(&self, message: OutgoingMessage) -> Result<()> {
        // Cloud API has no reply keyboards; the text alone carries the prompt
        self.send_text(&message.conversation_id, &message.content).await
    }

    async fn fetch_media(&self, media: &MediaRef) -> Result<InlineMedia> {
        let location = self.resolve_media(&media.id).await?;

        let response = self
            .client
            .get(&location.url)
            .header("Authorization", self.bearer())
            .send()
            .await
            .map_err(|e| Error::Media(format!("WhatsApp media download error: {e}")))?;

        if !response.status().is_success() {
            return Err(Error::Media(format!(
                "WhatsApp media download error: {}",
                response.status()
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::Media(format!("WhatsApp media download read error: {e}")))?;

        let declared = media
            .declared_mime
            .as_deref()
            .or(location.mime_type.as_deref());
        let mime = resolve_mime(declared, Some(&location.url), media.kind.default_mime());

        tracing::debug!(
            media_id = %media.id,
            mime,
            size = bytes.len(),
            "WhatsApp media downloaded"
        );
        Ok(InlineMedia::encode(&bytes, mime))
    }
}

/// Media resolution response
#[derive(Debug, Deserialize)]
struct MediaLocation {
    url: String,
    mime_type: Option<String>,
}

/// `WhatsApp` webhook payload from Cloud API
#[derive(Debug, Default, Deserialize)]
pub struct WhatsAppWebhook {
    #[serde(default)]
    pub entry: Vec<WhatsAppWebhookEntry>,
}

/// `WhatsApp` webhook entry
#[derive(Debug, Deserialize)]
pub struct WhatsAppWebhookEntry {
    #[serde(default)]
    pub changes: Vec<WhatsAppWebhookChange>,
}

/// `WhatsApp` webhook change
#[derive(Debug, Deserialize)]
pub struct WhatsAppWebhookChange {
    pub value: WhatsAppWebhookValue,
}

/// `WhatsApp` webhook value containing messages
///
/// Status callbacks (delivered/read) carry no `messages` and are ignored.
#[derive(Debug, Deserialize)]
pub struct WhatsAppWebhookValue {
    #[serde(default)]
    pub contacts: Vec<WhatsAppContact>,
    #[serde(default)]
    pub messages: Vec<WhatsAppMessage>,
}

/// Sender profile attached to a webhook value
#[derive(Debug, Deserialize)]
pub struct WhatsAppContact {
    pub wa_id: String,
    pub profile: Option<WhatsAppProfile>,
}

/// Sender profile
#[derive(Debug, Deserialize)]
pub struct WhatsAppProfile {
    pub name: Option<String>,
}

/// `WhatsApp` message
#[derive(Debug, Deserialize)]
pub struct WhatsAppMessage {
    /// Sender phone number, verified by the platform
    pub from: String,
    pub id: String,
    #[serde(rename = "type")]
    pub message_type: String,
    pub text: Option<WhatsAppTextContent>,
    pub image: Option<WhatsAppMedia>,
    pub audio: Option<WhatsAppMedia>,
}

/// `WhatsApp` media object (image, audio)
#[derive(Debug, Deserialize)]
pub struct WhatsAppMedia {
    /// Media ID (resolved to a URL on download)
    pub id: String,
    pub mime_type: Option<String>,
    pub caption: Option<String>,
    /// Set on audio recorded as a voice note
    #[serde(default)]
    pub voice: bool,
}

/// `WhatsApp` text message content
#[derive(Debug, Deserialize)]
pub struct WhatsAppTextContent {
    pub body: String,
}

impl WhatsAppWebhook {
    /// Normalize every message in the payload
    #[must_use]
    pub fn inbound_messages(&self) -> Vec<InboundMessage> {
        self.entry
            .iter()
            .flat_map(|entry| &entry.changes)
            .flat_map(|change| {
                let value = &change.value;
                value.messages.iter().map(move |msg| msg.to_inbound(&value.contacts))
            })
            .collect()
    }
}

impl WhatsAppMessage {
    fn to_inbound(&self, contacts: &[WhatsAppContact]) -> InboundMessage {
        let sender_name = contacts
            .iter()
            .find(|c| c.wa_id == self.from)
            .or_else(|| contacts.first())
            .and_then(|c| c.profile.as_ref())
            .and_then(|p| p.name.clone());

        let (kind, media) = match (self.message_type.as_str(), &self.image, &self.audio) {
            ("text", _, _) if self.text.is_some() => (MessageKind::Text, None),
            ("image", Some(image), _) => (MessageKind::Image, Some(image)),
            ("audio", _, Some(audio)) => {
                let kind = if audio.voice { MessageKind::Voice } else { MessageKind::Audio };
                (kind, Some(audio))
            }
            _ => (MessageKind::Unsupported, None),
        };

        InboundMessage {
            platform: Platform::WhatsApp,
            message_id: self.id.clone(),
            conversation_id: self.from.clone(),
            sender_id: self.from.clone(),
            sender_name,
            kind,
            text: self.text.as_ref().map(|t| t.body.clone()),
            caption: media.and_then(|m| m.caption.clone()),
            media: media.map(|m| MediaRef {
                id: m.id.clone(),
                kind,
                declared_mime: m.mime_type.clone(),
            }),
            contact: None,
            verified_phone: Some(self.from.clone()),
        }
    }
}
