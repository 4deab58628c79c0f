//! Messaging channel adapters
//!
//! Each platform implements the `Channel` trait: send a reply, and resolve a
//! platform media reference into inline data for the model.

mod telegram;
mod whatsapp;

use std::fmt;

use async_trait::async_trait;

pub use telegram::TelegramChannel;
pub use whatsapp::{
    WhatsAppChannel, WhatsAppContact, WhatsAppMedia, WhatsAppMessage, WhatsAppProfile,
    WhatsAppTextContent, WhatsAppWebhook, WhatsAppWebhookChange, WhatsAppWebhookEntry,
    WhatsAppWebhookValue,
};

use crate::media::InlineMedia;
use crate::Result;

/// Messaging platform an event arrived on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    Telegram,
    WhatsApp,
}

impl Platform {
    /// Stable lowercase name (used in session keys and stored rows)
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Telegram => "telegram",
            Self::WhatsApp => "whatsapp",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of inbound message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    /// Plain text
    Text,
    /// Telegram photo
    Photo,
    /// Voice note
    Voice,
    /// Audio file
    Audio,
    /// `WhatsApp` image
    Image,
    /// Shared contact card
    Contact,
    /// Anything the pipeline doesn't handle (stickers, documents, ...)
    Unsupported,
}

impl MessageKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Photo => "photo",
            Self::Voice => "voice",
            Self::Audio => "audio",
            Self::Image => "image",
            Self::Contact => "contact",
            Self::Unsupported => "unsupported",
        }
    }

    /// Whether this kind carries downloadable media
    #[must_use]
    pub const fn is_media(self) -> bool {
        matches!(self, Self::Photo | Self::Voice | Self::Audio | Self::Image)
    }

    /// Whether this kind carries audio
    #[must_use]
    pub const fn is_audio(self) -> bool {
        matches!(self, Self::Voice | Self::Audio)
    }

    /// MIME type assumed when nothing better is known
    #[must_use]
    pub const fn default_mime(self) -> &'static str {
        match self {
            Self::Voice => "audio/ogg",
            Self::Audio => "audio/mpeg",
            Self::Photo | Self::Image => "image/jpeg",
            Self::Text | Self::Contact | Self::Unsupported => "application/octet-stream",
        }
    }
}

/// Platform-specific reference to downloadable media
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaRef {
    /// Telegram `file_id` or `WhatsApp` media ID
    pub id: String,
    pub kind: MessageKind,
    /// MIME type declared in the webhook payload, if any
    pub declared_mime: Option<String>,
}

/// Contact card shared by the sender
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SharedContact {
    /// Phone number exactly as the platform delivered it
    pub phone_number: String,
    /// Whether the contact belongs to the sender (not someone else's card)
    pub is_own: bool,
}

/// Normalized inbound message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub platform: Platform,
    /// Platform message ID (used for redelivery suppression)
    pub message_id: String,
    /// Chat ID (Telegram) or sender number (`WhatsApp`) replies go to
    pub conversation_id: String,
    pub sender_id: String,
    /// Platform-supplied display name (client-controlled, not unique)
    pub sender_name: Option<String>,
    pub kind: MessageKind,
    pub text: Option<String>,
    pub caption: Option<String>,
    pub media: Option<MediaRef>,
    pub contact: Option<SharedContact>,
    /// Sender phone number as verified by the platform (`WhatsApp` `from`)
    pub verified_phone: Option<String>,
}

impl InboundMessage {
    /// Key identifying the conversation in the session store
    #[must_use]
    pub fn conversation_key(&self) -> String {
        format!("{}:{}", self.platform, self.conversation_id)
    }

    /// Whether this is the Telegram `/start` command
    #[must_use]
    pub fn is_start_command(&self) -> bool {
        if self.platform != Platform::Telegram {
            return false;
        }
        self.text.as_deref().is_some_and(|t| {
            let t = t.trim();
            t == "/start" || t.starts_with("/start ") || t.starts_with("/start@")
        })
    }
}

/// Reply keyboard attached to an outgoing message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyKeyboard {
    /// One-time keyboard with a single "share contact" button
    RequestContact { label: String },
    /// Remove any custom keyboard
    Remove,
}

/// An outgoing message to send
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub conversation_id: String,
    pub content: String,
    pub keyboard: Option<ReplyKeyboard>,
}

impl OutgoingMessage {
    /// Plain text reply
    #[must_use]
    pub fn text(conversation_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            content: content.into(),
            keyboard: None,
        }
    }

    /// Attach a reply keyboard
    #[must_use]
    pub fn with_keyboard(mut self, keyboard: ReplyKeyboard) -> Self {
        self.keyboard = Some(keyboard);
        self
    }
}

/// Channel trait for messaging platforms
#[async_trait]
pub trait Channel: Send + Sync {
    /// Platform this channel talks to
    fn platform(&self) -> Platform;

    /// Send a message
    async fn send(&self, message: OutgoingMessage) -> Result<()>;

    /// Resolve, download, and base64-encode a media reference
    async fn fetch_media(&self, media: &MediaRef) -> Result<InlineMedia>;
}
