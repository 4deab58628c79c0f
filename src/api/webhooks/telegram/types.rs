//! Telegram webhook types

use serde::Deserialize;

/// Telegram Update object (only the fields the gateway reads)
#[derive(Debug, Deserialize)]
pub struct TelegramUpdate {
    pub update_id: i64,
    pub message: Option<TelegramMessage>,
}

/// Telegram Message object
#[derive(Debug, Deserialize)]
pub struct TelegramMessage {
    pub message_id: i64,
    pub chat: TelegramChat,
    pub from: Option<TelegramUser>,
    pub text: Option<String>,
    pub caption: Option<String>,
    /// Photo (array of sizes, largest last)
    pub photo: Option<Vec<TelegramPhotoSize>>,
    pub audio: Option<TelegramAudio>,
    pub voice: Option<TelegramVoice>,
    pub contact: Option<TelegramContact>,
}

/// Telegram photo size
#[derive(Debug, Deserialize)]
pub struct TelegramPhotoSize {
    pub file_id: String,
    pub width: i32,
    pub height: i32,
}

/// Telegram audio file
#[derive(Debug, Deserialize)]
pub struct TelegramAudio {
    pub file_id: String,
    pub mime_type: Option<String>,
}

/// Telegram voice note
#[derive(Debug, Deserialize)]
pub struct TelegramVoice {
    pub file_id: String,
    pub mime_type: Option<String>,
}

/// Shared contact card
#[derive(Debug, Deserialize)]
pub struct TelegramContact {
    pub phone_number: String,
    pub first_name: String,
    /// Telegram user the card belongs to, if any
    pub user_id: Option<i64>,
}

/// Telegram Chat object
#[derive(Debug, Deserialize)]
pub struct TelegramChat {
    pub id: i64,
}

/// Telegram User object
#[derive(Debug, Deserialize)]
pub struct TelegramUser {
    pub id: i64,
    pub first_name: String,
    pub last_name: Option<String>,
}

impl TelegramUser {
    /// Name as Telegram clients display it
    #[must_use]
    pub fn display_name(&self) -> String {
        match &self.last_name {
            Some(last) if !last.is_empty() => format!("{} {last}", self.first_name),
            _ => self.first_name.clone(),
        }
    }
}
