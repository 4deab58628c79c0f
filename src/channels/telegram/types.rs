//! Telegram Bot API request/response types

use serde::{Deserialize, Serialize};

/// Telegram Bot API host
pub(crate) const API_HOST: &str = "https://api.telegram.org";

/// Reply markup for `sendMessage`
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub(crate) enum ReplyMarkup {
    Keyboard(ReplyKeyboardMarkup),
    Remove(ReplyKeyboardRemove),
}

/// Custom reply keyboard
#[derive(Debug, Clone, Serialize)]
pub(crate) struct ReplyKeyboardMarkup {
    pub keyboard: Vec<Vec<KeyboardButton>>,
    pub one_time_keyboard: bool,
    pub resize_keyboard: bool,
}

/// A button in a reply keyboard row
#[derive(Debug, Clone, Serialize)]
pub(crate) struct KeyboardButton {
    pub text: String,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub request_contact: bool,
}

/// Removes the custom keyboard
#[derive(Debug, Clone, Serialize)]
pub(crate) struct ReplyKeyboardRemove {
    pub remove_keyboard: bool,
}

/// Telegram sendMessage request
#[derive(Debug, Serialize)]
pub(crate) struct SendMessageRequest {
    pub chat_id: i64,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_markup: Option<ReplyMarkup>,
}

/// Telegram setWebhook request
#[derive(Debug, Serialize)]
pub(crate) struct SetWebhookRequest {
    pub url: String,
    pub allowed_updates: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret_token: Option<String>,
}

/// Telegram getFile request
#[derive(Debug, Serialize)]
pub(crate) struct GetFileRequest {
    pub file_id: String,
}

/// File metadata returned by getFile
#[derive(Debug, Deserialize)]
pub(crate) struct TelegramFile {
    pub file_path: Option<String>,
}

/// Envelope wrapping every Bot API response
#[derive(Debug, Deserialize)]
pub(crate) struct TelegramResponse<T> {
    pub ok: bool,
    pub result: Option<T>,
    pub description: Option<String>,
}
