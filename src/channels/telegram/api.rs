//! Raw Telegram Bot API calls

use secrecy::ExposeSecret;

use super::types::{
    GetFileRequest, KeyboardButton, ReplyKeyboardMarkup, ReplyKeyboardRemove, ReplyMarkup,
    SendMessageRequest, SetWebhookRequest, TelegramFile, TelegramResponse,
};
use crate::channels::ReplyKeyboard;
use crate::{Error, Result};

impl From<&ReplyKeyboard> for ReplyMarkup {
    fn from(keyboard: &ReplyKeyboard) -> Self {
        match keyboard {
            ReplyKeyboard::RequestContact { label } => Self::Keyboard(ReplyKeyboardMarkup {
                keyboard: vec![vec![KeyboardButton {
                    text: label.clone(),
                    request_contact: true,
                }]],
                one_time_keyboard: true,
                resize_keyboard: true,
            }),
            ReplyKeyboard::Remove => Self::Remove(ReplyKeyboardRemove {
                remove_keyboard: true,
            }),
        }
    }
}

impl super::TelegramChannel {
    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{method}", self.api_base, self.token.expose_secret())
    }

    fn file_url(&self, file_path: &str) -> String {
        format!("{}/file/bot{}/{file_path}", self.api_base, self.token.expose_secret())
    }

    /// Send a plain-text message to a chat
    ///
    /// # Errors
    ///
    /// Returns error if the API request fails
    pub async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        keyboard: Option<&ReplyKeyboard>,
    ) -> Result<()> {
        let request = SendMessageRequest {
            chat_id,
            text: text.to_string(),
            reply_markup: keyboard.map(ReplyMarkup::from),
        };

        let response = self
            .client
            .post(self.method_url("sendMessage"))
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Channel(format!("Telegram API error: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let body_lower = body.to_lowercase();

            if body_lower.contains("chat not found")
                || body_lower.contains("bot was blocked by the user")
            {
                return Err(Error::Channel(format!(
                    "Telegram chat {chat_id} not reachable: {body}"
                )));
            }

            return Err(Error::Channel(format!("Telegram API error: {status} - {body}")));
        }

        tracing::debug!(chat_id, "Telegram message sent");
        Ok(())
    }

    /// Register the webhook URL Telegram delivers updates to
    ///
    /// # Errors
    ///
    /// Returns error if the API request fails or Telegram rejects the URL
    pub async fn set_webhook(&self, url: &str, secret_token: Option<&str>) -> Result<()> {
        let request = SetWebhookRequest {
            url: url.to_string(),
            allowed_updates: vec!["message".to_string()],
            secret_token: secret_token.map(String::from),
        };

        let response = self
            .client
            .post(self.method_url("setWebhook"))
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Channel(format!("Telegram setWebhook error: {e}")))?;

        let status = response.status();
        let parsed: TelegramResponse<bool> = response
            .json()
            .await
            .map_err(|e| Error::Channel(format!("Telegram setWebhook error: {status} - {e}")))?;

        if !parsed.ok {
            return Err(Error::Channel(format!(
                "Telegram setWebhook error: {}",
                parsed.description.unwrap_or_default()
            )));
        }

        tracing::info!(url, "Telegram webhook set");
        Ok(())
    }

    /// Download a file by its `file_id`
    ///
    /// Returns the raw bytes and the server-side file path (which carries
    /// the extension).
    ///
    /// # Errors
    ///
    /// Returns error if getFile or the download fails
    pub async fn download_file(&self, file_id: &str) -> Result<(Vec<u8>, String)> {
        let request = GetFileRequest {
            file_id: file_id.to_string(),
        };

        let response = self
            .client
            .post(self.method_url("getFile"))
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Media(format!("Telegram getFile error: {e}")))?;

        let body = response
            .text()
            .await
            .map_err(|e| Error::Media(format!("Telegram getFile response read error: {e}")))?;

        let parsed: TelegramResponse<TelegramFile> = serde_json::from_str(&body)
            .map_err(|e| Error::Media(format!("Telegram getFile parse error: {e}")))?;

        let file = parsed.result.ok_or_else(|| {
            Error::Media(format!(
                "Telegram getFile error: {}",
                parsed.description.unwrap_or_default()
            ))
        })?;

        let file_path = file
            .file_path
            .ok_or_else(|| Error::Media("Telegram getFile returned no file_path".to_string()))?;

        let response = self
            .client
            .get(self.file_url(&file_path))
            .send()
            .await
            .map_err(|e| Error::Media(format!("Telegram file download error: {e}")))?;

        if !response.status().is_success() {
            return Err(Error::Media(format!(
                "Telegram file download error: {}",
                response.status()
            )));
        }

        let data = response
            .bytes()
            .await
            .map_err(|e| Error::Media(format!("Telegram file download read error: {e}")))?;

        Ok((data.to_vec(), file_path))
    }
}
