//! Telegram webhook handler

mod inbound;
pub mod types;

use std::sync::Arc;

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use serde::Serialize;

use self::types::TelegramUpdate;
use crate::api::ApiState;

/// Telegram webhook response
#[derive(Serialize)]
pub struct WebhookResponse {
    pub ok: bool,
}

/// Handle an incoming Telegram update
///
/// The message is processed to completion before answering. Anything past
/// the secret check answers 200 so Telegram does not redeliver.
pub async fn handle_update(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, Json<WebhookResponse>) {
    if let Some(expected) = state.telegram_secret.as_deref() {
        let provided = headers
            .get("x-telegram-bot-api-secret-token")
            .and_then(|v| v.to_str().ok());

        if provided != Some(expected) {
            tracing::warn!("Telegram webhook secret mismatch");
            return (StatusCode::FORBIDDEN, Json(WebhookResponse { ok: false }));
        }
    }

    let ok = (StatusCode::OK, Json(WebhookResponse { ok: true }));

    let Some(channel) = state.telegram.clone() else {
        tracing::warn!("Telegram update received but Telegram is not configured");
        return ok;
    };

    let update: TelegramUpdate = match serde_json::from_slice(&body) {
        Ok(update) => update,
        Err(e) => {
            tracing::warn!(error = %e, "unparseable Telegram update");
            return ok;
        }
    };

    tracing::debug!(update_id = update.update_id, "received Telegram update");

    let Some(message) = update.message else {
        return ok;
    };

    let inbound = inbound::to_inbound(&message);
    let key = format!("{}:{}", inbound.conversation_key(), inbound.message_id);
    if state.is_duplicate(&key) {
        tracing::debug!(update_id = update.update_id, "duplicate Telegram message, skipping");
        return ok;
    }

    state.pipeline.handle(channel.as_ref(), inbound).await;
    ok
}
