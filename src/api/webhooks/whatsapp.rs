//! `WhatsApp` Cloud API webhook handlers

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use serde::Deserialize;

use crate::api::ApiState;
use crate::channels::WhatsAppWebhook;

/// Query parameters of the verification handshake
#[derive(Debug, Deserialize)]
pub struct VerifyParams {
    #[serde(rename = "hub.mode")]
    pub mode: Option<String>,
    #[serde(rename = "hub.verify_token")]
    pub verify_token: Option<String>,
    #[serde(rename = "hub.challenge")]
    pub challenge: Option<String>,
}

/// Answer the webhook verification handshake
///
/// 400 if any parameter is missing, 403 on mode or token mismatch, otherwise
/// 200 echoing the challenge.
pub async fn verify(
    State(state): State<Arc<ApiState>>,
    Query(params): Query<VerifyParams>,
) -> (StatusCode, String) {
    let (Some(mode), Some(token), Some(challenge)) =
        (params.mode, params.verify_token, params.challenge)
    else {
        return (StatusCode::BAD_REQUEST, String::new());
    };

    let expected = state.whatsapp_verify_token.as_deref();
    if mode == "subscribe" && expected == Some(token.as_str()) {
        tracing::info!("WhatsApp webhook verified");
        (StatusCode::OK, challenge)
    } else {
        tracing::warn!(mode = %mode, "WhatsApp webhook verification rejected");
        (StatusCode::FORBIDDEN, String::new())
    }
}

/// Handle inbound `WhatsApp` events
///
/// Always 200; messages are processed in order before answering.
pub async fn handle_event(State(state): State<Arc<ApiState>>, body: Bytes) -> StatusCode {
    let Some(channel) = state.whatsapp.clone() else {
        tracing::warn!("WhatsApp event received but WhatsApp is not configured");
        return StatusCode::OK;
    };

    let payload: WhatsAppWebhook = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(e) => {
            tracing::warn!(error = %e, "unparseable WhatsApp event");
            return StatusCode::OK;
        }
    };

    for inbound in payload.inbound_messages() {
        let key = format!("whatsapp:{}", inbound.message_id);
        if state.is_duplicate(&key) {
            tracing::debug!(
                message_id = %inbound.message_id,
                "duplicate WhatsApp message, skipping"
            );
            continue;
        }
        state.pipeline.handle(channel.as_ref(), inbound).await;
    }

    StatusCode::OK
}
