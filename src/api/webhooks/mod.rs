//! Webhook endpoints for platform integrations

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};

use super::ApiState;

pub mod dedup;
pub mod telegram;
pub mod whatsapp;

pub use dedup::MessageDedup;

/// Build webhooks router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/webhook", get(whatsapp::verify).post(whatsapp::handle_event))
        .route("/telegram-webhook", post(telegram::handle_update))
        .with_state(state)
}
