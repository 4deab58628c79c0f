//! Liveness endpoints

use axum::{Json, Router, routing::get};
use serde::Serialize;

/// Static banner served at `/`
pub const BANNER: &str = "Intake Gateway Active 🌍";

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

/// Build health router
pub fn router() -> Router {
    Router::new()
        .route("/", get(banner))
        .route("/health", get(health))
}

async fn banner() -> &'static str {
    BANNER
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}
