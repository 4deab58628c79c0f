//! Intake Gateway - messaging webhooks to structured records
//!
//! Receives Telegram and `WhatsApp` messages, identifies the sender, has a
//! generative model extract a structured record from the text, photo or
//! voice note, stores it, and replies.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │           Webhooks (Telegram │ WhatsApp)             │
//! └──────────────────────────┬───────────────────────────┘
//!                            │ InboundMessage
//! ┌──────────────────────────▼───────────────────────────┐
//! │  Session Gate → Media Fetch → Model → Normalize →    │
//! │  Persist → Reply                                     │
//! └──────────────────────────┬───────────────────────────┘
//!                            │
//! ┌──────────────────────────▼───────────────────────────┐
//! │        SQLite (profiles, records, sessions)          │
//! └──────────────────────────────────────────────────────┘
//! ```

pub mod api;
pub mod channels;
pub mod config;
pub mod db;
pub mod error;
pub mod extraction;
pub mod gate;
pub mod media;
pub mod persist;
pub mod pipeline;
pub mod session;

pub use api::ApiServer;
pub use config::Config;
pub use db::{DbConn, DbPool};
pub use error::{Error, Result};
