//! HTTP server for the intake gateway

pub mod health;
pub mod webhooks;

use std::sync::{Arc, Mutex};

use axum::Router;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::channels::{Channel, TelegramChannel, WhatsAppChannel};
use crate::config::Config;
use crate::db::{DbPool, ProfileRepo};
use crate::extraction::GeminiClient;
use crate::gate::SessionGate;
use crate::persist::Persister;
use crate::pipeline::Pipeline;
use crate::{Result, session};

use self::webhooks::MessageDedup;

/// Shared state for API handlers
pub struct ApiState {
    pub pipeline: Pipeline,
    pub telegram: Option<Arc<dyn Channel>>,
    /// Expected `X-Telegram-Bot-Api-Secret-Token` (None = unchecked)
    pub telegram_secret: Option<String>,
    pub whatsapp: Option<Arc<dyn Channel>>,
    pub whatsapp_verify_token: Option<String>,
    dedup: Mutex<MessageDedup>,
}

impl ApiState {
    /// Record a platform message key; `true` if it was seen recently
    pub fn is_duplicate(&self, key: &str) -> bool {
        self.dedup
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .is_duplicate(key)
    }
}

/// API server
pub struct ApiServer {
    state: Arc<ApiState>,
    port: u16,
}

/// Builder for [`ApiServer`]
pub struct ApiServerBuilder {
    pipeline: Pipeline,
    port: u16,
    telegram: Option<Arc<dyn Channel>>,
    telegram_secret: Option<String>,
    whatsapp: Option<Arc<dyn Channel>>,
    whatsapp_verify_token: Option<String>,
}

impl ApiServerBuilder {
    /// Enable the Telegram webhook
    #[must_use]
    pub fn telegram(mut self, channel: Arc<dyn Channel>, webhook_secret: Option<String>) -> Self {
        self.telegram = Some(channel);
        self.telegram_secret = webhook_secret;
        self
    }

    /// Enable the `WhatsApp` webhook
    #[must_use]
    pub fn whatsapp(mut self, channel: Arc<dyn Channel>, verify_token: impl Into<String>) -> Self {
        self.whatsapp = Some(channel);
        self.whatsapp_verify_token = Some(verify_token.into());
        self
    }

    /// Set the listen port
    #[must_use]
    pub const fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Build the API server
    #[must_use]
    pub fn build(self) -> ApiServer {
        let state = Arc::new(ApiState {
            pipeline: self.pipeline,
            telegram: self.telegram,
            telegram_secret: self.telegram_secret,
            whatsapp: self.whatsapp,
            whatsapp_verify_token: self.whatsapp_verify_token,
            dedup: Mutex::new(MessageDedup::default()),
        });

        ApiServer {
            state,
            port: self.port,
        }
    }
}

impl ApiServer {
    /// Start building a server around a pipeline
    #[must_use]
    pub fn builder(pipeline: Pipeline) -> ApiServerBuilder {
        ApiServerBuilder {
            pipeline,
            port: crate::config::DEFAULT_PORT,
            telegram: None,
            telegram_secret: None,
            whatsapp: None,
            whatsapp_verify_token: None,
        }
    }

    /// Wire channels, model, gate and persistence from configuration
    ///
    /// # Errors
    ///
    /// Returns error if the model client cannot be built
    pub fn from_config(config: &Config, pool: DbPool) -> Result<Self> {
        let settings = config.pipeline;
        let sessions = session::build_store(settings.session_store, pool.clone());
        let gate = SessionGate::new(settings.identity, ProfileRepo::new(pool.clone()), sessions);
        let model = Arc::new(GeminiClient::new(&config.model)?);
        let persister = Persister::new(settings.persist, settings.schema, pool);
        let pipeline = Pipeline::new(gate, model, persister, settings.schema);

        tracing::info!(
            schema = %settings.schema,
            identity = %settings.identity,
            persist = %settings.persist,
            session_store = %settings.session_store,
            model = %config.model.model,
            "pipeline configured"
        );

        let mut builder = Self::builder(pipeline).port(config.port);
        if let Some(tg) = &config.telegram {
            let channel = TelegramChannel::new(tg.bot_token.clone());
            builder = builder.telegram(Arc::new(channel), tg.webhook_secret.clone());
        }
        if let Some(wa) = &config.whatsapp {
            let channel =
                WhatsAppChannel::new(wa.access_token.clone(), &wa.phone_number_id, &wa.api_version);
            builder = builder.whatsapp(Arc::new(channel), &wa.verify_token);
        }

        Ok(builder.build())
    }

    /// Build the router with all routes
    pub fn router(&self) -> Router {
        Router::new()
            .merge(health::router())
            .merge(webhooks::router(self.state.clone()))
            .layer(TraceLayer::new_for_http())
    }

    /// Run the API server
    ///
    /// # Errors
    ///
    /// Returns error if server fails to bind or run
    pub async fn run(self) -> Result<()> {
        let addr = format!("0.0.0.0:{}", self.port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| crate::Error::Config(format!("failed to bind API server: {e}")))?;

        tracing::info!(
            port = self.port,
            telegram = self.state.telegram.is_some(),
            whatsapp = self.state.whatsapp.is_some(),
            "API server listening"
        );

        axum::serve(listener, self.router())
            .await
            .map_err(|e| crate::Error::Config(format!("API server error: {e}")))?;

        Ok(())
    }
}
