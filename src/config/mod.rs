//! Configuration management for the intake gateway
//!
//! Precedence is env > TOML file > default. All values are read once at
//! process start.

pub mod file;

use std::path::{Path, PathBuf};
use std::time::Duration;

use secrecy::SecretString;

use crate::extraction::ExtractionSchema;
use crate::gate::IdentityStrategy;
use crate::persist::PersistMode;
use crate::session::SessionStoreKind;
use crate::{Error, Result};

use self::file::IntakeConfigFile;

/// Default HTTP listen port
pub const DEFAULT_PORT: u16 = 3000;

/// Default generative model
pub const DEFAULT_MODEL: &str = "gemini-1.5-flash";

/// Default Gemini API base URL
pub const DEFAULT_MODEL_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Default Graph API version for `WhatsApp` Cloud API calls
pub const DEFAULT_WHATSAPP_API_VERSION: &str = "v18.0";

/// Intake gateway configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP listen port
    pub port: u16,

    /// Telegram bot (None = platform disabled)
    pub telegram: Option<TelegramConfig>,

    /// `WhatsApp` Cloud API (None = platform disabled)
    pub whatsapp: Option<WhatsAppConfig>,

    /// Generative model
    pub model: ModelConfig,

    /// Path to the `SQLite` database
    pub database_path: PathBuf,

    /// Pipeline variant selection
    pub pipeline: PipelineConfig,
}

/// Telegram bot configuration
#[derive(Debug, Clone)]
pub struct TelegramConfig {
    /// Bot API token
    pub bot_token: SecretString,

    /// Secret expected in `X-Telegram-Bot-Api-Secret-Token` (None = unchecked)
    pub webhook_secret: Option<String>,
}

/// `WhatsApp` Cloud API configuration
#[derive(Debug, Clone)]
pub struct WhatsAppConfig {
    /// Bearer token for the Graph API
    pub access_token: SecretString,

    /// Phone number ID used for sending messages
    pub phone_number_id: String,

    /// Token echoed back during webhook verification
    pub verify_token: String,

    /// Graph API version segment
    pub api_version: String,
}

/// Generative model configuration
#[derive(Debug, Clone)]
pub struct ModelConfig {
    pub api_key: SecretString,
    pub model: String,
    pub base_url: String,
    pub timeout: Duration,
}

/// Pipeline variant selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineConfig {
    pub schema: ExtractionSchema,
    pub identity: IdentityStrategy,
    pub persist: PersistMode,
    pub session_store: SessionStoreKind,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            schema: ExtractionSchema::Carbon,
            identity: IdentityStrategy::Contact,
            persist: PersistMode::Database,
            session_store: SessionStoreKind::Memory,
        }
    }
}

impl Config {
    /// Load configuration from the process environment and the config file
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be loaded or a critical value is missing
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let fc = file::load_config_file(config_path)?;
        Self::from_sources(|key| std::env::var(key).ok(), fc)
    }

    /// Build configuration from an env lookup and a parsed config file
    ///
    /// # Errors
    ///
    /// Returns error if the model key is missing, no platform is configured,
    /// a platform is partially configured, or a variant value is unknown
    #[allow(clippy::needless_pass_by_value)]
    pub fn from_sources<F>(env: F, fc: IntakeConfigFile) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| env(key).filter(|v| !v.trim().is_empty());

        let port = non_empty("PORT")
            .map(|s| {
                s.parse::<u16>()
                    .map_err(|e| Error::Config(format!("invalid PORT {s:?}: {e}")))
            })
            .transpose()?
            .or(fc.server.port)
            .unwrap_or(DEFAULT_PORT);

        let telegram = non_empty("TELEGRAM_BOT_TOKEN")
            .or(fc.telegram.bot_token)
            .map(|token| TelegramConfig {
                bot_token: SecretString::from(token),
                webhook_secret: non_empty("TELEGRAM_WEBHOOK_SECRET").or(fc.telegram.webhook_secret),
            });

        let whatsapp = Self::whatsapp_from_sources(&non_empty, fc.whatsapp)?;

        if telegram.is_none() && whatsapp.is_none() {
            return Err(Error::Config(
                "no messaging platform configured: set TELEGRAM_BOT_TOKEN or WHATSAPP_TOKEN"
                    .to_string(),
            ));
        }

        let api_key = non_empty("GEMINI_API_KEY")
            .or(fc.model.api_key)
            .ok_or_else(|| Error::Config("GEMINI_API_KEY is required".to_string()))?;

        let model = ModelConfig {
            api_key: SecretString::from(api_key),
            model: non_empty("GEMINI_MODEL")
                .or(fc.model.name)
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            base_url: non_empty("GEMINI_BASE_URL")
                .or(fc.model.base_url)
                .unwrap_or_else(|| DEFAULT_MODEL_BASE_URL.to_string()),
            timeout: Duration::from_secs(fc.model.timeout_secs.unwrap_or(120)),
        };

        let database_path = non_empty("INTAKE_DB_PATH")
            .or(fc.database.path)
            .map_or_else(default_database_path, PathBuf::from);

        let defaults = PipelineConfig::default();
        let pipeline_file = fc.pipeline;
        let pipeline = PipelineConfig {
            schema: non_empty("INTAKE_SCHEMA")
                .or(pipeline_file.schema)
                .map_or(Ok(defaults.schema), |s| s.parse())?,
            identity: non_empty("INTAKE_IDENTITY")
                .or(pipeline_file.identity)
                .map_or(Ok(defaults.identity), |s| s.parse())?,
            persist: non_empty("INTAKE_PERSIST")
                .or(pipeline_file.persist)
                .map_or(Ok(defaults.persist), |s| s.parse())?,
            session_store: non_empty("INTAKE_SESSION_STORE")
                .or(pipeline_file.session_store)
                .map_or(Ok(defaults.session_store), |s| s.parse())?,
        };

        if pipeline.identity == IdentityStrategy::DisplayName {
            let allowed = non_empty("INTAKE_ALLOW_INSECURE_DISPLAY_NAME")
                .map(|v| ["1", "true", "yes"].iter().any(|t| v.eq_ignore_ascii_case(t)))
                .or(pipeline_file.allow_insecure_display_name)
                .unwrap_or(false);
            if !allowed {
                return Err(Error::Config(
                    "display_name identification trusts a spoofable client-supplied name; \
                     set INTAKE_ALLOW_INSECURE_DISPLAY_NAME=true to enable it anyway"
                        .to_string(),
                ));
            }
            tracing::warn!(
                "display-name identification enabled: any sender can claim a stored name"
            );
        }

        Ok(Self {
            port,
            telegram,
            whatsapp,
            model,
            database_path,
            pipeline,
        })
    }

    fn whatsapp_from_sources<F>(
        non_empty: &F,
        fc: file::WhatsAppFileConfig,
    ) -> Result<Option<WhatsAppConfig>>
    where
        F: Fn(&str) -> Option<String>,
    {
        let access_token = non_empty("WHATSAPP_TOKEN").or(fc.access_token);
        let phone_number_id = non_empty("WHATSAPP_PHONE_ID").or(fc.phone_number_id);
        let verify_token = non_empty("WHATSAPP_VERIFY_TOKEN").or(fc.verify_token);

        match (access_token, phone_number_id, verify_token) {
            (None, None, None) => Ok(None),
            (Some(access_token), Some(phone_number_id), Some(verify_token)) => {
                Ok(Some(WhatsAppConfig {
                    access_token: SecretString::from(access_token),
                    phone_number_id,
                    verify_token,
                    api_version: non_empty("WHATSAPP_API_VERSION")
                        .or(fc.api_version)
                        .unwrap_or_else(|| DEFAULT_WHATSAPP_API_VERSION.to_string()),
                }))
            }
            _ => Err(Error::Config(
                "WhatsApp requires WHATSAPP_TOKEN, WHATSAPP_PHONE_ID and WHATSAPP_VERIFY_TOKEN together"
                    .to_string(),
            )),
        }
    }
}

/// Default database path: `~/.local/share/intake/intake.db` on Linux
fn default_database_path() -> PathBuf {
    let data_dir = directories::BaseDirs::new()
        .map_or_else(|| PathBuf::from("."), |d| d.data_dir().join("intake"));

    if let Err(e) = std::fs::create_dir_all(&data_dir) {
        tracing::warn!(
            path = %data_dir.display(),
            error = %e,
            "failed to create data directory"
        );
    }

    data_dir.join("intake.db")
}
