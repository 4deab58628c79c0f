//! TOML configuration file loading
//!
//! Supports `~/.config/intake/config.toml` as a persistent config source.
//! All fields are optional; the file is a partial overlay on top of defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::{Error, Result};

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct IntakeConfigFile {
    /// Server/runtime configuration
    #[serde(default)]
    pub server: ServerFileConfig,

    /// Telegram bot configuration
    #[serde(default)]
    pub telegram: TelegramFileConfig,

    /// `WhatsApp` Cloud API configuration
    #[serde(default)]
    pub whatsapp: WhatsAppFileConfig,

    /// Generative model configuration
    #[serde(default)]
    pub model: ModelFileConfig,

    /// Database configuration
    #[serde(default)]
    pub database: DatabaseFileConfig,

    /// Pipeline variant selection
    #[serde(default)]
    pub pipeline: PipelineFileConfig,
}

/// Server/runtime configuration
#[derive(Debug, Default, Deserialize)]
pub struct ServerFileConfig {
    /// HTTP listen port
    pub port: Option<u16>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TelegramFileConfig {
    pub bot_token: Option<String>,
    pub webhook_secret: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct WhatsAppFileConfig {
    pub access_token: Option<String>,
    pub phone_number_id: Option<String>,
    pub verify_token: Option<String>,
    /// Graph API version (e.g. "v18.0")
    pub api_version: Option<String>,
}

/// Generative model configuration
#[derive(Debug, Default, Deserialize)]
pub struct ModelFileConfig {
    pub api_key: Option<String>,
    /// Model identifier (e.g. "gemini-1.5-flash")
    pub name: Option<String>,
    pub base_url: Option<String>,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DatabaseFileConfig {
    pub path: Option<String>,
}

/// Pipeline variant selection (string values are parsed in `Config::from_sources`)
#[derive(Debug, Default, Deserialize)]
pub struct PipelineFileConfig {
    /// "carbon" or "summary"
    pub schema: Option<String>,
    /// "contact" or `display_name`
    pub identity: Option<String>,
    /// "database" or "log"
    pub persist: Option<String>,
    /// "memory" or "database"
    pub session_store: Option<String>,
    pub allow_insecure_display_name: Option<bool>,
}

/// Load the TOML config file
///
/// An explicit path must exist and parse. The standard path is optional:
/// returns `IntakeConfigFile::default()` if it doesn't exist or can't be parsed.
///
/// # Errors
///
/// Returns error if an explicitly requested file cannot be read or parsed
pub fn load_config_file(explicit: Option<&Path>) -> Result<IntakeConfigFile> {
    if let Some(path) = explicit {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("failed to read {}: {e}", path.display()))
        })?;
        let config = toml::from_str(&content)?;
        tracing::info!(path = %path.display(), "loaded config file");
        return Ok(config);
    }

    let Some(path) = config_file_path() else {
        return Ok(IntakeConfigFile::default());
    };

    if !path.exists() {
        return Ok(IntakeConfigFile::default());
    }

    let config = match std::fs::read_to_string(&path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "loaded config file");
                config
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config file, using defaults"
                );
                IntakeConfigFile::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read config file"
            );
            IntakeConfigFile::default()
        }
    };

    Ok(config)
}

/// Return the config file path: `~/.config/intake/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("intake").join("config.toml"))
}
