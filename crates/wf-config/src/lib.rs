//! # wf-config
//!
//! Layered settings for the Wayfarer binary: built-in defaults, then an
//! optional `wayfarer.toml` (or the file named by `WAYFARER_CONFIG`), then
//! environment variables such as `WAYFARER__SERVER__PORT=9000`.
//! A `.env` file is read first when present.

use std::path::PathBuf;

use config::builder::DefaultState;
use config::{ConfigBuilder, Environment, File};
use secrecy::SecretString;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

const ENV_PREFIX: &str = "WAYFARER";
const DEFAULT_FILE: &str = "wayfarer";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub server: ServerSettings,
    pub database: DatabaseSettings,
    pub storage: StorageSettings,
    pub auth: AuthSettings,
    pub log: LogSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize)]
pub struct DatabaseSettings {
    /// May embed credentials, kept out of Debug output.
    pub url: SecretString,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageSettings {
    /// Directory uploads are written to
    pub root: PathBuf,
    /// Public URL prefix the root is served under
    pub url_prefix: String,
    pub max_upload_bytes: usize,
    /// Longest edge of generated image thumbnails, in pixels
    pub thumbnail_size: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthSettings {
    pub session_ttl_hours: i64,
    pub min_password_length: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogSettings {
    /// Default filter directive, overridden by `RUST_LOG`
    pub level: String,
    pub json: bool,
}

impl Settings {
    /// Reads `.env`, the optional config file and the environment.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let file = std::env::var(format!("{ENV_PREFIX}_CONFIG"))
            .unwrap_or_else(|_| DEFAULT_FILE.to_string());
        debug!(%file, "loading settings");

        let builder = defaults()?
            .add_source(File::with_name(&file).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            );
        finish(builder)
    }

    pub fn bind_address(&self) -> (String, u16) {
        (self.server.host.clone(), self.server.port)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::Invalid("server.port must be non-zero".into()));
        }
        if self.storage.max_upload_bytes == 0 {
            return Err(ConfigError::Invalid(
                "storage.max_upload_bytes must be positive".into(),
            ));
        }
        if self.storage.thumbnail_size == 0 {
            return Err(ConfigError::Invalid(
                "storage.thumbnail_size must be positive".into(),
            ));
        }
        if !self.storage.url_prefix.starts_with('/') {
            return Err(ConfigError::Invalid(
                "storage.url_prefix must start with '/'".into(),
            ));
        }
        if self.auth.session_ttl_hours <= 0 {
            return Err(ConfigError::Invalid(
                "auth.session_ttl_hours must be positive".into(),
            ));
        }
        if self.auth.min_password_length == 0 {
            return Err(ConfigError::Invalid(
                "auth.min_password_length must be positive".into(),
            ));
        }
        Ok(())
    }
}

fn defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    Ok(config::Config::builder()
        .set_default("server.host", "127.0.0.1")?
        .set_default("server.port", 8080_i64)?
        .set_default("database.url", "sqlite:wayfarer.db?mode=rwc")?
        .set_default("storage.root", "./data/uploads")?
        .set_default("storage.url_prefix", "/uploads")?
        .set_default("storage.max_upload_bytes", 25_i64 * 1024 * 1024)?
        .set_default("storage.thumbnail_size", 320_i64)?
        .set_default("auth.session_ttl_hours", 24_i64 * 7)?
        .set_default("auth.min_password_length", 6_i64)?
        .set_default("log.level", "info")?
        .set_default("log.json", false)?)
}

fn finish(builder: ConfigBuilder<DefaultState>) -> Result<Settings, ConfigError> {
    let settings: Settings = builder.build()?.try_deserialize()?;
    settings.validate()?;
    Ok(settings)
}
