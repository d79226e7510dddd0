//! # ab-config
//!
//! Layered application settings: built-in defaults, then an optional
//! `config/ad-board.toml`, then `AD_BOARD__SECTION__KEY` environment
//! variables. A `.env` file is loaded into the environment first.

use std::net::SocketAddr;
use std::time::Duration;

use config::{Config, Environment, File};
use secrecy::SecretString;
use serde::Deserialize;

pub const ENV_PREFIX: &str = "AD_BOARD";
pub const DEFAULT_CONFIG_FILE: &str = "config/ad-board";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MediaConfig {
    /// Directory uploaded images are written to.
    pub root: String,
    /// Public URL prefix the directory is served under.
    pub url_prefix: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MailBackend {
    Log,
    Smtp,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SmtpConfig {
    pub host: Option<String>,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<SecretString>,
    pub starttls: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MailConfig {
    pub from: String,
    pub backend: MailBackend,
    pub smtp: SmtpConfig,
}

/// Periods for the scheduled jobs, in seconds. Zero disables a job.
#[derive(Debug, Clone, Deserialize)]
pub struct JobsConfig {
    pub sweep_interval_secs: u64,
    pub user_count_interval_secs: u64,
    pub promo_interval_secs: u64,
}

impl JobsConfig {
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    pub fn user_count_interval(&self) -> Duration {
        Duration::from_secs(self.user_count_interval_secs)
    }

    pub fn promo_interval(&self) -> Duration {
        Duration::from_secs(self.promo_interval_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
    /// Fallback filter when `RUST_LOG` is unset.
    pub filter: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub media: MediaConfig,
    pub mail: MailConfig,
    pub jobs: JobsConfig,
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Loads `.env`, the optional config file and the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::build(Some(DEFAULT_CONFIG_FILE), Environment::with_prefix(ENV_PREFIX))
    }

    fn build(file: Option<&str>, env: Environment) -> Result<Self, ConfigError> {
        let mut builder = Config::builder()
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080)?
            .set_default("database.url", "sqlite:ad_board.db")?
            .set_default("media.root", "./media/ads")?
            .set_default("media.url_prefix", "/media/ads")?
            .set_default("mail.from", "admin@board.com")?
            .set_default("mail.backend", "log")?
            .set_default("mail.smtp.port", 587)?
            .set_default("mail.smtp.starttls", true)?
            .set_default("jobs.sweep_interval_secs", 3600)?
            .set_default("jobs.user_count_interval_secs", 86_400)?
            .set_default("jobs.promo_interval_secs", 0)?
            .set_default("logging.json", false)?
            .set_default("logging.filter", "info")?;

        if let Some(path) = file {
            builder = builder.add_source(File::with_name(path).required(false));
        }
        builder = builder.add_source(
            env.prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config: AppConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        tracing::debug!(
            addr = %config.server.host,
            port = config.server.port,
            mail_backend = ?config.mail.backend,
            "configuration loaded"
        );
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.mail.backend == MailBackend::Smtp && self.mail.smtp.host.is_none() {
            return Err(ConfigError::Invalid(
                "mail.smtp.host is required when mail.backend = \"smtp\"".into(),
            ));
        }
        if self.mail.from.trim().is_empty() {
            return Err(ConfigError::Invalid("mail.from must not be empty".into()));
        }
        Ok(())
    }

    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .map_err(|e| ConfigError::Invalid(format!("server address: {e}")))
    }
}
