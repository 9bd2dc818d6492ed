//! Application configuration
//!
//! Layered with the `config` crate: built-in defaults, an optional TOML
//! file, then `OUTFIT_TRACKER__*` environment variables
//! (e.g. `OUTFIT_TRACKER__WORKER__COUNT=8`).

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::infrastructure::http_client::HttpClientConfig;

pub const ENV_PREFIX: &str = "OUTFIT_TRACKER";

/// Default values
pub mod defaults {
    pub const DATABASE_URL: &str = "sqlite://data/outfit-tracker.db";
    pub const DATABASE_MAX_CONNECTIONS: u32 = 10;

    pub const USER_AGENT: &str =
        "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";
    pub const HTTP_TIMEOUT_SECONDS: u64 = 30;
    pub const MAX_REQUESTS_PER_SECOND: u32 = 5;

    pub const WORKER_COUNT: usize = 5;

    pub const LOG_LEVEL: &str = "info";
    pub const LOG_FILE_NAME: &str = "outfit-tracker.log";
    pub const LOG_DIR: &str = "logs";
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load config: {source}")]
    Load {
        #[from]
        source: config::ConfigError,
    },

    #[error("Configuration validation failed: {message}")]
    Validation { message: String },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub http: HttpClientConfig,
    pub worker: WorkerConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: defaults::DATABASE_URL.to_string(),
            max_connections: defaults::DATABASE_MAX_CONNECTIONS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Number of concurrent tracking workers
    pub count: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            count: defaults::WORKER_COUNT,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error"
    pub level: String,
    /// Structured JSON lines instead of plain text
    pub json_format: bool,
    pub console_output: bool,
    pub file_output: bool,
    pub log_dir: String,
    pub file_name: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::LOG_LEVEL.to_string(),
            json_format: false,
            console_output: true,
            file_output: false,
            log_dir: defaults::LOG_DIR.to_string(),
            file_name: defaults::LOG_FILE_NAME.to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from an optional file plus the environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder =
            config::Config::builder().add_source(config::Config::try_from(&Self::default())?);

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }

        let settings = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Self = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database.url.trim().is_empty() {
            return Err(ConfigError::Validation {
                message: "database.url must not be empty".to_string(),
            });
        }

        if self.database.max_connections == 0 {
            return Err(ConfigError::Validation {
                message: "database.max_connections must be greater than 0".to_string(),
            });
        }

        if self.worker.count == 0 {
            return Err(ConfigError::Validation {
                message: "worker.count must be greater than 0".to_string(),
            });
        }

        if self.http.max_requests_per_second == 0 {
            return Err(ConfigError::Validation {
                message: "http.max_requests_per_second must be greater than 0".to_string(),
            });
        }

        if self.http.timeout_seconds == 0 {
            return Err(ConfigError::Validation {
                message: "http.timeout_seconds must be greater than 0".to_string(),
            });
        }

        Ok(())
    }
}
