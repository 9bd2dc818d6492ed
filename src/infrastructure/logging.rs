//! Logging system configuration and initialization
//!
//! - Console and/or file output
//! - Optional structured JSON lines
//! - `RUST_LOG` overrides the configured level
//! - Dependency noise (SQL statements, HTTP internals) suppressed unless
//!   the level is `trace`

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use once_cell::sync::OnceCell;
use tracing_appender::{non_blocking, non_blocking::WorkerGuard, rolling};
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt, layer::SubscriberExt, util::SubscriberInitExt};

pub use crate::infrastructure::config::LoggingConfig;

// Keeps the non-blocking file writer alive for the process lifetime.
static LOG_GUARD: OnceCell<WorkerGuard> = OnceCell::new();

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Initialize the logging system with default configuration
pub fn init_logging() -> Result<()> {
    init_logging_with_config(&LoggingConfig::default())
}

/// Build the env filter for a configured level.
///
/// `RUST_LOG` wins when set, e.g. `RUST_LOG="debug,sqlx::query=debug"`.
pub fn build_env_filter(level: &str) -> Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }

    let mut filter = EnvFilter::try_new(level).with_context(|| format!("Invalid log level: {level}"))?;

    if !level.to_lowercase().contains("trace") {
        for directive in [
            "sqlx::query=warn",
            "sqlx::sqlite=warn",
            "reqwest=info",
            "hyper=warn",
            "hyper_util=warn",
            "h2=warn",
            "html5ever=warn",
            "selectors=warn",
        ] {
            filter = filter.add_directive(directive.parse()?);
        }
    }

    Ok(filter)
}

/// Resolve the log directory; relative paths sit next to the working dir.
pub fn log_directory(config: &LoggingConfig) -> PathBuf {
    let dir = Path::new(&config.log_dir);
    if dir.is_absolute() {
        dir.to_path_buf()
    } else {
        std::env::current_dir().unwrap_or_default().join(dir)
    }
}

/// Initialize logging with custom configuration
pub fn init_logging_with_config(config: &LoggingConfig) -> Result<()> {
    let env_filter = build_env_filter(&config.level)?;

    let mut layers: Vec<BoxedLayer> = Vec::new();

    if config.file_output {
        let log_dir = log_directory(config);
        std::fs::create_dir_all(&log_dir)
            .with_context(|| format!("Failed to create log directory {}", log_dir.display()))?;

        let file_appender = rolling::never(&log_dir, &config.file_name);
        let (file_writer, guard) = non_blocking(file_appender);
        let _ = LOG_GUARD.set(guard);

        let layer = fmt::layer().with_writer(file_writer).with_ansi(false);
        layers.push(if config.json_format {
            layer.json().with_current_span(false).boxed()
        } else {
            layer.with_target(false).boxed()
        });
    }

    if config.console_output {
        let layer = fmt::layer().with_writer(std::io::stdout);
        layers.push(if config.json_format {
            layer.json().boxed()
        } else {
            layer.with_target(false).boxed()
        });
    }

    Registry::default()
        .with(layers)
        .with(env_filter)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    tracing::info!(
        level = %config.level,
        json = config.json_format,
        file = config.file_output,
        "Logging initialized"
    );

    Ok(())
}
