//! Logging configuration using tracing.

use crate::utils::{BackupError, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global subscriber. `RUST_LOG` takes precedence over `level`.
pub fn init(level: &str) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => level_filter(level)?,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_thread_names(true))
        .try_init()
        .map_err(|e| BackupError::Config(format!("logger already installed: {}", e)))
}

/// Filter for a `--log_level` value. Unknown levels are a config error
/// rather than a silent fallback.
fn level_filter(level: &str) -> Result<EnvFilter> {
    let level = level.trim().to_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" | "off" => EnvFilter::try_new(&level)
            .map_err(|e| BackupError::Config(format!("log level {}: {}", level, e))),
        _ => Err(BackupError::Config(format!(
            "log_level must be one of trace, debug, info, warn, error, off, got {}",
            level
        ))),
    }
}
