// Logging module - Logging infrastructure
use crate::domain::config::GlobalConfig;
use crate::domain::error::{SerialTermError, SerialTermResult};
use std::io;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize logging system
///
/// `RUST_LOG` takes precedence; otherwise the configured level is used, or
/// `debug` when `verbose` is set. Logs go to stderr so stdout only carries
/// terminal text.
pub fn init_logging(config: &GlobalConfig, verbose: bool) -> SerialTermResult<()> {
    let level = if verbose { "debug" } else { config.log_level.as_str() };

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(format!("serialterm={},warn", level)))
        .map_err(|e| SerialTermError::Config {
            message: format!("Invalid log level '{}': {}", level, e),
        })?;

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(io::stderr)
                .with_target(true)
                .with_level(true),
        )
        .try_init()
        .map_err(|e| SerialTermError::Config {
            message: format!("Failed to initialize logging: {}", e),
        })?;

    tracing::debug!("SerialTerm logging system initialized");
    Ok(())
}
