//! Logging setup.

use tracing_subscriber::EnvFilter;

use crate::config::ConfigError;

/// Install a fmt subscriber. `RUST_LOG` wins over `level` when set.
/// A second call is a no-op.
pub fn init_tracing(level: &str) -> Result<(), ConfigError> {
    let filter = match std::env::var("RUST_LOG") {
        Ok(from_env) if !from_env.trim().is_empty() => EnvFilter::try_new(from_env),
        _ => EnvFilter::try_new(level.trim()),
    }
    .map_err(|e| ConfigError::Invalid(format!("invalid logging.level: {e}")))?;

    // ignore error: a subscriber is already installed
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
    Ok(())
}
