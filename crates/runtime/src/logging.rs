//! Tracing subscriber setup.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::api::{Result, RuntimeError};

/// Installs a stderr subscriber filtered by `RUST_LOG`, falling back to
/// `default_directive` (e.g. `"info"` or `"ability::net=debug"`).
pub fn init(default_directive: &str) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_directive))
        .map_err(|e| RuntimeError::Logging(e.to_string()))?;

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .try_init()
        .map_err(|e| RuntimeError::Logging(e.to_string()))?;

    tracing::debug!("Logging initialized");
    Ok(())
}
