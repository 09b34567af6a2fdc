//! Logging initialisation
//!
//! Installs a global `tracing` subscriber: an `EnvFilter` (from `RUST_LOG`,
//! falling back to the configured level) over a plain or JSON `fmt` layer.

use barsync_domain::{BarSyncError, LoggingConfig, Result};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is unset
fn build_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(&config.level).map_err(|e| {
            BarSyncError::Config(format!("invalid log level '{}': {e}", config.level))
        }),
    }
}

/// Install the global subscriber.
///
/// Returns `Ok(false)` when a subscriber is already installed (a host
/// application or an earlier call), which is not an error.
///
/// # Errors
/// Returns `BarSyncError::Config` if the configured level is not a valid
/// filter directive.
pub fn init_tracing(config: &LoggingConfig) -> Result<bool> {
    let filter = build_filter(config)?;

    let installed = if config.json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_target(true))
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .try_init()
    };

    match installed {
        Ok(()) => {
            tracing::debug!(level = %config.level, json = config.json, "Tracing initialised");
            Ok(true)
        }
        Err(_) => Ok(false),
    }
}
