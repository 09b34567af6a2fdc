//! Configuration loader
//!
//! Builds a [`BarSyncConfig`] from a config file, environment variables and
//! built-in defaults.
//!
//! ## Loading Strategy
//! 1. Reads `.env` (if present) into the process environment via `dotenvy`
//! 2. Starts from the explicit config file, else the first probed file, else
//!    defaults
//! 3. Overlays every `BARSYNC_*` variable that is set
//! 4. Validates the result and reports every problem at once
//!
//! ## Environment Variables
//! - `BARSYNC_DB_PATH`: SQLite file path (`:memory:` for an in-memory queue)
//! - `BARSYNC_DB_POOL_SIZE`: Connection pool size
//! - `BARSYNC_API_MODE`: `live` or `mock`
//! - `BARSYNC_API_URL`: Backend base URL
//! - `BARSYNC_API_KEY`: Backend anonymous key
//! - `BARSYNC_API_TIMEOUT_MS`: Per-request timeout
//! - `BARSYNC_SYNC_ENABLED`: Whether the background worker runs (true/false)
//! - `BARSYNC_SYNC_INTERVAL`: Drain interval in seconds
//! - `BARSYNC_SYNC_MAX_RETRIES`: Retries before an operation needs attention
//! - `BARSYNC_RECENTLY_SYNCED_WINDOW_MS`: Recently-synced buffer lifetime
//! - `BARSYNC_CLOSING_HOUR`: Business day closing hour (0-23)
//! - `BARSYNC_TIMEZONE`: IANA timezone of the bar
//! - `BARSYNC_LOG_LEVEL`: Default log filter
//! - `BARSYNC_LOG_JSON`: JSON log output (true/false)
//!
//! ## File Locations
//! The loader probes `barsync.toml`, `config/barsync.toml` and
//! `barsync.json`, first in the working directory, then next to the
//! executable.

use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use barsync_common::validation::{ValidationResult, Validator};
use barsync_domain::{ApiMode, BarSyncConfig, BarSyncError, Result};
use tracing_subscriber::EnvFilter;

use crate::errors::InfraError;

const CONFIG_FILE_NAMES: [&str; 3] = ["barsync.toml", "config/barsync.toml", "barsync.json"];

/// Load configuration with the full fallback chain
///
/// # Errors
/// Returns `BarSyncError::Config` if the file or an environment variable
/// cannot be parsed, or if the merged configuration fails [`validate`].
pub fn load() -> Result<BarSyncConfig> {
    match dotenvy::dotenv() {
        Ok(path) => tracing::debug!(path = %path.display(), "Loaded .env file"),
        Err(err) if err.not_found() => {}
        Err(err) => tracing::warn!(error = %err, "Ignoring unreadable .env file"),
    }
    load_with(None)
}

/// Load configuration from `path` (or the probed locations when `None`),
/// then apply environment overrides and validate.
///
/// # Errors
/// Same as [`load`]; an explicit `path` that does not exist is an error.
pub fn load_with(path: Option<PathBuf>) -> Result<BarSyncConfig> {
    let mut config = match path {
        Some(path) => load_from_file(Some(path))?,
        None => match probe_config_paths() {
            Some(found) => load_from_file(Some(found))?,
            None => {
                tracing::debug!("No config file found, starting from defaults");
                BarSyncConfig::default()
            }
        },
    };

    apply_env_overrides(&mut config)?;
    validate(&config).map_err(|err| BarSyncError::Config(err.to_string()))?;

    tracing::info!(
        mode = %config.api.mode,
        database = %config.database.path,
        sync_enabled = config.sync.enabled,
        "Configuration loaded"
    );
    Ok(config)
}

/// Defaults overlaid with the `BARSYNC_*` environment variables
///
/// # Errors
/// Returns `BarSyncError::Config` if a variable is set to an unparseable
/// value.
pub fn load_from_env() -> Result<BarSyncConfig> {
    let mut config = BarSyncConfig::default();
    apply_env_overrides(&mut config)?;
    Ok(config)
}

/// Load configuration from a file
///
/// If `path` is `None`, probes the standard locations. Format is detected by
/// file extension (`.json` or `.toml`). Missing keys keep their defaults.
///
/// # Errors
/// Returns `BarSyncError::Config` if the file is missing, unreadable or
/// malformed.
pub fn load_from_file(path: Option<PathBuf>) -> Result<BarSyncConfig> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(BarSyncError::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            p
        }
        None => probe_config_paths().ok_or_else(|| {
            BarSyncError::Config("No config file found in any of the standard locations".into())
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| BarSyncError::Config(format!("Failed to read config file: {e}")))?;

    parse_config(&contents, &config_path)
}

fn parse_config(contents: &str, path: &Path) -> Result<BarSyncConfig> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => toml::from_str(contents).map_err(|e| InfraError::from(e).into()),
        "json" => serde_json::from_str(contents)
            .map_err(|e| BarSyncError::Config(format!("Invalid JSON format: {e}"))),
        _ => Err(BarSyncError::Config(format!("Unsupported config format: {extension}"))),
    }
}

/// First existing config file among the standard locations
pub fn probe_config_paths() -> Option<PathBuf> {
    let mut roots = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        roots.push(cwd);
    }
    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            roots.push(exe_dir.to_path_buf());
        }
    }

    roots
        .iter()
        .flat_map(|root| CONFIG_FILE_NAMES.iter().map(move |name| root.join(name)))
        .find(|path| path.exists())
}

/// Overlay every `BARSYNC_*` variable that is set onto `config`
fn apply_env_overrides(config: &mut BarSyncConfig) -> Result<()> {
    if let Some(path) = env_var("BARSYNC_DB_PATH") {
        config.database.path = path;
    }
    if let Some(size) = env_parse("BARSYNC_DB_POOL_SIZE")? {
        config.database.pool_size = size;
    }

    if let Some(mode) = env_parse::<ApiMode>("BARSYNC_API_MODE")? {
        config.api.mode = mode;
    }
    if let Some(url) = env_var("BARSYNC_API_URL") {
        config.api.base_url = url;
    }
    if let Some(key) = env_var("BARSYNC_API_KEY") {
        config.api.api_key = Some(key);
    }
    if let Some(timeout) = env_parse("BARSYNC_API_TIMEOUT_MS")? {
        config.api.timeout_ms = timeout;
    }

    config.sync.enabled = env_bool("BARSYNC_SYNC_ENABLED", config.sync.enabled);
    if let Some(interval) = env_parse("BARSYNC_SYNC_INTERVAL")? {
        config.sync.interval_seconds = interval;
    }
    if let Some(retries) = env_parse("BARSYNC_SYNC_MAX_RETRIES")? {
        config.sync.max_retries = retries;
    }
    if let Some(window) = env_parse("BARSYNC_RECENTLY_SYNCED_WINDOW_MS")? {
        config.sync.recently_synced_window_ms = window;
    }

    if let Some(hour) = env_parse("BARSYNC_CLOSING_HOUR")? {
        config.business_day.closing_hour = hour;
    }
    if let Some(timezone) = env_var("BARSYNC_TIMEZONE") {
        config.business_day.timezone = timezone;
    }

    if let Some(level) = env_var("BARSYNC_LOG_LEVEL") {
        config.logging.level = level;
    }
    config.logging.json = env_bool("BARSYNC_LOG_JSON", config.logging.json);

    Ok(())
}

/// Check every section for values the runtime cannot work with
///
/// # Errors
/// Returns a `ValidationError` listing every offending field.
pub fn validate(config: &BarSyncConfig) -> ValidationResult<()> {
    let mut v = Validator::new();

    v.validate_nested("database", |v| {
        v.validate_not_empty("path", &config.database.path);
        v.validate_range("pool_size", config.database.pool_size, 1, 32);
    });

    v.validate_nested("api", |v| {
        let api = &config.api;
        if api.mode == ApiMode::Live && url::Url::parse(&api.base_url).is_err() {
            v.add_error("base_url", "must be an absolute URL");
        }
        v.validate_min("timeout_ms", api.timeout_ms, 1);
        if !api.mock_failure_rate.is_finite() {
            v.add_error("mock_failure_rate", "must be a finite number");
        } else {
            v.validate_range("mock_failure_rate", api.mock_failure_rate, 0.0, 1.0);
        }
    });

    v.validate_nested("sync", |v| {
        let sync = &config.sync;
        v.validate_min("interval_seconds", sync.interval_seconds, 1);
        v.validate_min("connectivity_probe_seconds", sync.connectivity_probe_seconds, 1);
        v.validate_min("batch_size", sync.batch_size, 1);
        v.validate_range("max_retries", sync.max_retries, 1, 100);
        v.validate_min("base_backoff_ms", sync.base_backoff_ms, 1);
        v.validate_min("max_backoff_ms", sync.max_backoff_ms, sync.base_backoff_ms);
        if !sync.backoff_jitter.is_finite() {
            v.add_error("backoff_jitter", "must be a finite number");
        } else {
            v.validate_range("backoff_jitter", sync.backoff_jitter, 0.0, 1.0);
        }
        v.validate_min("recently_synced_window_ms", sync.recently_synced_window_ms, 1);
    });

    v.validate_nested("business_day", |v| {
        v.validate_max("closing_hour", config.business_day.closing_hour, 23);
        if config.business_day.timezone.parse::<chrono_tz::Tz>().is_err() {
            v.add_error("timezone", "must be an IANA timezone name");
        }
    });

    v.validate_nested("logging", |v| {
        if EnvFilter::try_new(&config.logging.level).is_err() {
            v.add_error("level", "must be a valid log filter directive");
        }
    });

    v.finalize()
}

fn env_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn env_parse<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: Display,
{
    env_var(key)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .map_err(|e| BarSyncError::Config(format!("Invalid value for {key}: {e}")))
        })
        .transpose()
}

/// Parse boolean from environment variable
///
/// Accepts: `1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off` (case-insensitive)
fn env_bool(key: &str, default: bool) -> bool {
    env_var(key)
        .map(|s| matches!(s.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}
