//! Configuration structures
//!
//! Every section derives `Default` from [`crate::constants`] and carries
//! `#[serde(default)]`, so a config file only needs the keys it overrides.

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_API_TIMEOUT_MS, DEFAULT_BACKOFF_JITTER, DEFAULT_BASE_BACKOFF_MS,
    DEFAULT_CLOSING_HOUR, DEFAULT_CONNECTIVITY_PROBE_SECS, DEFAULT_DATABASE_PATH,
    DEFAULT_DRAIN_BATCH_SIZE, DEFAULT_MAX_BACKOFF_MS, DEFAULT_MAX_RETRIES,
    DEFAULT_MOCK_FAILURE_RATE, DEFAULT_MOCK_LATENCY_MS, DEFAULT_POOL_SIZE,
    DEFAULT_RECENTLY_SYNCED_WINDOW_MS, DEFAULT_SYNC_INTERVAL_SECS, DEFAULT_TIMEZONE,
};

/// Top-level configuration for a barsync client.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BarSyncConfig {
    pub database: DatabaseConfig,
    pub api: ApiConfig,
    pub sync: SyncConfig,
    pub business_day: BusinessDayConfig,
    pub logging: LoggingConfig,
}

/// Local operation store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite file path. `:memory:` keeps the queue in memory only.
    pub path: String,
    pub pool_size: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { path: DEFAULT_DATABASE_PATH.to_string(), pool_size: DEFAULT_POOL_SIZE }
    }
}

/// Which transport the API client uses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiMode {
    #[default]
    Live,
    Mock,
}

crate::impl_domain_status_conversions!(ApiMode {
    Live => "live",
    Mock => "mock",
});

/// Backend (Supabase) connection settings.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub mode: ApiMode,
    pub base_url: String,
    /// Anonymous/public API key sent as `apikey` and bearer token.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub timeout_ms: u64,
    /// Health endpoint probed for connectivity, relative to `base_url`.
    pub health_path: String,
    pub mock_latency_ms: u64,
    pub mock_failure_rate: f64,
}

impl std::fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiConfig")
            .field("mode", &self.mode)
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("timeout_ms", &self.timeout_ms)
            .field("health_path", &self.health_path)
            .field("mock_latency_ms", &self.mock_latency_ms)
            .field("mock_failure_rate", &self.mock_failure_rate)
            .finish()
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            mode: ApiMode::Live,
            base_url: "http://localhost:54321".to_string(),
            api_key: None,
            timeout_ms: DEFAULT_API_TIMEOUT_MS,
            health_path: "/rest/v1/".to_string(),
            mock_latency_ms: DEFAULT_MOCK_LATENCY_MS,
            mock_failure_rate: DEFAULT_MOCK_FAILURE_RATE,
        }
    }
}

/// Drain loop and retry policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub enabled: bool,
    pub interval_seconds: u64,
    pub connectivity_probe_seconds: u64,
    pub batch_size: usize,
    pub max_retries: u32,
    pub base_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub backoff_jitter: f64,
    /// Lifetime of a recently-synced buffer entry.
    pub recently_synced_window_ms: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_seconds: DEFAULT_SYNC_INTERVAL_SECS,
            connectivity_probe_seconds: DEFAULT_CONNECTIVITY_PROBE_SECS,
            batch_size: DEFAULT_DRAIN_BATCH_SIZE,
            max_retries: DEFAULT_MAX_RETRIES,
            base_backoff_ms: DEFAULT_BASE_BACKOFF_MS,
            max_backoff_ms: DEFAULT_MAX_BACKOFF_MS,
            backoff_jitter: DEFAULT_BACKOFF_JITTER,
            recently_synced_window_ms: DEFAULT_RECENTLY_SYNCED_WINDOW_MS,
        }
    }
}

/// Accounting day boundaries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BusinessDayConfig {
    /// Local hour (0-23) at which one business day ends and the next begins.
    pub closing_hour: u32,
    /// IANA timezone name of the establishment.
    pub timezone: String,
}

impl Default for BusinessDayConfig {
    fn default() -> Self {
        Self { closing_hour: DEFAULT_CLOSING_HOUR, timezone: DEFAULT_TIMEZONE.to_string() }
    }
}

/// Log output settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset.
    pub level: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), json: false }
    }
}
