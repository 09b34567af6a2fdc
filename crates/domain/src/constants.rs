//! Sync core constants
//!
//! Defaults for every tunable in [`crate::config::BarSyncConfig`]. Values are
//! plain integers so they can be shared between config defaults and tests.

// Recently-synced buffer
/// How long a confirmed write bridges the gap until the next authoritative
/// read. A tunable, not a guarantee: it only needs to exceed the time between
/// server confirmation and the next refetch.
pub const DEFAULT_RECENTLY_SYNCED_WINDOW_MS: u64 = 10_000;

// Retry policy for queued operations
pub const DEFAULT_MAX_RETRIES: u32 = 5;
pub const DEFAULT_BASE_BACKOFF_MS: u64 = 1_000;
pub const DEFAULT_MAX_BACKOFF_MS: u64 = 60_000;
pub const DEFAULT_BACKOFF_JITTER: f64 = 0.2;

// Drain loop
pub const DEFAULT_SYNC_INTERVAL_SECS: u64 = 30;
pub const DEFAULT_CONNECTIVITY_PROBE_SECS: u64 = 5;
pub const DEFAULT_DRAIN_BATCH_SIZE: usize = 50;
pub const WORKER_JOIN_TIMEOUT_SECS: u64 = 10;

// API client
pub const DEFAULT_API_TIMEOUT_MS: u64 = 15_000;
pub const DEFAULT_MOCK_LATENCY_MS: u64 = 300;
pub const DEFAULT_MOCK_FAILURE_RATE: f64 = 0.1;
pub const MAX_ERROR_MESSAGE_LENGTH: usize = 256;

// Business day
pub const DEFAULT_CLOSING_HOUR: u32 = 6;
pub const DEFAULT_TIMEZONE: &str = "Africa/Abidjan";

// Local storage
pub const DEFAULT_DATABASE_PATH: &str = "barsync.db";
pub const DEFAULT_POOL_SIZE: u32 = 4;
pub const TEMP_ID_PREFIX: &str = "tmp_";
