// Backoff defaults and bounds
use std::time::Duration;

/// Delivery attempts before an operation is parked for manual attention
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// First retry waits this long; each further retry doubles it
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);

pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(60);

/// Fraction of the delay spread around it (0.0 disables jitter)
pub const DEFAULT_JITTER_FACTOR: f64 = 0.3;

/// Doubling stops here; `2^30` base delays is far past any cap
pub const MAX_BACKOFF_EXPONENT: u32 = 30;

pub const MIN_MAX_ATTEMPTS: u32 = 1;
pub const MAX_MAX_ATTEMPTS: u32 = 100;
