//! Configuration loading and validation
//!
//! Reads [`barsync_domain::BarSyncConfig`] from files and environment
//! variables.

pub mod loader;

// Re-export commonly used items
pub use loader::{load, load_from_env, load_from_file, load_with, probe_config_paths, validate};
