//! Error types used throughout the sync core

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for barsync ports and adapters
///
/// Serialized as `{ "type": ..., "message": ... }` so the UI layer can render
/// it without knowing the Rust type.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "message")]
pub enum BarSyncError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for barsync operations
pub type Result<T> = std::result::Result<T, BarSyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_as_tagged_message() {
        let err = BarSyncError::Database("disk full".into());
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json, serde_json::json!({ "type": "Database", "message": "disk full" }));
    }

    #[test]
    fn display_prefixes_category() {
        assert_eq!(BarSyncError::NotFound("op-1".into()).to_string(), "Not found: op-1");
    }
}
