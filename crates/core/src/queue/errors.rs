//! Offline queue errors

use barsync_common::error::{CommonError, ErrorClassification, ErrorSeverity};
use barsync_common::impl_error_classification;
use barsync_common::validation::ValidationError;
use barsync_domain::{BarSyncError, OperationStatus};
use thiserror::Error;

/// Failures surfaced by [`super::OfflineQueue`].
///
/// `Validation` and `Storage` are hard failures of the user action: the
/// operation was never queued.
#[derive(Debug, Error)]
pub enum QueueError {
    #[error(transparent)]
    Common(#[from] CommonError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("operation store failed: {0}")]
    Storage(#[from] BarSyncError),

    #[error("operation not found: {0}")]
    NotFound(String),

    #[error("operation {id} is {actual}, expected {expected}")]
    InvalidState { id: String, actual: OperationStatus, expected: OperationStatus },

    #[error("offline queue is shut down")]
    ShutDown,
}

impl_error_classification!(QueueError, Common,
    Self::Validation(_) => {
        retryable: false,
        severity: ErrorSeverity::Error,
        critical: false,
    },
    Self::Storage(_) => {
        retryable: false,
        severity: ErrorSeverity::Critical,
        critical: true,
    },
    Self::NotFound(_) => {
        retryable: false,
        severity: ErrorSeverity::Info,
        critical: false,
    },
    Self::InvalidState { .. } => {
        retryable: false,
        severity: ErrorSeverity::Warning,
        critical: false,
    },
    Self::ShutDown => {
        retryable: false,
        severity: ErrorSeverity::Warning,
        critical: false,
    }
);

/// Result type for queue operations
pub type QueueResult<T> = Result<T, QueueError>;
