//! Sync manager errors

use barsync_common::error::{CommonError, ErrorClassification, ErrorSeverity};
use barsync_common::impl_error_classification;
use thiserror::Error;

use crate::queue::QueueError;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Common(#[from] CommonError),

    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error("sync manager is shut down")]
    ShutDown,
}

impl_error_classification!(SyncError, Common,
    Self::Queue(err) => {
        retryable: err.is_retryable(),
        severity: err.severity(),
        critical: err.is_critical(),
        retry_after: err.retry_after(),
    },
    Self::ShutDown => {
        retryable: false,
        severity: ErrorSeverity::Warning,
        critical: false,
    }
);

/// Result type for sync operations
pub type SyncResult<T> = Result<T, SyncError>;
