//! Unified view errors

use barsync_domain::{BarSyncError, OperationType};
use thiserror::Error;

use crate::queue::QueueError;
use crate::sync::SyncError;

#[derive(Debug, Error)]
pub enum ViewError {
    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error("authoritative read failed: {0}")]
    Source(#[from] BarSyncError),

    #[error("{family} view does not accept {op_type} operations")]
    UnsupportedOperation { family: &'static str, op_type: OperationType },

    #[error("operation belongs to bar {actual}, view is bound to bar {expected}")]
    WrongBar { expected: String, actual: String },
}

/// Result type for view operations
pub type ViewResult<T> = Result<T, ViewError>;
