//! Background worker lifecycle errors

use std::time::Duration;

use barsync_common::error::{CommonError, ErrorClassification, ErrorSeverity};
use barsync_common::impl_error_classification;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error(transparent)]
    Common(#[from] CommonError),

    #[error("sync worker already running")]
    AlreadyRunning,

    #[error("sync worker not running")]
    NotRunning,

    #[error("sync worker task panicked: {0}")]
    Panicked(String),

    #[error("sync worker did not stop within {0:?}")]
    JoinTimeout(Duration),
}

impl_error_classification!(WorkerError, Common,
    Self::AlreadyRunning | Self::NotRunning => {
        retryable: false,
        severity: ErrorSeverity::Warning,
        critical: false,
    },
    Self::Panicked(_) => {
        retryable: false,
        severity: ErrorSeverity::Critical,
        critical: true,
    },
    Self::JoinTimeout(_) => {
        retryable: true,
        severity: ErrorSeverity::Error,
        critical: false,
    }
);
