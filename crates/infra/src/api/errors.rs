//! API-specific error types
//!
//! Every outbound failure is classified into a [`FailureKind`] so the sync
//! manager can decide between backing off and parking the operation.

use std::time::Duration;

use barsync_common::error::{CommonError, ErrorClassification, ErrorSeverity};
use barsync_common::{impl_error_classification, impl_error_conversion};
use barsync_domain::{truncate_error_message, ApiResponse, BarSyncError, FailureKind};
use thiserror::Error;

/// API operation errors
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Common(#[from] CommonError),

    #[error("Timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Server error ({status}): {message}")]
    Server { status: u16, message: String },

    #[error("Rejected by server: {message}")]
    Rejected { message: String, code: Option<String> },

    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid response body: {0}")]
    Decode(String),
}

impl_error_conversion!(ApiError, Common);

impl_error_classification!(ApiError, Common,
    Self::Timeout(_) | Self::Network(_) | Self::Server { .. } => {
        retryable: true,
        severity: ErrorSeverity::Warning,
        critical: false,
    },
    Self::Rejected { .. } => {
        retryable: false,
        severity: ErrorSeverity::Error,
        critical: false,
    },
    Self::Unsupported(_) | Self::Config(_) => {
        retryable: false,
        severity: ErrorSeverity::Critical,
        critical: true,
    },
    Self::Decode(_) => {
        retryable: false,
        severity: ErrorSeverity::Error,
        critical: false,
    }
);

impl ApiError {
    /// Classify a reqwest failure, keeping client timeouts distinct from
    /// transport errors.
    pub fn from_transport(err: &reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            Self::Timeout(timeout)
        } else if err.is_decode() {
            Self::Decode(err.to_string())
        } else if err.is_builder() {
            Self::Config(err.to_string())
        } else {
            Self::Network(err.to_string())
        }
    }

    /// Failure kind recorded on the queued operation
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            Self::Timeout(_) => FailureKind::Timeout,
            Self::Network(_) | Self::Server { .. } => FailureKind::Network,
            Self::Unsupported(_) => FailureKind::Unsupported,
            Self::Common(err) if err.is_retryable() => FailureKind::Network,
            Self::Common(_) | Self::Rejected { .. } | Self::Config(_) | Self::Decode(_) => {
                FailureKind::Rejected
            }
        }
    }

    /// Backend error code (SQLSTATE or HTTP status) when known
    pub fn code(&self) -> Option<String> {
        match self {
            Self::Rejected { code, .. } => code.clone(),
            Self::Server { status, .. } => Some(status.to_string()),
            _ => None,
        }
    }

    /// Normalized `{ success: false, error }` response
    pub fn into_response(self) -> ApiResponse {
        let kind = self.failure_kind();
        let code = self.code();
        let message = match &self {
            Self::Rejected { message, .. } => message.clone(),
            other => other.to_string(),
        };

        let response = ApiResponse::failure(kind, truncate_error_message(&message));
        match code {
            Some(code) => response.with_code(code),
            None => response,
        }
    }
}

impl From<ApiError> for BarSyncError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Timeout(_) | ApiError::Network(_) | ApiError::Server { .. } => {
                Self::Network(err.to_string())
            }
            ApiError::Rejected { .. } | ApiError::Unsupported(_) => {
                Self::InvalidInput(err.to_string())
            }
            ApiError::Config(_) => Self::Config(err.to_string()),
            ApiError::Common(_) | ApiError::Decode(_) => Self::Internal(err.to_string()),
        }
    }
}
