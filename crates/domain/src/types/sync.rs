//! Transport results and sync bookkeeping

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::operation::PendingOperation;
use crate::constants::MAX_ERROR_MESSAGE_LENGTH;
use crate::impl_domain_status_conversions;

/// Why a delivery attempt failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Client-side timeout elapsed before the server answered.
    Timeout,
    /// Connection or transport failure, or a transient server error.
    Network,
    /// The server refused the mutation (constraint, insufficient stock, ...).
    Rejected,
    /// The client cannot dispatch this operation type.
    Unsupported,
}

impl_domain_status_conversions!(FailureKind {
    Timeout => "timeout",
    Network => "network",
    Rejected => "rejected",
    Unsupported => "unsupported",
});

impl FailureKind {
    /// Timeouts and transport errors are retried with backoff; rejections are
    /// terminal until the user corrects the operation.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout | Self::Network)
    }
}

/// Error attached to a failed delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiFailure {
    pub kind: FailureKind,
    pub message: String,
    /// Backend error code (Postgres SQLSTATE, HTTP status) when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

/// Normalized result of one outbound call: `{ success, data?, error? }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ApiFailure>,
}

impl ApiResponse {
    #[must_use]
    pub const fn ok(data: Option<serde_json::Value>) -> Self {
        Self { success: true, data, error: None }
    }

    #[must_use]
    pub fn failure(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(ApiFailure { kind, message: message.into(), code: None }),
        }
    }

    #[must_use]
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        if let Some(error) = self.error.as_mut() {
            error.code = Some(code.into());
        }
        self
    }

    /// Failure kind, defaulting to `Network` for a failed response that
    /// carries no error detail.
    #[must_use]
    pub fn failure_kind(&self) -> Option<FailureKind> {
        if self.success {
            return None;
        }
        Some(self.error.as_ref().map_or(FailureKind::Network, |e| e.kind))
    }
}

/// Clip a delivery error to [`MAX_ERROR_MESSAGE_LENGTH`] bytes on a char
/// boundary, marking the cut with `…`.
#[must_use]
pub fn truncate_error_message(message: &str) -> String {
    if message.len() <= MAX_ERROR_MESSAGE_LENGTH {
        return message.to_string();
    }
    let mut end = MAX_ERROR_MESSAGE_LENGTH;
    while !message.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}…", &message[..end])
}

/// Confirmation metadata kept between server acceptance and the next
/// authoritative read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecentlySyncedEntry {
    pub idempotency_key: String,
    pub total: f64,
    /// When the server confirmed the write.
    pub synced_at: DateTime<Utc>,
    /// The delivered operation, kept so views can render the entity.
    pub operation: PendingOperation,
    /// Server response body, typically the created record id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_data: Option<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_transport_failures_retry() {
        assert!(FailureKind::Timeout.is_retryable());
        assert!(FailureKind::Network.is_retryable());
        assert!(!FailureKind::Rejected.is_retryable());
        assert!(!FailureKind::Unsupported.is_retryable());
    }

    #[test]
    fn failure_kind_of_bare_failure_is_network() {
        let bare = ApiResponse { success: false, data: None, error: None };
        assert_eq!(bare.failure_kind(), Some(FailureKind::Network));
        assert_eq!(ApiResponse::ok(None).failure_kind(), None);

        let rejected = ApiResponse::failure(FailureKind::Rejected, "stock").with_code("P0001");
        assert_eq!(rejected.failure_kind(), Some(FailureKind::Rejected));
        assert_eq!(rejected.error.unwrap().code.as_deref(), Some("P0001"));
    }

    #[test]
    fn long_errors_are_clipped_on_a_char_boundary() {
        assert_eq!(truncate_error_message("connection reset"), "connection reset");

        let clipped = truncate_error_message(&"é".repeat(MAX_ERROR_MESSAGE_LENGTH));
        assert!(clipped.ends_with('…'));
        assert!(clipped.len() <= MAX_ERROR_MESSAGE_LENGTH + '…'.len_utf8());
    }
}
