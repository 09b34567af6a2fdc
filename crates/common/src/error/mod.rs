//! Shared error vocabulary for the barsync crates
//!
//! Every module error embeds [`CommonError`] for the failures that recur in
//! all layers (bad configuration, storage, timeouts, backend calls) and adds
//! its own variants on top. [`ErrorClassification`] tells callers whether an
//! error is worth retrying and how loudly to log it; module errors implement
//! it with [`impl_error_classification!`], delegating the common variant:
//!
//! ```rust
//! use barsync_common::error::{CommonError, ErrorClassification, ErrorSeverity};
//! use barsync_common::impl_error_classification;
//!
//! #[derive(Debug, thiserror::Error)]
//! pub enum QueueError {
//!     #[error(transparent)]
//!     Common(#[from] CommonError),
//!
//!     #[error("queue is shut down")]
//!     ShutDown,
//! }
//!
//! impl_error_classification!(QueueError, Common,
//!     Self::ShutDown => {
//!         retryable: false,
//!         severity: ErrorSeverity::Warning,
//!         critical: false,
//!     }
//! );
//!
//! let err = QueueError::from(CommonError::timeout("enqueue", std::time::Duration::from_secs(1)));
//! assert!(err.is_retryable());
//! assert!(!QueueError::ShutDown.is_retryable());
//! ```

use std::time::Duration;

use thiserror::Error;

pub type CommonResult<T> = Result<T, CommonError>;

/// Failures shared by every layer of the sync core.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommonError {
    #[error("invalid configuration{}: {message}", field_suffix(.field.as_deref()))]
    Config { field: Option<String>, message: String },

    /// A poisoned or contended lock around in-memory state
    #[error("lock unavailable: {0}")]
    Lock(String),

    #[error("malformed {format}: {message}")]
    Serialization { format: &'static str, message: String },

    /// Local storage (SQLite file, disk I/O)
    #[error("local storage failed: {0}")]
    Storage(String),

    #[error("{operation} timed out after {duration:?}")]
    Timeout { operation: String, duration: Duration },

    /// The remote backend answered with an error or could not be reached
    #[error("{service} call failed: {message}")]
    Backend { service: String, message: String, retryable: bool },

    #[error("invalid {field}: {message}")]
    Validation { field: String, message: String },

    /// Broken internal assumption
    #[error("internal error: {0}")]
    Internal(String),
}

fn field_suffix(field: Option<&str>) -> String {
    field.map(|f| format!(" for '{f}'")).unwrap_or_default()
}

impl CommonError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config { field: None, message: message.into() }
    }

    pub fn config_field(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Config { field: Some(field.into()), message: message.into() }
    }

    pub fn lock(message: impl Into<String>) -> Self {
        Self::Lock(message.into())
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage(message.into())
    }

    pub fn timeout(operation: impl Into<String>, duration: Duration) -> Self {
        Self::Timeout { operation: operation.into(), duration }
    }

    pub fn backend(
        service: impl Into<String>,
        message: impl Into<String>,
        retryable: bool,
    ) -> Self {
        Self::Backend { service: service.into(), message: message.into(), retryable }
    }

    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation { field: field.into(), message: message.into() }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }
}

/// How an error should be handled and reported.
pub trait ErrorClassification {
    /// Another attempt may succeed without any change to the input
    fn is_retryable(&self) -> bool;

    fn severity(&self) -> ErrorSeverity;

    /// A bug or corrupted state rather than an environmental failure
    fn is_critical(&self) -> bool;

    /// Delay requested by the error itself, if any
    fn retry_after(&self) -> Option<Duration>;
}

/// Ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

impl ErrorSeverity {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Critical => "critical",
        }
    }
}

impl ErrorClassification for CommonError {
    fn is_retryable(&self) -> bool {
        match self {
            Self::Lock(_) | Self::Timeout { .. } => true,
            Self::Backend { retryable, .. } => *retryable,
            Self::Config { .. }
            | Self::Serialization { .. }
            | Self::Storage(_)
            | Self::Validation { .. }
            | Self::Internal(_) => false,
        }
    }

    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Lock(_) | Self::Timeout { .. } | Self::Backend { retryable: true, .. } => {
                ErrorSeverity::Warning
            }
            Self::Internal(_) => ErrorSeverity::Critical,
            Self::Config { .. }
            | Self::Serialization { .. }
            | Self::Storage(_)
            | Self::Backend { .. }
            | Self::Validation { .. } => ErrorSeverity::Error,
        }
    }

    fn is_critical(&self) -> bool {
        matches!(self, Self::Internal(_))
    }

    fn retry_after(&self) -> Option<Duration> {
        None
    }
}

impl From<serde_json::Error> for CommonError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization { format: "JSON", message: err.to_string() }
    }
}

impl From<toml::de::Error> for CommonError {
    fn from(err: toml::de::Error) -> Self {
        Self::Serialization { format: "TOML", message: err.to_string() }
    }
}

impl From<std::io::Error> for CommonError {
    fn from(err: std::io::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

/// `From<serde_json::Error>` and `From<std::io::Error>` for a module error
/// whose `$variant` wraps `CommonError`.
#[macro_export]
macro_rules! impl_error_conversion {
    ($error_type:ty, $variant:ident) => {
        impl From<serde_json::Error> for $error_type {
            fn from(err: serde_json::Error) -> Self {
                Self::$variant($crate::error::CommonError::from(err))
            }
        }

        impl From<std::io::Error> for $error_type {
            fn from(err: std::io::Error) -> Self {
                Self::$variant($crate::error::CommonError::from(err))
            }
        }
    };
}

/// Implements `ErrorClassification` for a module error: the `CommonError`
/// variant delegates, every other variant is listed explicitly.
#[macro_export]
macro_rules! impl_error_classification {
    (
        $error_type:ty,
        $common_variant:ident
        $(,
            $variant:pat => {
                retryable: $retryable:expr,
                severity: $severity:expr,
                critical: $critical:expr
                $(, retry_after: $retry_after:expr)?
                $(,)?
            }
        )*
        $(,)?
    ) => {
        impl $crate::error::ErrorClassification for $error_type {
            fn is_retryable(&self) -> bool {
                match self {
                    Self::$common_variant(e) => e.is_retryable(),
                    $($variant => $retryable,)*
                }
            }

            fn severity(&self) -> $crate::error::ErrorSeverity {
                match self {
                    Self::$common_variant(e) => e.severity(),
                    $($variant => $severity,)*
                }
            }

            fn is_critical(&self) -> bool {
                match self {
                    Self::$common_variant(e) => e.is_critical(),
                    $($variant => $critical,)*
                }
            }

            fn retry_after(&self) -> Option<std::time::Duration> {
                match self {
                    Self::$common_variant(e) => e.retry_after(),
                    $($($variant => $retry_after,)?)*
                    #[allow(unreachable_patterns)]
                    _ => None,
                }
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, thiserror::Error)]
    enum StoreError {
        #[error(transparent)]
        Common(#[from] CommonError),

        #[error("quota exceeded: {0} bytes")]
        Quota(u64),
    }

    impl_error_conversion!(StoreError, Common);

    impl_error_classification!(StoreError, Common,
        Self::Quota(_) => {
            retryable: false,
            severity: ErrorSeverity::Critical,
            critical: true,
        }
    );

    #[test]
    fn messages_name_the_failing_field() {
        assert_eq!(
            CommonError::config_field("sync.max_retries", "must be positive").to_string(),
            "invalid configuration for 'sync.max_retries': must be positive"
        );
        assert_eq!(
            CommonError::config("empty file").to_string(),
            "invalid configuration: empty file"
        );
        assert_eq!(
            CommonError::timeout("dispatch", Duration::from_millis(1500)).to_string(),
            "dispatch timed out after 1.5s"
        );
    }

    #[test]
    fn transient_errors_are_retryable() {
        assert!(CommonError::timeout("dispatch", Duration::from_secs(15)).is_retryable());
        assert!(CommonError::lock("poisoned").is_retryable());
        assert!(CommonError::backend("supabase", "502", true).is_retryable());
        assert!(!CommonError::backend("supabase", "constraint", false).is_retryable());
        assert!(!CommonError::storage("disk full").is_retryable());
    }

    #[test]
    fn severity_follows_retryability() {
        assert_eq!(CommonError::internal("bug").severity(), ErrorSeverity::Critical);
        let transient = CommonError::backend("supabase", "502", true);
        assert_eq!(transient.severity(), ErrorSeverity::Warning);
        let refused = CommonError::backend("supabase", "400", false);
        assert_eq!(refused.severity(), ErrorSeverity::Error);
        assert!(ErrorSeverity::Critical > ErrorSeverity::Error);
        assert_eq!(ErrorSeverity::Warning.as_str(), "warning");
    }

    #[test]
    fn module_errors_delegate_classification() {
        let common: StoreError = CommonError::timeout("write", Duration::from_millis(50)).into();
        assert!(common.is_retryable());

        let quota = StoreError::Quota(1024);
        assert!(!quota.is_retryable());
        assert!(quota.is_critical());
        assert_eq!(quota.retry_after(), None);
    }

    #[test]
    fn serde_errors_convert_through_common() {
        let json_err = serde_json::from_str::<u32>("not a number").unwrap_err();
        let err: StoreError = json_err.into();
        assert!(matches!(
            err,
            StoreError::Common(CommonError::Serialization { format: "JSON", .. })
        ));
    }
}
