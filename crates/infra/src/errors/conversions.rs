//! Conversions from storage and config-parsing errors into domain errors.
//!
//! HTTP failures are classified separately by `api::ApiError`, which keeps
//! the timeout / network / rejection split the sync manager needs.

use barsync_domain::BarSyncError;
use rusqlite::Error as SqlError;

/// Error newtype that keeps conversions on the infrastructure side and can be
/// converted back into the domain error.
#[derive(Debug)]
pub struct InfraError(pub BarSyncError);

impl From<InfraError> for BarSyncError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

impl From<BarSyncError> for InfraError {
    fn from(value: BarSyncError) -> Self {
        InfraError(value)
    }
}

/// Extension trait to make the conversion logic explicit in tests and within
/// this module.
trait IntoBarSyncError {
    fn into_barsync(self) -> BarSyncError;
}

/* -------------------------------------------------------------------------- */
/* rusqlite::Error → BarSyncError */
/* -------------------------------------------------------------------------- */

impl IntoBarSyncError for SqlError {
    fn into_barsync(self) -> BarSyncError {
        use rusqlite::ffi::ErrorCode;
        use rusqlite::Error as RE;

        match self {
            RE::SqliteFailure(err, maybe_message) => {
                let message = maybe_message.unwrap_or_default();
                match (err.code, err.extended_code) {
                    (ErrorCode::DatabaseBusy, _) => {
                        BarSyncError::Database("database is busy".into())
                    }
                    (ErrorCode::DatabaseLocked, _) => {
                        BarSyncError::Database("database is locked".into())
                    }
                    (ErrorCode::ConstraintViolation, 1555 | 2067) => {
                        BarSyncError::InvalidInput(format!("duplicate key: {message}"))
                    }
                    (ErrorCode::DiskFull, _) => BarSyncError::Database("disk is full".into()),
                    (ErrorCode::ReadOnly, _) => {
                        BarSyncError::Database("database is read-only".into())
                    }
                    _ => BarSyncError::Database(format!(
                        "sqlite failure {:?} (code {}): {}",
                        err.code, err.extended_code, message
                    )),
                }
            }
            RE::QueryReturnedNoRows => BarSyncError::NotFound("no rows returned by query".into()),
            RE::FromSqlConversionFailure(_, _, cause) => {
                BarSyncError::Database(format!("failed to convert sqlite value: {cause}"))
            }
            RE::InvalidColumnType(_, _, ty) => {
                BarSyncError::Database(format!("invalid column type: {ty}"))
            }
            RE::Utf8Error(_) => BarSyncError::Database("invalid UTF-8 returned from sqlite".into()),
            RE::InvalidPath(path) => BarSyncError::Database(format!(
                "invalid database path: {}",
                path.to_string_lossy()
            )),
            other => BarSyncError::Database(other.to_string()),
        }
    }
}

impl From<SqlError> for InfraError {
    fn from(value: SqlError) -> Self {
        InfraError(value.into_barsync())
    }
}

/* -------------------------------------------------------------------------- */
/* r2d2::Error → BarSyncError */
/* -------------------------------------------------------------------------- */

impl IntoBarSyncError for r2d2::Error {
    fn into_barsync(self) -> BarSyncError {
        BarSyncError::Database(format!("connection pool unavailable: {self}"))
    }
}

impl From<r2d2::Error> for InfraError {
    fn from(value: r2d2::Error) -> Self {
        InfraError(value.into_barsync())
    }
}

/* -------------------------------------------------------------------------- */
/* toml → BarSyncError */
/* -------------------------------------------------------------------------- */

impl IntoBarSyncError for toml::de::Error {
    fn into_barsync(self) -> BarSyncError {
        BarSyncError::Config(format!("Invalid TOML format: {self}"))
    }
}

impl From<toml::de::Error> for InfraError {
    fn from(value: toml::de::Error) -> Self {
        InfraError(value.into_barsync())
    }
}

/* -------------------------------------------------------------------------- */
/* Tests */
/* -------------------------------------------------------------------------- */

#[cfg(test)]
mod tests {
    use rusqlite::ffi::{Error as FfiError, ErrorCode};

    use super::*;

    #[test]
    fn sqlite_busy_maps_to_database_error() {
        let err = SqlError::SqliteFailure(
            FfiError { code: ErrorCode::DatabaseBusy, extended_code: 5 },
            Some("database is locked".into()),
        );

        let mapped: BarSyncError = InfraError::from(err).into();
        match mapped {
            BarSyncError::Database(msg) => assert!(msg.contains("busy")),
            other => panic!("expected database error, got {other:?}"),
        }
    }

    #[test]
    fn primary_key_violation_is_invalid_input() {
        let err = SqlError::SqliteFailure(
            FfiError { code: ErrorCode::ConstraintViolation, extended_code: 1555 },
            Some("UNIQUE constraint failed: pending_operations.id".into()),
        );

        let mapped: BarSyncError = InfraError::from(err).into();
        assert!(
            matches!(mapped, BarSyncError::InvalidInput(msg) if msg.contains("pending_operations"))
        );
    }

    #[test]
    fn full_disk_is_reported_plainly() {
        let err = SqlError::SqliteFailure(
            FfiError { code: ErrorCode::DiskFull, extended_code: 13 },
            None,
        );
        let mapped: BarSyncError = InfraError::from(err).into();
        assert!(matches!(mapped, BarSyncError::Database(msg) if msg == "disk is full"));
    }

    #[test]
    fn no_rows_maps_to_not_found() {
        let mapped: BarSyncError = InfraError::from(SqlError::QueryReturnedNoRows).into();
        assert!(matches!(mapped, BarSyncError::NotFound(_)));
    }

    #[test]
    fn malformed_toml_maps_to_config_error() {
        let err = toml::from_str::<toml::Value>("not = [valid").unwrap_err();
        let mapped: BarSyncError = InfraError::from(err).into();
        assert!(matches!(mapped, BarSyncError::Config(msg) if msg.starts_with("Invalid TOML")));
    }
}
