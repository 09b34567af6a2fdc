//! SQLite-backed implementation of the offline queue's operation store.
//!
//! One row per queued operation keyed by temp id. The `seq` column keeps the
//! original insertion order so that updates never reorder the queue.

use std::sync::Arc;

use async_trait::async_trait;
use barsync_core::OperationStore;
use barsync_domain::{
    BarSyncError, FailureKind, OperationFilter, OperationPayload, OperationStatus,
    PendingOperation, Result,
};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use tokio::task;
use tracing::{instrument, warn};

use super::manager::{map_sql_error, DbManager};

const SELECT_COLUMNS: &str = "SELECT id, bar_id, op_type, status, payload_json, created_at,
        retry_count, last_error, failure_kind, next_retry_at
    FROM pending_operations";

const INSERT_SQL: &str = "INSERT INTO pending_operations (
        id, bar_id, op_type, status, idempotency_key, payload_json, created_at,
        retry_count, last_error, failure_kind, next_retry_at
    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)";

const UPDATE_SQL: &str = "UPDATE pending_operations SET
        bar_id = ?2, op_type = ?3, status = ?4, idempotency_key = ?5, payload_json = ?6,
        created_at = ?7, retry_count = ?8, last_error = ?9, failure_kind = ?10,
        next_retry_at = ?11
    WHERE id = ?1";

/// Durable operation store for the offline queue.
pub struct SqliteOperationStore {
    db: Arc<DbManager>,
}

impl SqliteOperationStore {
    /// Construct a store backed by the shared manager. The schema must
    /// already be migrated.
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }

    fn write_row(conn: &Connection, sql: &str, op: &PendingOperation) -> Result<usize> {
        let payload_json = serde_json::to_string(&op.operation)
            .map_err(|e| BarSyncError::InvalidInput(format!("unserializable payload: {e}")))?;

        conn.execute(
            sql,
            params![
                op.id,
                op.bar_id,
                op.op_type().as_str(),
                op.status.as_str(),
                op.idempotency_key(),
                payload_json,
                format_timestamp(op.timestamp),
                op.retry_count,
                op.last_error,
                op.failure_kind.map(|kind| kind.as_str()),
                op.next_retry_at.map(format_timestamp),
            ],
        )
        .map_err(map_sql_error)
    }

    fn fetch(conn: &Connection, filter: &OperationFilter) -> Result<Vec<PendingOperation>> {
        let mut clauses = Vec::new();
        let mut values: Vec<String> = Vec::new();

        if let Some(status) = filter.status {
            values.push(status.as_str().to_string());
            clauses.push(format!("status = ?{}", values.len()));
        }
        if let Some(bar_id) = &filter.bar_id {
            values.push(bar_id.clone());
            clauses.push(format!("bar_id = ?{}", values.len()));
        }
        if let Some(op_type) = filter.op_type {
            values.push(op_type.as_str().to_string());
            clauses.push(format!("op_type = ?{}", values.len()));
        }

        let mut sql = SELECT_COLUMNS.to_string();
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        sql.push_str(" ORDER BY seq ASC");

        let mut stmt = conn.prepare(&sql).map_err(map_sql_error)?;
        let rows = stmt
            .query_map(params_from_iter(values.iter()), |row| {
                Ok((row.get::<_, String>(0)?, map_operation_row(row)))
            })
            .map_err(map_sql_error)?;

        let mut operations = Vec::new();
        for row in rows {
            let (id, decoded) = row.map_err(map_sql_error)?;
            match decoded {
                Ok(operation) => operations.push(operation),
                // Unreadable rows are skipped, not fatal
                Err(err) => warn!(id = %id, error = %err, "skipping undecodable queued operation"),
            }
        }
        Ok(operations)
    }
}

#[async_trait]
impl OperationStore for SqliteOperationStore {
    #[instrument(skip_all, fields(id = %operation.id, op_type = %operation.op_type()))]
    async fn insert(&self, operation: &PendingOperation) -> Result<()> {
        let db = Arc::clone(&self.db);
        let to_insert = operation.clone();

        task::spawn_blocking(move || -> Result<()> {
            let conn = db.get_connection()?;
            Self::write_row(&conn, INSERT_SQL, &to_insert).map(|_| ())
        })
        .await
        .map_err(map_join_error)?
    }

    #[instrument(skip(self, operation), fields(id = %operation.id, status = %operation.status))]
    async fn update(&self, operation: &PendingOperation) -> Result<()> {
        let db = Arc::clone(&self.db);
        let to_update = operation.clone();

        task::spawn_blocking(move || -> Result<()> {
            let conn = db.get_connection()?;
            match Self::write_row(&conn, UPDATE_SQL, &to_update)? {
                0 => Err(BarSyncError::NotFound(format!("operation {}", to_update.id))),
                _ => Ok(()),
            }
        })
        .await
        .map_err(map_join_error)?
    }

    async fn get(&self, id: &str) -> Result<Option<PendingOperation>> {
        let db = Arc::clone(&self.db);
        let id = id.to_string();

        task::spawn_blocking(move || -> Result<Option<PendingOperation>> {
            let conn = db.get_connection()?;
            conn.query_row(&format!("{SELECT_COLUMNS} WHERE id = ?1"), [&id], map_operation_row)
                .optional()
                .map_err(map_sql_error)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn list(&self, filter: &OperationFilter) -> Result<Vec<PendingOperation>> {
        let db = Arc::clone(&self.db);
        let filter = filter.clone();

        task::spawn_blocking(move || -> Result<Vec<PendingOperation>> {
            let conn = db.get_connection()?;
            Self::fetch(&conn, &filter)
        })
        .await
        .map_err(map_join_error)?
    }

    #[instrument(skip(self))]
    async fn delete(&self, id: &str) -> Result<bool> {
        let db = Arc::clone(&self.db);
        let id = id.to_string();

        task::spawn_blocking(move || -> Result<bool> {
            let conn = db.get_connection()?;
            let removed = conn
                .execute("DELETE FROM pending_operations WHERE id = ?1", [&id])
                .map_err(map_sql_error)?;
            Ok(removed > 0)
        })
        .await
        .map_err(map_join_error)?
    }
}

fn map_operation_row(row: &Row<'_>) -> rusqlite::Result<PendingOperation> {
    let payload_json: String = row.get(4)?;
    let operation: OperationPayload = serde_json::from_str(&payload_json)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(4, Type::Text, Box::new(e)))?;

    Ok(PendingOperation {
        id: row.get(0)?,
        bar_id: row.get(1)?,
        operation,
        status: parse_column::<OperationStatus>(row, 3)?,
        timestamp: parse_timestamp(row, 5)?,
        retry_count: row.get(6)?,
        last_error: row.get(7)?,
        failure_kind: match row.get::<_, Option<String>>(8)? {
            Some(_) => Some(parse_column::<FailureKind>(row, 8)?),
            None => None,
        },
        next_retry_at: match row.get::<_, Option<String>>(9)? {
            Some(_) => Some(parse_timestamp(row, 9)?),
            None => None,
        },
    })
}

fn parse_column<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: std::str::FromStr<Err = String>,
{
    let raw: String = row.get(idx)?;
    raw.parse::<T>().map_err(|message| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            Type::Text,
            Box::new(BarSyncError::Database(message)),
        )
    })
}

fn parse_timestamp(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|at| at.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn map_join_error(err: task::JoinError) -> BarSyncError {
    if err.is_cancelled() {
        BarSyncError::Internal("operation store task cancelled".into())
    } else {
        BarSyncError::Internal(format!("operation store task panic: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use barsync_domain::{DeleteProductPayload, OperationType};
    use chrono::TimeZone;
    use tempfile::TempDir;

    use super::*;

    fn delete_product(id: &str, bar_id: &str) -> PendingOperation {
        PendingOperation::new_at(
            id,
            OperationPayload::DeleteProduct(DeleteProductPayload {
                bar_id: bar_id.into(),
                product_id: "p-1".into(),
            }),
            Utc.with_ymd_and_hms(2026, 3, 4, 21, 30, 0).unwrap(),
        )
    }

    fn setup_store() -> (SqliteOperationStore, TempDir) {
        let temp_dir = TempDir::new().expect("temp dir created");
        let manager = DbManager::new(temp_dir.path().join("queue.db"), 2).expect("manager");
        manager.run_migrations().expect("migrations run");
        (SqliteOperationStore::new(Arc::new(manager)), temp_dir)
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn failure_details_survive_a_round_trip() {
        let (store, _dir) = setup_store();
        let mut op = delete_product("tmp_1", "bar-1");
        store.insert(&op).await.unwrap();

        op.retry_count = 2;
        op.last_error = Some("timed out after 15000ms".into());
        op.failure_kind = Some(FailureKind::Timeout);
        op.next_retry_at = Some(op.timestamp + chrono::Duration::seconds(4));
        store.update(&op).await.unwrap();

        assert_eq!(store.get("tmp_1").await.unwrap(), Some(op));
        assert_eq!(store.get("missing").await.unwrap(), None);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn filters_combine_and_keep_insertion_order() {
        let (store, _dir) = setup_store();
        for (id, bar) in [("tmp_b", "bar-1"), ("tmp_a", "bar-2"), ("tmp_c", "bar-1")] {
            store.insert(&delete_product(id, bar)).await.unwrap();
        }

        let mut synced = delete_product("tmp_b", "bar-1");
        synced.status = OperationStatus::Synced;
        store.update(&synced).await.unwrap();

        let ids = |ops: Vec<PendingOperation>| ops.into_iter().map(|o| o.id).collect::<Vec<_>>();
        assert_eq!(
            ids(store.list(&OperationFilter::all()).await.unwrap()),
            ["tmp_b", "tmp_a", "tmp_c"]
        );
        let narrowed = OperationFilter::all()
            .with_bar("bar-1")
            .with_status(OperationStatus::Pending)
            .with_type(OperationType::DeleteProduct);
        assert_eq!(ids(store.list(&narrowed).await.unwrap()), ["tmp_c"]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn duplicate_ids_and_missing_rows_are_reported() {
        let (store, _dir) = setup_store();
        store.insert(&delete_product("tmp_1", "bar-1")).await.unwrap();

        assert!(matches!(
            store.insert(&delete_product("tmp_1", "bar-1")).await,
            Err(BarSyncError::InvalidInput(_))
        ));
        assert!(matches!(
            store.update(&delete_product("tmp_9", "bar-1")).await,
            Err(BarSyncError::NotFound(_))
        ));
        assert!(store.delete("tmp_1").await.unwrap());
        assert!(!store.delete("tmp_1").await.unwrap());
    }
}
