//! Offline queue service - durable, validated write buffer

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use barsync_common::{Subscribers, SubscriptionId};
use barsync_domain::constants::TEMP_ID_PREFIX;
use barsync_domain::{
    truncate_error_message, FailureKind, OperationFilter, OperationPayload, OperationStatus,
    OperationType, PendingOperation, QueueStats,
};
use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::errors::{QueueError, QueueResult};
use super::ports::OperationStore;
use crate::operations::OperationValidator;

/// Change notification emitted after every successful queue write
#[derive(Debug, Clone, PartialEq)]
pub enum QueueEvent {
    Enqueued(PendingOperation),
    Updated(PendingOperation),
    Removed { id: String },
}

impl QueueEvent {
    pub fn operation_id(&self) -> &str {
        match self {
            Self::Enqueued(op) | Self::Updated(op) => &op.id,
            Self::Removed { id } => id,
        }
    }
}

/// Per-device queue of pending mutations.
///
/// Writes are serialized through a single lock; reads go straight to the
/// store so a running drain never blocks `enqueue` for longer than one write.
pub struct OfflineQueue {
    store: Arc<dyn OperationStore>,
    write_lock: Mutex<()>,
    subscribers: Subscribers<QueueEvent>,
    closed: AtomicBool,
}

impl OfflineQueue {
    pub fn new(store: Arc<dyn OperationStore>) -> Self {
        Self {
            store,
            write_lock: Mutex::new(()),
            subscribers: Subscribers::new(),
            closed: AtomicBool::new(false),
        }
    }

    /// Validate and persist a typed payload with a fresh temp id.
    pub async fn enqueue(&self, payload: OperationPayload) -> QueueResult<PendingOperation> {
        self.enqueue_operation(PendingOperation::new(String::new(), payload)).await
    }

    /// Validate an untyped payload against `op_type`, then enqueue it.
    pub async fn enqueue_raw(
        &self,
        op_type: OperationType,
        raw: &Value,
    ) -> QueueResult<PendingOperation> {
        let payload = OperationValidator::validate(op_type, raw)?;
        self.enqueue(payload).await
    }

    /// Persist `operation` as pending, assigning a temp id when it has none.
    ///
    /// Enqueueing a record-creating operation whose idempotency key is already
    /// queued returns the existing record instead of a duplicate.
    #[instrument(skip(self, operation), fields(op_type = %operation.op_type()))]
    pub async fn enqueue_operation(
        &self,
        mut operation: PendingOperation,
    ) -> QueueResult<PendingOperation> {
        self.ensure_open()?;
        OperationValidator::validate_payload(&operation.operation)?;

        if operation.id.is_empty() {
            operation.id = new_temp_id();
        }
        operation.bar_id = operation.operation.bar_id().to_string();
        operation.status = OperationStatus::Pending;
        operation.retry_count = 0;
        operation.last_error = None;
        operation.failure_kind = None;
        operation.next_retry_at = None;

        let _guard = self.write_lock.lock().await;

        if let Some(key) = operation.idempotency_key() {
            let filter = OperationFilter::all().with_bar(operation.bar_id.clone());
            let existing = self.store.list(&filter).await?;
            if let Some(found) = existing.into_iter().find(|op| op.idempotency_key() == Some(key))
            {
                debug!(id = %found.id, "idempotency key already queued");
                return Ok(found);
            }
        }

        self.store.insert(&operation).await?;
        info!(id = %operation.id, bar_id = %operation.bar_id, "operation enqueued");
        self.subscribers.notify(&QueueEvent::Enqueued(operation.clone()));
        Ok(operation)
    }

    /// Operations matching `filter`, in insertion order.
    pub async fn get_operations(
        &self,
        filter: &OperationFilter,
    ) -> QueueResult<Vec<PendingOperation>> {
        Ok(self.store.list(filter).await?)
    }

    pub async fn pending_operations(&self) -> QueueResult<Vec<PendingOperation>> {
        self.get_operations(&OperationFilter::all().with_status(OperationStatus::Pending)).await
    }

    /// Failed operations parked for manual retry or discard.
    pub async fn needs_attention(&self) -> QueueResult<Vec<PendingOperation>> {
        self.get_operations(&OperationFilter::all().with_status(OperationStatus::Failed)).await
    }

    pub async fn get(&self, id: &str) -> QueueResult<PendingOperation> {
        self.store.get(id).await?.ok_or_else(|| QueueError::NotFound(id.to_string()))
    }

    #[instrument(skip(self))]
    pub async fn mark_synced(&self, id: &str) -> QueueResult<PendingOperation> {
        self.transition(id, |op| {
            op.status = OperationStatus::Synced;
            op.last_error = None;
            op.failure_kind = None;
            op.next_retry_at = None;
            Ok(())
        })
        .await
    }

    /// Record a failed delivery attempt that will not be retried: status
    /// failed, retry count + 1.
    pub async fn mark_failed(
        &self,
        id: &str,
        error: &str,
        kind: FailureKind,
    ) -> QueueResult<PendingOperation> {
        self.record_attempt(id, error, kind, None).await
    }

    /// Record a failed delivery attempt in a single write.
    ///
    /// With `retry_at` the operation stays pending and is not due before that
    /// instant; without it the operation is parked as failed.
    #[instrument(skip(self, error))]
    pub async fn record_attempt(
        &self,
        id: &str,
        error: &str,
        kind: FailureKind,
        retry_at: Option<DateTime<Utc>>,
    ) -> QueueResult<PendingOperation> {
        let message = truncate_error_message(error);
        self.transition(id, move |op| {
            op.status =
                if retry_at.is_some() { OperationStatus::Pending } else { OperationStatus::Failed };
            op.retry_count = op.retry_count.saturating_add(1);
            op.last_error = Some(message);
            op.failure_kind = Some(kind);
            op.next_retry_at = retry_at;
            Ok(())
        })
        .await
    }

    /// Manual retry of a failed operation: back to pending with a fresh
    /// retry budget.
    #[instrument(skip(self))]
    pub async fn retry_operation(&self, id: &str) -> QueueResult<PendingOperation> {
        self.transition(id, |op| {
            expect_status(op, OperationStatus::Failed)?;
            op.status = OperationStatus::Pending;
            op.retry_count = 0;
            op.last_error = None;
            op.failure_kind = None;
            op.next_retry_at = None;
            Ok(())
        })
        .await
    }

    /// Drop a failed operation the user gave up on.
    #[instrument(skip(self))]
    pub async fn discard_operation(&self, id: &str) -> QueueResult<()> {
        let op = self.get(id).await?;
        expect_status(&op, OperationStatus::Failed)?;
        warn!(id, op_type = %op.op_type(), "discarding failed operation");
        self.remove(id).await
    }

    /// Permanently delete an operation.
    pub async fn remove(&self, id: &str) -> QueueResult<()> {
        self.ensure_open()?;
        let _guard = self.write_lock.lock().await;
        if !self.store.delete(id).await? {
            return Err(QueueError::NotFound(id.to_string()));
        }
        debug!(id, "operation removed");
        self.subscribers.notify(&QueueEvent::Removed { id: id.to_string() });
        Ok(())
    }

    /// Delete synced records whose idempotency key the server now reports.
    pub async fn remove_superseded(&self, keys: &HashSet<String>) -> QueueResult<usize> {
        if keys.is_empty() {
            return Ok(0);
        }
        let filter = OperationFilter::all().with_status(OperationStatus::Synced);
        let synced = self.get_operations(&filter).await?;
        let mut removed = 0;
        for op in synced {
            if op.idempotency_key().is_some_and(|key| keys.contains(key)) {
                self.remove(&op.id).await?;
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Counts by status. `retrying` is the subset of `pending` waiting out a
    /// backoff delay.
    pub async fn stats(&self) -> QueueResult<QueueStats> {
        let now = Utc::now();
        let operations = self.get_operations(&OperationFilter::all()).await?;
        let mut stats = QueueStats::default();
        for op in &operations {
            match op.status {
                OperationStatus::Pending => {
                    stats.pending += 1;
                    if !op.is_due(now) {
                        stats.retrying += 1;
                    }
                }
                OperationStatus::Synced => stats.synced += 1,
                OperationStatus::Failed => stats.failed += 1,
            }
        }
        Ok(stats)
    }

    pub fn subscribe(
        &self,
        listener: impl Fn(&QueueEvent) + Send + Sync + 'static,
    ) -> SubscriptionId {
        self.subscribers.subscribe(listener)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.subscribers.unsubscribe(id)
    }

    /// Refuse further writes and drop every listener.
    pub fn shutdown(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.subscribers.clear();
            info!("offline queue shut down");
        }
    }

    pub fn is_shut_down(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn ensure_open(&self) -> QueueResult<()> {
        if self.is_shut_down() {
            return Err(QueueError::ShutDown);
        }
        Ok(())
    }

    async fn transition<F>(&self, id: &str, apply: F) -> QueueResult<PendingOperation>
    where
        F: FnOnce(&mut PendingOperation) -> QueueResult<()>,
    {
        self.ensure_open()?;
        let _guard = self.write_lock.lock().await;
        let mut op = self.get(id).await?;
        apply(&mut op)?;
        self.store.update(&op).await?;
        debug!(id, status = %op.status, retry_count = op.retry_count, "operation updated");
        self.subscribers.notify(&QueueEvent::Updated(op.clone()));
        Ok(op)
    }
}

fn new_temp_id() -> String {
    format!("{TEMP_ID_PREFIX}{}", Uuid::now_v7())
}

fn expect_status(op: &PendingOperation, expected: OperationStatus) -> QueueResult<()> {
    if op.status == expected {
        Ok(())
    } else {
        Err(QueueError::InvalidState { id: op.id.clone(), actual: op.status, expected })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use barsync_domain::constants::MAX_ERROR_MESSAGE_LENGTH;
    use barsync_domain::DeleteProductPayload;
    use serde_json::json;

    use super::*;
    use crate::queue::InMemoryOperationStore;

    const BAR: &str = "0191d3a4-6f1e-7c3b-9a57-3f1b2c4d5e6f";
    const PRODUCT: &str = "0191d3a4-6f1e-7c3b-9a57-000000000002";
    const USER: &str = "0191d3a4-6f1e-7c3b-9a57-000000000001";

    fn queue() -> OfflineQueue {
        OfflineQueue::new(Arc::new(InMemoryOperationStore::new()))
    }

    fn delete_product() -> OperationPayload {
        OperationPayload::DeleteProduct(DeleteProductPayload {
            bar_id: BAR.into(),
            product_id: PRODUCT.into(),
        })
    }

    fn expense(key: &str) -> Value {
        json!({
            "idempotency_key": key,
            "bar_id": BAR,
            "amount": 2500,
            "category": "water",
            "expense_date": "2026-03-01",
            "created_by": USER
        })
    }

    #[tokio::test]
    async fn enqueue_assigns_temp_id_and_notifies() {
        let queue = queue();
        let events = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&events);
        queue.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let op = queue.enqueue(delete_product()).await.unwrap();
        assert!(op.id.starts_with(TEMP_ID_PREFIX));
        assert_eq!(op.status, OperationStatus::Pending);
        assert_eq!(events.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn invalid_payload_is_never_persisted() {
        let queue = queue();
        let err = queue.enqueue_raw(OperationType::AddExpense, &json!({ "amount": -1 })).await;
        assert!(matches!(err, Err(QueueError::Validation(_))));
        assert!(queue.get_operations(&OperationFilter::all()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn same_idempotency_key_is_queued_once() {
        let queue = queue();
        let first = queue.enqueue_raw(OperationType::AddExpense, &expense("exp-1")).await.unwrap();
        let second = queue.enqueue_raw(OperationType::AddExpense, &expense("exp-1")).await.unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(queue.stats().await.unwrap().pending, 1);
    }

    #[tokio::test]
    async fn mark_failed_counts_attempts_and_truncates() {
        let queue = queue();
        let op = queue.enqueue(delete_product()).await.unwrap();

        let long_error = "x".repeat(MAX_ERROR_MESSAGE_LENGTH * 2);
        let failed = queue.mark_failed(&op.id, &long_error, FailureKind::Network).await.unwrap();
        assert_eq!(failed.status, OperationStatus::Failed);
        assert_eq!(failed.retry_count, 1);
        assert_eq!(failed.next_retry_at, None);
        assert!(failed.last_error.unwrap().chars().count() <= MAX_ERROR_MESSAGE_LENGTH + 1);
    }

    #[tokio::test]
    async fn retryable_attempt_stays_pending_in_one_update() {
        let queue = queue();
        let op = queue.enqueue(delete_product()).await.unwrap();
        let updates = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let seen = Arc::clone(&updates);
        queue.subscribe(move |event| {
            if let QueueEvent::Updated(op) = event {
                seen.lock().push(op.status);
            }
        });

        let retry_at = Utc::now() + chrono::Duration::seconds(30);
        let recorded = queue
            .record_attempt(&op.id, "timed out", FailureKind::Timeout, Some(retry_at))
            .await
            .unwrap();
        assert_eq!(recorded.status, OperationStatus::Pending);
        assert_eq!(recorded.retry_count, 1);
        assert_eq!(recorded.next_retry_at, Some(retry_at));
        assert!(!recorded.needs_attention());
        assert_eq!(*updates.lock(), [OperationStatus::Pending]);

        let stats = queue.stats().await.unwrap();
        assert_eq!((stats.pending, stats.retrying, stats.failed), (1, 1, 0));
    }

    #[tokio::test]
    async fn manual_recovery_only_applies_to_failed_operations() {
        let queue = queue();
        let op = queue.enqueue(delete_product()).await.unwrap();

        assert!(matches!(
            queue.retry_operation(&op.id).await,
            Err(QueueError::InvalidState { expected: OperationStatus::Failed, .. })
        ));
        assert!(queue.discard_operation(&op.id).await.is_err());

        queue.mark_failed(&op.id, "insufficient stock", FailureKind::Rejected).await.unwrap();
        let retried = queue.retry_operation(&op.id).await.unwrap();
        assert_eq!(retried.retry_count, 0);
        assert_eq!(retried.last_error, None);

        queue.mark_failed(&op.id, "insufficient stock", FailureKind::Rejected).await.unwrap();
        queue.discard_operation(&op.id).await.unwrap();
        assert!(matches!(queue.get(&op.id).await, Err(QueueError::NotFound(_))));
    }

    #[tokio::test]
    async fn insertion_order_survives_status_changes() {
        let queue = queue();
        let a = queue.enqueue_raw(OperationType::AddExpense, &expense("a")).await.unwrap();
        let b = queue.enqueue_raw(OperationType::AddExpense, &expense("b")).await.unwrap();
        let c = queue.enqueue_raw(OperationType::AddExpense, &expense("c")).await.unwrap();
        queue.mark_synced(&a.id).await.unwrap();

        let ids: Vec<_> = queue
            .get_operations(&OperationFilter::all())
            .await
            .unwrap()
            .into_iter()
            .map(|op| op.id)
            .collect();
        assert_eq!(ids, [a.id.clone(), b.id, c.id]);

        let removed = queue.remove_superseded(&HashSet::from(["a".to_string()])).await.unwrap();
        assert_eq!(removed, 1);
    }

    #[tokio::test]
    async fn shutdown_rejects_writes() {
        let queue = queue();
        queue.shutdown();
        assert!(matches!(queue.enqueue(delete_product()).await, Err(QueueError::ShutDown)));
    }
}
