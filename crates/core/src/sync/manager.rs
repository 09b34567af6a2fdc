//! Sync manager - drains the offline queue through the dispatcher
//!
//! One drain pass walks pending operations oldest first, keeping FIFO order
//! per bar: an operation that is still backing off (or just failed with a
//! retryable error) holds back every later operation of the same bar until
//! the next pass. Rejected operations are parked as failed and do not block.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use barsync_common::error::{CommonError, CommonResult};
use barsync_common::{RetryStrategy, Subscribers, SubscriptionId};
use barsync_domain::constants::{
    DEFAULT_BACKOFF_JITTER, DEFAULT_DRAIN_BATCH_SIZE, DEFAULT_RECENTLY_SYNCED_WINDOW_MS,
};
use barsync_domain::{
    ApiResponse, FailureKind, OperationStatus, OperationType, PendingOperation,
    RecentlySyncedEntry, SyncConfig,
};
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use super::buffer::RecentlySyncedBuffer;
use super::errors::{SyncError, SyncResult};
use super::ports::OperationDispatcher;
use crate::queue::OfflineQueue;

/// Drain and retry policy
#[derive(Debug, Clone)]
pub struct SyncManagerConfig {
    /// Upper bound on operations attempted per drain pass
    pub batch_size: usize,
    /// Backoff schedule; `max_attempts` is the maximum retry count
    pub retry: RetryStrategy,
    /// Lifetime of a recently-synced buffer entry
    pub recently_synced_window: Duration,
}

impl Default for SyncManagerConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_DRAIN_BATCH_SIZE,
            retry: RetryStrategy::new().with_jitter_factor(DEFAULT_BACKOFF_JITTER),
            recently_synced_window: Duration::from_millis(DEFAULT_RECENTLY_SYNCED_WINDOW_MS),
        }
    }
}

impl SyncManagerConfig {
    pub fn from_config(config: &SyncConfig) -> CommonResult<Self> {
        if config.batch_size == 0 {
            return Err(CommonError::config_field("sync.batch_size", "must be greater than 0"));
        }
        if config.recently_synced_window_ms == 0 {
            return Err(CommonError::config_field(
                "sync.recently_synced_window_ms",
                "must be greater than 0",
            ));
        }

        let retry = RetryStrategy::custom(
            config.max_retries,
            Duration::from_millis(config.base_backoff_ms),
            Duration::from_millis(config.max_backoff_ms),
        )?
        .with_jitter_factor(config.backoff_jitter);

        Ok(Self {
            batch_size: config.batch_size,
            retry,
            recently_synced_window: Duration::from_millis(config.recently_synced_window_ms),
        })
    }

    pub fn max_retries(&self) -> u32 {
        self.retry.max_attempts()
    }
}

/// Notification emitted by the sync manager
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    OperationSynced { id: String, op_type: OperationType, idempotency_key: Option<String> },
    OperationFailed {
        id: String,
        op_type: OperationType,
        kind: FailureKind,
        message: String,
        /// `false` when the operation now needs manual attention
        retry_scheduled: bool,
    },
    /// At least one sale reached the server during the last drain
    SalesSynced { idempotency_keys: Vec<String> },
    /// Buffer entries expired or were confirmed by an authoritative read
    BufferChanged,
    ConnectivityChanged { online: bool },
}

/// Outcome of one drain pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    pub attempted: usize,
    pub synced: usize,
    pub retry_scheduled: usize,
    /// Rejected or out of retries
    pub failed: usize,
    /// Held back by backoff or by an earlier operation of the same bar
    pub deferred: usize,
}

impl DrainReport {
    pub fn is_empty(&self) -> bool {
        self.attempted == 0 && self.deferred == 0
    }
}

/// Outcome of reconciling against a fresh authoritative read
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub buffer_confirmed: usize,
    pub queue_removed: usize,
}

pub struct SyncManager {
    queue: Arc<OfflineQueue>,
    dispatcher: Arc<dyn OperationDispatcher>,
    buffer: Arc<RecentlySyncedBuffer>,
    config: SyncManagerConfig,
    subscribers: Arc<Subscribers<SyncEvent>>,
    online: AtomicBool,
    drain_lock: Mutex<()>,
    shutdown: CancellationToken,
}

impl SyncManager {
    pub fn new(
        queue: Arc<OfflineQueue>,
        dispatcher: Arc<dyn OperationDispatcher>,
        config: SyncManagerConfig,
    ) -> Self {
        let buffer = Arc::new(RecentlySyncedBuffer::new(config.recently_synced_window));
        Self {
            queue,
            dispatcher,
            buffer,
            config,
            subscribers: Arc::new(Subscribers::new()),
            online: AtomicBool::new(true),
            drain_lock: Mutex::new(()),
            shutdown: CancellationToken::new(),
        }
    }

    pub fn config(&self) -> &SyncManagerConfig {
        &self.config
    }

    pub fn queue(&self) -> &Arc<OfflineQueue> {
        &self.queue
    }

    /// Deliver every due pending operation once.
    pub async fn drain(&self) -> SyncResult<DrainReport> {
        self.drain_at(Utc::now()).await
    }

    /// [`Self::drain`] with an explicit clock, used for due-time checks and
    /// to schedule retries.
    ///
    /// Returns an empty report while offline or when another drain is
    /// already running.
    #[instrument(skip(self))]
    pub async fn drain_at(&self, now: DateTime<Utc>) -> SyncResult<DrainReport> {
        if self.shutdown.is_cancelled() {
            return Err(SyncError::ShutDown);
        }
        if !self.is_online() {
            debug!("offline, skipping drain");
            return Ok(DrainReport::default());
        }
        let Ok(_guard) = self.drain_lock.try_lock() else {
            debug!("drain already in progress");
            return Ok(DrainReport::default());
        };

        let pending = self.queue.pending_operations().await?;
        let mut report = DrainReport::default();
        let mut blocked_bars: HashSet<String> = HashSet::new();
        let mut synced_sales = Vec::new();

        for op in pending {
            if self.shutdown.is_cancelled() || report.attempted >= self.config.batch_size {
                break;
            }
            if blocked_bars.contains(&op.bar_id) {
                report.deferred += 1;
                continue;
            }
            if !op.is_due(now) {
                blocked_bars.insert(op.bar_id.clone());
                report.deferred += 1;
                continue;
            }

            report.attempted += 1;
            let response = self.dispatcher.dispatch(&op).await;

            if response.success {
                self.record_success(&op, response).await?;
                report.synced += 1;
                if op.op_type() == OperationType::CreateSale {
                    synced_sales.extend(op.idempotency_key().map(str::to_string));
                }
            } else if self.record_failure(&op, &response, now).await? {
                report.retry_scheduled += 1;
                blocked_bars.insert(op.bar_id.clone());
            } else {
                report.failed += 1;
            }
        }

        if !synced_sales.is_empty() {
            self.subscribers.notify(&SyncEvent::SalesSynced { idempotency_keys: synced_sales });
        }
        if report.attempted > 0 {
            info!(
                attempted = report.attempted,
                synced = report.synced,
                retry_scheduled = report.retry_scheduled,
                failed = report.failed,
                deferred = report.deferred,
                "drain finished"
            );
        }
        Ok(report)
    }

    async fn record_success(&self, op: &PendingOperation, response: ApiResponse) -> SyncResult<()> {
        let key = op.idempotency_key().map(str::to_string);

        match &key {
            Some(key) => {
                // Buffer first: if the status write fails the operation is
                // re-sent, and the server dedupes it by key.
                let mut delivered = op.clone();
                delivered.status = OperationStatus::Synced;
                self.buffer.insert(RecentlySyncedEntry {
                    idempotency_key: key.clone(),
                    total: op.operation.amount(),
                    synced_at: Utc::now(),
                    operation: delivered,
                    server_data: response.data,
                });
                self.schedule_expiry();
                self.queue.mark_synced(&op.id).await?;
            }
            None => {
                self.queue.mark_synced(&op.id).await?;
                self.queue.remove(&op.id).await?;
            }
        }

        debug!(id = %op.id, op_type = %op.op_type(), "operation synced");
        self.subscribers.notify(&SyncEvent::OperationSynced {
            id: op.id.clone(),
            op_type: op.op_type(),
            idempotency_key: key,
        });
        Ok(())
    }

    /// Returns whether a retry was scheduled.
    async fn record_failure(
        &self,
        op: &PendingOperation,
        response: &ApiResponse,
        now: DateTime<Utc>,
    ) -> SyncResult<bool> {
        let kind = response.failure_kind().unwrap_or(FailureKind::Network);
        let message = response.error.as_ref().map_or("request failed", |e| e.message.as_str());

        let attempts = op.retry_count.saturating_add(1);
        let retry_at = (kind.is_retryable() && self.config.retry.should_retry(attempts)).then(|| {
            let delay = self.config.retry.get_delay(op.retry_count);
            now + chrono::Duration::from_std(delay).unwrap_or_else(|_| chrono::Duration::zero())
        });
        let failed = self.queue.record_attempt(&op.id, message, kind, retry_at).await?;
        let retry_scheduled = retry_at.is_some();

        if let Some(at) = retry_at {
            warn!(
                id = %op.id,
                kind = %kind,
                retry_count = failed.retry_count,
                delay_ms = (at - now).num_milliseconds(),
                error = message,
                "delivery failed, retry scheduled"
            );
        } else {
            error!(
                id = %op.id,
                kind = %kind,
                retry_count = failed.retry_count,
                error = message,
                "delivery failed, operation needs attention"
            );
        }

        self.subscribers.notify(&SyncEvent::OperationFailed {
            id: op.id.clone(),
            op_type: op.op_type(),
            kind,
            message: message.to_string(),
            retry_scheduled,
        });
        Ok(retry_scheduled)
    }

    fn schedule_expiry(&self) {
        let buffer = Arc::clone(&self.buffer);
        let subscribers = Arc::clone(&self.subscribers);
        let shutdown = self.shutdown.clone();
        let window = buffer.window();

        tokio::spawn(async move {
            tokio::select! {
                () = shutdown.cancelled() => {}
                () = tokio::time::sleep(window) => {
                    let expired = buffer.purge_expired();
                    if expired > 0 {
                        debug!(expired, "recently-synced entries expired");
                        subscribers.notify(&SyncEvent::BufferChanged);
                    }
                }
            }
        });
    }

    /// Idempotency keys currently in the recently-synced buffer.
    pub fn get_recently_synced_keys(&self) -> HashSet<String> {
        self.buffer.keys()
    }

    pub fn recently_synced(&self) -> Vec<RecentlySyncedEntry> {
        self.buffer.snapshot()
    }

    pub fn buffer(&self) -> &Arc<RecentlySyncedBuffer> {
        &self.buffer
    }

    /// Drop synced queue records the authoritative source now reports, and
    /// the buffer entries no view needs anymore. `stock_snapshot_at` is set
    /// when the read also refreshed product stock.
    pub async fn reconcile_with_authoritative(
        &self,
        keys: &HashSet<String>,
        stock_snapshot_at: Option<DateTime<Utc>>,
    ) -> SyncResult<ReconcileReport> {
        let mut buffer_confirmed = self.buffer.confirm_authoritative(keys);
        if let Some(fetched_at) = stock_snapshot_at {
            buffer_confirmed += self.buffer.confirm_stock_snapshot(fetched_at);
        }
        let queue_removed = self.queue.remove_superseded(keys).await?;
        if buffer_confirmed > 0 {
            self.subscribers.notify(&SyncEvent::BufferChanged);
        }
        if buffer_confirmed > 0 || queue_removed > 0 {
            debug!(buffer_confirmed, queue_removed, "superseded by authoritative read");
        }
        Ok(ReconcileReport { buffer_confirmed, queue_removed })
    }

    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    /// Record a connectivity change. Going from offline to online drains
    /// immediately and returns that drain's report.
    pub async fn set_online(&self, online: bool) -> SyncResult<Option<DrainReport>> {
        let was_online = self.online.swap(online, Ordering::SeqCst);
        if was_online == online {
            return Ok(None);
        }

        info!(online, "connectivity changed");
        self.subscribers.notify(&SyncEvent::ConnectivityChanged { online });
        if online {
            return self.drain().await.map(Some);
        }
        Ok(None)
    }

    /// Manual retry of a failed operation.
    pub async fn retry_operation(&self, id: &str) -> SyncResult<PendingOperation> {
        Ok(self.queue.retry_operation(id).await?)
    }

    /// Manual discard of a failed operation.
    pub async fn discard_operation(&self, id: &str) -> SyncResult<()> {
        Ok(self.queue.discard_operation(id).await?)
    }

    pub fn subscribe(
        &self,
        listener: impl Fn(&SyncEvent) + Send + Sync + 'static,
    ) -> SubscriptionId {
        self.subscribers.subscribe(listener)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.subscribers.unsubscribe(id)
    }

    /// Stop expiry timers and refuse further drains. In-flight dispatches
    /// are not interrupted.
    pub fn shutdown(&self) {
        if !self.shutdown.is_cancelled() {
            self.shutdown.cancel();
            self.subscribers.clear();
            self.buffer.clear();
            info!("sync manager shut down");
        }
    }

    pub fn is_shut_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }
}
