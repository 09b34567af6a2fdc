//! Generic unified view over one entity family
//!
//! A view is bound to one bar. It holds the last authoritative snapshot,
//! listens to the queue and the sync manager, and rebuilds its merged list
//! lazily on the next read after any of its inputs changed.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use barsync_common::SubscriptionId;
use barsync_domain::{
    OperationFilter, OperationPayload, OperationStatus, OperationType, PendingOperation,
    RecentlySyncedEntry, Result as DomainResult,
};
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, instrument};

use super::errors::{ViewError, ViewResult};
use super::merge::{merge_sources, InputDigest, MergeCache, MergeEntity, UnifiedEntity};
use super::ports::AuthoritativeSource;
use crate::queue::OfflineQueue;
use crate::sync::SyncManager;

/// Inputs available to [`EntityFamily::project`]
#[derive(Debug, Clone, Copy)]
pub struct ProjectionContext<'a> {
    /// Pending (not failed) operations for the view's bar, oldest first.
    pub pending: &'a [PendingOperation],
    /// Live buffer entries for the view's bar.
    pub recently_synced: &'a [RecentlySyncedEntry],
    /// When the authoritative snapshot was requested.
    pub fetched_at: Option<DateTime<Utc>>,
}

impl<'a> ProjectionContext<'a> {
    /// Buffer entries the authoritative snapshot cannot reflect yet.
    pub fn unreflected_synced(&self) -> impl Iterator<Item = &'a RecentlySyncedEntry> + 'a {
        let fetched_at = self.fetched_at;
        let entries: &'a [RecentlySyncedEntry] = self.recently_synced;
        entries
            .iter()
            .filter(move |entry| fetched_at.map_or(true, |at| at < entry.synced_at))
    }
}

/// Family-specific behaviour plugged into [`UnifiedView`]
#[async_trait]
pub trait EntityFamily: Send + Sync + 'static {
    type Entity: MergeEntity;

    fn name(&self) -> &'static str;

    /// Whether a fresh snapshot of this family includes the stock effect of
    /// every operation confirmed before it was requested.
    fn snapshot_reflects_stock(&self) -> bool {
        false
    }

    /// Operation types `add` accepts for this family.
    fn accepts(&self, op_type: OperationType) -> bool;

    async fn fetch(
        &self,
        source: &dyn AuthoritativeSource,
        bar_id: &str,
    ) -> DomainResult<Vec<Self::Entity>>;

    /// Optimistic entity an operation creates, if it creates one.
    fn entity_from_operation(&self, operation: &PendingOperation) -> Option<Self::Entity>;

    /// Apply queued updates (status changes, stock deltas, deletions) on top
    /// of the merged list.
    fn project(
        &self,
        _merged: &mut Vec<UnifiedEntity<Self::Entity>>,
        _ctx: &ProjectionContext<'_>,
    ) {
    }
}

#[derive(Debug)]
struct Snapshot<T> {
    entities: Vec<T>,
    fetched_at: Option<DateTime<Utc>>,
}

#[derive(Debug)]
struct ViewState<T> {
    snapshot: RwLock<Snapshot<T>>,
    cache: Mutex<MergeCache<T>>,
    dirty: AtomicBool,
    loading: AtomicBool,
}

/// Everything a merge or a stats computation reads
#[derive(Debug, Clone)]
pub struct ViewInputs<T> {
    pub authoritative: Vec<T>,
    pub fetched_at: Option<DateTime<Utc>>,
    pub recently_synced: Vec<RecentlySyncedEntry>,
    /// Pending and failed operations for the bar, oldest first.
    pub operations: Vec<PendingOperation>,
}

impl<T> ViewInputs<T> {
    pub fn pending(&self) -> Vec<PendingOperation> {
        self.operations
            .iter()
            .filter(|op| op.status == OperationStatus::Pending)
            .cloned()
            .collect()
    }
}

/// Merged authoritative + recently-synced + offline list for one bar
pub struct UnifiedView<F: EntityFamily> {
    family: F,
    bar_id: String,
    queue: Arc<OfflineQueue>,
    sync: Arc<SyncManager>,
    source: Arc<dyn AuthoritativeSource>,
    state: Arc<ViewState<F::Entity>>,
    queue_subscription: SubscriptionId,
    sync_subscription: SubscriptionId,
}

impl<F: EntityFamily> UnifiedView<F> {
    pub fn new(
        family: F,
        bar_id: impl Into<String>,
        sync: Arc<SyncManager>,
        source: Arc<dyn AuthoritativeSource>,
    ) -> Self {
        let queue = Arc::clone(sync.queue());
        let state = Arc::new(ViewState {
            snapshot: RwLock::new(Snapshot { entities: Vec::new(), fetched_at: None }),
            cache: Mutex::new(MergeCache::new()),
            dirty: AtomicBool::new(true),
            loading: AtomicBool::new(false),
        });

        let on_queue = Arc::clone(&state);
        let queue_subscription =
            queue.subscribe(move |_| on_queue.dirty.store(true, Ordering::Release));
        let on_sync = Arc::clone(&state);
        let sync_subscription =
            sync.subscribe(move |_| on_sync.dirty.store(true, Ordering::Release));

        Self {
            family,
            bar_id: bar_id.into(),
            queue,
            sync,
            source,
            state,
            queue_subscription,
            sync_subscription,
        }
    }

    pub fn bar_id(&self) -> &str {
        &self.bar_id
    }

    pub fn family(&self) -> &F {
        &self.family
    }

    pub fn is_loading(&self) -> bool {
        self.state.loading.load(Ordering::Acquire)
    }

    /// Whether the next `list` has to re-merge.
    pub fn is_dirty(&self) -> bool {
        self.state.dirty.load(Ordering::Acquire)
    }

    /// Last authoritative snapshot, as fetched.
    pub fn authoritative(&self) -> Vec<F::Entity> {
        self.state.snapshot.read().entities.clone()
    }

    pub fn fetched_at(&self) -> Option<DateTime<Utc>> {
        self.state.snapshot.read().fetched_at
    }

    /// Current merged list, newest first.
    pub async fn list(&self) -> ViewResult<Arc<Vec<UnifiedEntity<F::Entity>>>> {
        let cached = if self.state.dirty.load(Ordering::Acquire) {
            None
        } else {
            self.state.cache.lock().current()
        };
        if let Some(cached) = cached {
            return Ok(cached);
        }
        // Cleared before reading so a change during the read re-dirties.
        self.state.dirty.store(false, Ordering::Release);

        let inputs = self.inputs().await?;
        let digest = InputDigest::new(self.family.name())
            .add("authoritative", &inputs.authoritative)
            .add("fetched_at", &inputs.fetched_at)
            .add("recently_synced", &inputs.recently_synced)
            .add("operations", &inputs.operations)
            .finish();

        Ok(self.state.cache.lock().get_or_compute(digest, || self.merge(&inputs)))
    }

    /// Enqueue an operation belonging to this view's family and bar.
    #[instrument(skip(self, payload), fields(family = self.family.name(), bar_id = %self.bar_id))]
    pub async fn add(&self, payload: OperationPayload) -> ViewResult<PendingOperation> {
        let op_type = payload.operation_type();
        if !self.family.accepts(op_type) {
            return Err(ViewError::UnsupportedOperation { family: self.family.name(), op_type });
        }
        if payload.bar_id() != self.bar_id {
            return Err(ViewError::WrongBar {
                expected: self.bar_id.clone(),
                actual: payload.bar_id().to_string(),
            });
        }
        Ok(self.queue.enqueue(payload).await?)
    }

    /// Replace the authoritative snapshot and reconcile the buffer and queue
    /// against it. Returns the number of rows fetched.
    #[instrument(skip(self), fields(family = self.family.name(), bar_id = %self.bar_id))]
    pub async fn refetch(&self) -> ViewResult<usize> {
        self.state.loading.store(true, Ordering::Release);
        let fetched_at = Utc::now();
        let result = self.family.fetch(self.source.as_ref(), &self.bar_id).await;
        self.state.loading.store(false, Ordering::Release);
        let entities = result?;

        let keys: HashSet<String> =
            entities.iter().filter_map(|e| e.merge_key().map(str::to_string)).collect();
        let count = entities.len();
        *self.state.snapshot.write() = Snapshot { entities, fetched_at: Some(fetched_at) };
        self.state.dirty.store(true, Ordering::Release);

        let stock_snapshot_at = self.family.snapshot_reflects_stock().then_some(fetched_at);
        let report = self.sync.reconcile_with_authoritative(&keys, stock_snapshot_at).await?;
        debug!(
            count,
            buffer_confirmed = report.buffer_confirmed,
            queue_removed = report.queue_removed,
            "authoritative snapshot refreshed"
        );
        Ok(count)
    }

    /// Snapshot of every merge input scoped to this view's bar.
    pub async fn inputs(&self) -> ViewResult<ViewInputs<F::Entity>> {
        let (authoritative, fetched_at) = {
            let snapshot = self.state.snapshot.read();
            (snapshot.entities.clone(), snapshot.fetched_at)
        };
        let recently_synced = self
            .sync
            .recently_synced()
            .into_iter()
            .filter(|entry| entry.operation.bar_id == self.bar_id)
            .collect();
        let operations = self
            .queue
            .get_operations(&OperationFilter::all().with_bar(self.bar_id.clone()))
            .await?
            .into_iter()
            .filter(|op| op.status != OperationStatus::Synced)
            .collect();
        Ok(ViewInputs { authoritative, fetched_at, recently_synced, operations })
    }

    fn merge(&self, inputs: &ViewInputs<F::Entity>) -> Vec<UnifiedEntity<F::Entity>> {
        let authoritative =
            inputs.authoritative.iter().cloned().map(UnifiedEntity::authoritative).collect();
        let recently_synced = inputs
            .recently_synced
            .iter()
            .filter_map(|entry| {
                self.family
                    .entity_from_operation(&entry.operation)
                    .map(|entity| UnifiedEntity::recently_synced(entity, &entry.operation.id))
            })
            .collect();
        let offline = inputs
            .operations
            .iter()
            .filter_map(|op| {
                self.family
                    .entity_from_operation(op)
                    .map(|entity| UnifiedEntity::offline(entity, &op.id, op.needs_attention()))
            })
            .collect();

        let mut merged = merge_sources(authoritative, recently_synced, offline);
        let pending = inputs.pending();
        let ctx = ProjectionContext {
            pending: &pending,
            recently_synced: &inputs.recently_synced,
            fetched_at: inputs.fetched_at,
        };
        self.family.project(&mut merged, &ctx);
        merged
    }
}

impl<F: EntityFamily> Drop for UnifiedView<F> {
    fn drop(&mut self) {
        self.queue.unsubscribe(self.queue_subscription);
        self.sync.unsubscribe(self.sync_subscription);
    }
}
