//! Three-source merge
//!
//! Candidates are taken in precedence order (authoritative, recently
//! synced, offline). The first candidate with a given idempotency key wins
//! and later ones with that key are dropped. Candidates without a key are
//! never deduplicated.

use std::collections::HashSet;
use std::sync::Arc;

use barsync_domain::{Consignment, Product, Return, Sale};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::trace;

/// Entity that can appear in a unified view
pub trait MergeEntity: Clone + Serialize + Send + Sync + 'static {
    fn entity_id(&self) -> &str;

    fn merge_key(&self) -> Option<&str>;

    /// Timestamp used for newest-first ordering.
    fn effective_timestamp(&self) -> DateTime<Utc>;
}

impl MergeEntity for Sale {
    fn entity_id(&self) -> &str {
        &self.id
    }

    fn merge_key(&self) -> Option<&str> {
        self.idempotency_key.as_deref()
    }

    fn effective_timestamp(&self) -> DateTime<Utc> {
        self.created_at
    }
}

impl MergeEntity for Return {
    fn entity_id(&self) -> &str {
        &self.id
    }

    fn merge_key(&self) -> Option<&str> {
        self.idempotency_key.as_deref()
    }

    fn effective_timestamp(&self) -> DateTime<Utc> {
        self.created_at
    }
}

impl MergeEntity for Product {
    fn entity_id(&self) -> &str {
        &self.id
    }

    fn merge_key(&self) -> Option<&str> {
        self.idempotency_key.as_deref()
    }

    fn effective_timestamp(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

impl MergeEntity for Consignment {
    fn entity_id(&self) -> &str {
        &self.id
    }

    fn merge_key(&self) -> Option<&str> {
        self.idempotency_key.as_deref()
    }

    fn effective_timestamp(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// Where a merged entity came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    Authoritative,
    RecentlySynced,
    Offline,
}

/// One row of a unified view
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnifiedEntity<T> {
    pub entity: T,
    pub provenance: Provenance,
    /// Queue operation backing a non-authoritative row.
    pub operation_id: Option<String>,
    /// The backing operation failed permanently and waits for the user.
    pub needs_attention: bool,
    /// Local changes not yet reflected by the authoritative source.
    pub has_pending_changes: bool,
}

impl<T> UnifiedEntity<T> {
    pub const fn authoritative(entity: T) -> Self {
        Self {
            entity,
            provenance: Provenance::Authoritative,
            operation_id: None,
            needs_attention: false,
            has_pending_changes: false,
        }
    }

    pub fn recently_synced(entity: T, operation_id: impl Into<String>) -> Self {
        Self {
            entity,
            provenance: Provenance::RecentlySynced,
            operation_id: Some(operation_id.into()),
            needs_attention: false,
            has_pending_changes: true,
        }
    }

    pub fn offline(entity: T, operation_id: impl Into<String>, needs_attention: bool) -> Self {
        Self {
            entity,
            provenance: Provenance::Offline,
            operation_id: Some(operation_id.into()),
            needs_attention,
            has_pending_changes: true,
        }
    }

    pub fn is_authoritative(&self) -> bool {
        self.provenance == Provenance::Authoritative
    }
}

/// Merge candidates from the three sources, newest first.
///
/// Ties keep source precedence because the sort is stable.
pub fn merge_sources<T: MergeEntity>(
    authoritative: Vec<UnifiedEntity<T>>,
    recently_synced: Vec<UnifiedEntity<T>>,
    offline: Vec<UnifiedEntity<T>>,
) -> Vec<UnifiedEntity<T>> {
    let capacity = authoritative.len() + recently_synced.len() + offline.len();
    let mut seen: HashSet<String> = HashSet::with_capacity(capacity);
    let mut merged = Vec::with_capacity(capacity);

    for candidate in authoritative.into_iter().chain(recently_synced).chain(offline) {
        if let Some(key) = candidate.entity.merge_key() {
            if !seen.insert(key.to_string()) {
                trace!(key, provenance = ?candidate.provenance, "shadowed by higher precedence");
                continue;
            }
        }
        merged.push(candidate);
    }

    merged.sort_by(|a, b| b.entity.effective_timestamp().cmp(&a.entity.effective_timestamp()));
    merged
}

/// Incremental blake3 digest over serialized merge inputs
#[derive(Debug, Clone, Default)]
pub struct InputDigest {
    hasher: blake3::Hasher,
}

impl InputDigest {
    pub fn new(label: &str) -> Self {
        let mut digest = Self::default();
        digest.hasher.update(label.as_bytes());
        digest
    }

    /// Mix one labelled input into the digest.
    pub fn add<S: Serialize + ?Sized>(mut self, label: &str, value: &S) -> Self {
        self.hasher.update(label.as_bytes());
        self.hasher.update(&[0]);
        match serde_json::to_vec(value) {
            Ok(bytes) => {
                self.hasher.update(&(bytes.len() as u64).to_le_bytes());
                self.hasher.update(&bytes);
            }
            // Unserializable input: fold the error text in so the digest
            // still changes with the input's shape.
            Err(err) => {
                self.hasher.update(err.to_string().as_bytes());
            }
        }
        self
    }

    pub fn finish(&self) -> blake3::Hash {
        self.hasher.finalize()
    }
}

/// Memoized merge result keyed by an input digest
#[derive(Debug)]
pub struct MergeCache<T> {
    digest: Option<blake3::Hash>,
    value: Arc<Vec<UnifiedEntity<T>>>,
    hits: u64,
    misses: u64,
}

impl<T> Default for MergeCache<T> {
    fn default() -> Self {
        Self { digest: None, value: Arc::new(Vec::new()), hits: 0, misses: 0 }
    }
}

impl<T> MergeCache<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached result, if one has been computed since the last invalidation.
    pub fn current(&self) -> Option<Arc<Vec<UnifiedEntity<T>>>> {
        self.digest.map(|_| Arc::clone(&self.value))
    }

    /// Return the cached result when `digest` matches, otherwise run
    /// `compute` and store its result.
    pub fn get_or_compute(
        &mut self,
        digest: blake3::Hash,
        compute: impl FnOnce() -> Vec<UnifiedEntity<T>>,
    ) -> Arc<Vec<UnifiedEntity<T>>> {
        if self.digest == Some(digest) {
            self.hits += 1;
            return Arc::clone(&self.value);
        }
        self.misses += 1;
        self.value = Arc::new(compute());
        self.digest = Some(digest);
        Arc::clone(&self.value)
    }

    pub fn invalidate(&mut self) {
        self.digest = None;
    }

    /// `(hits, misses)` since creation.
    pub const fn counters(&self) -> (u64, u64) {
        (self.hits, self.misses)
    }
}
