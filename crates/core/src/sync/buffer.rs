//! Recently-synced buffer
//!
//! Bridges the gap between "server accepted the write" and "the next
//! authoritative read includes it". Memory-only: after a restart the next
//! refetch is authoritative anyway.
//!
//! The window is a tunable. An entry only needs to outlive the time between
//! confirmation and the next refetch; a longer window costs memory, never
//! correctness, because merges ignore entries whose key the authoritative
//! source already reports.
//!
//! Views share the buffer, so an entry is dropped early only once every
//! snapshot that projects it has caught up: its key has been reported, and
//! for stock-moving operations a product snapshot was requested after the
//! confirmation.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use barsync_domain::RecentlySyncedEntry;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tokio::time::Instant;

#[derive(Debug, Clone)]
struct Slot {
    entry: RecentlySyncedEntry,
    expires_at: Instant,
    key_reported: bool,
    stock_reflected: bool,
}

impl Slot {
    const fn is_settled(&self) -> bool {
        self.key_reported && self.stock_reflected
    }
}

/// Time-bounded map from idempotency key to confirmation metadata.
#[derive(Debug)]
pub struct RecentlySyncedBuffer {
    window: Duration,
    slots: RwLock<HashMap<String, Slot>>,
}

impl RecentlySyncedBuffer {
    pub fn new(window: Duration) -> Self {
        Self { window, slots: RwLock::new(HashMap::new()) }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Insert or refresh an entry; it expires one window from now.
    pub fn insert(&self, entry: RecentlySyncedEntry) {
        let expires_at = Instant::now() + self.window;
        let stock_reflected = entry.operation.operation.stock_deltas().is_empty();
        let slot = Slot { entry, expires_at, key_reported: false, stock_reflected };
        self.slots.write().insert(slot.entry.idempotency_key.clone(), slot);
    }

    /// Live entries, oldest confirmation first.
    pub fn snapshot(&self) -> Vec<RecentlySyncedEntry> {
        let now = Instant::now();
        let mut entries: Vec<_> = self
            .slots
            .read()
            .values()
            .filter(|slot| slot.expires_at > now)
            .map(|slot| slot.entry.clone())
            .collect();
        entries.sort_by(|a, b| {
            a.synced_at.cmp(&b.synced_at).then_with(|| a.idempotency_key.cmp(&b.idempotency_key))
        });
        entries
    }

    pub fn keys(&self) -> HashSet<String> {
        let now = Instant::now();
        self.slots
            .read()
            .iter()
            .filter(|(_, slot)| slot.expires_at > now)
            .map(|(key, _)| key.clone())
            .collect()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.slots.read().get(key).is_some_and(|slot| slot.expires_at > Instant::now())
    }

    pub fn remove(&self, key: &str) -> bool {
        self.slots.write().remove(key).is_some()
    }

    /// Record that the authoritative source reports `keys`. Returns how many
    /// entries were dropped because nothing projects them anymore.
    pub fn confirm_authoritative(&self, keys: &HashSet<String>) -> usize {
        self.settle(|key, slot| {
            if keys.contains(key) {
                slot.key_reported = true;
            }
        })
    }

    /// Record a product snapshot requested at `fetched_at`; it includes the
    /// stock effect of every entry confirmed no later than that. Returns how
    /// many entries were dropped.
    pub fn confirm_stock_snapshot(&self, fetched_at: DateTime<Utc>) -> usize {
        self.settle(|_, slot| {
            if slot.entry.synced_at <= fetched_at {
                slot.stock_reflected = true;
            }
        })
    }

    fn settle(&self, mut mark: impl FnMut(&str, &mut Slot)) -> usize {
        let mut slots = self.slots.write();
        let before = slots.len();
        slots.retain(|key, slot| {
            mark(key, slot);
            !slot.is_settled()
        });
        before - slots.len()
    }

    /// Drop expired entries. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut slots = self.slots.write();
        let before = slots.len();
        slots.retain(|_, slot| slot.expires_at > now);
        before - slots.len()
    }

    /// Live entry count.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.slots.read().values().filter(|slot| slot.expires_at > now).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.slots.write().clear();
    }
}

#[cfg(test)]
mod tests {
    use barsync_domain::{DeleteProductPayload, OperationPayload, PendingOperation};
    use chrono::Utc;

    use super::*;
    use crate::test_fixtures::{self as fixtures, BAR_A};

    fn entry(key: &str) -> RecentlySyncedEntry {
        RecentlySyncedEntry {
            idempotency_key: key.to_string(),
            total: 500.0,
            synced_at: Utc::now(),
            operation: PendingOperation::new(
                "tmp_1",
                OperationPayload::DeleteProduct(DeleteProductPayload {
                    bar_id: "b".into(),
                    product_id: "p".into(),
                }),
            ),
            server_data: None,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn entries_expire_after_the_window() {
        let buffer = RecentlySyncedBuffer::new(Duration::from_secs(10));
        buffer.insert(entry("k1"));
        assert!(buffer.contains("k1"));

        tokio::time::advance(Duration::from_secs(9)).await;
        assert_eq!(buffer.keys(), HashSet::from(["k1".to_string()]));

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(!buffer.contains("k1"));
        assert!(buffer.snapshot().is_empty());
        assert_eq!(buffer.purge_expired(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn reinsert_refreshes_expiry() {
        let buffer = RecentlySyncedBuffer::new(Duration::from_secs(10));
        buffer.insert(entry("k1"));
        tokio::time::advance(Duration::from_secs(8)).await;
        buffer.insert(entry("k1"));
        tokio::time::advance(Duration::from_secs(8)).await;
        assert!(buffer.contains("k1"));
        assert_eq!(buffer.len(), 1);
    }

    #[test]
    fn authoritative_confirmation_removes_only_reported_keys() {
        let buffer = RecentlySyncedBuffer::new(Duration::from_secs(60));
        buffer.insert(entry("k1"));
        buffer.insert(entry("k2"));

        let removed = buffer.confirm_authoritative(&HashSet::from(["k1".to_string()]));
        assert_eq!(removed, 1);
        assert_eq!(buffer.keys(), HashSet::from(["k2".to_string()]));
    }

    #[test]
    fn stock_moving_entry_waits_for_a_later_product_snapshot() {
        let buffer = RecentlySyncedBuffer::new(Duration::from_secs(60));
        let mut sale = entry("k1");
        sale.operation = PendingOperation::new("tmp_2", fixtures::sale("k1", BAR_A, 500.0));
        let synced_at = sale.synced_at;
        buffer.insert(sale);

        assert_eq!(buffer.confirm_authoritative(&HashSet::from(["k1".to_string()])), 0);
        assert!(buffer.contains("k1"));

        // A snapshot requested before the confirmation does not include it
        let stale = synced_at - chrono::Duration::seconds(1);
        assert_eq!(buffer.confirm_stock_snapshot(stale), 0);
        assert_eq!(buffer.confirm_stock_snapshot(synced_at), 1);
        assert!(buffer.is_empty());
    }
}
