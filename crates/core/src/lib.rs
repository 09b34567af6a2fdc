//! # barsync Core
//!
//! Offline-first sync logic for the bar POS - no infrastructure
//! dependencies.
//!
//! This crate contains:
//! - Operation validation
//! - The offline queue and its storage port
//! - The sync manager and recently-synced buffer
//! - Business-day aware revenue calculation
//! - Unified views merging authoritative, recently-synced and offline data
//!
//! ## Architecture Principles
//! - Only depends on `barsync-common` and `barsync-domain`
//! - No database, HTTP, or platform code
//! - Storage, transport and authoritative reads via traits

pub mod operations;
pub mod queue;
pub mod revenue;
pub mod sync;
pub mod views;

#[cfg(test)]
mod test_fixtures;

// Re-export specific items to avoid ambiguity
pub use operations::OperationValidator;
pub use queue::ports::OperationStore;
pub use queue::{InMemoryOperationStore, OfflineQueue, QueueError, QueueEvent, QueueResult};
pub use revenue::{
    BusinessDateRange, BusinessDayCalendar, OperatorScope, RevenueCalculator, RevenueInputs,
    StatsQuery,
};
pub use sync::ports::OperationDispatcher;
pub use sync::{
    DrainReport, ReconcileReport, RecentlySyncedBuffer, SyncError, SyncEvent, SyncManager,
    SyncManagerConfig, SyncResult,
};
pub use views::{
    AuthoritativeSource, ConsignmentsView, ReturnsView, SalesView, StockView, UnifiedEntity,
    UnifiedView, ViewError, ViewResult,
};
