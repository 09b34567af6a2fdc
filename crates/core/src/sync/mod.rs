//! Sync manager, recently-synced buffer and the dispatcher port

pub mod buffer;
pub mod errors;
pub mod manager;
pub mod ports;

pub use buffer::RecentlySyncedBuffer;
pub use errors::{SyncError, SyncResult};
pub use manager::{DrainReport, ReconcileReport, SyncEvent, SyncManager, SyncManagerConfig};
pub use ports::OperationDispatcher;
