//! Background synchronization for barsync
//!
//! - `SyncWorker`: drives the sync manager from connectivity probes and a
//!   periodic drain
//! - `ConnectivityProbe`: reachability check implemented by each API client

mod errors;
pub mod worker;

pub use errors::WorkerError;
pub use worker::{ConnectivityProbe, SyncWorker, SyncWorkerConfig};
