//! # barsync Infrastructure
//!
//! Infrastructure implementations of the core ports.
//!
//! This crate contains:
//! - The SQLite operation store (r2d2 pool, schema migrations)
//! - Live (PostgREST) and mock API clients
//! - Configuration loading and validation
//! - Tracing subscriber setup
//! - The background sync worker and the `SyncContext` container
//!
//! ## Architecture
//! - Implements traits defined in `barsync-core`
//! - Depends on `barsync-common`, `barsync-domain` and `barsync-core`
//! - Contains all "impure" code (I/O, network, timers)

pub mod api;
pub mod config;
pub mod context;
pub mod database;
pub mod errors;
pub mod observability;
pub mod sync;

// Re-export commonly used items
pub use api::{ApiError, LiveApiClient, MockApiClient};
pub use context::SyncContext;
pub use database::{DbManager, SqliteOperationStore};
pub use errors::InfraError;
pub use observability::init_tracing;
pub use sync::{ConnectivityProbe, SyncWorker, SyncWorkerConfig, WorkerError};
