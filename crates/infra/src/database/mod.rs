//! Local SQLite storage

pub mod manager;
pub mod operation_store;

pub use manager::{DbConnection, DbManager};
pub use operation_store::SqliteOperationStore;
