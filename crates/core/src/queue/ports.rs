//! Port interfaces for the offline queue

use async_trait::async_trait;
use barsync_domain::{OperationFilter, PendingOperation, Result};

/// Durable storage for queued operations, one record per temp id
#[async_trait]
pub trait OperationStore: Send + Sync {
    /// Persist a new operation. Fails if the id already exists.
    async fn insert(&self, operation: &PendingOperation) -> Result<()>;

    /// Overwrite an existing operation, keeping its insertion position
    async fn update(&self, operation: &PendingOperation) -> Result<()>;

    /// Get an operation by temp id
    async fn get(&self, id: &str) -> Result<Option<PendingOperation>>;

    /// Operations matching `filter`, oldest first
    async fn list(&self, filter: &OperationFilter) -> Result<Vec<PendingOperation>>;

    /// Delete an operation. Returns `false` if it did not exist.
    async fn delete(&self, id: &str) -> Result<bool>;
}
