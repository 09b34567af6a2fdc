//! Port interfaces for sync operations

use async_trait::async_trait;
use barsync_domain::{ApiResponse, PendingOperation};

/// Delivers one queued operation to the backend.
///
/// Never returns `Err`: every outcome, including timeouts and unsupported
/// operation types, is normalized into an [`ApiResponse`] so the sync
/// manager can classify it.
#[async_trait]
pub trait OperationDispatcher: Send + Sync {
    async fn dispatch(&self, operation: &PendingOperation) -> ApiResponse;
}
