//! In-memory operation store for tests and ephemeral sessions

use async_trait::async_trait;
use barsync_domain::{BarSyncError, OperationFilter, PendingOperation, Result};
use parking_lot::RwLock;

use super::ports::OperationStore;

/// Keeps operations in a `Vec`, which preserves insertion order for free.
#[derive(Debug, Default)]
pub struct InMemoryOperationStore {
    operations: RwLock<Vec<PendingOperation>>,
}

impl InMemoryOperationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.operations.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.read().is_empty()
    }
}

#[async_trait]
impl OperationStore for InMemoryOperationStore {
    async fn insert(&self, operation: &PendingOperation) -> Result<()> {
        let mut operations = self.operations.write();
        if operations.iter().any(|op| op.id == operation.id) {
            return Err(BarSyncError::InvalidInput(format!(
                "operation {} already exists",
                operation.id
            )));
        }
        operations.push(operation.clone());
        Ok(())
    }

    async fn update(&self, operation: &PendingOperation) -> Result<()> {
        let mut operations = self.operations.write();
        let slot = operations
            .iter_mut()
            .find(|op| op.id == operation.id)
            .ok_or_else(|| BarSyncError::NotFound(format!("operation {}", operation.id)))?;
        *slot = operation.clone();
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<PendingOperation>> {
        Ok(self.operations.read().iter().find(|op| op.id == id).cloned())
    }

    async fn list(&self, filter: &OperationFilter) -> Result<Vec<PendingOperation>> {
        Ok(self.operations.read().iter().filter(|op| filter.matches(op)).cloned().collect())
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let mut operations = self.operations.write();
        let before = operations.len();
        operations.retain(|op| op.id != id);
        Ok(operations.len() != before)
    }
}
