//! Returns view

use async_trait::async_trait;
use barsync_domain::{
    OperationPayload, OperationType, PendingOperation, Result as DomainResult, Return,
    ReturnStats, ReturnStatus,
};

use super::errors::ViewResult;
use super::merge::UnifiedEntity;
use super::ports::AuthoritativeSource;
use super::view::{EntityFamily, ProjectionContext, UnifiedView};

#[derive(Debug, Clone, Copy, Default)]
pub struct ReturnsFamily;

#[async_trait]
impl EntityFamily for ReturnsFamily {
    type Entity = Return;

    fn name(&self) -> &'static str {
        "returns"
    }

    fn accepts(&self, op_type: OperationType) -> bool {
        matches!(op_type, OperationType::CreateReturn | OperationType::UpdateReturn)
    }

    async fn fetch(
        &self,
        source: &dyn AuthoritativeSource,
        bar_id: &str,
    ) -> DomainResult<Vec<Return>> {
        source.list_returns(bar_id).await
    }

    fn entity_from_operation(&self, operation: &PendingOperation) -> Option<Return> {
        match &operation.operation {
            OperationPayload::CreateReturn(payload) => {
                Some(payload.to_optimistic_return(&operation.id, operation.timestamp))
            }
            _ => None,
        }
    }

    /// Queued approvals and rejections show up before the server applies
    /// them.
    fn project(&self, merged: &mut Vec<UnifiedEntity<Return>>, ctx: &ProjectionContext<'_>) {
        for op in ctx.pending {
            let OperationPayload::UpdateReturn(update) = &op.operation else {
                continue;
            };
            if let Some(row) = merged.iter_mut().find(|row| row.entity.id == update.return_id) {
                row.entity.status = update.status;
                if let Some(is_refunded) = update.is_refunded {
                    row.entity.is_refunded = is_refunded;
                }
                row.has_pending_changes = true;
            }
        }
    }
}

pub type ReturnsView = UnifiedView<ReturnsFamily>;

impl UnifiedView<ReturnsFamily> {
    pub async fn stats(&self) -> ViewResult<ReturnStats> {
        let rows = self.list().await?;
        let mut stats = ReturnStats::default();
        for row in rows.iter() {
            stats.total += 1;
            if row.entity.status == ReturnStatus::Pending {
                stats.pending += 1;
            }
            if row.entity.is_confirmed_refund() {
                stats.refunded_amount += row.entity.refund_amount;
            }
        }
        Ok(stats)
    }
}
