//! Consignments view

use async_trait::async_trait;
use barsync_domain::{
    Consignment, ConsignmentStats, ConsignmentStatus, OperationPayload, OperationType,
    PendingOperation, Result as DomainResult,
};

use super::errors::ViewResult;
use super::merge::UnifiedEntity;
use super::ports::AuthoritativeSource;
use super::view::{EntityFamily, ProjectionContext, UnifiedView};

#[derive(Debug, Clone, Copy, Default)]
pub struct ConsignmentsFamily;

#[async_trait]
impl EntityFamily for ConsignmentsFamily {
    type Entity = Consignment;

    fn name(&self) -> &'static str {
        "consignments"
    }

    fn accepts(&self, op_type: OperationType) -> bool {
        matches!(
            op_type,
            OperationType::CreateConsignment
                | OperationType::ClaimConsignment
                | OperationType::ForfeitConsignment
        )
    }

    async fn fetch(
        &self,
        source: &dyn AuthoritativeSource,
        bar_id: &str,
    ) -> DomainResult<Vec<Consignment>> {
        source.list_consignments(bar_id).await
    }

    fn entity_from_operation(&self, operation: &PendingOperation) -> Option<Consignment> {
        match &operation.operation {
            OperationPayload::CreateConsignment(payload) => {
                Some(payload.to_optimistic_consignment(&operation.id, operation.timestamp))
            }
            _ => None,
        }
    }

    fn project(
        &self,
        merged: &mut Vec<UnifiedEntity<Consignment>>,
        ctx: &ProjectionContext<'_>,
    ) {
        for op in ctx.pending {
            let (consignment_id, status) = match &op.operation {
                OperationPayload::ClaimConsignment(settle) => {
                    (&settle.consignment_id, ConsignmentStatus::Claimed)
                }
                OperationPayload::ForfeitConsignment(settle) => {
                    (&settle.consignment_id, ConsignmentStatus::Forfeited)
                }
                _ => continue,
            };
            if let Some(row) = merged.iter_mut().find(|row| &row.entity.id == consignment_id) {
                row.entity.status = status;
                row.has_pending_changes = true;
            }
        }
    }
}

pub type ConsignmentsView = UnifiedView<ConsignmentsFamily>;

impl UnifiedView<ConsignmentsFamily> {
    pub async fn stats(&self) -> ViewResult<ConsignmentStats> {
        let rows = self.list().await?;
        let mut stats = ConsignmentStats::default();
        for row in rows.iter() {
            match row.entity.status {
                ConsignmentStatus::Active => {
                    stats.active += 1;
                    stats.active_amount += row.entity.total_amount;
                }
                ConsignmentStatus::Claimed => stats.claimed += 1,
                ConsignmentStatus::Forfeited => stats.forfeited += 1,
                ConsignmentStatus::Expired => {}
            }
        }
        Ok(stats)
    }
}
