//! Sales view

use async_trait::async_trait;
use barsync_domain::{
    OperationPayload, OperationType, PendingOperation, Result as DomainResult, Return, Sale,
    SalesStats,
};

use super::errors::ViewResult;
use super::ports::AuthoritativeSource;
use super::view::{EntityFamily, UnifiedView};
use crate::revenue::{RevenueCalculator, RevenueInputs, StatsQuery};

/// Sales family; carries the calculator used for [`SalesView::stats`]
#[derive(Debug, Clone, Copy)]
pub struct SalesFamily {
    calculator: RevenueCalculator,
}

impl SalesFamily {
    pub const fn new(calculator: RevenueCalculator) -> Self {
        Self { calculator }
    }

    pub const fn calculator(&self) -> &RevenueCalculator {
        &self.calculator
    }
}

#[async_trait]
impl EntityFamily for SalesFamily {
    type Entity = Sale;

    fn name(&self) -> &'static str {
        "sales"
    }

    fn accepts(&self, op_type: OperationType) -> bool {
        op_type == OperationType::CreateSale
    }

    async fn fetch(
        &self,
        source: &dyn AuthoritativeSource,
        bar_id: &str,
    ) -> DomainResult<Vec<Sale>> {
        source.list_sales(bar_id).await
    }

    fn entity_from_operation(&self, operation: &PendingOperation) -> Option<Sale> {
        match &operation.operation {
            OperationPayload::CreateSale(payload) => {
                Some(payload.to_optimistic_sale(&operation.id, operation.timestamp))
            }
            _ => None,
        }
    }
}

pub type SalesView = UnifiedView<SalesFamily>;

impl UnifiedView<SalesFamily> {
    /// Revenue for `query`, counting every logical sale once across the
    /// three sources. `returns` are the authoritative returns used for
    /// refunds.
    pub async fn stats(&self, query: &StatsQuery, returns: &[Return]) -> ViewResult<SalesStats> {
        let inputs = self.inputs().await?;
        let pending = inputs.pending();
        let revenue_inputs = RevenueInputs {
            sales: &inputs.authoritative,
            returns,
            recently_synced: &inputs.recently_synced,
            pending: &pending,
        };
        Ok(self.family().calculator().calculate(&revenue_inputs, query))
    }
}
