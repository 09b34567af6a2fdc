//! Product and stock view
//!
//! Stock levels are projected: the authoritative level plus the quantity
//! effect of every queued operation and of every buffered operation the
//! snapshot was fetched too early to include.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use barsync_domain::{
    OperationPayload, OperationType, PendingOperation, Product, Result as DomainResult,
    StockStats,
};

use super::errors::ViewResult;
use super::merge::UnifiedEntity;
use super::ports::AuthoritativeSource;
use super::view::{EntityFamily, ProjectionContext, UnifiedView};

#[derive(Debug, Clone, Copy, Default)]
pub struct StockFamily;

#[async_trait]
impl EntityFamily for StockFamily {
    type Entity = Product;

    fn name(&self) -> &'static str {
        "stock"
    }

    fn snapshot_reflects_stock(&self) -> bool {
        true
    }

    fn accepts(&self, op_type: OperationType) -> bool {
        matches!(
            op_type,
            OperationType::CreateProduct
                | OperationType::UpdateProduct
                | OperationType::DeleteProduct
                | OperationType::AddSupply
                | OperationType::CreateStockAdjustment
        )
    }

    async fn fetch(
        &self,
        source: &dyn AuthoritativeSource,
        bar_id: &str,
    ) -> DomainResult<Vec<Product>> {
        source.list_products(bar_id).await
    }

    fn entity_from_operation(&self, operation: &PendingOperation) -> Option<Product> {
        match &operation.operation {
            OperationPayload::CreateProduct(payload) => Some(Product {
                id: operation.id.clone(),
                bar_id: payload.bar_id.clone(),
                idempotency_key: Some(payload.idempotency_key.clone()),
                name: payload.name.clone(),
                price: payload.price,
                stock: payload.initial_stock,
                alert_threshold: payload.alert_threshold,
                is_active: true,
                updated_at: operation.timestamp,
            }),
            _ => None,
        }
    }

    fn project(&self, merged: &mut Vec<UnifiedEntity<Product>>, ctx: &ProjectionContext<'_>) {
        let mut deltas: HashMap<&str, i64> = HashMap::new();
        let buffered_keys: HashSet<&str> =
            ctx.recently_synced.iter().map(|entry| entry.idempotency_key.as_str()).collect();

        for entry in ctx.unreflected_synced() {
            for (product_id, delta) in entry.operation.operation.stock_deltas() {
                *deltas.entry(product_id).or_default() += delta;
            }
        }

        let mut deleted: HashSet<&str> = HashSet::new();
        for op in ctx.pending {
            // Confirmed but not yet marked synced; already counted above.
            if op.idempotency_key().is_some_and(|key| buffered_keys.contains(key)) {
                continue;
            }
            match &op.operation {
                OperationPayload::UpdateProduct(update) => {
                    if let Some(row) =
                        merged.iter_mut().find(|row| row.entity.id == update.product_id)
                    {
                        if let Some(name) = &update.name {
                            row.entity.name.clone_from(name);
                        }
                        if let Some(price) = update.price {
                            row.entity.price = price;
                        }
                        if let Some(threshold) = update.alert_threshold {
                            row.entity.alert_threshold = threshold;
                        }
                        if let Some(is_active) = update.is_active {
                            row.entity.is_active = is_active;
                        }
                        row.has_pending_changes = true;
                    }
                }
                OperationPayload::DeleteProduct(delete) => {
                    deleted.insert(delete.product_id.as_str());
                }
                payload => {
                    for (product_id, delta) in payload.stock_deltas() {
                        *deltas.entry(product_id).or_default() += delta;
                    }
                }
            }
        }

        merged.retain(|row| !deleted.contains(row.entity.id.as_str()));
        for row in merged.iter_mut() {
            if let Some(delta) = deltas.get(row.entity.id.as_str()) {
                row.entity.stock += delta;
                row.has_pending_changes = true;
            }
        }
    }
}

pub type StockView = UnifiedView<StockFamily>;

impl UnifiedView<StockFamily> {
    pub async fn stats(&self) -> ViewResult<StockStats> {
        let rows = self.list().await?;
        let mut stats = StockStats::default();
        for row in rows.iter() {
            if row.has_pending_changes {
                stats.with_pending_changes += 1;
            }
            if !row.entity.is_active {
                continue;
            }
            stats.product_count += 1;
            if row.entity.is_low_stock() {
                stats.low_stock += 1;
            }
        }
        Ok(stats)
    }
}
