//! Port interfaces for authoritative reads

use async_trait::async_trait;
use barsync_domain::{Consignment, Product, Result, Return, Sale};

/// "List entities for bar X" queries against the authoritative backend.
///
/// Implementations drop rows they cannot decode instead of failing the
/// whole list.
#[async_trait]
pub trait AuthoritativeSource: Send + Sync {
    async fn list_sales(&self, bar_id: &str) -> Result<Vec<Sale>>;

    async fn list_returns(&self, bar_id: &str) -> Result<Vec<Return>>;

    async fn list_products(&self, bar_id: &str) -> Result<Vec<Product>>;

    async fn list_consignments(&self, bar_id: &str) -> Result<Vec<Consignment>>;
}
