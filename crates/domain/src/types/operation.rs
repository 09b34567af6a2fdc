//! Queued mutations
//!
//! A [`PendingOperation`] is one user action waiting to reach the backend.
//! Its [`OperationPayload`] is a tagged union with one strongly-typed shape
//! per [`OperationType`], so every consumer that dispatches on the payload is
//! checked for exhaustiveness by the compiler.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::payloads::{
    AddExpensePayload, AddSalaryPayload, AddSupplyPayload, ConsignmentSettlementPayload,
    CreateConsignmentPayload, CreateProductPayload, CreateReturnPayload, CreateSalePayload,
    CreateServerMappingPayload, CreateStockAdjustmentPayload, CreateTicketPayload,
    DeleteProductPayload, PayTicketPayload, UpdateBarPayload, UpdateProductPayload,
    UpdateReturnPayload,
};
use super::sync::FailureKind;
use crate::impl_domain_status_conversions;

/* -------------------------------------------------------------------------- */
/* Operation type & status */
/* -------------------------------------------------------------------------- */

/// Discriminant of a queued mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperationType {
    CreateSale,
    CreateReturn,
    UpdateReturn,
    AddExpense,
    CreateProduct,
    UpdateProduct,
    DeleteProduct,
    AddSupply,
    CreateConsignment,
    ClaimConsignment,
    ForfeitConsignment,
    AddSalary,
    CreateTicket,
    PayTicket,
    CreateServerMapping,
    CreateStockAdjustment,
    UpdateBar,
}

impl_domain_status_conversions!(OperationType {
    CreateSale => "CREATE_SALE",
    CreateReturn => "CREATE_RETURN",
    UpdateReturn => "UPDATE_RETURN",
    AddExpense => "ADD_EXPENSE",
    CreateProduct => "CREATE_PRODUCT",
    UpdateProduct => "UPDATE_PRODUCT",
    DeleteProduct => "DELETE_PRODUCT",
    AddSupply => "ADD_SUPPLY",
    CreateConsignment => "CREATE_CONSIGNMENT",
    ClaimConsignment => "CLAIM_CONSIGNMENT",
    ForfeitConsignment => "FORFEIT_CONSIGNMENT",
    AddSalary => "ADD_SALARY",
    CreateTicket => "CREATE_TICKET",
    PayTicket => "PAY_TICKET",
    CreateServerMapping => "CREATE_SERVER_MAPPING",
    CreateStockAdjustment => "CREATE_STOCK_ADJUSTMENT",
    UpdateBar => "UPDATE_BAR",
});

impl OperationType {
    /// Every operation type, in declaration order.
    pub const ALL: [Self; 17] = [
        Self::CreateSale,
        Self::CreateReturn,
        Self::UpdateReturn,
        Self::AddExpense,
        Self::CreateProduct,
        Self::UpdateProduct,
        Self::DeleteProduct,
        Self::AddSupply,
        Self::CreateConsignment,
        Self::ClaimConsignment,
        Self::ForfeitConsignment,
        Self::AddSalary,
        Self::CreateTicket,
        Self::PayTicket,
        Self::CreateServerMapping,
        Self::CreateStockAdjustment,
        Self::UpdateBar,
    ];

    /// Whether the operation creates a new authoritative record and must
    /// therefore carry an idempotency key.
    #[must_use]
    pub const fn creates_record(&self) -> bool {
        matches!(
            self,
            Self::CreateSale
                | Self::CreateReturn
                | Self::AddExpense
                | Self::CreateProduct
                | Self::AddSupply
                | Self::CreateConsignment
                | Self::AddSalary
                | Self::CreateTicket
                | Self::CreateServerMapping
                | Self::CreateStockAdjustment
        )
    }
}

/// Delivery state of a queued operation.
///
/// `Failed` means the operation needs manual attention: it was rejected by
/// the server or exhausted its retries. Retryable failures go back to
/// `Pending` with a `next_retry_at`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationStatus {
    Pending,
    Synced,
    Failed,
}

impl_domain_status_conversions!(OperationStatus {
    Pending => "pending",
    Synced => "synced",
    Failed => "failed",
});

/* -------------------------------------------------------------------------- */
/* Payload union */
/* -------------------------------------------------------------------------- */

/// Strongly-typed payload, tagged by operation type.
///
/// Serialized as `{ "type": "CREATE_SALE", "payload": { ... } }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperationPayload {
    CreateSale(CreateSalePayload),
    CreateReturn(CreateReturnPayload),
    UpdateReturn(UpdateReturnPayload),
    AddExpense(AddExpensePayload),
    CreateProduct(CreateProductPayload),
    UpdateProduct(UpdateProductPayload),
    DeleteProduct(DeleteProductPayload),
    AddSupply(AddSupplyPayload),
    CreateConsignment(CreateConsignmentPayload),
    ClaimConsignment(ConsignmentSettlementPayload),
    ForfeitConsignment(ConsignmentSettlementPayload),
    AddSalary(AddSalaryPayload),
    CreateTicket(CreateTicketPayload),
    PayTicket(PayTicketPayload),
    CreateServerMapping(CreateServerMappingPayload),
    CreateStockAdjustment(CreateStockAdjustmentPayload),
    UpdateBar(UpdateBarPayload),
}

impl OperationPayload {
    #[must_use]
    pub const fn operation_type(&self) -> OperationType {
        match self {
            Self::CreateSale(_) => OperationType::CreateSale,
            Self::CreateReturn(_) => OperationType::CreateReturn,
            Self::UpdateReturn(_) => OperationType::UpdateReturn,
            Self::AddExpense(_) => OperationType::AddExpense,
            Self::CreateProduct(_) => OperationType::CreateProduct,
            Self::UpdateProduct(_) => OperationType::UpdateProduct,
            Self::DeleteProduct(_) => OperationType::DeleteProduct,
            Self::AddSupply(_) => OperationType::AddSupply,
            Self::CreateConsignment(_) => OperationType::CreateConsignment,
            Self::ClaimConsignment(_) => OperationType::ClaimConsignment,
            Self::ForfeitConsignment(_) => OperationType::ForfeitConsignment,
            Self::AddSalary(_) => OperationType::AddSalary,
            Self::CreateTicket(_) => OperationType::CreateTicket,
            Self::PayTicket(_) => OperationType::PayTicket,
            Self::CreateServerMapping(_) => OperationType::CreateServerMapping,
            Self::CreateStockAdjustment(_) => OperationType::CreateStockAdjustment,
            Self::UpdateBar(_) => OperationType::UpdateBar,
        }
    }

    /// Establishment the operation belongs to.
    #[must_use]
    pub fn bar_id(&self) -> &str {
        match self {
            Self::CreateSale(p) => &p.bar_id,
            Self::CreateReturn(p) => &p.bar_id,
            Self::UpdateReturn(p) => &p.bar_id,
            Self::AddExpense(p) => &p.bar_id,
            Self::CreateProduct(p) => &p.bar_id,
            Self::UpdateProduct(p) => &p.bar_id,
            Self::DeleteProduct(p) => &p.bar_id,
            Self::AddSupply(p) => &p.bar_id,
            Self::CreateConsignment(p) => &p.bar_id,
            Self::ClaimConsignment(p) | Self::ForfeitConsignment(p) => &p.bar_id,
            Self::AddSalary(p) => &p.bar_id,
            Self::CreateTicket(p) => &p.bar_id,
            Self::PayTicket(p) => &p.bar_id,
            Self::CreateServerMapping(p) => &p.bar_id,
            Self::CreateStockAdjustment(p) => &p.bar_id,
            Self::UpdateBar(p) => &p.bar_id,
        }
    }

    /// Idempotency key of record-creating operations.
    #[must_use]
    pub fn idempotency_key(&self) -> Option<&str> {
        let key = match self {
            Self::CreateSale(p) => &p.idempotency_key,
            Self::CreateReturn(p) => &p.idempotency_key,
            Self::AddExpense(p) => &p.idempotency_key,
            Self::CreateProduct(p) => &p.idempotency_key,
            Self::AddSupply(p) => &p.idempotency_key,
            Self::CreateConsignment(p) => &p.idempotency_key,
            Self::AddSalary(p) => &p.idempotency_key,
            Self::CreateTicket(p) => &p.idempotency_key,
            Self::CreateServerMapping(p) => &p.idempotency_key,
            Self::CreateStockAdjustment(p) => &p.idempotency_key,
            Self::UpdateReturn(_)
            | Self::UpdateProduct(_)
            | Self::DeleteProduct(_)
            | Self::ClaimConsignment(_)
            | Self::ForfeitConsignment(_)
            | Self::PayTicket(_)
            | Self::UpdateBar(_) => return None,
        };
        Some(key.as_str())
    }

    /// Monetary amount the operation represents, used as the `total` of a
    /// recently-synced entry.
    #[must_use]
    pub fn amount(&self) -> f64 {
        match self {
            Self::CreateSale(p) => p.total,
            Self::CreateReturn(p) => p.refund_amount,
            Self::AddExpense(p) => p.amount,
            Self::AddSupply(p) => p.total_cost(),
            Self::CreateConsignment(p) => p.total_amount,
            Self::AddSalary(p) => p.amount,
            _ => 0.0,
        }
    }

    /// Stock movements the operation causes, as `(product_id, delta)` pairs.
    #[must_use]
    pub fn stock_deltas(&self) -> Vec<(&str, i64)> {
        match self {
            Self::CreateSale(sale) => sale
                .items
                .iter()
                .map(|item| (item.product_id.as_str(), -item.quantity))
                .collect(),
            Self::AddSupply(supply) => vec![(supply.product_id.as_str(), supply.quantity)],
            Self::CreateStockAdjustment(adjustment) => {
                vec![(adjustment.product_id.as_str(), adjustment.delta)]
            }
            Self::CreateReturn(ret) if ret.auto_restock => {
                vec![(ret.product_id.as_str(), ret.quantity)]
            }
            _ => Vec::new(),
        }
    }
}

/* -------------------------------------------------------------------------- */
/* Pending operation */
/* -------------------------------------------------------------------------- */

/// A single buffered mutation, persisted locally until delivered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingOperation {
    /// Local temp id, never the server-assigned id.
    pub id: String,
    pub bar_id: String,
    pub operation: OperationPayload,
    pub status: OperationStatus,
    /// Local creation time.
    pub timestamp: DateTime<Utc>,
    /// Delivery attempts that failed so far.
    pub retry_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_kind: Option<FailureKind>,
    /// Earliest time the next delivery attempt may start.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_retry_at: Option<DateTime<Utc>>,
}

impl PendingOperation {
    /// New pending operation created now.
    #[must_use]
    pub fn new(id: impl Into<String>, operation: OperationPayload) -> Self {
        Self::new_at(id, operation, Utc::now())
    }

    /// New pending operation with an explicit creation time.
    #[must_use]
    pub fn new_at(id: impl Into<String>, operation: OperationPayload, at: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            bar_id: operation.bar_id().to_string(),
            operation,
            status: OperationStatus::Pending,
            timestamp: at,
            retry_count: 0,
            last_error: None,
            failure_kind: None,
            next_retry_at: None,
        }
    }

    #[must_use]
    pub const fn op_type(&self) -> OperationType {
        self.operation.operation_type()
    }

    #[must_use]
    pub fn idempotency_key(&self) -> Option<&str> {
        self.operation.idempotency_key()
    }

    /// Whether a pending operation may be attempted at `now`.
    #[must_use]
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.status == OperationStatus::Pending && self.next_retry_at.map_or(true, |at| at <= now)
    }

    /// Whether the operation is parked until the user retries or discards it.
    #[must_use]
    pub fn needs_attention(&self) -> bool {
        self.status == OperationStatus::Failed
    }
}

/* -------------------------------------------------------------------------- */
/* Filter */
/* -------------------------------------------------------------------------- */

/// Conjunctive filter over queued operations. Empty filter matches all.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationFilter {
    pub status: Option<OperationStatus>,
    pub bar_id: Option<String>,
    pub op_type: Option<OperationType>,
}

impl OperationFilter {
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_status(mut self, status: OperationStatus) -> Self {
        self.status = Some(status);
        self
    }

    #[must_use]
    pub fn with_bar(mut self, bar_id: impl Into<String>) -> Self {
        self.bar_id = Some(bar_id.into());
        self
    }

    #[must_use]
    pub fn with_type(mut self, op_type: OperationType) -> Self {
        self.op_type = Some(op_type);
        self
    }

    #[must_use]
    pub fn matches(&self, op: &PendingOperation) -> bool {
        self.status.map_or(true, |s| op.status == s)
            && self.bar_id.as_deref().map_or(true, |b| op.bar_id == b)
            && self.op_type.map_or(true, |t| op.op_type() == t)
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use chrono::Duration;

    use super::*;
    use crate::types::payloads::DeleteProductPayload;

    fn delete_product(bar: &str) -> OperationPayload {
        OperationPayload::DeleteProduct(DeleteProductPayload {
            bar_id: bar.to_string(),
            product_id: "p-1".to_string(),
        })
    }

    #[test]
    fn operation_type_parses_wire_names() {
        for op_type in OperationType::ALL {
            assert_eq!(OperationType::from_str(op_type.as_str()).unwrap(), op_type);
        }
        assert_eq!(
            OperationType::from_str("create_stock_adjustment").unwrap(),
            OperationType::CreateStockAdjustment
        );
    }

    #[test]
    fn payload_serializes_with_type_tag() {
        let json = serde_json::to_value(delete_product("bar-1")).unwrap();
        assert_eq!(json["type"], "DELETE_PRODUCT");
        assert_eq!(json["payload"]["product_id"], "p-1");
    }

    #[test]
    fn update_operations_carry_no_idempotency_key() {
        let payload = delete_product("bar-1");
        assert!(!payload.operation_type().creates_record());
        assert_eq!(payload.idempotency_key(), None);
    }

    #[test]
    fn pending_operation_inherits_bar_from_payload() {
        let op = PendingOperation::new("tmp_1", delete_product("bar-9"));
        assert_eq!(op.bar_id, "bar-9");
        assert_eq!(op.status, OperationStatus::Pending);
        assert_eq!(op.retry_count, 0);
    }

    #[test]
    fn is_due_respects_backoff() {
        let now = Utc::now();
        let mut op = PendingOperation::new_at("tmp_1", delete_product("bar-1"), now);
        assert!(op.is_due(now));

        op.next_retry_at = Some(now + Duration::seconds(5));
        assert!(!op.is_due(now));
        assert!(op.is_due(now + Duration::seconds(5)));

        op.status = OperationStatus::Failed;
        assert!(!op.is_due(now + Duration::seconds(60)));
        assert!(op.needs_attention());
    }

    #[test]
    fn filter_is_conjunctive() {
        let op = PendingOperation::new("tmp_1", delete_product("bar-1"));

        assert!(OperationFilter::all().matches(&op));
        assert!(OperationFilter::all()
            .with_bar("bar-1")
            .with_type(OperationType::DeleteProduct)
            .matches(&op));
        assert!(!OperationFilter::all().with_bar("bar-2").matches(&op));
        assert!(!OperationFilter::all()
            .with_bar("bar-1")
            .with_status(OperationStatus::Synced)
            .matches(&op));
    }
}
