//! Typed payloads, one per operation type
//!
//! Identifiers stay `String` and amounts stay signed so that a malformed
//! value still deserializes and the validator can report every violated
//! constraint at once instead of stopping at the first serde error.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::entities::{
    AdjustmentReason, Consignment, ConsignmentStatus, ExpenseCategory, PaymentMethod, Return,
    ReturnReason, ReturnStatus, Sale, SaleItem, SaleStatus,
};

/* -------------------------------------------------------------------------- */
/* Sales & returns */
/* -------------------------------------------------------------------------- */

/// Line of a sale as submitted by the till.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaleItemInput {
    pub product_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_name: Option<String>,
    pub quantity: i64,
    pub unit_price: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateSalePayload {
    pub idempotency_key: String,
    pub bar_id: String,
    pub items: Vec<SaleItemInput>,
    pub total: f64,
    pub payment_method: PaymentMethod,
    /// User who rang the sale up.
    pub sold_by: String,
    /// Server (waiter) the sale is attributed to, when different from the seller.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ticket_id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub promotion_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl CreateSalePayload {
    /// Optimistic sale shown before the server confirms it.
    #[must_use]
    pub fn to_optimistic_sale(&self, id: &str, created_at: DateTime<Utc>) -> Sale {
        Sale {
            id: id.to_string(),
            bar_id: self.bar_id.clone(),
            idempotency_key: Some(self.idempotency_key.clone()),
            items: self
                .items
                .iter()
                .map(|item| SaleItem {
                    product_id: item.product_id.clone(),
                    product_name: item.product_name.clone(),
                    quantity: item.quantity,
                    unit_price: item.unit_price,
                })
                .collect(),
            total: self.total,
            payment_method: self.payment_method,
            status: SaleStatus::Pending,
            sold_by: self.sold_by.clone(),
            server_id: self.server_id.clone(),
            created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateReturnPayload {
    pub idempotency_key: String,
    pub bar_id: String,
    pub sale_id: String,
    pub product_id: String,
    pub quantity: i64,
    pub refund_amount: f64,
    pub reason: ReturnReason,
    #[serde(default)]
    pub is_refunded: bool,
    #[serde(default)]
    pub auto_restock: bool,
    pub returned_by: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl CreateReturnPayload {
    /// Optimistic return shown before the server confirms it.
    #[must_use]
    pub fn to_optimistic_return(&self, id: &str, created_at: DateTime<Utc>) -> Return {
        Return {
            id: id.to_string(),
            bar_id: self.bar_id.clone(),
            idempotency_key: Some(self.idempotency_key.clone()),
            sale_id: self.sale_id.clone(),
            product_id: self.product_id.clone(),
            quantity: self.quantity,
            refund_amount: self.refund_amount,
            reason: self.reason,
            status: ReturnStatus::Pending,
            is_refunded: self.is_refunded,
            returned_by: self.returned_by.clone(),
            server_id: self.server_id.clone(),
            created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateReturnPayload {
    pub bar_id: String,
    pub return_id: String,
    pub status: ReturnStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_refunded: Option<bool>,
    pub updated_by: String,
}

/* -------------------------------------------------------------------------- */
/* Expenses & salaries */
/* -------------------------------------------------------------------------- */

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddExpensePayload {
    pub idempotency_key: String,
    pub bar_id: String,
    pub amount: f64,
    pub category: ExpenseCategory,
    pub expense_date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub created_by: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddSalaryPayload {
    pub idempotency_key: String,
    pub bar_id: String,
    pub member_id: String,
    pub amount: f64,
    /// Pay period as `YYYY-MM`.
    pub period: String,
    pub paid_by: String,
}

/* -------------------------------------------------------------------------- */
/* Products & stock */
/* -------------------------------------------------------------------------- */

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateProductPayload {
    pub idempotency_key: String,
    pub bar_id: String,
    pub name: String,
    pub price: f64,
    #[serde(default)]
    pub initial_stock: i64,
    #[serde(default)]
    pub alert_threshold: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateProductPayload {
    pub bar_id: String,
    pub product_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alert_threshold: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteProductPayload {
    pub bar_id: String,
    pub product_id: String,
}

/// Stock purchase: `quantity` units bought in lots of `lot_size` at
/// `lot_price` per lot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddSupplyPayload {
    pub idempotency_key: String,
    pub bar_id: String,
    pub product_id: String,
    pub quantity: i64,
    pub lot_size: i64,
    pub lot_price: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supplier: Option<String>,
    pub created_by: String,
}

impl AddSupplyPayload {
    /// Cost of the supply; zero when the lot size is not positive.
    #[must_use]
    pub fn total_cost(&self) -> f64 {
        if self.lot_size <= 0 {
            return 0.0;
        }
        #[allow(clippy::cast_precision_loss)]
        let lots = self.quantity as f64 / self.lot_size as f64;
        lots * self.lot_price
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateStockAdjustmentPayload {
    pub idempotency_key: String,
    pub bar_id: String,
    pub product_id: String,
    /// Signed stock change; never zero.
    pub delta: i64,
    pub reason: AdjustmentReason,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub adjusted_by: String,
}

/* -------------------------------------------------------------------------- */
/* Consignments */
/* -------------------------------------------------------------------------- */

/// Goods paid for but left at the bar for the customer to collect later.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateConsignmentPayload {
    pub idempotency_key: String,
    pub bar_id: String,
    pub sale_id: String,
    pub product_id: String,
    pub quantity: i64,
    pub total_amount: f64,
    pub customer_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_phone: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub created_by: String,
}

impl CreateConsignmentPayload {
    #[must_use]
    pub fn to_optimistic_consignment(&self, id: &str, created_at: DateTime<Utc>) -> Consignment {
        Consignment {
            id: id.to_string(),
            bar_id: self.bar_id.clone(),
            idempotency_key: Some(self.idempotency_key.clone()),
            sale_id: self.sale_id.clone(),
            product_id: self.product_id.clone(),
            quantity: self.quantity,
            total_amount: self.total_amount,
            customer_name: self.customer_name.clone(),
            status: ConsignmentStatus::Active,
            expires_at: self.expires_at,
            created_by: self.created_by.clone(),
            created_at,
        }
    }
}

/// Claim or forfeit of an existing consignment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsignmentSettlementPayload {
    pub bar_id: String,
    pub consignment_id: String,
    pub acted_by: String,
}

/* -------------------------------------------------------------------------- */
/* Tickets, servers, bar */
/* -------------------------------------------------------------------------- */

/// Open tab (bon) grouping several sales until paid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateTicketPayload {
    pub idempotency_key: String,
    pub bar_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table_number: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub created_by: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayTicketPayload {
    pub bar_id: String,
    pub ticket_id: String,
    pub payment_method: PaymentMethod,
    pub paid_by: String,
}

/// Maps a display name used on a shared till to a user account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateServerMappingPayload {
    pub idempotency_key: String,
    pub bar_id: String,
    pub server_name: String,
    pub user_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateBarPayload {
    pub bar_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub closing_hour: Option<i64>,
}
