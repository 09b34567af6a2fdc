//! Authoritative entities returned by the backend's list queries
//!
//! The same structs are used for optimistic copies built from queued
//! payloads; those carry a temp id and a pending status.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
#[cfg(feature = "ts-gen")]
use ts_rs::TS;

use crate::impl_domain_status_conversions;

/* -------------------------------------------------------------------------- */
/* Closed sets */
/* -------------------------------------------------------------------------- */

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "ts-gen", derive(TS))]
#[cfg_attr(feature = "ts-gen", ts(export))]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    MobileMoney,
    Card,
    Credit,
}

impl_domain_status_conversions!(PaymentMethod {
    Cash => "cash",
    MobileMoney => "mobile_money",
    Card => "card",
    Credit => "credit",
});

/// Lifecycle of a sale on the server. Only `Validated` sales count toward
/// revenue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "ts-gen", derive(TS))]
#[cfg_attr(feature = "ts-gen", ts(export))]
#[serde(rename_all = "snake_case")]
pub enum SaleStatus {
    Pending,
    Validated,
    Rejected,
    Cancelled,
}

impl_domain_status_conversions!(SaleStatus {
    Pending => "pending",
    Validated => "validated",
    Rejected => "rejected",
    Cancelled => "cancelled",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReturnStatus {
    Pending,
    Approved,
    Rejected,
    Restocked,
}

impl_domain_status_conversions!(ReturnStatus {
    Pending => "pending",
    Approved => "approved",
    Rejected => "rejected",
    Restocked => "restocked",
});

impl ReturnStatus {
    /// Approved or restocked returns are final on the server.
    #[must_use]
    pub const fn is_confirmed(&self) -> bool {
        matches!(self, Self::Approved | Self::Restocked)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReturnReason {
    Defective,
    Expired,
    WrongItem,
    CustomerChange,
    Other,
}

impl_domain_status_conversions!(ReturnReason {
    Defective => "defective",
    Expired => "expired",
    WrongItem => "wrong_item",
    CustomerChange => "customer_change",
    Other => "other",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpenseCategory {
    Supply,
    Water,
    Electricity,
    Maintenance,
    Rent,
    Other,
}

impl_domain_status_conversions!(ExpenseCategory {
    Supply => "supply",
    Water => "water",
    Electricity => "electricity",
    Maintenance => "maintenance",
    Rent => "rent",
    Other => "other",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdjustmentReason {
    Damage,
    Loss,
    Inventory,
    Correction,
    Other,
}

impl_domain_status_conversions!(AdjustmentReason {
    Damage => "damage",
    Loss => "loss",
    Inventory => "inventory",
    Correction => "correction",
    Other => "other",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsignmentStatus {
    Active,
    Claimed,
    Forfeited,
    Expired,
}

impl_domain_status_conversions!(ConsignmentStatus {
    Active => "active",
    Claimed => "claimed",
    Forfeited => "forfeited",
    Expired => "expired",
});

/// Role of the user looking at the data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Owner,
    Manager,
    /// Waiter: restricted to their own sales and returns.
    Server,
}

impl_domain_status_conversions!(UserRole {
    Owner => "owner",
    Manager => "manager",
    Server => "server",
});

/* -------------------------------------------------------------------------- */
/* Entities */
/* -------------------------------------------------------------------------- */

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts-gen", derive(TS))]
#[cfg_attr(feature = "ts-gen", ts(export))]
pub struct SaleItem {
    pub product_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_name: Option<String>,
    pub quantity: i64,
    pub unit_price: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts-gen", derive(TS))]
#[cfg_attr(feature = "ts-gen", ts(export))]
pub struct Sale {
    pub id: String,
    pub bar_id: String,
    /// Absent on legacy/manual entries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<String>,
    #[serde(default)]
    pub items: Vec<SaleItem>,
    pub total: f64,
    pub payment_method: PaymentMethod,
    pub status: SaleStatus,
    pub sold_by: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Sale {
    /// User the sale is attributed to for role scoping.
    #[must_use]
    pub fn operator_id(&self) -> &str {
        self.server_id.as_deref().unwrap_or(&self.sold_by)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Return {
    pub id: String,
    pub bar_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<String>,
    pub sale_id: String,
    pub product_id: String,
    pub quantity: i64,
    pub refund_amount: f64,
    pub reason: ReturnReason,
    pub status: ReturnStatus,
    #[serde(default)]
    pub is_refunded: bool,
    pub returned_by: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Return {
    #[must_use]
    pub fn operator_id(&self) -> &str {
        self.server_id.as_deref().unwrap_or(&self.returned_by)
    }

    /// Whether the refund has actually left the till.
    #[must_use]
    pub const fn is_confirmed_refund(&self) -> bool {
        self.is_refunded && self.status.is_confirmed()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub bar_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<String>,
    pub name: String,
    pub price: f64,
    pub stock: i64,
    #[serde(default)]
    pub alert_threshold: i64,
    #[serde(default = "default_true")]
    pub is_active: bool,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    #[must_use]
    pub const fn is_low_stock(&self) -> bool {
        self.stock <= self.alert_threshold
    }
}

const fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Consignment {
    pub id: String,
    pub bar_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<String>,
    pub sale_id: String,
    pub product_id: String,
    pub quantity: i64,
    pub total_amount: f64,
    pub customer_name: String,
    pub status: ConsignmentStatus,
    pub expires_at: DateTime<Utc>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}
