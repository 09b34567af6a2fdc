//! Statistics types exposed to the UI
//!
//! Aggregates are recomputed from the three data sources (authoritative,
//! recently synced, offline) on every change; none of these are persisted.

use serde::{Deserialize, Serialize};
#[cfg(feature = "ts-gen")]
use ts_rs::TS;

/* -------------------------------------------------------------------------- */
/* Sales Statistics */
/* -------------------------------------------------------------------------- */

/// Revenue aggregate for a business-date range.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts-gen", derive(TS))]
#[cfg_attr(feature = "ts-gen", ts(export))]
pub struct SalesStats {
    /// Sum of every counted sale, each logical sale exactly once
    pub gross_revenue: f64,

    /// Gross revenue minus confirmed refunds
    pub net_revenue: f64,

    /// Number of counted sales
    #[cfg_attr(feature = "ts-gen", ts(type = "number"))]
    pub sale_count: u64,

    /// `gross_revenue / sale_count`, or 0 without sales
    pub average_sale: f64,

    /// Sum of confirmed refunds in the same scope
    pub refund_total: f64,

    /// Number of confirmed refunds
    #[cfg_attr(feature = "ts-gen", ts(type = "number"))]
    pub refund_count: u64,

    /// Part of `gross_revenue` not yet visible in the authoritative list
    pub unconfirmed_revenue: f64,

    /// Part of `sale_count` not yet visible in the authoritative list
    #[cfg_attr(feature = "ts-gen", ts(type = "number"))]
    pub unconfirmed_count: u64,
}

/* -------------------------------------------------------------------------- */
/* Returns & Consignments */
/* -------------------------------------------------------------------------- */

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts-gen", derive(TS))]
#[cfg_attr(feature = "ts-gen", ts(export))]
pub struct ReturnStats {
    #[cfg_attr(feature = "ts-gen", ts(type = "number"))]
    pub total: u64,

    /// Returns awaiting approval, including optimistic ones
    #[cfg_attr(feature = "ts-gen", ts(type = "number"))]
    pub pending: u64,

    /// Sum of confirmed refunds
    pub refunded_amount: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts-gen", derive(TS))]
#[cfg_attr(feature = "ts-gen", ts(export))]
pub struct ConsignmentStats {
    #[cfg_attr(feature = "ts-gen", ts(type = "number"))]
    pub active: u64,
    #[cfg_attr(feature = "ts-gen", ts(type = "number"))]
    pub claimed: u64,
    #[cfg_attr(feature = "ts-gen", ts(type = "number"))]
    pub forfeited: u64,

    /// Value of goods still held for customers
    pub active_amount: f64,
}

/* -------------------------------------------------------------------------- */
/* Stock Statistics */
/* -------------------------------------------------------------------------- */

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts-gen", derive(TS))]
#[cfg_attr(feature = "ts-gen", ts(export))]
pub struct StockStats {
    #[cfg_attr(feature = "ts-gen", ts(type = "number"))]
    pub product_count: u64,

    /// Products at or below their alert threshold
    #[cfg_attr(feature = "ts-gen", ts(type = "number"))]
    pub low_stock: u64,

    /// Products whose projected stock includes unconfirmed operations
    #[cfg_attr(feature = "ts-gen", ts(type = "number"))]
    pub with_pending_changes: u64,
}

/* -------------------------------------------------------------------------- */
/* Queue Statistics */
/* -------------------------------------------------------------------------- */

/// Offline queue summary
///
/// `failed` counts operations parked for manual attention; retryable failures
/// are back in `pending`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts-gen", derive(TS))]
#[cfg_attr(feature = "ts-gen", ts(export))]
pub struct QueueStats {
    #[cfg_attr(feature = "ts-gen", ts(type = "number"))]
    pub pending: u64,

    /// Pending operations waiting out a backoff delay
    #[cfg_attr(feature = "ts-gen", ts(type = "number"))]
    pub retrying: u64,

    #[cfg_attr(feature = "ts-gen", ts(type = "number"))]
    pub synced: u64,

    #[cfg_attr(feature = "ts-gen", ts(type = "number"))]
    pub failed: u64,
}

impl QueueStats {
    #[must_use]
    pub const fn total(&self) -> u64 {
        self.pending + self.synced + self.failed
    }
}
