//! Revenue calculator
//!
//! Merges the three sources of sales (authoritative rows, the
//! recently-synced buffer and the offline queue) into one aggregate where
//! every logical sale counts exactly once. Precedence follows the sources:
//! an authoritative row hides a buffer entry with the same idempotency key,
//! and either hides a queued operation with that key. Rows without a key
//! always count from their own source.

use std::collections::HashSet;

use barsync_domain::{
    OperationPayload, OperationStatus, PendingOperation, RecentlySyncedEntry, Return, Sale,
    SaleStatus, SalesStats, UserRole,
};
use tracing::warn;

use super::business_day::{BusinessDateRange, BusinessDayCalendar};
use crate::operations::OperationValidator;

/// Whose sales are visible
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperatorScope {
    All,
    /// Only entities attributed to this user
    Operator(String),
}

impl OperatorScope {
    /// Servers see their own sales and returns; owners and managers see all.
    pub fn for_role(role: UserRole, user_id: &str) -> Self {
        match role {
            UserRole::Server => Self::Operator(user_id.to_string()),
            UserRole::Owner | UserRole::Manager => Self::All,
        }
    }

    pub fn includes(&self, operator_id: &str) -> bool {
        match self {
            Self::All => true,
            Self::Operator(id) => id == operator_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatsQuery {
    pub range: BusinessDateRange,
    pub scope: OperatorScope,
}

impl StatsQuery {
    pub const fn new(range: BusinessDateRange, scope: OperatorScope) -> Self {
        Self { range, scope }
    }
}

/// Borrowed view of the three sources plus authoritative returns
#[derive(Debug, Clone, Copy, Default)]
pub struct RevenueInputs<'a> {
    pub sales: &'a [Sale],
    pub returns: &'a [Return],
    pub recently_synced: &'a [RecentlySyncedEntry],
    pub pending: &'a [PendingOperation],
}

#[derive(Debug, Default)]
struct Tally {
    gross: f64,
    count: u64,
    unconfirmed_gross: f64,
    unconfirmed_count: u64,
}

impl Tally {
    fn add(&mut self, total: f64, unconfirmed: bool) {
        self.gross += total;
        self.count += 1;
        if unconfirmed {
            self.unconfirmed_gross += total;
            self.unconfirmed_count += 1;
        }
    }
}

/// Pure stats calculator for one establishment's calendar
#[derive(Debug, Clone, Copy)]
pub struct RevenueCalculator {
    calendar: BusinessDayCalendar,
}

impl RevenueCalculator {
    pub const fn new(calendar: BusinessDayCalendar) -> Self {
        Self { calendar }
    }

    pub const fn calendar(&self) -> &BusinessDayCalendar {
        &self.calendar
    }

    /// Aggregate sales and confirmed refunds for `query`.
    ///
    /// Invalid items are logged and skipped; this never fails.
    pub fn calculate(&self, inputs: &RevenueInputs<'_>, query: &StatsQuery) -> SalesStats {
        let mut tally = Tally::default();

        let authoritative: Vec<&Sale> =
            inputs.sales.iter().filter(|sale| is_valid_sale(sale, "authoritative")).collect();
        let authoritative_keys: HashSet<&str> = authoritative
            .iter()
            .copied()
            .filter_map(|sale| sale.idempotency_key.as_deref())
            .collect();

        let mut counted_keys: HashSet<&str> = HashSet::new();
        for sale in authoritative {
            if sale.status != SaleStatus::Validated || !self.in_query(sale, query) {
                continue;
            }
            if let Some(key) = sale.idempotency_key.as_deref() {
                if !counted_keys.insert(key) {
                    continue;
                }
            }
            tally.add(sale.total, false);
        }

        let mut buffer_keys: HashSet<&str> = HashSet::new();
        for entry in inputs.recently_synced {
            let OperationPayload::CreateSale(payload) = &entry.operation.operation else {
                continue;
            };
            buffer_keys.insert(entry.idempotency_key.as_str());
            if authoritative_keys.contains(entry.idempotency_key.as_str()) {
                continue;
            }
            let sale = payload.to_optimistic_sale(&entry.operation.id, entry.operation.timestamp);
            if is_valid_sale(&sale, "recently_synced") && self.in_query(&sale, query) {
                tally.add(sale.total, true);
            }
        }

        let mut offline_keys: HashSet<&str> = HashSet::new();
        for op in inputs.pending {
            if op.status != OperationStatus::Pending {
                continue;
            }
            let OperationPayload::CreateSale(payload) = &op.operation else {
                continue;
            };
            let key = payload.idempotency_key.as_str();
            if authoritative_keys.contains(key) || buffer_keys.contains(key) {
                continue;
            }
            let sale = payload.to_optimistic_sale(&op.id, op.timestamp);
            if !is_valid_sale(&sale, "offline") || !offline_keys.insert(key) {
                continue;
            }
            if self.in_query(&sale, query) {
                tally.add(sale.total, true);
            }
        }

        let mut refund_total = 0.0;
        let mut refund_count = 0_u64;
        for ret in inputs.returns {
            if let Err(err) = OperationValidator::validate_return(ret) {
                warn!(id = %ret.id, error = %err, "dropping invalid return");
                continue;
            }
            if !ret.is_confirmed_refund()
                || !query.scope.includes(ret.operator_id())
                || !query.range.contains(self.calendar.business_date(ret.created_at))
            {
                continue;
            }
            refund_total += ret.refund_amount;
            refund_count += 1;
        }

        #[allow(clippy::cast_precision_loss)]
        let average_sale = if tally.count == 0 { 0.0 } else { tally.gross / tally.count as f64 };

        SalesStats {
            gross_revenue: tally.gross,
            net_revenue: tally.gross - refund_total,
            sale_count: tally.count,
            average_sale,
            refund_total,
            refund_count,
            unconfirmed_revenue: tally.unconfirmed_gross,
            unconfirmed_count: tally.unconfirmed_count,
        }
    }

    fn in_query(&self, sale: &Sale, query: &StatsQuery) -> bool {
        query.scope.includes(sale.operator_id())
            && query.range.contains(self.calendar.business_date(sale.created_at))
    }
}

fn is_valid_sale(sale: &Sale, source: &'static str) -> bool {
    match OperationValidator::validate_sale(sale) {
        Ok(()) => true,
        Err(err) => {
            warn!(source, id = %sale.id, error = %err, "dropping invalid sale");
            false
        }
    }
}
