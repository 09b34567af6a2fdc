//! Shared test helpers for `barsync-core` integration tests.
//!
//! Fixtures for the three data sources plus lightweight fakes for the
//! dispatcher and authoritative-read ports.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use barsync_common::RetryStrategy;
use barsync_core::{
    AuthoritativeSource, BusinessDayCalendar, InMemoryOperationStore, OfflineQueue,
    OperationDispatcher, RevenueCalculator, SyncManager, SyncManagerConfig,
};
use barsync_domain::{
    ApiResponse, BarSyncError, Consignment, CreateSalePayload, OperationPayload, PaymentMethod,
    PendingOperation, Product, RecentlySyncedEntry, Result as DomainResult, Return, ReturnReason,
    ReturnStatus, Sale, SaleItem, SaleItemInput, SaleStatus,
};
use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;

pub const BAR: &str = "0191d3a4-6f1e-7c3b-9a57-3f1b2c4d5e6f";
pub const OTHER_BAR: &str = "0191d3a4-6f1e-7c3b-9a57-3f1b2c4d5e70";
pub const SELLER: &str = "0191d3a4-6f1e-7c3b-9a57-000000000001";
pub const WAITER: &str = "0191d3a4-6f1e-7c3b-9a57-000000000003";
pub const PRODUCT: &str = "0191d3a4-6f1e-7c3b-9a57-000000000002";

/* -------------------------------------------------------------------------- */
/* Fixtures */
/* -------------------------------------------------------------------------- */

/// UTC instant on the given day.
pub fn at(day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, day, hour, minute, 0).unwrap()
}

/// Calendar used by the scenarios: 06:00 closing, Africa/Abidjan (UTC+0).
pub fn calculator() -> RevenueCalculator {
    RevenueCalculator::new(BusinessDayCalendar::new(6, chrono_tz::Africa::Abidjan).unwrap())
}

pub fn sale_payload(key: &str, total: f64) -> CreateSalePayload {
    CreateSalePayload {
        idempotency_key: key.to_string(),
        bar_id: BAR.to_string(),
        items: vec![SaleItemInput {
            product_id: PRODUCT.to_string(),
            product_name: Some("Flag 65cl".to_string()),
            quantity: 1,
            unit_price: total,
        }],
        total,
        payment_method: PaymentMethod::Cash,
        sold_by: SELLER.to_string(),
        server_id: None,
        ticket_id: None,
        promotion_ids: Vec::new(),
        notes: None,
    }
}

pub fn sale_op(key: &str, total: f64) -> OperationPayload {
    OperationPayload::CreateSale(sale_payload(key, total))
}

/// Validated sale as the backend would return it.
pub fn authoritative_sale(
    id: &str,
    key: Option<&str>,
    total: f64,
    created_at: DateTime<Utc>,
) -> Sale {
    Sale {
        id: id.to_string(),
        bar_id: BAR.to_string(),
        idempotency_key: key.map(str::to_string),
        items: vec![SaleItem {
            product_id: PRODUCT.to_string(),
            product_name: None,
            quantity: 1,
            unit_price: total,
        }],
        total,
        payment_method: PaymentMethod::Cash,
        status: SaleStatus::Validated,
        sold_by: SELLER.to_string(),
        server_id: None,
        created_at,
    }
}

pub fn queued_sale(id: &str, key: &str, total: f64, timestamp: DateTime<Utc>) -> PendingOperation {
    PendingOperation::new_at(id, sale_op(key, total), timestamp)
}

pub fn synced_entry(operation: PendingOperation, synced_at: DateTime<Utc>) -> RecentlySyncedEntry {
    RecentlySyncedEntry {
        idempotency_key: operation.idempotency_key().unwrap_or_default().to_string(),
        total: operation.operation.amount(),
        synced_at,
        operation,
        server_data: None,
    }
}

pub fn refund(id: &str, amount: f64, created_at: DateTime<Utc>) -> Return {
    Return {
        id: id.to_string(),
        bar_id: BAR.to_string(),
        idempotency_key: None,
        sale_id: "s-1".to_string(),
        product_id: PRODUCT.to_string(),
        quantity: 1,
        refund_amount: amount,
        reason: ReturnReason::Defective,
        status: ReturnStatus::Approved,
        is_refunded: true,
        returned_by: SELLER.to_string(),
        server_id: None,
        created_at,
    }
}

pub fn product(id: &str, stock: i64, updated_at: DateTime<Utc>) -> Product {
    Product {
        id: id.to_string(),
        bar_id: BAR.to_string(),
        idempotency_key: None,
        name: "Flag 65cl".to_string(),
        price: 1000.0,
        stock,
        alert_threshold: 5,
        is_active: true,
        updated_at,
    }
}

/* -------------------------------------------------------------------------- */
/* Fakes */
/* -------------------------------------------------------------------------- */

/// Replays canned responses in order; succeeds once they run out.
#[derive(Default)]
pub struct ScriptedDispatcher {
    responses: Mutex<VecDeque<ApiResponse>>,
    dispatched: Mutex<Vec<PendingOperation>>,
}

impl ScriptedDispatcher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push(&self, response: ApiResponse) {
        self.responses.lock().push_back(response);
    }

    pub fn dispatched(&self) -> Vec<PendingOperation> {
        self.dispatched.lock().clone()
    }
}

#[async_trait]
impl OperationDispatcher for ScriptedDispatcher {
    async fn dispatch(&self, operation: &PendingOperation) -> ApiResponse {
        self.dispatched.lock().push(operation.clone());
        self.responses.lock().pop_front().unwrap_or_else(|| ApiResponse::ok(None))
    }
}

/// Authoritative source backed by mutable in-memory lists.
#[derive(Default)]
pub struct StaticSource {
    pub sales: Mutex<Vec<Sale>>,
    pub returns: Mutex<Vec<Return>>,
    pub products: Mutex<Vec<Product>>,
    pub consignments: Mutex<Vec<Consignment>>,
    pub unreachable: Mutex<bool>,
}

impl StaticSource {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn check(&self) -> DomainResult<()> {
        if *self.unreachable.lock() {
            return Err(BarSyncError::Network("backend unreachable".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl AuthoritativeSource for StaticSource {
    async fn list_sales(&self, bar_id: &str) -> DomainResult<Vec<Sale>> {
        self.check()?;
        Ok(self.sales.lock().iter().filter(|s| s.bar_id == bar_id).cloned().collect())
    }

    async fn list_returns(&self, bar_id: &str) -> DomainResult<Vec<Return>> {
        self.check()?;
        Ok(self.returns.lock().iter().filter(|r| r.bar_id == bar_id).cloned().collect())
    }

    async fn list_products(&self, bar_id: &str) -> DomainResult<Vec<Product>> {
        self.check()?;
        Ok(self.products.lock().iter().filter(|p| p.bar_id == bar_id).cloned().collect())
    }

    async fn list_consignments(&self, bar_id: &str) -> DomainResult<Vec<Consignment>> {
        self.check()?;
        Ok(self.consignments.lock().iter().filter(|c| c.bar_id == bar_id).cloned().collect())
    }
}

/* -------------------------------------------------------------------------- */
/* Wiring */
/* -------------------------------------------------------------------------- */

pub fn manager_config(max_retries: u32, window: Duration) -> SyncManagerConfig {
    SyncManagerConfig {
        batch_size: 50,
        retry: RetryStrategy::custom(max_retries, Duration::from_secs(1), Duration::from_secs(60))
            .unwrap()
            .with_jitter_factor(0.0),
        recently_synced_window: window,
    }
}

/// In-memory queue + scripted dispatcher + sync manager.
pub struct Harness {
    pub queue: Arc<OfflineQueue>,
    pub dispatcher: Arc<ScriptedDispatcher>,
    pub sync: Arc<SyncManager>,
    pub source: Arc<StaticSource>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(manager_config(5, Duration::from_secs(10)))
    }

    pub fn with_config(config: SyncManagerConfig) -> Self {
        let queue = Arc::new(OfflineQueue::new(Arc::new(InMemoryOperationStore::new())));
        let dispatcher = ScriptedDispatcher::new();
        let sync = Arc::new(SyncManager::new(
            Arc::clone(&queue),
            Arc::clone(&dispatcher) as Arc<dyn OperationDispatcher>,
            config,
        ));
        Self { queue, dispatcher, sync, source: StaticSource::new() }
    }

    pub fn source(&self) -> Arc<dyn AuthoritativeSource> {
        Arc::clone(&self.source) as Arc<dyn AuthoritativeSource>
    }
}
