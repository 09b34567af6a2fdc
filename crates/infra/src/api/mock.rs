//! In-process backend for demos and tests
//!
//! Applies every operation type to an in-memory model with the same
//! server-side idempotency the real backend has: a replayed idempotency key
//! returns the first result instead of applying twice. Latency and failure
//! injection make the sync manager's retry path observable without a network.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use barsync_core::{AuthoritativeSource, OperationDispatcher};
use barsync_domain::{
    ApiConfig, ApiResponse, Consignment, ConsignmentSettlementPayload, ConsignmentStatus,
    CreateReturnPayload, CreateSalePayload, OperationPayload, PendingOperation, Product,
    Result as DomainResult, Return, ReturnStatus, Sale, SaleStatus,
};
use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use rand::Rng;
use serde_json::{json, Value};
use tracing::{debug, instrument};
use uuid::Uuid;

use super::errors::ApiError;
use crate::sync::ConnectivityProbe;

/// SQLSTATE raised by the backend's business-rule exceptions.
const RAISE_EXCEPTION: &str = "P0001";

#[derive(Debug, Default)]
struct MockBackend {
    sales: Vec<Sale>,
    returns: Vec<Return>,
    products: Vec<Product>,
    consignments: Vec<Consignment>,
    applied: HashMap<String, Option<Value>>,
    calls: usize,
}

/// Simulated backend implementing the same ports as the live client.
pub struct MockApiClient {
    latency: Duration,
    failure_rate: RwLock<f64>,
    reachable: AtomicBool,
    backend: Mutex<MockBackend>,
}

impl MockApiClient {
    pub fn new(config: &ApiConfig) -> Self {
        Self::with_settings(Duration::from_millis(config.mock_latency_ms), config.mock_failure_rate)
    }

    /// `failure_rate` is clamped to `[0, 1]`.
    pub fn with_settings(latency: Duration, failure_rate: f64) -> Self {
        Self {
            latency,
            failure_rate: RwLock::new(clamp_rate(failure_rate)),
            reachable: AtomicBool::new(true),
            backend: Mutex::new(MockBackend::default()),
        }
    }

    /// Instant, never-failing backend.
    pub fn reliable() -> Self {
        Self::with_settings(Duration::ZERO, 0.0)
    }

    pub fn set_failure_rate(&self, rate: f64) {
        *self.failure_rate.write() = clamp_rate(rate);
    }

    pub fn failure_rate(&self) -> f64 {
        *self.failure_rate.read()
    }

    /// Simulate losing or regaining the network.
    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    pub fn seed_products(&self, products: impl IntoIterator<Item = Product>) {
        self.backend.lock().products.extend(products);
    }

    pub fn seed_sales(&self, sales: impl IntoIterator<Item = Sale>) {
        self.backend.lock().sales.extend(sales);
    }

    /// Mutations that reached the backend, replays included.
    pub fn call_count(&self) -> usize {
        self.backend.lock().calls
    }

    /// Distinct idempotency keys the backend has applied.
    pub fn applied_keys(&self) -> usize {
        self.backend.lock().applied.len()
    }

    #[instrument(skip_all, fields(id = %operation.id, op_type = %operation.op_type()))]
    pub async fn send_operation(
        &self,
        operation: &PendingOperation,
    ) -> Result<Option<Value>, ApiError> {
        self.simulate_latency().await;
        self.ensure_reachable()?;
        self.maybe_fail()?;

        let mut backend = self.backend.lock();
        backend.calls += 1;

        let key = operation.idempotency_key().map(str::to_string);
        if let Some(previous) = key.as_ref().and_then(|k| backend.applied.get(k)) {
            debug!("idempotency key already applied, replaying result");
            return Ok(previous.clone());
        }

        let data = backend.apply(&operation.operation)?;
        if let Some(key) = key {
            backend.applied.insert(key, data.clone());
        }
        Ok(data)
    }

    async fn simulate_latency(&self) {
        if self.latency.is_zero() {
            return;
        }
        // Base latency +/- 50%
        let delay = {
            let base = self.latency.as_secs_f64();
            let factor = rand::thread_rng().gen_range(0.5..=1.5);
            Duration::from_secs_f64(base * factor)
        };
        tokio::time::sleep(delay).await;
    }

    fn ensure_reachable(&self) -> Result<(), ApiError> {
        if self.reachable.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(ApiError::Network("backend unreachable".into()))
        }
    }

    fn maybe_fail(&self) -> Result<(), ApiError> {
        let rate = self.failure_rate();
        if rate <= 0.0 {
            return Ok(());
        }
        let mut rng = rand::thread_rng();
        if !rng.gen_bool(rate) {
            return Ok(());
        }
        if rng.gen_bool(0.5) {
            Err(ApiError::Timeout(self.latency.max(Duration::from_millis(1))))
        } else {
            Err(ApiError::Network("connection reset by peer".into()))
        }
    }
}

impl MockBackend {
    fn apply(&mut self, payload: &OperationPayload) -> Result<Option<Value>, ApiError> {
        match payload {
            OperationPayload::CreateSale(p) => self.create_sale(p),
            OperationPayload::CreateReturn(p) => self.create_return(p),
            OperationPayload::UpdateReturn(p) => {
                let ret = self
                    .returns
                    .iter_mut()
                    .find(|r| r.id == p.return_id && r.bar_id == p.bar_id)
                    .ok_or_else(|| not_found("return", &p.return_id))?;
                ret.status = p.status;
                if let Some(refunded) = p.is_refunded {
                    ret.is_refunded = refunded;
                }
                Ok(Some(json!({ "id": ret.id })))
            }
            OperationPayload::CreateProduct(p) => {
                let id = Uuid::new_v4().to_string();
                self.products.push(Product {
                    id: id.clone(),
                    bar_id: p.bar_id.clone(),
                    idempotency_key: Some(p.idempotency_key.clone()),
                    name: p.name.clone(),
                    price: p.price,
                    stock: p.initial_stock,
                    alert_threshold: p.alert_threshold,
                    is_active: true,
                    updated_at: Utc::now(),
                });
                Ok(Some(json!({ "id": id })))
            }
            OperationPayload::UpdateProduct(p) => {
                let product = self.product_mut(&p.bar_id, &p.product_id)?;
                if let Some(name) = &p.name {
                    product.name.clone_from(name);
                }
                if let Some(price) = p.price {
                    product.price = price;
                }
                if let Some(threshold) = p.alert_threshold {
                    product.alert_threshold = threshold;
                }
                if let Some(active) = p.is_active {
                    product.is_active = active;
                }
                product.updated_at = Utc::now();
                Ok(Some(json!({ "id": product.id })))
            }
            OperationPayload::DeleteProduct(p) => {
                let before = self.products.len();
                self.products.retain(|pr| !(pr.id == p.product_id && pr.bar_id == p.bar_id));
                if self.products.len() == before {
                    return Err(not_found("product", &p.product_id));
                }
                Ok(None)
            }
            OperationPayload::AddSupply(p) => {
                self.adjust_stock(&p.bar_id, &p.product_id, p.quantity)?;
                Ok(Some(json!({ "id": Uuid::new_v4().to_string() })))
            }
            OperationPayload::CreateStockAdjustment(p) => {
                let product = self.product_mut(&p.bar_id, &p.product_id)?;
                if product.stock + p.delta < 0 {
                    return Err(rejected(format!(
                        "adjustment would make stock of {} negative",
                        product.name
                    )));
                }
                product.stock += p.delta;
                product.updated_at = Utc::now();
                Ok(Some(json!({ "id": Uuid::new_v4().to_string() })))
            }
            OperationPayload::CreateConsignment(p) => {
                let id = Uuid::new_v4().to_string();
                let mut consignment = p.to_optimistic_consignment(&id, Utc::now());
                consignment.status = ConsignmentStatus::Active;
                self.consignments.push(consignment);
                Ok(Some(json!({ "id": id })))
            }
            OperationPayload::ClaimConsignment(p) => {
                self.settle_consignment(p, ConsignmentStatus::Claimed)
            }
            OperationPayload::ForfeitConsignment(p) => {
                self.settle_consignment(p, ConsignmentStatus::Forfeited)
            }
            OperationPayload::AddExpense(_)
            | OperationPayload::AddSalary(_)
            | OperationPayload::CreateTicket(_)
            | OperationPayload::CreateServerMapping(_) => {
                Ok(Some(json!({ "id": Uuid::new_v4().to_string() })))
            }
            OperationPayload::PayTicket(_) | OperationPayload::UpdateBar(_) => Ok(None),
        }
    }

    fn create_sale(&mut self, p: &CreateSalePayload) -> Result<Option<Value>, ApiError> {
        // Check every line before touching stock so a rejection leaves no trace.
        for item in &p.items {
            if let Some(product) =
                self.products.iter().find(|pr| pr.id == item.product_id && pr.bar_id == p.bar_id)
            {
                if product.stock < item.quantity {
                    return Err(rejected(format!("insufficient stock for {}", product.name)));
                }
            }
        }
        for item in &p.items {
            if let Some(product) = self
                .products
                .iter_mut()
                .find(|pr| pr.id == item.product_id && pr.bar_id == p.bar_id)
            {
                product.stock -= item.quantity;
                product.updated_at = Utc::now();
            }
        }

        let id = Uuid::new_v4().to_string();
        let mut sale = p.to_optimistic_sale(&id, Utc::now());
        sale.status = SaleStatus::Validated;
        self.sales.push(sale);
        Ok(Some(json!({ "id": id })))
    }

    fn create_return(&mut self, p: &CreateReturnPayload) -> Result<Option<Value>, ApiError> {
        if !self.sales.iter().any(|s| s.id == p.sale_id && s.bar_id == p.bar_id) {
            return Err(not_found("sale", &p.sale_id));
        }

        let id = Uuid::new_v4().to_string();
        let mut ret = p.to_optimistic_return(&id, Utc::now());
        if p.auto_restock {
            if let Some(product) = self
                .products
                .iter_mut()
                .find(|pr| pr.id == p.product_id && pr.bar_id == p.bar_id)
            {
                product.stock += p.quantity;
                product.updated_at = Utc::now();
            }
            ret.status = ReturnStatus::Restocked;
        }
        self.returns.push(ret);
        Ok(Some(json!({ "id": id })))
    }

    fn settle_consignment(
        &mut self,
        p: &ConsignmentSettlementPayload,
        to: ConsignmentStatus,
    ) -> Result<Option<Value>, ApiError> {
        let consignment = self
            .consignments
            .iter_mut()
            .find(|c| c.id == p.consignment_id && c.bar_id == p.bar_id)
            .ok_or_else(|| not_found("consignment", &p.consignment_id))?;
        if consignment.status != ConsignmentStatus::Active {
            return Err(rejected(format!("consignment is already {}", consignment.status)));
        }
        consignment.status = to;
        Ok(Some(json!({ "id": consignment.id, "status": to.as_str() })))
    }

    fn adjust_stock(&mut self, bar_id: &str, product_id: &str, delta: i64) -> Result<(), ApiError> {
        let product = self.product_mut(bar_id, product_id)?;
        product.stock += delta;
        product.updated_at = Utc::now();
        Ok(())
    }

    fn product_mut(&mut self, bar_id: &str, product_id: &str) -> Result<&mut Product, ApiError> {
        self.products
            .iter_mut()
            .find(|p| p.id == product_id && p.bar_id == bar_id)
            .ok_or_else(|| not_found("product", product_id))
    }
}

fn rejected(message: String) -> ApiError {
    ApiError::Rejected { message, code: Some(RAISE_EXCEPTION.to_string()) }
}

fn not_found(entity: &str, id: &str) -> ApiError {
    ApiError::Rejected { message: format!("{entity} {id} not found"), code: Some("404".into()) }
}

fn clamp_rate(rate: f64) -> f64 {
    if rate.is_finite() {
        rate.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

#[async_trait]
impl OperationDispatcher for MockApiClient {
    async fn dispatch(&self, operation: &PendingOperation) -> ApiResponse {
        match self.send_operation(operation).await {
            Ok(data) => ApiResponse::ok(data),
            Err(err) => err.into_response(),
        }
    }
}

#[async_trait]
impl AuthoritativeSource for MockApiClient {
    async fn list_sales(&self, bar_id: &str) -> DomainResult<Vec<Sale>> {
        self.simulate_latency().await;
        self.ensure_reachable()?;
        let backend = self.backend.lock();
        Ok(backend.sales.iter().filter(|s| s.bar_id == bar_id).cloned().collect())
    }

    async fn list_returns(&self, bar_id: &str) -> DomainResult<Vec<Return>> {
        self.simulate_latency().await;
        self.ensure_reachable()?;
        let backend = self.backend.lock();
        Ok(backend.returns.iter().filter(|r| r.bar_id == bar_id).cloned().collect())
    }

    async fn list_products(&self, bar_id: &str) -> DomainResult<Vec<Product>> {
        self.simulate_latency().await;
        self.ensure_reachable()?;
        let backend = self.backend.lock();
        Ok(backend.products.iter().filter(|p| p.bar_id == bar_id).cloned().collect())
    }

    async fn list_consignments(&self, bar_id: &str) -> DomainResult<Vec<Consignment>> {
        self.simulate_latency().await;
        self.ensure_reachable()?;
        let backend = self.backend.lock();
        Ok(backend.consignments.iter().filter(|c| c.bar_id == bar_id).cloned().collect())
    }
}

#[async_trait]
impl ConnectivityProbe for MockApiClient {
    async fn is_reachable(&self) -> bool {
        self.reachable.load(Ordering::SeqCst)
    }
}
