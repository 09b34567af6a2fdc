//! Live API client against a local PostgREST stand-in
//!
//! Covers RPC dispatch, the timeout/network/rejection split, authoritative
//! reads with their retries and the connectivity probe, plus one drain through
//! the sync manager.

use std::sync::Arc;
use std::time::Duration;

use barsync_core::{
    AuthoritativeSource, InMemoryOperationStore, OfflineQueue, OperationDispatcher, SyncManager,
    SyncManagerConfig,
};
use barsync_domain::{
    ApiConfig, ApiMode, BarSyncError, CreateReturnPayload, FailureKind, OperationPayload,
    OperationStatus, PendingOperation, ReturnReason, SyncConfig,
};
use barsync_infra::{ConnectivityProbe, LiveApiClient};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ANON_KEY: &str = "anon-test-key";

fn client(server: &MockServer, timeout_ms: u64) -> LiveApiClient {
    let config = ApiConfig {
        mode: ApiMode::Live,
        base_url: server.uri(),
        api_key: Some(ANON_KEY.into()),
        timeout_ms,
        ..ApiConfig::default()
    };
    LiveApiClient::new(&config).expect("client built")
}

fn return_payload(key: &str) -> OperationPayload {
    OperationPayload::CreateReturn(CreateReturnPayload {
        idempotency_key: key.into(),
        bar_id: "bar-1".into(),
        sale_id: "s-1".into(),
        product_id: "p-1".into(),
        quantity: 1,
        refund_amount: 650.0,
        reason: ReturnReason::Defective,
        is_refunded: true,
        auto_restock: false,
        returned_by: "u-1".into(),
        server_id: None,
        notes: None,
    })
}

fn return_op(key: &str) -> PendingOperation {
    PendingOperation::new(format!("tmp_{key}"), return_payload(key))
}

#[tokio::test]
async fn rpc_success_returns_server_data() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/rpc/create_return"))
        .and(header("apikey", ANON_KEY))
        .and(header("authorization", format!("Bearer {ANON_KEY}").as_str()))
        .and(body_partial_json(json!({
            "p_idempotency_key": "r-1",
            "p_sale_id": "s-1",
            "p_reason": "defective"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "ret-42" })))
        .expect(1)
        .mount(&server)
        .await;

    let response = client(&server, 2_000).dispatch(&return_op("r-1")).await;

    assert!(response.success);
    assert_eq!(response.data, Some(json!({ "id": "ret-42" })));
}

#[tokio::test]
async fn empty_success_body_has_no_data() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/rpc/create_return"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let response = client(&server, 2_000).dispatch(&return_op("r-1")).await;
    assert!(response.success);
    assert_eq!(response.data, None);
}

#[tokio::test]
async fn slow_server_is_a_timeout_not_a_network_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
        .mount(&server)
        .await;

    let response = client(&server, 100).dispatch(&return_op("r-1")).await;

    assert_eq!(response.failure_kind(), Some(FailureKind::Timeout));
    assert!(response.error.unwrap().message.contains("100ms"));
}

#[tokio::test]
async fn business_rule_exception_is_rejected_with_its_code() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "code": "P0001",
            "message": "sale s-1 already fully returned",
            "details": null,
            "hint": null
        })))
        .mount(&server)
        .await;

    let response = client(&server, 2_000).dispatch(&return_op("r-1")).await;
    let error = response.error.expect("failure carries an error");

    assert_eq!(error.kind, FailureKind::Rejected);
    assert_eq!(error.message, "sale s-1 already fully returned");
    assert_eq!(error.code.as_deref(), Some("P0001"));
}

#[tokio::test]
async fn unavailable_server_is_a_network_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503).set_body_string("upstream unavailable"))
        .mount(&server)
        .await;

    let response = client(&server, 2_000).dispatch(&return_op("r-1")).await;
    let error = response.error.expect("failure carries an error");
    assert_eq!(error.kind, FailureKind::Network);
    assert_eq!(error.code.as_deref(), Some("503"));
}

#[tokio::test]
async fn reads_filter_by_bar_and_skip_bad_rows() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/sales"))
        .and(query_param("bar_id", "eq.bar-1"))
        .and(query_param("select", "*"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {
                "id": "s-1",
                "bar_id": "bar-1",
                "idempotency_key": "k-1",
                "total": 1000.0,
                "payment_method": "cash",
                "status": "validated",
                "sold_by": "u-1",
                "created_at": "2026-03-04T21:30:00Z"
            },
            { "id": "s-2", "bar_id": "bar-1", "total": "not a number" }
        ])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/products"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "code": "PGRST301",
            "message": "JWT expired"
        })))
        .mount(&server)
        .await;

    let api = client(&server, 2_000);
    let sales = api.list_sales("bar-1").await.unwrap();
    assert_eq!(sales.len(), 1);
    assert_eq!(sales[0].idempotency_key.as_deref(), Some("k-1"));

    let err = api.list_products("bar-1").await.unwrap_err();
    assert!(matches!(err, BarSyncError::InvalidInput(ref msg) if msg.contains("JWT expired")));
}

#[tokio::test]
async fn probe_treats_server_errors_as_unreachable() {
    let healthy = MockServer::start().await;
    Mock::given(method("HEAD"))
        .and(path("/rest/v1/"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&healthy)
        .await;
    assert!(client(&healthy, 1_000).is_reachable().await);

    let failing = MockServer::start().await;
    Mock::given(method("HEAD"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&failing)
        .await;
    assert!(!client(&failing, 1_000).is_reachable().await);
}

#[tokio::test]
async fn drain_retries_after_outage_and_server_dedupes() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/rpc/create_return"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/rpc/create_return"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "ret-1" })))
        .mount(&server)
        .await;

    let queue = Arc::new(OfflineQueue::new(Arc::new(InMemoryOperationStore::new())));
    let config = SyncManagerConfig::from_config(&SyncConfig::default()).unwrap();
    let sync = SyncManager::new(Arc::clone(&queue), Arc::new(client(&server, 2_000)), config);

    let op = queue.enqueue(return_payload("r-9")).await.unwrap();

    let first = sync.drain().await.unwrap();
    assert_eq!(first.retry_scheduled, 1);
    let waiting = queue.get(&op.id).await.unwrap();
    assert_eq!(waiting.status, OperationStatus::Pending);
    assert_eq!(waiting.failure_kind, Some(FailureKind::Network));

    // Past the backoff window the retry goes through
    let later = waiting.next_retry_at.unwrap() + chrono::Duration::seconds(1);
    let second = sync.drain_at(later).await.unwrap();
    assert_eq!(second.synced, 1);
    assert_eq!(queue.get(&op.id).await.unwrap().status, OperationStatus::Synced);
    assert!(sync.get_recently_synced_keys().contains("r-9"));
}

#[tokio::test]
async fn reads_retry_through_a_transient_outage() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/returns"))
        .respond_with(ResponseTemplate::new(502))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/returns"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let returns = client(&server, 2_000).list_returns("bar-1").await.unwrap();
    assert!(returns.is_empty());
}
