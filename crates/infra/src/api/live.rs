//! Live backend client over PostgREST
//!
//! Mutations go to `POST /rest/v1/rpc/<name>`; authoritative reads are
//! `GET /rest/v1/<table>?bar_id=eq.<id>`. Every call is bounded by the
//! configured timeout, and a timeout is reported separately from transport
//! errors. Reads are idempotent and retried a few times on transient
//! failures; mutations are not, the queue owns their retries.

use std::time::Duration;

use async_trait::async_trait;
use barsync_common::RetryStrategy;
use barsync_core::{AuthoritativeSource, OperationDispatcher};
use barsync_domain::{
    ApiConfig, ApiResponse, BarSyncError, Consignment, PendingOperation, Product,
    Result as DomainResult, Return, Sale,
};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, instrument, warn};
use url::Url;

use super::errors::ApiError;
use super::rpc::{rpc_name, rpc_params};
use crate::sync::ConnectivityProbe;

const READ_ATTEMPTS: u32 = 3;
const READ_BASE_DELAY: Duration = Duration::from_millis(250);
const READ_MAX_DELAY: Duration = Duration::from_secs(2);

/// PostgREST error body (`{ code, message, details, hint }`)
#[derive(Debug, Default, Deserialize)]
struct PostgrestError {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    details: Option<String>,
}

/// HTTP client for the live backend.
pub struct LiveApiClient {
    http: Client,
    base_url: Url,
    health_url: Url,
    timeout: Duration,
    read_retry: RetryStrategy,
}

impl LiveApiClient {
    /// Build a client from the API section of the configuration.
    ///
    /// # Errors
    /// Returns [`ApiError::Config`] if the base URL or API key is malformed.
    pub fn new(config: &ApiConfig) -> Result<Self, ApiError> {
        let base_url = Url::parse(&config.base_url).map_err(|e| {
            ApiError::Config(format!("invalid base_url '{}': {e}", config.base_url))
        })?;
        let health_url = base_url
            .join(&config.health_path)
            .map_err(|e| ApiError::Config(format!("invalid health_path: {e}")))?;
        let timeout = Duration::from_millis(config.timeout_ms);

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(key) = &config.api_key {
            let mut api_key = HeaderValue::from_str(key)
                .map_err(|_| ApiError::Config("api_key is not a valid header value".into()))?;
            api_key.set_sensitive(true);
            let mut bearer = HeaderValue::from_str(&format!("Bearer {key}"))
                .map_err(|_| ApiError::Config("api_key is not a valid header value".into()))?;
            bearer.set_sensitive(true);
            headers.insert("apikey", api_key);
            headers.insert(AUTHORIZATION, bearer);
        }

        let http = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .user_agent(concat!("barsync/", env!("CARGO_PKG_VERSION")))
            .no_proxy()
            .build()
            .map_err(|e| ApiError::Config(format!("failed to build HTTP client: {e}")))?;

        let read_retry = RetryStrategy::custom(READ_ATTEMPTS, READ_BASE_DELAY, READ_MAX_DELAY)
            .map_err(|e| ApiError::Config(e.to_string()))?;

        Ok(Self { http, base_url, health_url, timeout, read_retry })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Deliver one operation to its RPC.
    ///
    /// Returns the response body (`None` for an empty or non-JSON body).
    #[instrument(skip_all, fields(id = %operation.id, op_type = %operation.op_type()))]
    pub async fn send_operation(
        &self,
        operation: &PendingOperation,
    ) -> Result<Option<Value>, ApiError> {
        let name = rpc_name(operation.op_type());
        let params = rpc_params(&operation.operation)?;
        let url = self.endpoint(&format!("rest/v1/rpc/{name}"))?;

        debug!(rpc = name, "calling backend function");
        let response = self.execute(self.http.request(Method::POST, url).json(&params)).await?;
        let body =
            response.text().await.map_err(|e| ApiError::from_transport(&e, self.timeout))?;

        if body.trim().is_empty() {
            return Ok(None);
        }
        match serde_json::from_str::<Value>(&body) {
            Ok(Value::Null) => Ok(None),
            Ok(value) => Ok(Some(value)),
            Err(err) => {
                warn!(rpc = name, error = %err, "RPC succeeded with a non-JSON body");
                Ok(None)
            }
        }
    }

    /// Rows of `table` belonging to `bar_id`. Rows that fail to decode are
    /// skipped with a warning.
    #[instrument(skip(self))]
    pub async fn select<T: DeserializeOwned>(
        &self,
        table: &str,
        bar_id: &str,
    ) -> Result<Vec<T>, ApiError> {
        let url = self.endpoint(&format!("rest/v1/{table}"))?;
        let request = self
            .http
            .request(Method::GET, url)
            .query(&[("select", "*".to_string()), ("bar_id", format!("eq.{bar_id}"))]);

        let response = self.execute(request).await?;
        let rows = response
            .json::<Vec<Value>>()
            .await
            .map_err(|e| ApiError::from_transport(&e, self.timeout))?;

        let total = rows.len();
        let decoded: Vec<T> = rows
            .into_iter()
            .filter_map(|row| match serde_json::from_value(row) {
                Ok(entity) => Some(entity),
                Err(err) => {
                    warn!(table, error = %err, "skipping undecodable row");
                    None
                }
            })
            .collect();
        debug!(table, total, kept = decoded.len(), "authoritative rows fetched");
        Ok(decoded)
    }

    /// [`Self::select`] with retries on timeouts and 5xx answers.
    async fn fetch<T: DeserializeOwned>(&self, table: &str, bar_id: &str) -> DomainResult<Vec<T>> {
        self.read_retry
            .execute(table, || self.select(table, bar_id))
            .await
            .map_err(BarSyncError::from)
    }

    /// Send with a client-enforced deadline and classify non-2xx statuses.
    async fn execute(&self, request: RequestBuilder) -> Result<Response, ApiError> {
        let response = match tokio::time::timeout(self.timeout, request.send()).await {
            Ok(Ok(response)) => response,
            Ok(Err(err)) => return Err(ApiError::from_transport(&err, self.timeout)),
            Err(_) => return Err(ApiError::Timeout(self.timeout)),
        };

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(map_status_error(status, &body))
    }

    fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        self.base_url
            .join(path)
            .map_err(|e| ApiError::Config(format!("invalid endpoint '{path}': {e}")))
    }
}

fn map_status_error(status: StatusCode, body: &str) -> ApiError {
    let parsed: PostgrestError = serde_json::from_str(body).unwrap_or_default();
    let message = match (parsed.message, parsed.details) {
        (Some(message), Some(details)) => format!("{message} ({details})"),
        (Some(message), None) => message,
        (None, _) if !body.trim().is_empty() => body.trim().to_string(),
        (None, _) => status.canonical_reason().unwrap_or("unknown status").to_string(),
    };

    match status {
        StatusCode::REQUEST_TIMEOUT | StatusCode::TOO_MANY_REQUESTS => {
            ApiError::Server { status: status.as_u16(), message }
        }
        s if s.is_server_error() => ApiError::Server { status: s.as_u16(), message },
        s => ApiError::Rejected {
            message,
            code: parsed.code.or_else(|| Some(s.as_u16().to_string())),
        },
    }
}

#[async_trait]
impl OperationDispatcher for LiveApiClient {
    async fn dispatch(&self, operation: &PendingOperation) -> ApiResponse {
        match self.send_operation(operation).await {
            Ok(data) => ApiResponse::ok(data),
            Err(err) => {
                debug!(id = %operation.id, error = %err, "dispatch failed");
                err.into_response()
            }
        }
    }
}

#[async_trait]
impl AuthoritativeSource for LiveApiClient {
    async fn list_sales(&self, bar_id: &str) -> DomainResult<Vec<Sale>> {
        self.fetch("sales", bar_id).await
    }

    async fn list_returns(&self, bar_id: &str) -> DomainResult<Vec<Return>> {
        self.fetch("returns", bar_id).await
    }

    async fn list_products(&self, bar_id: &str) -> DomainResult<Vec<Product>> {
        self.fetch("products", bar_id).await
    }

    async fn list_consignments(&self, bar_id: &str) -> DomainResult<Vec<Consignment>> {
        self.fetch("consignments", bar_id).await
    }
}

#[async_trait]
impl ConnectivityProbe for LiveApiClient {
    /// Any HTTP answer below 500 means the backend is reachable.
    async fn is_reachable(&self) -> bool {
        let request = self.http.request(Method::HEAD, self.health_url.clone());
        match tokio::time::timeout(self.timeout, request.send()).await {
            Ok(Ok(response)) => !response.status().is_server_error(),
            Ok(Err(err)) => {
                debug!(error = %err, "connectivity probe failed");
                false
            }
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn postgrest_exception_is_a_rejection_with_sqlstate() {
        let body = r#"{"code":"P0001","message":"Stock insuffisant","details":null,"hint":null}"#;
        match map_status_error(StatusCode::BAD_REQUEST, body) {
            ApiError::Rejected { message, code } => {
                assert_eq!(message, "Stock insuffisant");
                assert_eq!(code.as_deref(), Some("P0001"));
            }
            other => panic!("expected rejection, got {other:?}"),
        }
    }

    #[test]
    fn throttling_and_gateway_errors_are_retryable() {
        assert!(matches!(
            map_status_error(StatusCode::TOO_MANY_REQUESTS, ""),
            ApiError::Server { status: 429, .. }
        ));
        assert!(matches!(
            map_status_error(StatusCode::BAD_GATEWAY, "<html>bad gateway</html>"),
            ApiError::Server { status: 502, .. }
        ));
    }

    #[test]
    fn malformed_base_url_is_a_config_error() {
        let config = ApiConfig { base_url: "not a url".into(), ..ApiConfig::default() };
        assert!(matches!(LiveApiClient::new(&config), Err(ApiError::Config(_))));
    }
}
