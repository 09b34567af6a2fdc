//! Backend API clients
//!
//! Two interchangeable transports implement the core ports
//! (`OperationDispatcher`, `AuthoritativeSource`) plus the worker's
//! `ConnectivityProbe`:
//! - [`LiveApiClient`]: PostgREST over HTTPS
//! - [`MockApiClient`]: in-process backend with injected latency and failures

pub mod errors;
pub mod live;
pub mod mock;
pub mod rpc;

pub use errors::ApiError;
pub use live::LiveApiClient;
pub use mock::MockApiClient;
pub use rpc::{rpc_name, rpc_params};
