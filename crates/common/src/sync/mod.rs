//! Synchronization primitives shared by the sync core
//!
//! - **`retry`**: exponential backoff with jitter, used for per-operation
//!   retry scheduling and for retrying idempotent reads
//! - **`observer`**: service-scoped subscriptions for change notifications

pub mod observer;
pub mod retry;

pub use observer::{Subscribers, SubscriptionId};
pub use retry::RetryStrategy;
