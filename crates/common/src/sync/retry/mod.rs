// Retry module with exponential backoff and jitter

pub mod constants;
pub mod strategy;

pub use strategy::RetryStrategy;
