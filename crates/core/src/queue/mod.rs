//! Offline queue: durable per-device buffer of pending mutations

pub mod errors;
pub mod memory;
pub mod ports;
pub mod service;

pub use errors::{QueueError, QueueResult};
pub use memory::InMemoryOperationStore;
pub use ports::OperationStore;
pub use service::{OfflineQueue, QueueEvent};
