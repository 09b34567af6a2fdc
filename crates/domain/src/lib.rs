//! # barsync Domain
//!
//! Business domain types for the offline-first sync core of the bar POS.
//!
//! This crate contains:
//! - Queued operations and their typed payloads
//! - Authoritative entities (sales, returns, products, consignments)
//! - Statistics and transport result types
//! - Configuration structures, constants and the domain error
//!
//! ## Architecture
//! - No dependencies on other barsync crates
//! - No I/O; pure data structures

pub mod config;
pub mod constants;
pub mod errors;
pub mod macros;
pub mod types;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
pub use types::*;
