//! Unified views: authoritative + recently-synced + offline, per entity
//! family and bar

pub mod consignments;
pub mod errors;
pub mod merge;
pub mod ports;
pub mod returns;
pub mod sales;
pub mod stock;
pub mod view;

pub use consignments::{ConsignmentsFamily, ConsignmentsView};
pub use errors::{ViewError, ViewResult};
pub use merge::{merge_sources, InputDigest, MergeCache, MergeEntity, Provenance, UnifiedEntity};
pub use ports::AuthoritativeSource;
pub use returns::{ReturnsFamily, ReturnsView};
pub use sales::{SalesFamily, SalesView};
pub use stock::{StockFamily, StockView};
pub use view::{EntityFamily, ProjectionContext, UnifiedView, ViewInputs};
