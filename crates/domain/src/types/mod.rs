//! Domain types and models

pub mod entities;
pub mod operation;
pub mod payloads;
pub mod stats;
pub mod sync;

pub use entities::{
    AdjustmentReason, Consignment, ConsignmentStatus, ExpenseCategory, PaymentMethod, Product,
    Return, ReturnReason, ReturnStatus, Sale, SaleItem, SaleStatus, UserRole,
};
pub use operation::{
    OperationFilter, OperationPayload, OperationStatus, OperationType, PendingOperation,
};
pub use payloads::{
    AddExpensePayload, AddSalaryPayload, AddSupplyPayload, ConsignmentSettlementPayload,
    CreateConsignmentPayload, CreateProductPayload, CreateReturnPayload, CreateSalePayload,
    CreateServerMappingPayload, CreateStockAdjustmentPayload, CreateTicketPayload,
    DeleteProductPayload, PayTicketPayload, SaleItemInput, UpdateBarPayload,
    UpdateProductPayload, UpdateReturnPayload,
};
pub use stats::{ConsignmentStats, QueueStats, ReturnStats, SalesStats, StockStats};
pub use sync::{
    truncate_error_message, ApiFailure, ApiResponse, FailureKind, RecentlySyncedEntry,
};
