//! Payload builders shared by unit tests

use barsync_domain::{
    CreateSalePayload, DeleteProductPayload, OperationPayload, PaymentMethod, SaleItemInput,
};

pub const BAR_A: &str = "0191d3a4-6f1e-7c3b-9a57-3f1b2c4d5e6f";
pub const BAR_B: &str = "0191d3a4-6f1e-7c3b-9a57-3f1b2c4d5e70";
pub const SELLER: &str = "0191d3a4-6f1e-7c3b-9a57-000000000001";
pub const PRODUCT: &str = "0191d3a4-6f1e-7c3b-9a57-000000000002";

pub fn sale_payload(key: &str, bar_id: &str, total: f64) -> CreateSalePayload {
    CreateSalePayload {
        idempotency_key: key.to_string(),
        bar_id: bar_id.to_string(),
        items: vec![SaleItemInput {
            product_id: PRODUCT.to_string(),
            product_name: None,
            quantity: 1,
            unit_price: total,
        }],
        total,
        payment_method: PaymentMethod::Cash,
        sold_by: SELLER.to_string(),
        server_id: None,
        ticket_id: None,
        promotion_ids: Vec::new(),
        notes: None,
    }
}

pub fn sale(key: &str, bar_id: &str, total: f64) -> OperationPayload {
    OperationPayload::CreateSale(sale_payload(key, bar_id, total))
}

pub fn delete_product(bar_id: &str) -> OperationPayload {
    OperationPayload::DeleteProduct(DeleteProductPayload {
        bar_id: bar_id.to_string(),
        product_id: PRODUCT.to_string(),
    })
}
