//! Mapping from queued operations to backend RPC calls
//!
//! Each operation type is one Postgres function exposed through PostgREST
//! (`POST /rest/v1/rpc/<name>`). Parameters are the payload fields sent flat,
//! each prefixed with `p_`.

use barsync_domain::{OperationPayload, OperationType};
use serde::Serialize;
use serde_json::{Map, Value};

use super::errors::ApiError;

/// Backend function invoked for `op_type`
pub const fn rpc_name(op_type: OperationType) -> &'static str {
    match op_type {
        OperationType::CreateSale => "create_sale_with_promotions",
        OperationType::CreateReturn => "create_return",
        OperationType::UpdateReturn => "update_return",
        OperationType::AddExpense => "add_expense",
        OperationType::CreateProduct => "create_product",
        OperationType::UpdateProduct => "update_product",
        OperationType::DeleteProduct => "delete_product",
        OperationType::AddSupply => "add_supply",
        OperationType::CreateConsignment => "create_consignment",
        OperationType::ClaimConsignment => "claim_consignment",
        OperationType::ForfeitConsignment => "forfeit_consignment",
        OperationType::AddSalary => "add_salary",
        OperationType::CreateTicket => "create_ticket",
        OperationType::PayTicket => "pay_ticket",
        OperationType::CreateServerMapping => "create_server_mapping",
        OperationType::CreateStockAdjustment => "create_stock_adjustment",
        OperationType::UpdateBar => "update_bar",
    }
}

/// Flat `p_`-prefixed parameter object for the operation's RPC
///
/// # Errors
/// Returns [`ApiError::Unsupported`] if the payload does not serialize to a
/// JSON object.
pub fn rpc_params(payload: &OperationPayload) -> Result<Value, ApiError> {
    let value = match payload {
        OperationPayload::CreateSale(p) => to_value(p)?,
        OperationPayload::CreateReturn(p) => to_value(p)?,
        OperationPayload::UpdateReturn(p) => to_value(p)?,
        OperationPayload::AddExpense(p) => to_value(p)?,
        OperationPayload::CreateProduct(p) => to_value(p)?,
        OperationPayload::UpdateProduct(p) => to_value(p)?,
        OperationPayload::DeleteProduct(p) => to_value(p)?,
        OperationPayload::AddSupply(p) => to_value(p)?,
        OperationPayload::CreateConsignment(p) => to_value(p)?,
        OperationPayload::ClaimConsignment(p) | OperationPayload::ForfeitConsignment(p) => {
            to_value(p)?
        }
        OperationPayload::AddSalary(p) => to_value(p)?,
        OperationPayload::CreateTicket(p) => to_value(p)?,
        OperationPayload::PayTicket(p) => to_value(p)?,
        OperationPayload::CreateServerMapping(p) => to_value(p)?,
        OperationPayload::CreateStockAdjustment(p) => to_value(p)?,
        OperationPayload::UpdateBar(p) => to_value(p)?,
    };

    match value {
        Value::Object(fields) => Ok(Value::Object(prefix_keys(fields))),
        other => Err(ApiError::Unsupported(format!(
            "{} payload must be an object, got {}",
            payload.operation_type(),
            json_kind(&other)
        ))),
    }
}

fn to_value<T: Serialize>(payload: &T) -> Result<Value, ApiError> {
    Ok(serde_json::to_value(payload)?)
}

fn prefix_keys(fields: Map<String, Value>) -> Map<String, Value> {
    fields.into_iter().map(|(key, value)| (format!("p_{key}"), value)).collect()
}

const fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use barsync_domain::{
        ConsignmentSettlementPayload, CreateSalePayload, PaymentMethod, SaleItemInput,
    };
    use serde_json::json;

    use super::*;

    #[test]
    fn sale_params_are_flat_and_prefixed() {
        let payload = OperationPayload::CreateSale(CreateSalePayload {
            idempotency_key: "k1".into(),
            bar_id: "bar-1".into(),
            items: vec![SaleItemInput {
                product_id: "p-1".into(),
                product_name: None,
                quantity: 2,
                unit_price: 500.0,
            }],
            total: 1000.0,
            payment_method: PaymentMethod::MobileMoney,
            sold_by: "u-1".into(),
            server_id: None,
            ticket_id: None,
            promotion_ids: Vec::new(),
            notes: None,
        });

        let params = rpc_params(&payload).unwrap();
        assert_eq!(params["p_idempotency_key"], json!("k1"));
        assert_eq!(params["p_bar_id"], json!("bar-1"));
        assert_eq!(params["p_total"], json!(1000.0));
        assert_eq!(params["p_payment_method"], json!("mobile_money"));
        assert_eq!(params["p_items"][0]["product_id"], json!("p-1"));
        assert!(params.get("p_notes").is_none());
        assert_eq!(rpc_name(payload.operation_type()), "create_sale_with_promotions");
    }

    #[test]
    fn claim_and_forfeit_share_params_but_not_functions() {
        let settlement = ConsignmentSettlementPayload {
            bar_id: "bar-1".into(),
            consignment_id: "c-1".into(),
            acted_by: "u-1".into(),
        };
        let claim = OperationPayload::ClaimConsignment(settlement.clone());
        let forfeit = OperationPayload::ForfeitConsignment(settlement);

        assert_eq!(rpc_params(&claim).unwrap(), rpc_params(&forfeit).unwrap());
        assert_eq!(rpc_name(claim.operation_type()), "claim_consignment");
        assert_eq!(rpc_name(forfeit.operation_type()), "forfeit_consignment");
    }
}
