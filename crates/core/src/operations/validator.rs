//! Shape validation for queued operations
//!
//! Raw JSON is checked field by field before typed deserialization, so a
//! caller gets every violated constraint in one error, addressed by field
//! path (`items[0].quantity`).

use barsync_common::validation::{ValidationError, ValidationResult, Validator};
use barsync_domain::{OperationPayload, OperationType, Return, Sale};
use chrono::{DateTime, NaiveDate};
use serde_json::{Map, Value};

const PAYMENT_METHODS: &[&str] = &["cash", "mobile_money", "card", "credit"];
const RETURN_STATUSES: &[&str] = &["pending", "approved", "rejected", "restocked"];
const RETURN_REASONS: &[&str] =
    &["defective", "expired", "wrong_item", "customer_change", "other"];
const EXPENSE_CATEGORIES: &[&str] =
    &["supply", "water", "electricity", "maintenance", "rent", "other"];
const ADJUSTMENT_REASONS: &[&str] = &["damage", "loss", "inventory", "correction", "other"];

/// Validates operation payloads and the entities built from them.
///
/// Pure and synchronous; never touches storage.
pub struct OperationValidator;

impl OperationValidator {
    /// Validate an untyped payload for `op_type` and turn it into the typed
    /// union. The error lists every violated field constraint.
    pub fn validate(op_type: OperationType, raw: &Value) -> ValidationResult<OperationPayload> {
        let Some(object) = raw.as_object() else {
            return Err(ValidationError::field("payload", "must be an object"));
        };

        let mut validator = Validator::new();
        check_fields(op_type, &mut Fields { v: &mut validator, object });
        validator.finalize()?;

        let tagged = serde_json::json!({ "type": op_type.as_str(), "payload": raw });
        serde_json::from_value(tagged)
            .map_err(|err| ValidationError::field("payload", err.to_string()))
    }

    /// Re-check a payload that was built in code rather than parsed.
    pub fn validate_payload(payload: &OperationPayload) -> ValidationResult<()> {
        let tagged = serde_json::to_value(payload)
            .map_err(|err| ValidationError::field("payload", err.to_string()))?;
        let raw = tagged.get("payload").cloned().unwrap_or(Value::Null);
        Self::validate(payload.operation_type(), &raw).map(|_| ())
    }

    /// Numeric sanity of a sale from any source (server row, buffer, queue).
    pub fn validate_sale(sale: &Sale) -> ValidationResult<()> {
        let mut v = Validator::new();
        v.validate_not_empty("id", &sale.id)
            .validate_not_empty("bar_id", &sale.bar_id)
            .validate_non_negative("total", sale.total);
        if let Some(key) = &sale.idempotency_key {
            v.validate_not_empty("idempotency_key", key);
        }
        for (index, item) in sale.items.iter().enumerate() {
            v.validate_nested(&format!("items[{index}]"), |v| {
                v.validate_positive("quantity", item.quantity)
                    .validate_non_negative("unit_price", item.unit_price);
            });
        }
        v.finalize()
    }

    pub fn validate_return(ret: &Return) -> ValidationResult<()> {
        let mut v = Validator::new();
        v.validate_not_empty("id", &ret.id)
            .validate_not_empty("bar_id", &ret.bar_id)
            .validate_positive("quantity", ret.quantity)
            .validate_non_negative("refund_amount", ret.refund_amount);
        v.finalize()
    }
}

fn check_fields(op_type: OperationType, f: &mut Fields<'_>) {
    f.uuid("bar_id");

    match op_type {
        OperationType::CreateSale => {
            f.idempotency_key();
            f.sale_items();
            f.money("total");
            f.one_of("payment_method", PAYMENT_METHODS);
            f.uuid("sold_by");
            f.optional_uuid("server_id");
            f.optional_uuid("ticket_id");
            f.uuid_list("promotion_ids");
        }
        OperationType::CreateReturn => {
            f.idempotency_key();
            f.uuid("sale_id");
            f.uuid("product_id");
            f.quantity("quantity");
            f.money("refund_amount");
            f.one_of("reason", RETURN_REASONS);
            f.uuid("returned_by");
            f.optional_uuid("server_id");
        }
        OperationType::UpdateReturn => {
            f.uuid("return_id");
            f.one_of("status", RETURN_STATUSES);
            f.uuid("updated_by");
        }
        OperationType::AddExpense => {
            f.idempotency_key();
            f.money("amount");
            f.one_of("category", EXPENSE_CATEGORIES);
            f.date("expense_date");
            f.uuid("created_by");
        }
        OperationType::CreateProduct => {
            f.idempotency_key();
            f.text("name");
            f.money("price");
            f.optional_count("initial_stock");
            f.optional_count("alert_threshold");
            f.optional_uuid("category_id");
        }
        OperationType::UpdateProduct => {
            f.uuid("product_id");
            f.optional_text("name");
            f.optional_money("price");
            f.optional_count("alert_threshold");
        }
        OperationType::DeleteProduct => {
            f.uuid("product_id");
        }
        OperationType::AddSupply => {
            f.idempotency_key();
            f.uuid("product_id");
            f.quantity("quantity");
            f.quantity("lot_size");
            f.money("lot_price");
            f.uuid("created_by");
        }
        OperationType::CreateConsignment => {
            f.idempotency_key();
            f.uuid("sale_id");
            f.uuid("product_id");
            f.quantity("quantity");
            f.money("total_amount");
            f.text("customer_name");
            f.timestamp("expires_at");
            f.uuid("created_by");
        }
        OperationType::ClaimConsignment | OperationType::ForfeitConsignment => {
            f.uuid("consignment_id");
            f.uuid("acted_by");
        }
        OperationType::AddSalary => {
            f.idempotency_key();
            f.uuid("member_id");
            f.money("amount");
            f.period("period");
            f.uuid("paid_by");
        }
        OperationType::CreateTicket => {
            f.idempotency_key();
            f.optional_uuid("server_id");
            f.optional_positive("table_number");
            f.uuid("created_by");
        }
        OperationType::PayTicket => {
            f.uuid("ticket_id");
            f.one_of("payment_method", PAYMENT_METHODS);
            f.uuid("paid_by");
        }
        OperationType::CreateServerMapping => {
            f.idempotency_key();
            f.text("server_name");
            f.uuid("user_id");
        }
        OperationType::CreateStockAdjustment => {
            f.idempotency_key();
            f.uuid("product_id");
            f.nonzero("delta");
            f.one_of("reason", ADJUSTMENT_REASONS);
            f.uuid("adjusted_by");
        }
        OperationType::UpdateBar => {
            f.optional_text("name");
            f.optional_hour("closing_hour");
        }
    }
}

/// Field checks over one JSON object, reporting into a shared validator.
struct Fields<'a> {
    v: &'a mut Validator,
    object: &'a Map<String, Value>,
}

impl<'a> Fields<'a> {
    /// Present and non-null, otherwise records "is required".
    fn required(&mut self, key: &str) -> Option<&'a Value> {
        let object = self.object;
        match object.get(key) {
            None | Some(Value::Null) => {
                self.v.add_error(key, "is required");
                None
            }
            Some(value) => Some(value),
        }
    }

    fn optional(&self, key: &str) -> Option<&'a Value> {
        let object = self.object;
        object.get(key).filter(|value| !value.is_null())
    }

    fn string(&mut self, key: &str, value: &'a Value) -> Option<&'a str> {
        let text = value.as_str();
        if text.is_none() {
            self.v.add_error(key, "must be a string");
        }
        text
    }

    fn integer(&mut self, key: &str, value: &Value) -> Option<i64> {
        let number = value.as_i64();
        if number.is_none() {
            self.v.add_error(key, "must be an integer");
        }
        number
    }

    fn idempotency_key(&mut self) {
        self.text("idempotency_key");
    }

    fn uuid(&mut self, key: &str) {
        if let Some(value) = self.required(key) {
            if let Some(text) = self.string(key, value) {
                self.v.validate_uuid(key, text);
            }
        }
    }

    fn optional_uuid(&mut self, key: &str) {
        if let Some(value) = self.optional(key) {
            if let Some(text) = self.string(key, value) {
                self.v.validate_uuid(key, text);
            }
        }
    }

    fn uuid_list(&mut self, key: &str) {
        let Some(value) = self.optional(key) else {
            return;
        };
        let Some(list) = value.as_array() else {
            self.v.add_error(key, "must be an array");
            return;
        };
        for (index, item) in list.iter().enumerate() {
            let field = format!("{key}[{index}]");
            match item.as_str() {
                Some(text) => {
                    self.v.validate_uuid(&field, text);
                }
                None => self.v.add_error(field, "must be a string"),
            }
        }
    }

    fn text(&mut self, key: &str) {
        if let Some(value) = self.required(key) {
            if let Some(text) = self.string(key, value) {
                self.v.validate_not_empty(key, text);
            }
        }
    }

    fn optional_text(&mut self, key: &str) {
        if let Some(value) = self.optional(key) {
            if let Some(text) = self.string(key, value) {
                self.v.validate_not_empty(key, text);
            }
        }
    }

    fn money(&mut self, key: &str) {
        if let Some(value) = self.required(key) {
            self.non_negative_number(key, value);
        }
    }

    fn optional_money(&mut self, key: &str) {
        if let Some(value) = self.optional(key) {
            self.non_negative_number(key, value);
        }
    }

    fn non_negative_number(&mut self, key: &str, value: &Value) {
        match value.as_f64() {
            Some(number) => {
                self.v.validate_non_negative(key, number);
            }
            None => self.v.add_error(key, "must be a number"),
        }
    }

    /// Strictly positive integer (consumed or moved units).
    fn quantity(&mut self, key: &str) {
        if let Some(value) = self.required(key) {
            if let Some(number) = self.integer(key, value) {
                self.v.validate_positive(key, number);
            }
        }
    }

    fn optional_positive(&mut self, key: &str) {
        if let Some(value) = self.optional(key) {
            if let Some(number) = self.integer(key, value) {
                self.v.validate_positive(key, number);
            }
        }
    }

    fn optional_count(&mut self, key: &str) {
        if let Some(value) = self.optional(key) {
            if let Some(number) = self.integer(key, value) {
                self.v.validate_min(key, number, 0);
            }
        }
    }

    fn nonzero(&mut self, key: &str) {
        if let Some(value) = self.required(key) {
            if self.integer(key, value) == Some(0) {
                self.v.add_error(key, "must not be zero");
            }
        }
    }

    fn optional_hour(&mut self, key: &str) {
        if let Some(value) = self.optional(key) {
            if let Some(hour) = self.integer(key, value) {
                self.v.validate_range(key, hour, 0, 23);
            }
        }
    }

    fn one_of(&mut self, key: &str, allowed: &[&str]) {
        if let Some(value) = self.required(key) {
            if let Some(text) = self.string(key, value) {
                self.v.validate_one_of(key, text, allowed);
            }
        }
    }

    /// RFC 3339 timestamp.
    fn timestamp(&mut self, key: &str) {
        if let Some(value) = self.required(key) {
            if let Some(text) = self.string(key, value) {
                if DateTime::parse_from_rfc3339(text).is_err() {
                    self.v.add_error(key, "must be an RFC 3339 timestamp");
                }
            }
        }
    }

    fn date(&mut self, key: &str) {
        if let Some(value) = self.required(key) {
            if let Some(text) = self.string(key, value) {
                if NaiveDate::parse_from_str(text, "%Y-%m-%d").is_err() {
                    self.v.add_error(key, "must be a date (YYYY-MM-DD)");
                }
            }
        }
    }

    /// `YYYY-MM` pay period.
    fn period(&mut self, key: &str) {
        if let Some(value) = self.required(key) {
            if let Some(text) = self.string(key, value) {
                let valid = text.len() == 7
                    && NaiveDate::parse_from_str(&format!("{text}-01"), "%Y-%m-%d").is_ok();
                if !valid {
                    self.v.add_error(key, "must be a period (YYYY-MM)");
                }
            }
        }
    }

    fn sale_items(&mut self) {
        let Some(value) = self.required("items") else {
            return;
        };
        let Some(items) = value.as_array() else {
            self.v.add_error("items", "must be an array");
            return;
        };
        self.v.validate_collection_size("items", items, Some(1), None);

        for (index, item) in items.iter().enumerate() {
            let path = format!("items[{index}]");
            let Some(object) = item.as_object() else {
                self.v.add_error(path, "must be an object");
                continue;
            };
            self.v.validate_nested(&path, |v| {
                let mut line = Fields { v, object };
                line.uuid("product_id");
                line.quantity("quantity");
                line.money("unit_price");
                line.optional_text("product_name");
            });
        }
    }
}
