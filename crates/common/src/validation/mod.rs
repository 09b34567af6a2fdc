//! Field validation that collects every violation
//!
//! [`Validator`] accumulates `(field path, message)` pairs instead of
//! returning on the first problem, so a caller gets the full list of what is
//! wrong with an input in one pass. Nested objects and array elements are
//! addressed with dotted paths (`items[2].quantity`).

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type ValidationResult<T> = Result<T, ValidationError>;

/// Every field that failed validation, in the order it was checked.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationError {
    pub errors: Vec<FieldError>,
}

impl ValidationError {
    pub fn field(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self { errors: vec![FieldError { field: field.into(), message: message.into() }] }
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn error_count(&self) -> usize {
        self.errors.len()
    }

    /// Errors reported for exactly `field`
    pub fn field_errors(&self, field: &str) -> Vec<&FieldError> {
        self.errors.iter().filter(|e| e.field == field).collect()
    }

    /// Whether any error was reported for `field`
    pub fn has_field(&self, field: &str) -> bool {
        self.errors.iter().any(|e| e.field == field)
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.errors.is_empty() {
            return f.write_str("invalid input");
        }
        for (i, error) in self.errors.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{}: {}", error.field, error.message)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    /// Dotted path from the input root
    pub field: String,
    pub message: String,
}

/// Collects field errors across a whole input
#[derive(Debug, Default)]
pub struct Validator {
    errors: ValidationError,
    /// Segments pushed by `validate_nested`
    path: Vec<String>,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an error for `field`, prefixed by the current nested path
    pub fn add_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        let field = field.into();
        let field = match (self.path.is_empty(), field.is_empty()) {
            (true, _) => field,
            (false, true) => self.path.join("."),
            (false, false) => format!("{}.{field}", self.path.join(".")),
        };
        self.errors.errors.push(FieldError { field, message: message.into() });
    }

    /// Validate a numeric range (inclusive)
    pub fn validate_range<T>(&mut self, field: &str, value: T, min: T, max: T) -> &mut Self
    where
        T: PartialOrd + fmt::Display,
    {
        if value < min || value > max {
            self.add_error(field, format!("must be between {min} and {max}"));
        }
        self
    }

    pub fn validate_min<T>(&mut self, field: &str, value: T, min: T) -> &mut Self
    where
        T: PartialOrd + fmt::Display,
    {
        if value < min {
            self.add_error(field, format!("must be at least {min}"));
        }
        self
    }

    pub fn validate_max<T>(&mut self, field: &str, value: T, max: T) -> &mut Self
    where
        T: PartialOrd + fmt::Display,
    {
        if value > max {
            self.add_error(field, format!("must not exceed {max}"));
        }
        self
    }

    /// Finite and `>= 0`
    pub fn validate_non_negative(&mut self, field: &str, value: f64) -> &mut Self {
        if !value.is_finite() {
            self.add_error(field, "must be a finite number");
        } else if value < 0.0 {
            self.add_error(field, "must not be negative");
        }
        self
    }

    /// Strictly greater than zero
    pub fn validate_positive(&mut self, field: &str, value: i64) -> &mut Self {
        if value <= 0 {
            self.add_error(field, "must be greater than 0");
        }
        self
    }

    pub fn validate_not_empty(&mut self, field: &str, value: &str) -> &mut Self {
        if value.trim().is_empty() {
            self.add_error(field, "cannot be empty");
        }
        self
    }

    /// Parseable UUID of any version
    pub fn validate_uuid(&mut self, field: &str, value: &str) -> &mut Self {
        if Uuid::parse_str(value).is_err() {
            self.add_error(field, "must be a valid UUID");
        }
        self
    }

    /// Value must be one of a closed set
    pub fn validate_one_of(&mut self, field: &str, value: &str, allowed: &[&str]) -> &mut Self {
        if !allowed.contains(&value) {
            self.add_error(field, format!("must be one of: {}", allowed.join(", ")));
        }
        self
    }

    pub fn validate_collection_size<T>(
        &mut self,
        field: &str,
        collection: &[T],
        min: Option<usize>,
        max: Option<usize>,
    ) -> &mut Self {
        let size = collection.len();

        if let Some(min) = min {
            if size < min {
                self.add_error(field, format!("must contain at least {min} items"));
            }
        }

        if let Some(max) = max {
            if size > max {
                self.add_error(field, format!("must not contain more than {max} items"));
            }
        }

        self
    }

    /// Run `f` with `field` pushed onto the path
    pub fn validate_nested<F>(&mut self, field: &str, f: F) -> &mut Self
    where
        F: FnOnce(&mut Self),
    {
        self.path.push(field.to_string());
        f(self);
        self.path.pop();
        self
    }

    pub fn error_count(&self) -> usize {
        self.errors.error_count()
    }

    pub fn finalize(self) -> ValidationResult<()> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self.errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collects_every_violation() {
        let mut v = Validator::new();
        v.validate_uuid("bar_id", "not-a-uuid")
            .validate_non_negative("total", -5.0)
            .validate_positive("quantity", 0)
            .validate_one_of("payment_method", "cheque", &["cash", "card"]);

        let err = v.finalize().unwrap_err();
        assert_eq!(err.error_count(), 4);
        assert!(err.has_field("bar_id"));
        assert!(err.has_field("total"));
        assert!(err.has_field("quantity"));
        assert_eq!(err.field_errors("payment_method")[0].message, "must be one of: cash, card");
    }

    #[test]
    fn nested_paths_are_prefixed() {
        let mut v = Validator::new();
        v.validate_nested("items[1]", |v| {
            v.validate_positive("quantity", -1);
        });
        v.validate_nested("items", |v| {
            v.add_error("", "must contain at least 1 items");
        });

        let err = v.finalize().unwrap_err();
        assert!(err.has_field("items[1].quantity"));
        assert!(err.has_field("items"));
    }

    #[test]
    fn non_finite_numbers_are_rejected() {
        let mut v = Validator::new();
        v.validate_non_negative("total", f64::NAN).validate_non_negative("price", f64::INFINITY);
        assert_eq!(v.error_count(), 2);
    }

    #[test]
    fn clean_input_finalizes_ok() {
        let mut v = Validator::new();
        v.validate_uuid("id", "0191d3a4-6f1e-7c3b-9a57-3f1b2c4d5e6f")
            .validate_range("closing_hour", 6, 0, 23)
            .validate_not_empty("name", "Castel")
            .validate_collection_size("items", &[1, 2], Some(1), None);
        assert_eq!(v.error_count(), 0);
        assert!(v.finalize().is_ok());
    }

    #[test]
    fn display_lists_fields() {
        let err = ValidationError::field("total", "must not be negative");
        assert_eq!(err.to_string(), "total: must not be negative");

        let mut v = Validator::new();
        v.validate_non_negative("total", -1.0).validate_uuid("bar_id", "x");
        assert_eq!(
            v.finalize().unwrap_err().to_string(),
            "total: must not be negative; bar_id: must be a valid UUID"
        );
    }
}
