//! Validation utilities for type mapping
//!
//! Coerces JSON values supplied by callers into bind values of a known column type.

use crate::types::{PostgresValue, ScalarType};
use chrono::{DateTime, Utc};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Error)]
#[error("expected {expected}, got {found}")]
pub struct CoercionError {
    pub expected: &'static str,
    pub found: String,
}

impl CoercionError {
    fn new(expected: ScalarType, value: &Value) -> Self {
        let found = match value {
            Value::Null => "null".to_string(),
            Value::Bool(_) => "Boolean".to_string(),
            Value::Number(n) => format!("number {}", n),
            Value::String(s) => format!("string {:?}", s),
            Value::Array(_) => "list".to_string(),
            Value::Object(_) => "object".to_string(),
        };
        Self {
            expected: expected.name(),
            found,
        }
    }
}

/// Coerce a JSON value into a bind value for a column of type `scalar`
///
/// `null` becomes a typed NULL; nullability is checked by the caller.
pub fn coerce_json(value: &Value, scalar: ScalarType) -> Result<PostgresValue, CoercionError> {
    if value.is_null() {
        return Ok(PostgresValue::Null(scalar));
    }
    let err = || CoercionError::new(scalar, value);
    match scalar {
        ScalarType::String => value
            .as_str()
            .map(|s| PostgresValue::Text(s.to_string()))
            .ok_or_else(err),
        ScalarType::Int => value
            .as_i64()
            .and_then(|i| i32::try_from(i).ok())
            .map(PostgresValue::Integer)
            .ok_or_else(err),
        ScalarType::Float => value.as_f64().map(PostgresValue::Float).ok_or_else(err),
        ScalarType::Boolean => value.as_bool().map(PostgresValue::Boolean).ok_or_else(err),
        ScalarType::DateTime => value
            .as_str()
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| PostgresValue::Timestamp(dt.with_timezone(&Utc)))
            .ok_or_else(err),
        ScalarType::Uuid => value
            .as_str()
            .and_then(|s| Uuid::parse_str(s).ok())
            .map(PostgresValue::Uuid)
            .ok_or_else(err),
        ScalarType::StringList => match value {
            Value::Array(items) => items
                .iter()
                .map(|item| item.as_str().map(str::to_string))
                .collect::<Option<Vec<_>>>()
                .map(PostgresValue::TextArray)
                .ok_or_else(err),
            _ => Err(err()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_coerce_scalars() {
        assert_eq!(
            coerce_json(&json!("Shoes"), ScalarType::String).unwrap(),
            PostgresValue::Text("Shoes".into())
        );
        assert_eq!(
            coerce_json(&json!(42), ScalarType::Int).unwrap(),
            PostgresValue::Integer(42)
        );
        assert_eq!(
            coerce_json(&json!(3), ScalarType::Float).unwrap(),
            PostgresValue::Float(3.0)
        );
        assert!(matches!(
            coerce_json(&json!("2024-05-01T10:00:00+02:00"), ScalarType::DateTime).unwrap(),
            PostgresValue::Timestamp(_)
        ));
    }

    #[test]
    fn test_coerce_rejects_mismatch() {
        assert!(coerce_json(&json!("12"), ScalarType::Int).is_err());
        assert!(coerce_json(&json!(1.5), ScalarType::Int).is_err());
        assert!(coerce_json(&json!("not-a-uuid"), ScalarType::Uuid).is_err());
        assert!(coerce_json(&json!(["a", 1]), ScalarType::StringList).is_err());
        let err = coerce_json(&json!(true), ScalarType::String).unwrap_err();
        assert_eq!(err.to_string(), "expected String, got Boolean");
    }

    #[test]
    fn test_null_is_typed() {
        assert_eq!(
            coerce_json(&Value::Null, ScalarType::Float).unwrap(),
            PostgresValue::Null(ScalarType::Float)
        );
    }
}
