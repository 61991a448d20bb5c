//! Serialization utilities
//!
//! Conversion of loosely typed JSON parameters into bind values, used where no
//! column type is known (raw queries), and the reverse for event payloads.

use crate::types::{PostgresValue, ScalarType};
use serde_json::Value;

/// Guess a bind value from a JSON parameter
pub fn infer_postgres_value(value: &Value) -> PostgresValue {
    match value {
        Value::String(s) => {
            // RFC3339 strings bind as timestamps
            if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(s) {
                PostgresValue::Timestamp(dt.with_timezone(&chrono::Utc))
            } else {
                PostgresValue::Text(s.clone())
            }
        }
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                if i >= i32::MIN as i64 && i <= i32::MAX as i64 {
                    PostgresValue::Integer(i as i32)
                } else {
                    PostgresValue::BigInt(i)
                }
            } else if let Some(f) = n.as_f64() {
                PostgresValue::Float(f)
            } else {
                PostgresValue::Text(n.to_string())
            }
        }
        Value::Bool(b) => PostgresValue::Boolean(*b),
        Value::Null => PostgresValue::Null(ScalarType::String),
        Value::Array(items) if items.iter().all(Value::is_string) => PostgresValue::TextArray(
            items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
        ),
        other => PostgresValue::Json(other.clone()),
    }
}

/// Render bound parameters as the JSON array text carried by query events
pub fn params_to_json(params: &[PostgresValue]) -> String {
    Value::Array(params.iter().map(PostgresValue::to_json).collect()).to_string()
}
