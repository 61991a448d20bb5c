//! Type mapping definitions
//!
//! Scalar kinds known to the schema and the typed values bound into queries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Scalar kind of a model column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScalarType {
    String,
    Int,
    Float,
    Boolean,
    DateTime,
    Uuid,
    StringList,
}

impl ScalarType {
    /// PostgreSQL column type used for casts and typed nulls
    pub fn pg_type(&self) -> &'static str {
        match self {
            ScalarType::String => "TEXT",
            ScalarType::Int => "INTEGER",
            ScalarType::Float => "DOUBLE PRECISION",
            ScalarType::Boolean => "BOOLEAN",
            ScalarType::DateTime => "TIMESTAMPTZ",
            ScalarType::Uuid => "UUID",
            ScalarType::StringList => "TEXT[]",
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, ScalarType::Int | ScalarType::Float)
    }

    pub fn is_list(&self) -> bool {
        matches!(self, ScalarType::StringList)
    }

    /// Whether `<`/`>` comparisons are meaningful
    pub fn is_orderable(&self) -> bool {
        !matches!(self, ScalarType::StringList)
    }

    pub fn name(&self) -> &'static str {
        match self {
            ScalarType::String => "String",
            ScalarType::Int => "Int",
            ScalarType::Float => "Float",
            ScalarType::Boolean => "Boolean",
            ScalarType::DateTime => "DateTime",
            ScalarType::Uuid => "Uuid",
            ScalarType::StringList => "String[]",
        }
    }
}

/// A value ready to be bound as a positional query parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PostgresValue {
    Text(String),
    Integer(i32),
    BigInt(i64),
    Float(f64),
    Boolean(bool),
    Uuid(Uuid),
    Timestamp(DateTime<Utc>),
    TextArray(Vec<String>),
    Json(serde_json::Value),
    /// NULL carrying the column type it is bound against
    Null(ScalarType),
}

impl PostgresValue {
    pub fn is_null(&self) -> bool {
        matches!(self, PostgresValue::Null(_))
    }

    /// JSON rendering used in query events
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value;
        match self {
            PostgresValue::Text(s) => Value::String(s.clone()),
            PostgresValue::Integer(i) => Value::from(*i),
            PostgresValue::BigInt(i) => Value::from(*i),
            PostgresValue::Float(f) => Value::from(*f),
            PostgresValue::Boolean(b) => Value::Bool(*b),
            PostgresValue::Uuid(u) => Value::String(u.to_string()),
            PostgresValue::Timestamp(t) => Value::String(t.to_rfc3339()),
            PostgresValue::TextArray(items) => {
                Value::Array(items.iter().cloned().map(Value::String).collect())
            }
            PostgresValue::Json(v) => v.clone(),
            PostgresValue::Null(_) => Value::Null,
        }
    }
}

impl From<String> for PostgresValue {
    fn from(val: String) -> Self {
        PostgresValue::Text(val)
    }
}

impl From<&str> for PostgresValue {
    fn from(val: &str) -> Self {
        PostgresValue::Text(val.to_string())
    }
}

impl From<i32> for PostgresValue {
    fn from(val: i32) -> Self {
        PostgresValue::Integer(val)
    }
}

impl From<i64> for PostgresValue {
    fn from(val: i64) -> Self {
        PostgresValue::BigInt(val)
    }
}

impl From<f64> for PostgresValue {
    fn from(val: f64) -> Self {
        PostgresValue::Float(val)
    }
}

impl From<bool> for PostgresValue {
    fn from(val: bool) -> Self {
        PostgresValue::Boolean(val)
    }
}

impl From<Uuid> for PostgresValue {
    fn from(val: Uuid) -> Self {
        PostgresValue::Uuid(val)
    }
}

impl From<DateTime<Utc>> for PostgresValue {
    fn from(val: DateTime<Utc>) -> Self {
        PostgresValue::Timestamp(val)
    }
}

impl From<Vec<String>> for PostgresValue {
    fn from(val: Vec<String>) -> Self {
        PostgresValue::TextArray(val)
    }
}

impl From<serde_json::Value> for PostgresValue {
    fn from(val: serde_json::Value) -> Self {
        PostgresValue::Json(val)
    }
}
