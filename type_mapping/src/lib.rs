//! Unified type mapping between Rust types, JSON payloads and PostgreSQL
//! This crate provides the scalar vocabulary shared by the derive macro and the query engine

pub mod serialize;
pub mod sql;
pub mod types;
pub mod validate;

pub use serialize::{infer_postgres_value, params_to_json};
pub use sql::{is_optional_type, rust_type_to_pg_type, rust_type_to_scalar_variant};
pub use types::{PostgresValue, ScalarType};
pub use validate::{coerce_json, CoercionError};
