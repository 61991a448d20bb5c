//! SQL type conversion utilities
//!
//! Maps Rust field types, as written in model structs, onto scalar kinds.

/// Normalize a type string by dropping whitespace and well-known path prefixes
fn normalize(rust_type: &str) -> String {
    rust_type
        .replace(' ', "")
        .replace("chrono::", "")
        .replace("uuid::", "")
        .replace("std::string::", "")
        .replace("std::vec::", "")
}

/// Strip one level of `Option<...>`
fn unwrap_option(normalized: &str) -> &str {
    normalized
        .strip_prefix("Option<")
        .and_then(|rest| rest.strip_suffix('>'))
        .unwrap_or(normalized)
}

/// Name of the `ScalarType` variant for a Rust field type, if it is a column type
pub fn rust_type_to_scalar_variant(rust_type: &str) -> Option<&'static str> {
    let normalized = normalize(rust_type);
    match unwrap_option(&normalized) {
        "String" => Some("String"),
        "i32" | "i16" | "i8" => Some("Int"),
        "f64" | "f32" => Some("Float"),
        "bool" => Some("Boolean"),
        "DateTime<Utc>" => Some("DateTime"),
        "Uuid" => Some("Uuid"),
        "Vec<String>" => Some("StringList"),
        _ => None,
    }
}

/// Map Rust type names to PostgreSQL column types
pub fn rust_type_to_pg_type(rust_type: &str) -> &'static str {
    match rust_type_to_scalar_variant(rust_type) {
        Some("String") => "TEXT",
        Some("Int") => "INTEGER",
        Some("Float") => "DOUBLE PRECISION",
        Some("Boolean") => "BOOLEAN",
        Some("DateTime") => "TIMESTAMPTZ",
        Some("Uuid") => "UUID",
        Some("StringList") => "TEXT[]",
        _ => "JSONB",
    }
}

/// Check if a Rust type is Optional (nullable in SQL)
pub fn is_optional_type(rust_type: &str) -> bool {
    let normalized = rust_type.replace(' ', "");
    normalized.starts_with("Option<") || normalized.starts_with("std::option::Option<")
}
