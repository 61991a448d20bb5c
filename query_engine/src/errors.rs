use serde_json::Value;
use thiserror::Error;

/// Every failure surfaced by the client
#[derive(Error, Debug, Clone)]
pub enum ClientError {
    /// The store rejected a well-formed request
    #[error("[{code}] {message}")]
    KnownRequest {
        code: String,
        message: String,
        meta: Value,
    },

    #[error("Unknown request error: {0}")]
    UnknownRequest(String),

    #[error("Engine panic: {0}")]
    EnginePanic(String),

    #[error("[{code}] Initialization error: {message}")]
    Initialization { code: String, message: String },

    #[error("Invalid `{model}.{action}()` invocation: {message}")]
    Validation {
        model: String,
        action: String,
        message: String,
    },

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Store error codes produced by this client
pub mod codes {
    pub const AUTHENTICATION_FAILED: &str = "P1000";
    pub const UNREACHABLE: &str = "P1001";
    pub const DATABASE_MISSING: &str = "P1003";
    pub const SCHEMA_INVALID: &str = "P1012";
    pub const INVALID_URL: &str = "P1013";
    /// Client configuration outside the connection URL, e.g. pool sizing
    pub const INVALID_CONFIG: &str = "P1014";
    pub const SERVER_CLOSED: &str = "P1017";
    pub const UNIQUE_VIOLATION: &str = "P2002";
    pub const FOREIGN_KEY_VIOLATION: &str = "P2003";
    pub const NULL_VIOLATION: &str = "P2011";
    pub const VALUE_OUT_OF_RANGE: &str = "P2020";
    pub const TABLE_MISSING: &str = "P2021";
    pub const COLUMN_MISSING: &str = "P2022";
    pub const INCONSISTENT_DATA: &str = "P2023";
    pub const POOL_TIMEOUT: &str = "P2024";
    pub const NOT_FOUND: &str = "P2025";
    pub const TRANSACTION_API: &str = "P2028";
    pub const WRITE_CONFLICT: &str = "P2034";
}

impl ClientError {
    pub fn known(code: &str, message: impl Into<String>) -> Self {
        ClientError::KnownRequest {
            code: code.to_string(),
            message: message.into(),
            meta: Value::Null,
        }
    }

    pub fn known_with_meta(code: &str, message: impl Into<String>, meta: Value) -> Self {
        ClientError::KnownRequest {
            code: code.to_string(),
            message: message.into(),
            meta,
        }
    }

    pub fn validation(model: &str, action: &str, message: impl Into<String>) -> Self {
        ClientError::Validation {
            model: model.to_string(),
            action: action.to_string(),
            message: message.into(),
        }
    }

    pub fn initialization(code: &str, message: impl Into<String>) -> Self {
        ClientError::Initialization {
            code: code.to_string(),
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::known(codes::NOT_FOUND, message)
    }

    pub fn transaction(message: impl Into<String>) -> Self {
        Self::known(codes::TRANSACTION_API, message)
    }

    /// Store error code of known request and initialization errors
    pub fn code(&self) -> Option<&str> {
        match self {
            ClientError::KnownRequest { code, .. } | ClientError::Initialization { code, .. } => {
                Some(code)
            }
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.code() == Some(codes::NOT_FOUND)
    }

    pub fn is_unique_violation(&self) -> bool {
        self.code() == Some(codes::UNIQUE_VIOLATION)
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, ClientError::Validation { .. })
    }

    /// Map a driver error raised while running a statement
    pub fn from_sqlx(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db) => Self::from_database_error(db.as_ref()),
            sqlx::Error::RowNotFound => Self::not_found("No record was found for the query."),
            sqlx::Error::PoolTimedOut => Self::known(
                codes::POOL_TIMEOUT,
                "Timed out fetching a new connection from the connection pool.",
            ),
            sqlx::Error::PoolClosed => {
                Self::initialization(codes::SERVER_CLOSED, "The connection pool was closed.")
            }
            sqlx::Error::Configuration(e) => Self::initialization(
                codes::INVALID_URL,
                format!("The provided database string is invalid: {}", e),
            ),
            sqlx::Error::Io(e) => Self::initialization(
                codes::UNREACHABLE,
                format!("Can't reach database server: {}", e),
            ),
            sqlx::Error::Tls(e) => Self::initialization(
                codes::UNREACHABLE,
                format!("Error opening a TLS connection: {}", e),
            ),
            sqlx::Error::Protocol(e) => ClientError::EnginePanic(e),
            sqlx::Error::WorkerCrashed => {
                ClientError::EnginePanic("The database worker crashed.".to_string())
            }
            sqlx::Error::ColumnDecode { index, source } => ClientError::Serialization(format!(
                "Could not decode column {}: {}",
                index, source
            )),
            sqlx::Error::Decode(e) => ClientError::Serialization(e.to_string()),
            other => ClientError::UnknownRequest(other.to_string()),
        }
    }

    /// Map a driver error raised while opening a connection
    pub fn from_connect_error(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db) => match db.code().as_deref() {
                Some("28P01") | Some("28000") => Self::initialization(
                    codes::AUTHENTICATION_FAILED,
                    format!("Authentication failed: {}", db.message()),
                ),
                Some("3D000") => Self::initialization(
                    codes::DATABASE_MISSING,
                    format!("Database does not exist: {}", db.message()),
                ),
                _ => Self::initialization(codes::UNREACHABLE, db.message().to_string()),
            },
            sqlx::Error::PoolTimedOut => Self::initialization(
                codes::UNREACHABLE,
                "Can't reach database server: timed out while connecting.",
            ),
            other => Self::from_sqlx(other),
        }
    }

    fn from_database_error(db: &dyn sqlx::error::DatabaseError) -> Self {
        let code = db.code().map(|c| c.into_owned()).unwrap_or_default();
        let constraint = db.constraint().map(str::to_string);
        let message = db.message().to_string();
        let meta = serde_json::json!({
            "sqlstate": code,
            "constraint": constraint,
            "table": db.table(),
        });
        match code.as_str() {
            "23505" => Self::known_with_meta(
                codes::UNIQUE_VIOLATION,
                format!(
                    "Unique constraint failed on the constraint: `{}`",
                    constraint.as_deref().unwrap_or("unknown")
                ),
                meta,
            ),
            "23503" => Self::known_with_meta(
                codes::FOREIGN_KEY_VIOLATION,
                format!(
                    "Foreign key constraint failed on the field: `{}`",
                    constraint.as_deref().unwrap_or("unknown")
                ),
                meta,
            ),
            "23502" => Self::known_with_meta(
                codes::NULL_VIOLATION,
                format!("Null constraint violation: {}", message),
                meta,
            ),
            "22003" => Self::known_with_meta(codes::VALUE_OUT_OF_RANGE, message, meta),
            "22P02" => Self::known_with_meta(codes::INCONSISTENT_DATA, message, meta),
            "42P01" => Self::known_with_meta(codes::TABLE_MISSING, message, meta),
            "42703" => Self::known_with_meta(codes::COLUMN_MISSING, message, meta),
            "40001" | "40P01" => Self::known_with_meta(
                codes::WRITE_CONFLICT,
                "Transaction failed due to a write conflict or a deadlock. Please retry your transaction",
                meta,
            ),
            "25P02" => Self::known_with_meta(
                codes::TRANSACTION_API,
                "Transaction is aborted, commands ignored until end of transaction block.",
                meta,
            ),
            _ => ClientError::UnknownRequest(format!("{} (SQLSTATE {})", message, code)),
        }
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        ClientError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_and_helpers() {
        let err = ClientError::not_found("Record to update not found.");
        assert!(err.is_not_found());
        assert_eq!(err.code(), Some("P2025"));
        assert_eq!(err.to_string(), "[P2025] Record to update not found.");

        let err = ClientError::validation("Product", "findMany", "bad");
        assert!(err.is_validation());
        assert_eq!(err.code(), None);
        assert_eq!(err.to_string(), "Invalid `Product.findMany()` invocation: bad");
    }

    #[test]
    fn test_driver_error_mapping() {
        assert_eq!(
            ClientError::from_sqlx(sqlx::Error::PoolTimedOut).code(),
            Some("P2024")
        );
        assert!(matches!(
            ClientError::from_sqlx(sqlx::Error::WorkerCrashed),
            ClientError::EnginePanic(_)
        ));
        assert!(ClientError::from_sqlx(sqlx::Error::RowNotFound).is_not_found());
        assert_eq!(
            ClientError::from_connect_error(sqlx::Error::PoolTimedOut).code(),
            Some("P1001")
        );
    }
}
