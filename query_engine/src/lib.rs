//! Query Engine - typed data access over PostgreSQL
//!
//! This crate holds everything between a delegate call and the database:
//! static schema metadata, the filter grammar and argument types, SQL
//! generation, execution, transactions and the middleware chain.

/// Conditional debug logging macros
/// These macros only compile in code when the `debug-logging` feature is enabled
#[cfg(feature = "debug-logging")]
#[macro_export]
macro_rules! debug_log {
    ($($arg:tt)*) => {
        tracing::debug!($($arg)*)
    };
}

#[cfg(not(feature = "debug-logging"))]
#[macro_export]
macro_rules! debug_log {
    ($($arg:tt)*) => {};
}

#[cfg(feature = "debug-logging")]
#[macro_export]
macro_rules! trace_log {
    ($($arg:tt)*) => {
        tracing::trace!($($arg)*)
    };
}

#[cfg(not(feature = "debug-logging"))]
#[macro_export]
macro_rules! trace_log {
    ($($arg:tt)*) => {};
}

pub mod delegate;
pub mod dispatch;
pub mod engine;
pub mod errors;
pub mod middleware;
pub mod operation;
pub mod prelude;
pub mod query_builder;
pub mod schema;
pub mod validation;

pub use delegate::Delegate;
pub use dispatch::{Dispatcher, MiddlewareStack};
pub use engine::{Engine, IsolationLevel, RawSql, Session, TransactionOptions};
pub use errors::{codes, ClientError};
pub use middleware::{middleware_fn, FnMiddleware, Middleware, Next};
pub use operation::{Action, BatchPayload, BatchResults, Operation, OperationParams, PendingOperation, QueryArgs};
pub use schema::{Model, ModelDef};
pub use type_mapping::{PostgresValue, ScalarType};
pub use validation::{validate_schema, SchemaError};
