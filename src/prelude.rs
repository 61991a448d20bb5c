//! Convenience re-exports for common shopdb usage
//!
//! ```rust
//! use shopdb::prelude::*;
//! ```

pub use crate::client::{ShopClient, TransactionClient};
pub use crate::models::*;

pub use config::{AppConfig, DatabaseConfig, LogEmit, LogLevel};
pub use query_engine::prelude::*;
pub use query_engine::codes;
pub use query_events::{ClientEvent, EventType, SubscriptionId};

pub use model_derive::model;

pub use chrono::{DateTime, Utc};
pub use serde_json::{json, Value};
