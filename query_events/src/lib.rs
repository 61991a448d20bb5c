//! Event bus for client observability
//!
//! This crate carries query and log events from the client to
//! subscribers registered through `on(...)`.

pub mod event;
pub mod manager;
pub mod prelude;
pub mod types;

pub use event::{ClientEvent, EventType, LogEvent, QueryEvent, QUERY_TARGET};
pub use manager::{EventBus, SubscriptionId};
pub use types::EventCallback;
