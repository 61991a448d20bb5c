//! Convenience re-exports for common query-events usage

pub use crate::event::{ClientEvent, EventType, LogEvent, QueryEvent};
pub use crate::manager::{EventBus, SubscriptionId};
pub use crate::types::EventCallback;
