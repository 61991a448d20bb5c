//! Type definitions for the event bus

use crate::event::ClientEvent;
use std::sync::Arc;

/// Subscriber callback, invoked synchronously on the emitting task
pub type EventCallback = Arc<dyn Fn(&ClientEvent) + Send + Sync>;
