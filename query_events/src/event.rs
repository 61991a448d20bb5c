//! Client event types and definitions
//!
//! This module defines the events that flow from the query engine
//! to `on(...)` subscribers.

use chrono::{DateTime, Utc};
use config::LogLevel;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use type_mapping::{params_to_json, PostgresValue};

/// Target attached to query events
pub const QUERY_TARGET: &str = "shopdb::query";

/// Event kinds a subscriber can register for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    Query,
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for EventType {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Query => EventType::Query,
            LogLevel::Info => EventType::Info,
            LogLevel::Warn => EventType::Warn,
            LogLevel::Error => EventType::Error,
        }
    }
}

/// One executed statement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryEvent {
    pub timestamp: DateTime<Utc>,
    pub query: String,
    /// Bound parameters as a JSON array
    pub params: String,
    pub duration_ms: u64,
    pub target: String,
}

/// A log line routed to subscribers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEvent {
    pub timestamp: DateTime<Utc>,
    pub message: String,
    pub target: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ClientEvent {
    Query(QueryEvent),
    Info(LogEvent),
    Warn(LogEvent),
    Error(LogEvent),
}

impl QueryEvent {
    pub fn new(query: impl Into<String>, params: &[PostgresValue], duration: Duration) -> Self {
        Self {
            timestamp: Utc::now(),
            query: query.into(),
            params: params_to_json(params),
            duration_ms: duration.as_millis() as u64,
            target: QUERY_TARGET.to_string(),
        }
    }
}

impl LogEvent {
    pub fn new(message: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            message: message.into(),
            target: target.into(),
        }
    }
}

impl ClientEvent {
    pub fn event_type(&self) -> EventType {
        match self {
            ClientEvent::Query(_) => EventType::Query,
            ClientEvent::Info(_) => EventType::Info,
            ClientEvent::Warn(_) => EventType::Warn,
            ClientEvent::Error(_) => EventType::Error,
        }
    }

    /// Build a log event of the given non-query kind
    pub fn log(event_type: EventType, message: impl Into<String>, target: impl Into<String>) -> Self {
        let event = LogEvent::new(message, target);
        match event_type {
            EventType::Info | EventType::Query => ClientEvent::Info(event),
            EventType::Warn => ClientEvent::Warn(event),
            EventType::Error => ClientEvent::Error(event),
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            ClientEvent::Query(e) => e.timestamp,
            ClientEvent::Info(e) | ClientEvent::Warn(e) | ClientEvent::Error(e) => e.timestamp,
        }
    }

    pub fn as_query(&self) -> Option<&QueryEvent> {
        match self {
            ClientEvent::Query(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_log(&self) -> Option<&LogEvent> {
        match self {
            ClientEvent::Query(_) => None,
            ClientEvent::Info(e) | ClientEvent::Warn(e) | ClientEvent::Error(e) => Some(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use type_mapping::ScalarType;

    #[test]
    fn test_query_event_fields() {
        let event = QueryEvent::new(
            "SELECT 1 WHERE \"name\" = $1",
            &[PostgresValue::Text("Shoes".into()), PostgresValue::Null(ScalarType::Int)],
            Duration::from_millis(12),
        );
        assert_eq!(event.params, r#"["Shoes",null]"#);
        assert_eq!(event.duration_ms, 12);
        assert_eq!(event.target, QUERY_TARGET);
    }

    #[test]
    fn test_log_event_kind() {
        let event = ClientEvent::log(EventType::Warn, "slow transaction", "shopdb::tx");
        assert_eq!(event.event_type(), EventType::Warn);
        assert_eq!(event.as_log().map(|e| e.message.as_str()), Some("slow transaction"));
        assert!(event.as_query().is_none());
    }

    #[test]
    fn test_level_mapping() {
        assert_eq!(EventType::from(LogLevel::Query), EventType::Query);
        assert_eq!(EventType::from(LogLevel::Error), EventType::Error);
    }

    #[test]
    fn test_event_type_serializes_lowercase() {
        assert_eq!(serde_json::to_value(EventType::Query).unwrap(), serde_json::json!("query"));
        let parsed: EventType = serde_json::from_str("\"warn\"").unwrap();
        assert_eq!(parsed, EventType::Warn);
    }
}
