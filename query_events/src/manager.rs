use crate::event::{ClientEvent, EventType};
use crate::types::EventCallback;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tracing::warn;

/// Handle returned by `subscribe`, used to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct Subscriber {
    id: SubscriptionId,
    event_type: EventType,
    callback: EventCallback,
}

/// Event bus delivering client events to subscribers
pub struct EventBus {
    subscribers: RwLock<Vec<Subscriber>>,
    next_id: AtomicU64,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            subscribers: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register a callback for one event kind
    pub fn subscribe<F>(&self, event_type: EventType, callback: F) -> SubscriptionId
    where
        F: Fn(&ClientEvent) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        if let Ok(mut subscribers) = self.subscribers.write() {
            subscribers.push(Subscriber {
                id,
                event_type,
                callback: Arc::new(callback),
            });
        }
        id
    }

    /// Remove a subscription; returns whether it existed
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        match self.subscribers.write() {
            Ok(mut subscribers) => {
                let before = subscribers.len();
                subscribers.retain(|s| s.id != id);
                subscribers.len() != before
            }
            Err(_) => false,
        }
    }

    /// Emit event to all subscribers of its kind
    pub fn emit(&self, event: &ClientEvent) {
        let event_type = event.event_type();
        // Callbacks run outside the lock so they may subscribe themselves
        let callbacks: Vec<EventCallback> = match self.subscribers.read() {
            Ok(subscribers) => subscribers
                .iter()
                .filter(|s| s.event_type == event_type)
                .map(|s| Arc::clone(&s.callback))
                .collect(),
            Err(_) => {
                warn!(target: "shopdb::events", "subscriber list poisoned; dropping {:?} event", event_type);
                return;
            }
        };
        for callback in callbacks {
            callback(event);
        }
    }

    pub fn has_subscribers(&self, event_type: EventType) -> bool {
        self.subscribers
            .read()
            .map(|s| s.iter().any(|s| s.event_type == event_type))
            .unwrap_or(false)
    }

    /// Get number of registered subscriptions
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().map(|s| s.len()).unwrap_or(0)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::QueryEvent;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    #[test]
    fn test_emit_only_reaches_matching_kind() {
        let bus = EventBus::new();
        let queries = Arc::new(AtomicUsize::new(0));
        let errors = Arc::new(AtomicUsize::new(0));

        let q = Arc::clone(&queries);
        bus.subscribe(EventType::Query, move |_| {
            q.fetch_add(1, Ordering::SeqCst);
        });
        let e = Arc::clone(&errors);
        bus.subscribe(EventType::Error, move |_| {
            e.fetch_add(1, Ordering::SeqCst);
        });

        bus.emit(&ClientEvent::Query(QueryEvent::new("SELECT 1", &[], Duration::ZERO)));
        bus.emit(&ClientEvent::Query(QueryEvent::new("SELECT 2", &[], Duration::ZERO)));
        bus.emit(&ClientEvent::log(EventType::Error, "boom", "test"));

        assert_eq!(queries.load(Ordering::SeqCst), 2);
        assert_eq!(errors.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unsubscribe() {
        let bus = EventBus::new();
        let id = bus.subscribe(EventType::Info, |_| {});
        assert!(bus.has_subscribers(EventType::Info));
        assert!(bus.unsubscribe(id));
        assert!(!bus.unsubscribe(id));
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn test_callback_may_subscribe_during_emit() {
        let bus = Arc::new(EventBus::new());
        let inner = Arc::clone(&bus);
        bus.subscribe(EventType::Info, move |_| {
            inner.subscribe(EventType::Warn, |_| {});
        });
        bus.emit(&ClientEvent::log(EventType::Info, "hello", "test"));
        assert_eq!(bus.subscriber_count(), 2);
    }
}
