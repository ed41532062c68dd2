//! In-process publish/subscribe for feed events.
//!
//! Handlers run synchronously on the publishing task, in the order they were
//! registered. A panicking handler is contained: the remaining handlers still
//! receive the event and the publisher carries on.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use tracing::{error, trace};

use super::types::{EventKind, FeedEvent};
use crate::feed::FeedEntry;
use crate::FeedwatchError;

type Handler = Arc<dyn Fn(&FeedEvent) + Send + Sync>;

/// Identifies a registered handler so it can be removed again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct Subscriber {
    id: SubscriptionId,
    kind: EventKind,
    handler: Handler,
}

/// Typed event bus with per-kind subscriptions.
pub struct EventBus {
    next_id: AtomicU64,
    subscribers: RwLock<Vec<Subscriber>>,
}

impl EventBus {
    /// Create an empty bus.
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            subscribers: RwLock::new(Vec::new()),
        }
    }

    /// Register `handler` for every event of `kind`.
    pub fn subscribe<F>(&self, kind: EventKind, handler: F) -> SubscriptionId
    where
        F: Fn(&FeedEvent) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Subscriber {
                id,
                kind,
                handler: Arc::new(handler),
            });
        id
    }

    /// Register a handler receiving the new entries of each detected change.
    pub fn on_new_items<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&[FeedEntry]) + Send + Sync + 'static,
    {
        self.subscribe(EventKind::NewItems, move |event| {
            if let FeedEvent::NewItems(entries) = event {
                handler(entries.as_slice());
            }
        })
    }

    /// Register a handler receiving poll failures.
    pub fn on_error<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&FeedwatchError) + Send + Sync + 'static,
    {
        self.subscribe(EventKind::Error, move |event| {
            if let FeedEvent::Error(err) = event {
                handler(err);
            }
        })
    }

    /// Register a handler receiving `(name, url)` when polling starts.
    pub fn on_started<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&str, &str) + Send + Sync + 'static,
    {
        self.subscribe(EventKind::Started, move |event| {
            if let FeedEvent::Started { name, url } = event {
                handler(name.as_str(), url.as_str());
            }
        })
    }

    /// Remove a handler.
    ///
    /// Returns true if the subscription existed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self
            .subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let before = subscribers.len();
        subscribers.retain(|s| s.id != id);
        subscribers.len() != before
    }

    /// Number of handlers registered for `kind`.
    pub fn subscriber_count(&self, kind: EventKind) -> usize {
        self.subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|s| s.kind == kind)
            .count()
    }

    /// Deliver `event` to every handler of its kind.
    ///
    /// Returns the number of handlers that completed without panicking.
    pub fn publish(&self, event: FeedEvent) -> usize {
        let kind = event.kind();

        // Snapshot so handlers may subscribe or unsubscribe while being called.
        let handlers: Vec<Handler> = self
            .subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|s| s.kind == kind)
            .map(|s| Arc::clone(&s.handler))
            .collect();

        trace!(kind = %kind, handlers = handlers.len(), "publishing event");

        let mut delivered = 0;
        for handler in handlers {
            match panic::catch_unwind(AssertUnwindSafe(|| handler(&event))) {
                Ok(()) => delivered += 1,
                Err(payload) => {
                    error!(kind = %kind, "event handler panicked: {}", panic_message(&*payload));
                }
            }
        }
        delivered
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = self
            .subscribers
            .read()
            .map(|s| s.len())
            .unwrap_or_default();
        f.debug_struct("EventBus")
            .field("subscribers", &count)
            .finish()
    }
}

/// Text of a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s
    } else {
        "non-string panic payload"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn entry(guid: &str) -> FeedEntry {
        FeedEntry::new(guid).with_title(format!("title {}", guid))
    }

    #[test]
    fn test_delivery_in_insertion_order() {
        let bus = EventBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for n in 0..3 {
            let seen = Arc::clone(&seen);
            bus.on_new_items(move |_| seen.lock().unwrap().push(n));
        }

        let delivered = bus.publish(FeedEvent::NewItems(vec![entry("a")]));
        assert_eq!(delivered, 3);
        assert_eq!(*seen.lock().unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn test_only_matching_kind_is_notified() {
        let bus = EventBus::new();
        let items = Arc::new(Mutex::new(0));
        let errors = Arc::new(Mutex::new(Vec::new()));

        {
            let items = Arc::clone(&items);
            bus.on_new_items(move |entries| *items.lock().unwrap() += entries.len());
        }
        {
            let errors = Arc::clone(&errors);
            bus.on_error(move |err| errors.lock().unwrap().push(err.to_string()));
        }

        bus.publish(FeedEvent::Error(FeedwatchError::Fetch("timeout".into())));
        assert_eq!(*items.lock().unwrap(), 0);
        assert_eq!(*errors.lock().unwrap(), vec!["fetch error: timeout"]);

        bus.publish(FeedEvent::NewItems(vec![entry("a"), entry("b")]));
        assert_eq!(*items.lock().unwrap(), 2);
        assert_eq!(errors.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_unsubscribe() {
        let bus = EventBus::new();
        let count = Arc::new(Mutex::new(0));

        let id = {
            let count = Arc::clone(&count);
            bus.on_new_items(move |_| *count.lock().unwrap() += 1)
        };
        assert_eq!(bus.subscriber_count(EventKind::NewItems), 1);

        bus.publish(FeedEvent::NewItems(vec![entry("a")]));
        assert!(bus.unsubscribe(id));
        assert!(!bus.unsubscribe(id));
        bus.publish(FeedEvent::NewItems(vec![entry("b")]));

        assert_eq!(*count.lock().unwrap(), 1);
        assert_eq!(bus.subscriber_count(EventKind::NewItems), 0);
    }

    #[test]
    fn test_panicking_handler_is_isolated() {
        let bus = EventBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        {
            let seen = Arc::clone(&seen);
            bus.on_new_items(move |_| seen.lock().unwrap().push("first"));
        }
        bus.on_new_items(|_| panic!("subscriber blew up"));
        {
            let seen = Arc::clone(&seen);
            bus.on_new_items(move |_| seen.lock().unwrap().push("third"));
        }

        let delivered = bus.publish(FeedEvent::NewItems(vec![entry("a")]));
        assert_eq!(delivered, 2);
        assert_eq!(*seen.lock().unwrap(), vec!["first", "third"]);

        // The bus keeps working after a panic
        let delivered = bus.publish(FeedEvent::NewItems(vec![entry("b")]));
        assert_eq!(delivered, 2);
        assert_eq!(seen.lock().unwrap().len(), 4);
    }

    #[test]
    fn test_handler_may_subscribe_during_publish() {
        let bus = Arc::new(EventBus::new());
        let weak = Arc::downgrade(&bus);

        bus.on_new_items(move |_| {
            if let Some(bus) = weak.upgrade() {
                bus.on_error(|_| {});
            }
        });

        bus.publish(FeedEvent::NewItems(vec![entry("a")]));
        assert_eq!(bus.subscriber_count(EventKind::Error), 1);
    }

    #[test]
    fn test_on_started_receives_name_and_url() {
        let bus = EventBus::new();
        let seen = Arc::new(Mutex::new(None));
        {
            let seen = Arc::clone(&seen);
            bus.on_started(move |name, url| {
                *seen.lock().unwrap() = Some((name.to_string(), url.to_string()));
            });
        }

        bus.publish(FeedEvent::Started {
            name: "episodes".into(),
            url: "https://example.com/episodes".into(),
        });

        assert_eq!(
            seen.lock().unwrap().clone(),
            Some((
                "episodes".to_string(),
                "https://example.com/episodes".to_string()
            ))
        );
    }

    #[test]
    fn test_publish_without_subscribers() {
        let bus = EventBus::default();
        assert_eq!(bus.publish(FeedEvent::NewItems(vec![])), 0);
    }
}
