//! Link notifications and the subscription registry.
//!
//! Links report state changes as typed events. Any number of independent
//! observers can register a handler with [`EventHub::subscribe`] or consume an
//! [`EventStream`].
//!
//! Handlers run on whichever thread produced the event (usually the link's
//! supervising task) and must not block.

// ============================================================================
// Imports
// ============================================================================

use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::task::{Context, Poll};

use futures_util::Stream;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tokio::sync::mpsc;

use crate::error::Error;
use crate::identifiers::SubscriptionId;

// ============================================================================
// LinkEvent
// ============================================================================

/// Notification raised by a byte-oriented link.
#[derive(Debug, Clone)]
pub enum LinkEvent {
    /// The transport connected (`true`) or dropped (`false`).
    ConnectedChanged(bool),
    /// `set_enabled` was called. Raised on every call, even without a change.
    EnabledChanged(bool),
    /// A recoverable fault occurred.
    Error {
        /// The triggering fault.
        error: Arc<Error>,
        /// What the link was doing.
        context: String,
    },
    /// A chunk was added to the inbound queue.
    DataReceived,
}

impl LinkEvent {
    /// Builds an error event.
    #[must_use]
    pub fn error(error: Error, context: impl Into<String>) -> Self {
        Self::Error {
            error: Arc::new(error),
            context: context.into(),
        }
    }
}

// ============================================================================
// FramedEvent
// ============================================================================

/// Notification raised by a framed link.
#[derive(Debug, Clone)]
pub enum FramedEvent {
    /// Event forwarded from the underlying byte link.
    Link(LinkEvent),
    /// A complete message was decoded and queued.
    MessageReceived,
}

// ============================================================================
// EventHub
// ============================================================================

/// Event handler callback type.
pub type EventHandler<E> = Arc<dyn Fn(&E) + Send + Sync>;

/// Registry of event handlers keyed by subscription.
pub struct EventHub<E> {
    /// Next subscription counter value.
    next_id: AtomicU64,
    /// Registered handlers.
    handlers: Mutex<FxHashMap<SubscriptionId, EventHandler<E>>>,
}

impl<E> Default for EventHub<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> EventHub<E> {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            handlers: Mutex::new(FxHashMap::default()),
        }
    }

    /// Registers a handler and returns its subscription ID.
    pub fn subscribe<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        let id = SubscriptionId::new(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.handlers.lock().insert(id, Arc::new(handler));
        id
    }

    /// Removes a handler. Returns `false` if it was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.handlers.lock().remove(&id).is_some()
    }

    /// Removes every handler.
    pub fn clear(&self) {
        self.handlers.lock().clear();
    }

    /// Number of registered handlers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.lock().len()
    }

    /// Returns `true` if no handler is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Delivers an event to every handler.
    ///
    /// The handler set is snapshotted first, so handlers may subscribe or
    /// unsubscribe while being called.
    pub fn emit(&self, event: &E) {
        let handlers: Vec<EventHandler<E>> = self.handlers.lock().values().cloned().collect();
        for handler in handlers {
            handler(event);
        }
    }
}

impl<E: Clone + Send + 'static> EventHub<E> {
    /// Subscribes a channel and returns it as a stream.
    ///
    /// The subscription is removed on the first event after the stream is
    /// dropped.
    pub fn stream(self: &Arc<Self>) -> EventStream<E> {
        let (tx, rx) = mpsc::unbounded_channel();
        let hub = Arc::downgrade(self);
        let slot: Arc<Mutex<Option<SubscriptionId>>> = Arc::new(Mutex::new(None));
        let slot_clone = Arc::clone(&slot);

        let id = self.subscribe(move |event: &E| {
            if tx.send(event.clone()).is_err()
                && let Some(hub) = hub.upgrade()
                && let Some(id) = *slot_clone.lock()
            {
                hub.unsubscribe(id);
            }
        });
        *slot.lock() = Some(id);

        EventStream { rx }
    }
}

// ============================================================================
// EventStream
// ============================================================================

/// Async stream of events from one subscription.
pub struct EventStream<E> {
    rx: mpsc::UnboundedReceiver<E>,
}

impl<E> EventStream<E> {
    /// Waits for the next event. Returns `None` once the source is gone.
    pub async fn recv(&mut self) -> Option<E> {
        self.rx.recv().await
    }

    /// Returns a buffered event without waiting.
    pub fn try_recv(&mut self) -> Option<E> {
        self.rx.try_recv().ok()
    }
}

impl<E> Stream for EventStream<E> {
    type Item = E;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<E>> {
        self.rx.poll_recv(cx)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::AtomicUsize;

    use futures_util::StreamExt;

    #[test]
    fn test_multiple_subscribers_all_notified() {
        let hub: EventHub<u32> = EventHub::new();
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));

        let f = Arc::clone(&first);
        hub.subscribe(move |v| {
            f.fetch_add(*v as usize, Ordering::SeqCst);
        });
        let s = Arc::clone(&second);
        hub.subscribe(move |v| {
            s.fetch_add(*v as usize, Ordering::SeqCst);
        });

        hub.emit(&3);

        assert_eq!(first.load(Ordering::SeqCst), 3);
        assert_eq!(second.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_unsubscribe() {
        let hub: EventHub<()> = EventHub::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&calls);
        let id = hub.subscribe(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });

        assert!(hub.unsubscribe(id));
        assert!(!hub.unsubscribe(id));
        hub.emit(&());

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(hub.is_empty());
    }

    #[test]
    fn test_handler_may_unsubscribe_itself() {
        let hub: Arc<EventHub<()>> = Arc::new(EventHub::new());
        let slot = Arc::new(Mutex::new(None));
        let hub_clone = Arc::clone(&hub);
        let slot_clone = Arc::clone(&slot);

        let id = hub.subscribe(move |_| {
            if let Some(id) = *slot_clone.lock() {
                hub_clone.unsubscribe(id);
            }
        });
        *slot.lock() = Some(id);

        hub.emit(&());
        assert!(hub.is_empty());
    }

    #[tokio::test]
    async fn test_stream_receives_events_in_order() {
        let hub: Arc<EventHub<u8>> = Arc::new(EventHub::new());
        let mut stream = hub.stream();

        hub.emit(&1);
        hub.emit(&2);

        assert_eq!(stream.next().await, Some(1));
        assert_eq!(stream.recv().await, Some(2));
        assert_eq!(stream.try_recv(), None);
    }

    #[test]
    fn test_dropped_stream_unsubscribes() {
        let hub: Arc<EventHub<u8>> = Arc::new(EventHub::new());
        let stream = hub.stream();
        assert_eq!(hub.len(), 1);

        drop(stream);
        hub.emit(&1);

        assert!(hub.is_empty());
    }

    #[test]
    fn test_link_event_error_constructor() {
        let event = LinkEvent::error(Error::ConnectionClosed, "receive");
        let LinkEvent::Error { error, context } = event else {
            panic!("expected error event");
        };
        assert!(matches!(*error, Error::ConnectionClosed));
        assert_eq!(context, "receive");
    }
}
