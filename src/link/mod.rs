//! Byte-oriented links.
//!
//! A [`Link`] is an enable/connect/reconnect-aware channel to one remote
//! device. Each link owns:
//! - One supervising task (exclusive owner of the transport)
//! - One bounded inbound queue of received chunks
//! - One event registry for status notifications
//!
//! # Example
//!
//! ```no_run
//! use device_link::{Link, LinkEvent};
//!
//! # async fn example() -> device_link::Result<()> {
//! let link = Link::builder().tcp("192.168.1.20", 4001).build()?;
//!
//! link.subscribe(|event| {
//!     if let LinkEvent::ConnectedChanged(up) = event {
//!         println!("connected: {up}");
//!     }
//! });
//!
//! link.send(b"PING\r".to_vec());
//! while let Some(chunk) = link.receive()? {
//!     println!("{chunk:?}");
//! }
//!
//! link.dispose();
//! # Ok(())
//! # }
//! ```
//!
//! # Disposal
//!
//! [`Link::dispose`] is explicit. After it, `send` and `set_enabled` are
//! silent no-ops while `receive` fails with [`Error::Disposed`].

// ============================================================================
// Submodules
// ============================================================================

/// Fluent link configuration.
pub mod builder;

/// Connection and enabled state.
pub mod status;

mod supervisor;

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::{Arc, Weak};

use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::{debug, info, trace};

use crate::error::{Error, Result};
use crate::events::{EventHub, EventStream, LinkEvent};
use crate::identifiers::{LinkId, SubscriptionId};
use crate::options::LinkOptions;
use crate::queue::InboundQueue;
use crate::settings::LinkSettings;
use crate::transport::{self, Transport, TransportKind};

use self::status::{ConnectionState, LinkSnapshot, LinkStatus};
use self::supervisor::{Command, Supervisor};

// ============================================================================
// Re-exports
// ============================================================================

pub use builder::LinkBuilder;

// ============================================================================
// Types
// ============================================================================

/// State shared between link handles and the supervisor.
pub(crate) struct LinkShared {
    /// Link identifier for logs.
    pub(crate) id: LinkId,
    /// Connection/enabled/disposed flags.
    pub(crate) status: LinkStatus,
    /// Received chunks.
    pub(crate) queue: InboundQueue<Vec<u8>>,
    /// Notification registry.
    pub(crate) events: Arc<EventHub<LinkEvent>>,
}

/// Internal state behind a [`Link`] handle.
struct LinkInner {
    /// State shared with the supervisor.
    shared: Arc<LinkShared>,
    /// Transport settings.
    settings: LinkSettings,
    /// Transport kind.
    kind: TransportKind,
    /// Commands to the supervisor.
    command_tx: mpsc::UnboundedSender<Command>,
}

// ============================================================================
// Link
// ============================================================================

/// Handle to a supervised link.
///
/// Cheap to clone; all clones drive the same link. When the last clone is
/// dropped the supervisor closes the transport and exits.
#[derive(Clone)]
pub struct Link {
    inner: Arc<LinkInner>,
}

impl fmt::Debug for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Link")
            .field("id", &self.inner.shared.id)
            .field("settings", &self.inner.settings)
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Link - Constructors
// ============================================================================

impl Link {
    /// Creates a builder for configuring a link.
    #[inline]
    #[must_use]
    pub fn builder() -> LinkBuilder {
        LinkBuilder::new()
    }

    /// Creates a link for `settings` and starts its supervisor.
    ///
    /// If `enabled` is `true` the first connect attempt starts immediately.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if settings or options are invalid
    /// - [`Error::Config`] if called outside a tokio runtime
    pub fn open(settings: LinkSettings, options: LinkOptions, enabled: bool) -> Result<Self> {
        settings.validate()?;
        let transport = transport::from_settings(&settings);
        Self::with_transport(settings, transport, options, enabled)
    }

    /// Creates a link over a caller-supplied transport.
    ///
    /// `settings` only describes the endpoint for [`address`](Self::address)
    /// and [`port`](Self::port); `transport` does the I/O.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if options are invalid
    /// - [`Error::Config`] if called outside a tokio runtime
    pub fn with_transport(
        settings: LinkSettings,
        transport: Arc<dyn Transport>,
        options: LinkOptions,
        enabled: bool,
    ) -> Result<Self> {
        options.validate()?;

        let runtime = Handle::try_current()
            .map_err(|_| Error::config("a link must be created inside a tokio runtime"))?;

        let shared = Arc::new(LinkShared {
            id: LinkId::generate(),
            status: LinkStatus::new(enabled),
            queue: InboundQueue::new(options.queue_capacity),
            events: Arc::new(EventHub::new()),
        });

        let kind = transport.kind();
        let command_tx = Supervisor::spawn(&runtime, Arc::clone(&shared), transport, options);

        debug!(link = %shared.id, settings = %settings, enabled, "Link created");

        Ok(Self {
            inner: Arc::new(LinkInner {
                shared,
                settings,
                kind,
                command_tx,
            }),
        })
    }
}

// ============================================================================
// Link - Data
// ============================================================================

impl Link {
    /// Queues `bytes` for transmission.
    ///
    /// Silently does nothing while disabled or after disposal. While enabled
    /// but not connected the bytes are dropped and [`Error::NotConnected`] is
    /// reported. Write faults are reported through [`LinkEvent::Error`] and
    /// trigger a reconnect.
    pub fn send(&self, bytes: impl Into<Vec<u8>>) {
        let status = &self.inner.shared.status;
        if status.is_disposed() || !status.is_enabled() {
            trace!(link = %self.id(), "Send ignored on inactive link");
            return;
        }

        let _ = self.inner.command_tx.send(Command::Send(bytes.into()));
    }

    /// Pops the oldest received chunk.
    ///
    /// Returns `Ok(None)` while disabled (nothing is dequeued) or when the
    /// queue is empty.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Disposed`] after [`dispose`](Self::dispose).
    pub fn receive(&self) -> Result<Option<Vec<u8>>> {
        let shared = &self.inner.shared;
        if shared.status.is_disposed() {
            return Err(Error::Disposed);
        }
        if !shared.status.is_enabled() {
            return Ok(None);
        }
        Ok(shared.queue.pop())
    }

    /// Returns `true` if received chunks are waiting.
    #[inline]
    #[must_use]
    pub fn has_data(&self) -> bool {
        self.inner.shared.queue.has_data()
    }

    /// Total chunks evicted by queue overflow.
    #[inline]
    #[must_use]
    pub fn overflow_count(&self) -> u64 {
        self.inner.shared.queue.overflow_count()
    }
}

// ============================================================================
// Link - Lifecycle
// ============================================================================

impl Link {
    /// Enables or disables the link.
    ///
    /// Raises [`LinkEvent::EnabledChanged`] on every call. Enabling starts a
    /// connect if needed; disabling cancels pending connects and closes stream
    /// transports. No-op after disposal.
    pub fn set_enabled(&self, enabled: bool) {
        let shared = &self.inner.shared;
        if shared.status.is_disposed() {
            return;
        }

        shared.status.set_enabled(enabled);
        let _ = self.inner.command_tx.send(Command::SetEnabled(enabled));

        info!(link = %shared.id, enabled, "Link enabled state set");
        shared.events.emit(&LinkEvent::EnabledChanged(enabled));
    }

    /// Shuts the link down for good.
    ///
    /// Marks it disposed, closes the transport, clears the inbound queue and
    /// drops every subscription. Calling it again does nothing.
    pub fn dispose(&self) {
        let shared = &self.inner.shared;
        if !shared.status.mark_disposed() {
            return;
        }

        shared.status.set_enabled(false);
        let _ = self.inner.command_tx.send(Command::Shutdown);
        shared.queue.clear();
        shared.events.clear();

        info!(link = %shared.id, "Link disposed");
    }
}

// ============================================================================
// Link - Status
// ============================================================================

impl Link {
    /// Link identifier.
    #[inline]
    #[must_use]
    pub fn id(&self) -> LinkId {
        self.inner.shared.id
    }

    /// Returns `true` if the link is enabled.
    #[inline]
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.inner.shared.status.is_enabled()
    }

    /// Returns `true` if the transport is open.
    #[inline]
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Returns `true` once [`dispose`](Self::dispose) has been called.
    #[inline]
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.inner.shared.status.is_disposed()
    }

    /// Current connection state.
    #[inline]
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.inner.shared.status.state()
    }

    /// Snapshot of all status flags.
    #[inline]
    #[must_use]
    pub fn status(&self) -> LinkSnapshot {
        self.inner.shared.status.snapshot()
    }

    /// Transport settings.
    #[inline]
    #[must_use]
    pub fn settings(&self) -> &LinkSettings {
        &self.inner.settings
    }

    /// Transport kind.
    #[inline]
    #[must_use]
    pub fn kind(&self) -> TransportKind {
        self.inner.kind
    }

    /// Remote address, or the port name for serial links.
    #[inline]
    #[must_use]
    pub fn address(&self) -> &str {
        self.inner.settings.address()
    }

    /// Remote port, or 0 for serial links.
    #[inline]
    #[must_use]
    pub fn port(&self) -> u16 {
        self.inner.settings.port()
    }
}

// ============================================================================
// Link - Events
// ============================================================================

impl Link {
    /// Registers an event handler.
    ///
    /// Handlers run on the supervisor task (or the caller of `set_enabled`)
    /// and must not block.
    pub fn subscribe<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&LinkEvent) + Send + Sync + 'static,
    {
        self.inner.shared.events.subscribe(handler)
    }

    /// Removes an event handler.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.inner.shared.events.unsubscribe(id)
    }

    /// Returns a stream of subsequent events.
    #[must_use]
    pub fn events(&self) -> EventStream<LinkEvent> {
        self.inner.shared.events.stream()
    }

    /// Creates a handle that does not keep the link alive.
    #[must_use]
    pub fn downgrade(&self) -> WeakLink {
        WeakLink {
            inner: Arc::downgrade(&self.inner),
        }
    }
}

// ============================================================================
// WeakLink
// ============================================================================

/// Non-owning link handle, used by event handlers that must not form cycles.
#[derive(Clone)]
pub struct WeakLink {
    inner: Weak<LinkInner>,
}

impl WeakLink {
    /// Upgrades to a [`Link`] if it is still alive.
    #[must_use]
    pub fn upgrade(&self) -> Option<Link> {
        self.inner.upgrade().map(|inner| Link { inner })
    }
}

impl fmt::Debug for WeakLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakLink").finish_non_exhaustive()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use tokio::time::{sleep, timeout};

    use crate::transport::mock::{MockState, MockTransport};

    const WAIT: Duration = Duration::from_secs(2);

    fn mock_link(options: LinkOptions, enabled: bool) -> (Link, Arc<MockState>) {
        mock_link_with(MockTransport::new(), options, enabled)
    }

    fn mock_link_with(
        transport: MockTransport,
        options: LinkOptions,
        enabled: bool,
    ) -> (Link, Arc<MockState>) {
        let state = Arc::clone(&transport.state);
        let link = Link::with_transport(
            LinkSettings::tcp("mock", 1),
            Arc::new(transport),
            options,
            enabled,
        )
        .unwrap();
        (link, state)
    }

    async fn wait_for<F>(events: &mut EventStream<LinkEvent>, mut matches: F) -> LinkEvent
    where
        F: FnMut(&LinkEvent) -> bool,
    {
        timeout(WAIT, async {
            loop {
                let event = events.recv().await.expect("event stream closed");
                if matches(&event) {
                    return event;
                }
            }
        })
        .await
        .expect("timed out waiting for event")
    }

    async fn wait_until<F: Fn() -> bool>(condition: F) {
        timeout(WAIT, async {
            while !condition() {
                sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("timed out waiting for condition");
    }

    fn is_connected_changed(up: bool) -> impl FnMut(&LinkEvent) -> bool {
        move |event| matches!(event, LinkEvent::ConnectedChanged(v) if *v == up)
    }

    #[tokio::test]
    async fn test_connects_when_created_enabled() {
        let (link, state) = mock_link(LinkOptions::new(), true);
        wait_until(|| link.is_connected()).await;

        assert_eq!(state.connects(), 1);
        assert!(link.is_enabled());
        assert_eq!(link.address(), "mock");
        assert_eq!(link.port(), 1);
    }

    #[tokio::test]
    async fn test_disabled_link_never_connects_and_ignores_send() {
        let (link, state) = mock_link(LinkOptions::new(), false);
        link.send(b"hello".to_vec());
        sleep(Duration::from_millis(50)).await;

        assert_eq!(state.connects(), 0);
        assert!(state.sent().is_empty());
        assert!(!link.is_connected());
    }

    #[tokio::test]
    async fn test_send_reaches_transport() {
        let (link, state) = mock_link(LinkOptions::new(), true);
        wait_until(|| link.is_connected()).await;

        link.send(b"one".to_vec());
        link.send(b"two".to_vec());
        wait_until(|| state.sent().len() == 2).await;

        assert_eq!(state.sent(), vec![b"one".to_vec(), b"two".to_vec()]);
    }

    #[tokio::test]
    async fn test_receive_on_disabled_link_does_not_dequeue() {
        let (link, state) = mock_link(LinkOptions::new(), true);
        let mut events = link.events();
        wait_until(|| link.is_connected()).await;

        assert!(state.inject(b"abc"));
        wait_for(&mut events, |e| matches!(e, LinkEvent::DataReceived)).await;

        link.set_enabled(false);
        assert_eq!(link.receive().unwrap(), None);
        assert_eq!(link.receive().unwrap(), None);
        assert!(link.has_data());

        link.set_enabled(true);
        assert_eq!(link.receive().unwrap(), Some(b"abc".to_vec()));
        assert_eq!(link.receive().unwrap(), None);
    }

    #[tokio::test]
    async fn test_receive_after_dispose_always_fails() {
        let (link, _state) = mock_link(LinkOptions::new(), true);
        link.dispose();

        for _ in 0..3 {
            assert!(matches!(link.receive(), Err(Error::Disposed)));
        }

        // Send and set_enabled stay silent.
        link.send(b"ignored".to_vec());
        link.set_enabled(true);
        assert!(!link.is_enabled());
        assert!(link.is_disposed());
    }

    #[tokio::test]
    async fn test_dispose_closes_transport_and_clears_queue() {
        let (link, state) = mock_link(LinkOptions::new(), true);
        let mut events = link.events();
        wait_until(|| link.is_connected()).await;

        state.inject(b"pending");
        wait_for(&mut events, |e| matches!(e, LinkEvent::DataReceived)).await;

        link.dispose();
        link.dispose();

        assert!(!link.has_data());
        wait_until(|| !link.is_connected()).await;
    }

    #[tokio::test]
    async fn test_write_faults_reconnect_without_overlap() {
        let options = LinkOptions::new().with_reconnect_delay(Duration::from_millis(20));
        let (link, state) = mock_link(options, true);

        let drops = Arc::new(AtomicUsize::new(0));
        let send_errors = Arc::new(AtomicUsize::new(0));
        let d = Arc::clone(&drops);
        let s = Arc::clone(&send_errors);
        link.subscribe(move |event| match event {
            LinkEvent::ConnectedChanged(false) => {
                d.fetch_add(1, Ordering::SeqCst);
            }
            LinkEvent::Error { context, .. } if context == "send" => {
                s.fetch_add(1, Ordering::SeqCst);
            }
            _ => {}
        });

        let mut events = link.events();
        wait_until(|| link.is_connected()).await;
        state.fail_send.store(true, Ordering::SeqCst);

        for _ in 0..3 {
            link.send(b"x".to_vec());
            wait_for(&mut events, is_connected_changed(false)).await;
            wait_for(&mut events, is_connected_changed(true)).await;
        }

        assert_eq!(drops.load(Ordering::SeqCst), 3);
        assert_eq!(send_errors.load(Ordering::SeqCst), 3);
        assert_eq!(state.connects(), 4);
        assert_eq!(state.max_in_flight.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_peer_close_triggers_reconnect() {
        let (link, state) = mock_link(LinkOptions::new(), true);
        let mut events = link.events();
        wait_until(|| link.is_connected()).await;

        state.hang_up();

        let event = wait_for(&mut events, |e| matches!(e, LinkEvent::Error { .. })).await;
        let LinkEvent::Error { error, context } = event else {
            unreachable!();
        };
        assert!(matches!(*error, Error::ConnectionClosed));
        assert_eq!(context, "receive");

        wait_for(&mut events, is_connected_changed(true)).await;
        assert_eq!(state.connects(), 2);
    }

    #[tokio::test]
    async fn test_connect_failure_retries_until_disabled() {
        let options = LinkOptions::new().with_reconnect_delay(Duration::from_millis(20));
        let transport = MockTransport::new();
        transport.state.fail_connect.store(true, Ordering::SeqCst);
        let (link, state) = mock_link_with(transport, options, false);

        let mut events = link.events();
        link.set_enabled(true);

        let event = wait_for(&mut events, |e| matches!(e, LinkEvent::Error { .. })).await;
        let LinkEvent::Error { context, .. } = event else {
            unreachable!();
        };
        assert_eq!(context, "connect to mock");

        wait_until(|| state.connects() >= 3).await;
        assert_eq!(state.max_in_flight.load(Ordering::SeqCst), 1);
        assert!(!link.is_connected());

        link.set_enabled(false);
        sleep(Duration::from_millis(30)).await;
        let attempts = state.connects();
        sleep(Duration::from_millis(100)).await;
        assert_eq!(state.connects(), attempts);
    }

    #[tokio::test]
    async fn test_send_while_disconnected_reports_not_connected() {
        let options = LinkOptions::new().with_reconnect_delay(Duration::from_secs(10));
        let transport = MockTransport::new();
        transport.state.fail_connect.store(true, Ordering::SeqCst);
        let (link, state) = mock_link_with(transport, options, true);

        let mut events = link.events();
        wait_until(|| state.connects() >= 1).await;

        link.send(b"x".to_vec());

        let event = wait_for(
            &mut events,
            |e| matches!(e, LinkEvent::Error { context, .. } if context == "send"),
        )
        .await;
        let LinkEvent::Error { error, .. } = event else {
            unreachable!();
        };
        assert!(matches!(*error, Error::NotConnected));
        assert!(state.sent().is_empty());
        assert!(!link.is_connected());
    }

    #[tokio::test]
    async fn test_enable_twice_is_idempotent() {
        let (link, state) = mock_link(LinkOptions::new(), true);
        wait_until(|| link.is_connected()).await;

        let enabled_events = Arc::new(AtomicUsize::new(0));
        let e = Arc::clone(&enabled_events);
        link.subscribe(move |event| {
            if matches!(event, LinkEvent::EnabledChanged(true)) {
                e.fetch_add(1, Ordering::SeqCst);
            }
        });

        link.set_enabled(true);
        link.set_enabled(true);
        sleep(Duration::from_millis(50)).await;

        assert_eq!(enabled_events.load(Ordering::SeqCst), 2);
        assert_eq!(state.connects(), 1);
        assert!(link.is_connected());
    }

    #[tokio::test]
    async fn test_disable_tears_down_stream_transport() {
        let (link, state) = mock_link(LinkOptions::new(), true);
        let mut events = link.events();
        wait_until(|| link.is_connected()).await;

        link.set_enabled(false);
        wait_for(&mut events, is_connected_changed(false)).await;

        link.set_enabled(true);
        wait_for(&mut events, is_connected_changed(true)).await;
        assert_eq!(state.connects(), 2);
    }

    #[tokio::test]
    async fn test_overflow_reported_through_error_event() {
        let options = LinkOptions::new().with_queue_capacity(2);
        let (link, state) = mock_link(options, true);

        let data_events = Arc::new(AtomicUsize::new(0));
        let overflows = Arc::new(AtomicUsize::new(0));
        let d = Arc::clone(&data_events);
        let o = Arc::clone(&overflows);
        link.subscribe(move |event| match event {
            LinkEvent::DataReceived => {
                d.fetch_add(1, Ordering::SeqCst);
            }
            LinkEvent::Error { error, .. } if matches!(**error, Error::QueueOverflow { .. }) => {
                o.fetch_add(1, Ordering::SeqCst);
            }
            _ => {}
        });

        wait_until(|| link.is_connected()).await;
        for chunk in [b"0", b"1", b"2", b"3", b"4"] {
            state.inject(chunk);
        }
        wait_until(|| data_events.load(Ordering::SeqCst) == 5).await;

        assert_eq!(overflows.load(Ordering::SeqCst), 3);
        assert_eq!(link.overflow_count(), 3);
        assert_eq!(link.receive().unwrap(), Some(b"0".to_vec()));
        assert_eq!(link.receive().unwrap(), Some(b"4".to_vec()));
        assert_eq!(link.receive().unwrap(), None);
    }

    #[tokio::test]
    async fn test_connectionless_disable_keeps_socket_and_discards_data() {
        let (link, state) = mock_link_with(MockTransport::connectionless(), LinkOptions::new(), true);
        wait_until(|| link.is_connected()).await;

        link.set_enabled(false);
        sleep(Duration::from_millis(20)).await;
        assert!(link.is_connected());
        assert!(state.inject(b"dropped"));
        sleep(Duration::from_millis(20)).await;

        link.set_enabled(true);
        sleep(Duration::from_millis(20)).await;
        assert_eq!(link.receive().unwrap(), None);
        assert_eq!(state.connects(), 1);
    }

    #[tokio::test]
    async fn test_unsubscribe_stops_notifications() {
        let (link, _state) = mock_link(LinkOptions::new(), false);
        let calls = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&calls);
        let id = link.subscribe(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });

        link.set_enabled(false);
        assert!(link.unsubscribe(id));
        link.set_enabled(false);

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_weak_link_upgrade() {
        let (link, _state) = mock_link(LinkOptions::new(), false);
        let weak = link.downgrade();
        assert!(weak.upgrade().is_some());

        drop(link);
        assert!(weak.upgrade().is_none());
    }

    #[test]
    fn test_open_outside_runtime_fails() {
        let err = Link::open(LinkSettings::tcp("127.0.0.1", 9), LinkOptions::new(), false)
            .unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[test]
    fn test_open_rejects_invalid_settings() {
        let err =
            Link::open(LinkSettings::tcp("", 9), LinkOptions::new(), false).unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }
}
