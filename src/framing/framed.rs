//! Message-oriented link.
//!
//! A [`FramedLink`] owns a byte [`Link`] and subscribes to it. Each
//! `DataReceived` drains the byte queue through a [`FramingCodec`] and queues
//! the decoded messages in a second bounded queue with the same overflow
//! policy.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::events::{EventHub, EventStream, FramedEvent, LinkEvent};
use crate::identifiers::SubscriptionId;
use crate::link::status::{ConnectionState, LinkSnapshot};
use crate::link::{Link, WeakLink};
use crate::options::LinkOptions;
use crate::queue::{InboundQueue, PushOutcome};
use crate::settings::LinkSettings;
use crate::transport::Transport;

use super::{FramingCodec, SerialFrame};

// ============================================================================
// Types
// ============================================================================

/// Decoder state reached from the byte link's event handler.
struct FramedCore {
    frame: SerialFrame,
    codec: Mutex<FramingCodec>,
    messages: InboundQueue<String>,
    events: Arc<EventHub<FramedEvent>>,
}

// ============================================================================
// FramedLink
// ============================================================================

/// Link that sends and receives delimited text messages.
#[derive(Clone)]
pub struct FramedLink {
    link: Link,
    core: Arc<FramedCore>,
    subscription: SubscriptionId,
}

impl fmt::Debug for FramedLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FramedLink")
            .field("link", &self.link)
            .field("frame", &self.core.frame)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// FramedLink - Constructors
// ============================================================================

impl FramedLink {
    /// Creates a framed link for `settings`.
    ///
    /// # Errors
    ///
    /// Same as [`Link::open`].
    pub fn open(
        settings: LinkSettings,
        frame: SerialFrame,
        options: LinkOptions,
        enabled: bool,
    ) -> Result<Self> {
        let capacity = options.queue_capacity;
        let link = Link::open(settings, options, false)?;
        Ok(Self::attach(link, frame, capacity, enabled))
    }

    /// Creates a framed link over a caller-supplied transport.
    ///
    /// # Errors
    ///
    /// Same as [`Link::with_transport`].
    pub fn with_transport(
        settings: LinkSettings,
        transport: Arc<dyn Transport>,
        frame: SerialFrame,
        options: LinkOptions,
        enabled: bool,
    ) -> Result<Self> {
        let capacity = options.queue_capacity;
        let link = Link::with_transport(settings, transport, options, false)?;
        Ok(Self::attach(link, frame, capacity, enabled))
    }

    /// Wires the decoder to a disabled link, then enables it if requested.
    fn attach(link: Link, frame: SerialFrame, capacity: usize, enabled: bool) -> Self {
        if !frame.is_configured() {
            warn!(link = %link.id(), "Framed link created without header or footer");
        }

        let core = Arc::new(FramedCore {
            codec: Mutex::new(FramingCodec::new(&frame)),
            frame,
            messages: InboundQueue::new(capacity),
            events: Arc::new(EventHub::new()),
        });

        let weak = link.downgrade();
        let handler_core = Arc::clone(&core);
        let subscription = link.subscribe(move |event| on_link_event(&handler_core, &weak, event));

        let framed = Self {
            link,
            core,
            subscription,
        };
        if enabled {
            framed.link.set_enabled(true);
        }
        framed
    }
}

// ============================================================================
// FramedLink - Messages
// ============================================================================

impl FramedLink {
    /// Sends `message` wrapped in the frame delimiters.
    ///
    /// Silently does nothing while disabled or after disposal.
    pub fn send_message(&self, message: &str) {
        let payload = self.core.codec.lock().encode(message);
        self.link.send(payload);
    }

    /// Pops the oldest decoded message.
    ///
    /// Returns `Ok(None)` while disabled or when no message is waiting.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Disposed`] after [`dispose`](Self::dispose).
    pub fn receive(&self) -> Result<Option<String>> {
        if self.link.is_disposed() {
            return Err(Error::Disposed);
        }
        if !self.link.is_enabled() {
            return Ok(None);
        }
        Ok(self.core.messages.pop())
    }

    /// Returns `true` if decoded messages are waiting.
    #[inline]
    #[must_use]
    pub fn has_data(&self) -> bool {
        self.core.messages.has_data()
    }

    /// Total messages evicted by queue overflow.
    #[inline]
    #[must_use]
    pub fn overflow_count(&self) -> u64 {
        self.core.messages.overflow_count()
    }
}

// ============================================================================
// FramedLink - Lifecycle
// ============================================================================

impl FramedLink {
    /// Enables or disables the link.
    ///
    /// Disabling drops queued messages and any partially decoded frame.
    pub fn set_enabled(&self, enabled: bool) {
        if self.link.is_disposed() {
            return;
        }
        self.link.set_enabled(enabled);

        if !enabled {
            // Held across the clear so an in-progress drain cannot refill the queue.
            let mut codec = self.core.codec.lock();
            self.core.messages.clear();
            codec.reset();
            debug!(link = %self.link.id(), "Framed state cleared");
        }
    }

    /// Shuts the link down for good. Calling it again does nothing.
    pub fn dispose(&self) {
        if self.link.is_disposed() {
            return;
        }
        self.link.unsubscribe(self.subscription);
        self.link.dispose();
        self.core.messages.clear();
        self.core.codec.lock().reset();
        self.core.events.clear();

        info!(link = %self.link.id(), "Framed link disposed");
    }
}

// ============================================================================
// FramedLink - Status
// ============================================================================

impl FramedLink {
    /// Returns `true` if the link is enabled.
    #[inline]
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.link.is_enabled()
    }

    /// Returns `true` if the transport is open.
    #[inline]
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.link.is_connected()
    }

    /// Returns `true` once disposed.
    #[inline]
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.link.is_disposed()
    }

    /// Current connection state.
    #[inline]
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.link.state()
    }

    /// Snapshot of all status flags.
    #[inline]
    #[must_use]
    pub fn status(&self) -> LinkSnapshot {
        self.link.status()
    }

    /// Remote address, or the port name for serial links.
    #[inline]
    #[must_use]
    pub fn address(&self) -> &str {
        self.link.address()
    }

    /// Remote port, or 0 for serial links.
    #[inline]
    #[must_use]
    pub fn port(&self) -> u16 {
        self.link.port()
    }

    /// Frame delimiters.
    #[inline]
    #[must_use]
    pub fn frame(&self) -> &SerialFrame {
        &self.core.frame
    }

    /// Underlying byte link.
    #[inline]
    #[must_use]
    pub fn link(&self) -> &Link {
        &self.link
    }
}

// ============================================================================
// FramedLink - Events
// ============================================================================

impl FramedLink {
    /// Registers an event handler.
    pub fn subscribe<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&FramedEvent) + Send + Sync + 'static,
    {
        self.core.events.subscribe(handler)
    }

    /// Removes an event handler.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.core.events.unsubscribe(id)
    }

    /// Returns a stream of subsequent events.
    #[must_use]
    pub fn events(&self) -> EventStream<FramedEvent> {
        self.core.events.stream()
    }
}

// ============================================================================
// Decoding
// ============================================================================

/// Decodes pending chunks, then forwards the event.
fn on_link_event(core: &FramedCore, link: &WeakLink, event: &LinkEvent) {
    if matches!(event, LinkEvent::DataReceived)
        && let Some(link) = link.upgrade()
    {
        drain(core, &link);
    }

    core.events.emit(&FramedEvent::Link(event.clone()));
}

/// Moves every queued chunk through the decoder.
///
/// The enabled check and the pushes happen under the codec lock, which
/// `set_enabled(false)` also takes before clearing.
fn drain(core: &FramedCore, link: &Link) {
    while let Ok(Some(chunk)) = link.receive() {
        let outcomes: Vec<PushOutcome> = {
            let mut codec = core.codec.lock();
            if !link.is_enabled() {
                return;
            }
            codec
                .feed(&chunk)
                .into_iter()
                .map(|message| core.messages.push(message))
                .collect()
        };

        for outcome in outcomes {
            if let PushOutcome::Overflowed { dropped } = outcome {
                let capacity = core.messages.capacity();
                warn!(link = %link.id(), capacity, dropped, "Message queue overflow");
                core.events.emit(&FramedEvent::Link(LinkEvent::error(
                    Error::queue_overflow(capacity, dropped),
                    "message queue",
                )));
            }
            core.events.emit(&FramedEvent::MessageReceived);
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
