//! Device Link - resilient links to remote devices.
//!
//! This library talks to devices over unreliable transports (TCP, UDP and
//! serial ports) with automatic reconnection, enable/disable gating, bounded
//! inbound queues and optional header/footer message framing.
//!
//! # Architecture
//!
//! - Each [`Link`] owns one supervising task, which is the only owner of the
//!   transport channel
//! - Callers talk to the supervisor over a command channel and read received
//!   data from a bounded [`InboundQueue`]
//! - Faults never reach callers: they become [`LinkEvent::Error`]
//!   notifications followed by a reconnect
//! - A [`FramedLink`] layers a [`FramingCodec`] over a byte link and exposes
//!   text messages
//!
//! # Quick Start
//!
//! ```no_run
//! use device_link::{Link, LinkEvent, Result, SerialFrame};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let link = Link::builder()
//!         .tcp("192.168.1.50", 4001)
//!         .build_framed(SerialFrame::new().with_header([0x02]).with_footer([0x03]))?;
//!
//!     link.subscribe(|event| println!("{event:?}"));
//!     link.send_message("VOL?");
//!
//!     tokio::time::sleep(std::time::Duration::from_millis(500)).await;
//!     while let Some(reply) = link.receive()? {
//!         println!("reply: {reply}");
//!     }
//!
//!     link.dispose();
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | Type-safe ID wrappers |
//! | [`settings`] | Transport settings |
//! | [`options`] | Link tuning |
//! | [`queue`] | Bounded inbound queue |
//! | [`events`] | Notifications and subscriptions |
//! | [`transport`] | Transport adapters |
//! | [`link`] | Supervised byte links |
//! | [`framing`] | Message framing |

// ============================================================================
// Modules
// ============================================================================

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Notifications and subscription registries.
pub mod events;

/// Header/footer message framing.
pub mod framing;

/// Type-safe identifiers.
pub mod identifiers;

/// Supervised byte links.
///
/// Use [`Link::builder()`] to create a configured link.
pub mod link;

/// Link tuning options.
pub mod options;

/// Bounded inbound queue.
pub mod queue;

/// Transport settings and JSON configuration.
pub mod settings;

/// Transport adapters.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Error types
pub use error::{Error, Result};

// Event types
pub use events::{EventHub, EventStream, FramedEvent, LinkEvent};

// Framing types
pub use framing::{FramedLink, FramingCodec, SerialFrame};

// Identifier types
pub use identifiers::{LinkId, SubscriptionId};

// Link types
pub use link::status::{ConnectionState, LinkSnapshot};
pub use link::{Link, LinkBuilder, WeakLink};

// Configuration types
pub use options::LinkOptions;
pub use settings::{LinkSettings, Parity, SerialSettings, TcpSettings, UdpSettings};

// Queue types
pub use queue::{InboundQueue, PushOutcome};

// Transport types
pub use transport::{Channel, RequestExchange, Transport, TransportKind};
