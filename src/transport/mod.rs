//! Transport adapters.
//!
//! A [`Transport`] knows how to open a [`Channel`] to one endpoint. The link's
//! supervising task owns the channel exclusively: it reads from it, writes to
//! it, and drops it on fault or disable.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐  open()   ┌──────────────┐   bytes   ┌──────────┐
//! │  Transport   │──────────►│   Channel    │◄─────────►│  Device  │
//! │ (Tcp/Udp/    │           │ send/receive │           │          │
//! │  Serial)     │           │    close     │           │          │
//! └──────────────┘           └──────────────┘           └──────────┘
//! ```
//!
//! A `receive` that returns `Ok(0)` on a stream transport means the peer
//! closed the connection. Connectionless transports never use that signal.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `tcp` | TCP client adapter |
//! | `udp` | UDP datagram adapter |
//! | `serial` | Serial port adapter |
//! | `stream` | Channel over any `AsyncRead + AsyncWrite` stream |
//! | `exchange` | One-shot request/response over a fresh TCP connection |

// ============================================================================
// Submodules
// ============================================================================

/// One-shot request/response over TCP.
pub mod exchange;

/// Serial port adapter.
pub mod serial;

/// Generic stream channel.
pub mod stream;

/// TCP client adapter.
pub mod tcp;

/// UDP datagram adapter.
pub mod udp;

#[cfg(test)]
pub(crate) mod mock;

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::settings::LinkSettings;

// ============================================================================
// Re-exports
// ============================================================================

pub use exchange::RequestExchange;
pub use serial::SerialTransport;
pub use stream::StreamChannel;
pub use tcp::TcpTransport;
pub use udp::{UdpChannel, UdpTransport};

// ============================================================================
// TransportKind
// ============================================================================

/// Which kind of transport backs a link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportKind {
    /// TCP client.
    Tcp,
    /// UDP socket.
    Udp,
    /// Serial port.
    Serial,
    /// Caller-supplied transport.
    Custom,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Tcp => "tcp",
            Self::Udp => "udp",
            Self::Serial => "serial",
            Self::Custom => "custom",
        };
        f.write_str(name)
    }
}

// ============================================================================
// Traits
// ============================================================================

/// Opens channels to one endpoint.
///
/// Implementations are shared with spawned connect tasks, hence `Sync`.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Transport kind.
    fn kind(&self) -> TransportKind;

    /// Human-readable endpoint, used in logs and error contexts.
    fn endpoint(&self) -> String;

    /// Returns `true` if the transport has no connect phase (UDP).
    ///
    /// Connectionless channels survive read faults and disable.
    fn is_connectionless(&self) -> bool {
        false
    }

    /// Opens a new channel.
    ///
    /// # Errors
    ///
    /// Returns a transport fault if the endpoint cannot be reached.
    async fn open(&self) -> Result<Box<dyn Channel>>;
}

/// An open, exclusively owned connection.
#[async_trait]
pub trait Channel: Send {
    /// Writes the whole payload.
    ///
    /// # Errors
    ///
    /// Returns a transport fault if the write fails.
    async fn send(&mut self, bytes: &[u8]) -> Result<()>;

    /// Reads available bytes into `buf`.
    ///
    /// Must be cancel-safe: the supervising task races it against commands.
    ///
    /// # Errors
    ///
    /// Returns a transport fault if the read fails.
    async fn receive(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Closes the channel. Errors are swallowed; the handle is dead either way.
    async fn close(&mut self);
}

// ============================================================================
// Factory
// ============================================================================

/// Builds the adapter matching `settings`.
#[must_use]
pub fn from_settings(settings: &LinkSettings) -> Arc<dyn Transport> {
    match settings {
        LinkSettings::Tcp(tcp) => Arc::new(TcpTransport::new(tcp.clone())),
        LinkSettings::Udp(udp) => Arc::new(UdpTransport::new(udp.clone())),
        LinkSettings::Serial(serial) => Arc::new(SerialTransport::new(serial.clone())),
    }
}

// ============================================================================
// Tests
// ============================================================================
