//! UDP datagram adapter.
//!
//! UDP has no connect phase. Opening the transport binds a local socket and
//! resolves the remote endpoint; datagrams are sent there and accepted from
//! any peer.

// ============================================================================
// Imports
// ============================================================================

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

use async_trait::async_trait;
use tokio::net::{UdpSocket, lookup_host};
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::settings::UdpSettings;

use super::{Channel, Transport, TransportKind};

// ============================================================================
// UdpTransport
// ============================================================================

/// Binds UDP sockets that talk to a fixed remote endpoint.
#[derive(Debug, Clone)]
pub struct UdpTransport {
    settings: UdpSettings,
}

impl UdpTransport {
    /// Creates an adapter for `settings`.
    #[must_use]
    pub fn new(settings: UdpSettings) -> Self {
        Self { settings }
    }

    async fn resolve_remote(&self) -> Result<SocketAddr> {
        let target = (self.settings.address.as_str(), self.settings.port);
        lookup_host(target)
            .await?
            .next()
            .ok_or_else(|| Error::connection(format!("cannot resolve {}", self.endpoint())))
    }
}

#[async_trait]
impl Transport for UdpTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Udp
    }

    fn endpoint(&self) -> String {
        format!("{}:{}", self.settings.address, self.settings.port)
    }

    fn is_connectionless(&self) -> bool {
        true
    }

    async fn open(&self) -> Result<Box<dyn Channel>> {
        let remote = self.resolve_remote().await?;
        let unspecified: IpAddr = if remote.is_ipv6() {
            Ipv6Addr::UNSPECIFIED.into()
        } else {
            Ipv4Addr::UNSPECIFIED.into()
        };
        let local = SocketAddr::new(unspecified, self.settings.local_port);
        let socket = UdpSocket::bind(local).await?;

        debug!(
            local = %socket.local_addr()?,
            remote = %remote,
            "UDP socket bound"
        );

        Ok(Box::new(UdpChannel::new(socket, remote)))
    }
}

// ============================================================================
// UdpChannel
// ============================================================================

/// Bound UDP socket plus the remote it sends to.
pub struct UdpChannel {
    socket: UdpSocket,
    remote: SocketAddr,
}

impl UdpChannel {
    /// Wraps a bound socket.
    #[must_use]
    pub fn new(socket: UdpSocket, remote: SocketAddr) -> Self {
        Self { socket, remote }
    }

    /// Local address the socket is bound to.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the socket cannot report its address.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }
}

#[async_trait]
impl Channel for UdpChannel {
    async fn send(&mut self, bytes: &[u8]) -> Result<()> {
        let sent = self.socket.send_to(bytes, self.remote).await?;
        trace!(remote = %self.remote, len = sent, "Sent datagram");
        Ok(())
    }

    async fn receive(&mut self, buf: &mut [u8]) -> Result<usize> {
        let (n, from) = self.socket.recv_from(buf).await?;
        trace!(from = %from, len = n, "Received datagram");
        Ok(n)
    }

    async fn close(&mut self) {
        // Dropping the socket releases the port.
    }
}

// ============================================================================
// Tests
// ============================================================================
