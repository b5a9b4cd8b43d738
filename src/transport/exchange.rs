//! One-shot request/response over a fresh TCP connection.
//!
//! Device-control clients that speak a line-oriented command protocol open a
//! new connection per call: connect, write one command, read one reply, close.
//! [`RequestExchange`] is that primitive. It keeps no state between calls and
//! shares nothing with a [`Link`](crate::Link).
//!
//! # Example
//!
//! ```no_run
//! use device_link::transport::RequestExchange;
//!
//! # async fn example() -> device_link::Result<()> {
//! let exchange = RequestExchange::new("192.168.1.40", 4352);
//! let reply = exchange.call(b"%1POWR ?\r").await?;
//! println!("{}", String::from_utf8_lossy(&reply));
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::time::timeout;
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::settings::TcpSettings;

use super::TcpTransport;

// ============================================================================
// Constants
// ============================================================================

/// Default bound on a whole round trip.
const DEFAULT_EXCHANGE_TIMEOUT: Duration = Duration::from_secs(5);

/// Default reply terminator (carriage return).
const DEFAULT_TERMINATOR: u8 = b'\r';

/// Default cap on reply length, terminator included.
const DEFAULT_MAX_REPLY_LEN: usize = 64 * 1024;

// ============================================================================
// RequestExchange
// ============================================================================

/// Connect-send-receive-close helper.
#[derive(Debug, Clone)]
pub struct RequestExchange {
    settings: TcpSettings,
    timeout: Duration,
    terminator: u8,
    max_reply_len: usize,
}

impl RequestExchange {
    /// Creates an exchange for `address:port` with a 5s timeout and `\r`
    /// terminator.
    #[must_use]
    pub fn new(address: impl Into<String>, port: u16) -> Self {
        Self {
            settings: TcpSettings {
                address: address.into(),
                port,
            },
            timeout: DEFAULT_EXCHANGE_TIMEOUT,
            terminator: DEFAULT_TERMINATOR,
            max_reply_len: DEFAULT_MAX_REPLY_LEN,
        }
    }

    /// Sets the round-trip timeout.
    #[inline]
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the byte that ends a reply.
    #[inline]
    #[must_use]
    pub fn with_terminator(mut self, terminator: u8) -> Self {
        self.terminator = terminator;
        self
    }

    /// Sets the longest reply accepted, terminator included.
    #[inline]
    #[must_use]
    pub fn with_max_reply_len(mut self, max_reply_len: usize) -> Self {
        self.max_reply_len = max_reply_len.max(1);
        self
    }

    /// Sends `request` and returns the reply without its terminator.
    ///
    /// A reply cut short by the peer closing is returned as-is.
    ///
    /// # Errors
    ///
    /// - [`Error::ConnectionTimeout`] if the round trip exceeds the timeout
    /// - [`Error::Connection`] if the endpoint cannot be reached or the reply
    ///   exceeds the length cap
    /// - [`Error::ConnectionClosed`] if the peer closes without replying
    /// - [`Error::Io`] on read/write failure
    pub async fn call(&self, request: &[u8]) -> Result<Vec<u8>> {
        timeout(self.timeout, self.round_trip(request))
            .await
            .map_err(|_| Error::connection_timeout(self.timeout))?
    }

    async fn round_trip(&self, request: &[u8]) -> Result<Vec<u8>> {
        let transport = TcpTransport::new(self.settings.clone());
        let mut stream = BufReader::new(transport.connect_stream().await?);

        stream.get_mut().write_all(request).await?;
        stream.get_mut().flush().await?;
        trace!(len = request.len(), "Exchange request sent");

        let mut reply = Vec::new();
        let limit = u64::try_from(self.max_reply_len).unwrap_or(u64::MAX);
        let n = (&mut stream)
            .take(limit)
            .read_until(self.terminator, &mut reply)
            .await?;
        if n == 0 {
            return Err(Error::ConnectionClosed);
        }
        if reply.last() == Some(&self.terminator) {
            reply.pop();
        } else if reply.len() >= self.max_reply_len {
            return Err(Error::connection(format!(
                "reply exceeds {} bytes",
                self.max_reply_len
            )));
        }

        if let Err(e) = stream.get_mut().shutdown().await {
            debug!(error = %e, "Exchange shutdown failed");
        }

        debug!(
            address = %self.settings.address,
            port = self.settings.port,
            len = reply.len(),
            "Exchange completed"
        );
        Ok(reply)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use tokio::net::TcpListener;
    use tokio_test::assert_ok;

    #[tokio::test]
    async fn test_call_returns_reply_without_terminator() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 9];
            socket.read_exact(&mut buf).await.unwrap();
            assert_eq!(&buf, b"%1POWR ?\r");
            socket.write_all(b"%1POWR=1\r").await.unwrap();
        });

        let reply = assert_ok!(
            RequestExchange::new("127.0.0.1", port)
                .call(b"%1POWR ?\r")
                .await
        );
        assert_eq!(reply, b"%1POWR=1");
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_peer_closing_without_reply() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            drop(socket);
        });

        let err = RequestExchange::new("127.0.0.1", port)
            .call(b"x\r")
            .await
            .unwrap_err();
        assert!(err.is_transport_fault());
    }

    #[tokio::test]
    async fn test_silent_peer_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(2)).await;
            drop(socket);
        });

        let err = RequestExchange::new("127.0.0.1", port)
            .with_timeout(Duration::from_millis(100))
            .call(b"x\r")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ConnectionTimeout { timeout_ms: 100 }));
        server.abort();
    }

    #[tokio::test]
    async fn test_oversized_reply_is_rejected() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            socket.write_all(&[b'a'; 100]).await.unwrap();
            // Keep the connection open: only the cap can end the read.
            tokio::time::sleep(Duration::from_secs(5)).await;
        });

        let err = RequestExchange::new("127.0.0.1", port)
            .with_max_reply_len(16)
            .call(b"x\r")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Connection { .. }), "got {err:?}");
        server.abort();
    }

    #[tokio::test]
    async fn test_reply_at_cap_with_terminator_is_accepted() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            socket.write_all(b"0123456\r").await.unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
        });

        let reply = assert_ok!(
            RequestExchange::new("127.0.0.1", port)
                .with_max_reply_len(8)
                .call(b"x\r")
                .await
        );
        assert_eq!(reply, b"0123456");
        server.abort();
    }

    #[test]
    fn test_builder() {
        let exchange = RequestExchange::new("h", 1)
            .with_timeout(Duration::from_secs(1))
            .with_terminator(b'\n')
            .with_max_reply_len(0);
        assert_eq!(exchange.timeout, Duration::from_secs(1));
        assert_eq!(exchange.terminator, b'\n');
        assert_eq!(exchange.max_reply_len, 1);
        assert_eq!(RequestExchange::new("h", 1).max_reply_len, DEFAULT_MAX_REPLY_LEN);
    }
}
