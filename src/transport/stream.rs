//! Channel over a byte stream.
//!
//! TCP sockets and serial ports both surface as `AsyncRead + AsyncWrite`, so
//! they share one channel implementation.

// ============================================================================
// Imports
// ============================================================================

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, trace};

use crate::error::Result;

use super::Channel;

// ============================================================================
// StreamChannel
// ============================================================================

/// [`Channel`] over any async byte stream.
pub struct StreamChannel<S> {
    /// Underlying stream.
    stream: S,
    /// Endpoint label for logs.
    endpoint: String,
}

impl<S> StreamChannel<S> {
    /// Wraps a connected stream.
    pub fn new(stream: S, endpoint: impl Into<String>) -> Self {
        Self {
            stream,
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl<S> Channel for StreamChannel<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn send(&mut self, bytes: &[u8]) -> Result<()> {
        self.stream.write_all(bytes).await?;
        self.stream.flush().await?;
        trace!(endpoint = %self.endpoint, len = bytes.len(), "Wrote to stream");
        Ok(())
    }

    async fn receive(&mut self, buf: &mut [u8]) -> Result<usize> {
        let n = self.stream.read(buf).await?;
        trace!(endpoint = %self.endpoint, len = n, "Read from stream");
        Ok(n)
    }

    async fn close(&mut self) {
        if let Err(e) = self.stream.shutdown().await {
            debug!(endpoint = %self.endpoint, error = %e, "Stream shutdown failed");
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
