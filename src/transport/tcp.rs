//! TCP client adapter.

// ============================================================================
// Imports
// ============================================================================

use async_trait::async_trait;
use tokio::net::TcpStream;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::settings::TcpSettings;

use super::{Channel, StreamChannel, Transport, TransportKind};

// ============================================================================
// TcpTransport
// ============================================================================

/// Opens TCP client connections to a fixed endpoint.
#[derive(Debug, Clone)]
pub struct TcpTransport {
    settings: TcpSettings,
}

impl TcpTransport {
    /// Creates an adapter for `settings`.
    #[must_use]
    pub fn new(settings: TcpSettings) -> Self {
        Self { settings }
    }

    /// Connects a raw stream. Callers bound it with their own timeout.
    pub(crate) async fn connect_stream(&self) -> Result<TcpStream> {
        let target = (self.settings.address.as_str(), self.settings.port);

        let stream = TcpStream::connect(target)
            .await
            .map_err(|e| Error::connection(format!("{}: {e}", self.endpoint())))?;

        if let Err(e) = stream.set_nodelay(true) {
            warn!(endpoint = %self.endpoint(), error = %e, "Failed to set TCP_NODELAY");
        }

        Ok(stream)
    }
}

#[async_trait]
impl Transport for TcpTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Tcp
    }

    fn endpoint(&self) -> String {
        format!("{}:{}", self.settings.address, self.settings.port)
    }

    async fn open(&self) -> Result<Box<dyn Channel>> {
        let stream = self.connect_stream().await?;
        debug!(endpoint = %self.endpoint(), "TCP connected");
        Ok(Box::new(StreamChannel::new(stream, self.endpoint())))
    }
}

// ============================================================================
// Tests
// ============================================================================
