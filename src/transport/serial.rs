//! Serial port adapter.

// ============================================================================
// Imports
// ============================================================================

use async_trait::async_trait;
use tokio_serial::SerialPortBuilderExt;
use tracing::debug;

use crate::error::Result;
use crate::settings::SerialSettings;

use super::{Channel, StreamChannel, Transport, TransportKind};

// ============================================================================
// SerialTransport
// ============================================================================

/// Opens a serial port with fixed line parameters.
#[derive(Debug, Clone)]
pub struct SerialTransport {
    settings: SerialSettings,
}

impl SerialTransport {
    /// Creates an adapter for `settings`.
    #[must_use]
    pub fn new(settings: SerialSettings) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl Transport for SerialTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Serial
    }

    fn endpoint(&self) -> String {
        format!("{}@{}", self.settings.port_name, self.settings.baud_rate)
    }

    async fn open(&self) -> Result<Box<dyn Channel>> {
        let port = tokio_serial::new(&self.settings.port_name, self.settings.baud_rate)
            .data_bits(self.settings.serial_data_bits())
            .parity(self.settings.parity.into())
            .stop_bits(self.settings.serial_stop_bits())
            .open_native_async()?;

        debug!(
            port = %self.settings.port_name,
            baud = self.settings.baud_rate,
            "Serial port opened"
        );

        Ok(Box::new(StreamChannel::new(port, self.endpoint())))
    }
}

// ============================================================================
// Tests
// ============================================================================
