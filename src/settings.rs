//! Transport settings for a link.
//!
//! [`LinkSettings`] describes *where* a link talks to: a TCP endpoint, a UDP
//! endpoint with an optional local port, or a serial port with its line
//! parameters. Settings are immutable once a link is built.
//!
//! # Example
//!
//! ```
//! use device_link::{LinkSettings, Parity};
//!
//! let tcp = LinkSettings::tcp("192.168.1.20", 4352);
//! let serial = LinkSettings::serial("/dev/ttyUSB0", 9600).with_parity(Parity::Even);
//!
//! let from_config = LinkSettings::from_json(
//!     r#"{ "transport": "udp", "address": "10.0.0.5", "port": 9000, "local_port": 9001 }"#,
//! )
//! .unwrap();
//! assert_eq!(from_config.port(), 9000);
//! # let _ = (tcp, serial);
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use serde::{Deserialize, Serialize};
use tokio_serial::{DataBits, Parity as SerialParity, StopBits};

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

const DEFAULT_DATA_BITS: u8 = 8;
const DEFAULT_STOP_BITS: u8 = 1;

// ============================================================================
// Parity
// ============================================================================

/// Parity setting for serial links.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Parity {
    /// No parity bit.
    #[default]
    None,
    /// Odd parity.
    Odd,
    /// Even parity.
    Even,
}

impl From<Parity> for SerialParity {
    fn from(parity: Parity) -> Self {
        match parity {
            Parity::None => SerialParity::None,
            Parity::Odd => SerialParity::Odd,
            Parity::Even => SerialParity::Even,
        }
    }
}

// ============================================================================
// Per-Transport Settings
// ============================================================================

/// TCP endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TcpSettings {
    /// Host name or IP address.
    pub address: String,
    /// Remote port.
    pub port: u16,
}

/// UDP endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UdpSettings {
    /// Host name or IP address datagrams are sent to.
    pub address: String,
    /// Remote port.
    pub port: u16,
    /// Local port to bind (0 = any).
    #[serde(default)]
    pub local_port: u16,
}

/// Serial port and line parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerialSettings {
    /// Port name (`/dev/ttyUSB0`, `COM3`).
    pub port_name: String,
    /// Baud rate.
    pub baud_rate: u32,
    /// Data bits (5-8).
    #[serde(default = "default_data_bits")]
    pub data_bits: u8,
    /// Parity.
    #[serde(default)]
    pub parity: Parity,
    /// Stop bits (1 or 2).
    #[serde(default = "default_stop_bits")]
    pub stop_bits: u8,
}

fn default_data_bits() -> u8 {
    DEFAULT_DATA_BITS
}

fn default_stop_bits() -> u8 {
    DEFAULT_STOP_BITS
}

impl SerialSettings {
    /// Data bits as the serial crate's type.
    pub(crate) fn serial_data_bits(&self) -> DataBits {
        match self.data_bits {
            5 => DataBits::Five,
            6 => DataBits::Six,
            7 => DataBits::Seven,
            _ => DataBits::Eight,
        }
    }

    /// Stop bits as the serial crate's type.
    pub(crate) fn serial_stop_bits(&self) -> StopBits {
        match self.stop_bits {
            2 => StopBits::Two,
            _ => StopBits::One,
        }
    }
}

// ============================================================================
// LinkSettings
// ============================================================================

/// Immutable transport configuration for one link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "transport", rename_all = "lowercase")]
pub enum LinkSettings {
    /// TCP client connection.
    Tcp(TcpSettings),
    /// UDP datagram socket.
    Udp(UdpSettings),
    /// Serial port.
    Serial(SerialSettings),
}

// ============================================================================
// LinkSettings - Constructors
// ============================================================================

impl LinkSettings {
    /// TCP settings for `address:port`.
    #[must_use]
    pub fn tcp(address: impl Into<String>, port: u16) -> Self {
        Self::Tcp(TcpSettings {
            address: address.into(),
            port,
        })
    }

    /// UDP settings for `address:port`, bound to any local port.
    #[must_use]
    pub fn udp(address: impl Into<String>, port: u16) -> Self {
        Self::Udp(UdpSettings {
            address: address.into(),
            port,
            local_port: 0,
        })
    }

    /// Serial settings with 8 data bits, no parity, 1 stop bit.
    #[must_use]
    pub fn serial(port_name: impl Into<String>, baud_rate: u32) -> Self {
        Self::Serial(SerialSettings {
            port_name: port_name.into(),
            baud_rate,
            data_bits: DEFAULT_DATA_BITS,
            parity: Parity::None,
            stop_bits: DEFAULT_STOP_BITS,
        })
    }

    /// Parses settings from a JSON document.
    ///
    /// # Errors
    ///
    /// - [`Error::Json`] if the document is malformed
    /// - [`Error::Config`] if the settings fail validation
    pub fn from_json(json: &str) -> Result<Self> {
        let settings: Self = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }
}

// ============================================================================
// LinkSettings - Builder Methods
// ============================================================================

impl LinkSettings {
    /// Sets the local UDP port. Ignored for other transports.
    #[must_use]
    pub fn with_local_port(mut self, local_port: u16) -> Self {
        if let Self::Udp(udp) = &mut self {
            udp.local_port = local_port;
        }
        self
    }

    /// Sets serial data bits. Ignored for other transports.
    #[must_use]
    pub fn with_data_bits(mut self, data_bits: u8) -> Self {
        if let Self::Serial(serial) = &mut self {
            serial.data_bits = data_bits;
        }
        self
    }

    /// Sets serial parity. Ignored for other transports.
    #[must_use]
    pub fn with_parity(mut self, parity: Parity) -> Self {
        if let Self::Serial(serial) = &mut self {
            serial.parity = parity;
        }
        self
    }

    /// Sets serial stop bits. Ignored for other transports.
    #[must_use]
    pub fn with_stop_bits(mut self, stop_bits: u8) -> Self {
        if let Self::Serial(serial) = &mut self {
            serial.stop_bits = stop_bits;
        }
        self
    }
}

// ============================================================================
// LinkSettings - Accessors
// ============================================================================

impl LinkSettings {
    /// Remote address, or the port name for serial links.
    #[must_use]
    pub fn address(&self) -> &str {
        match self {
            Self::Tcp(tcp) => &tcp.address,
            Self::Udp(udp) => &udp.address,
            Self::Serial(serial) => &serial.port_name,
        }
    }

    /// Remote port, or 0 for serial links.
    #[must_use]
    pub fn port(&self) -> u16 {
        match self {
            Self::Tcp(tcp) => tcp.port,
            Self::Udp(udp) => udp.port,
            Self::Serial(_) => 0,
        }
    }

    /// Validates the settings.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] describing the first invalid field.
    pub fn validate(&self) -> Result<()> {
        if self.address().trim().is_empty() {
            return Err(Error::config("address must not be empty"));
        }

        match self {
            Self::Tcp(TcpSettings { port, .. }) | Self::Udp(UdpSettings { port, .. })
                if *port == 0 =>
            {
                Err(Error::config("remote port must not be 0"))
            }
            Self::Serial(serial) if serial.baud_rate == 0 => {
                Err(Error::config("baud rate must not be 0"))
            }
            Self::Serial(serial) if !(5..=8).contains(&serial.data_bits) => Err(Error::config(
                format!("data bits must be 5-8, got {}", serial.data_bits),
            )),
            Self::Serial(serial) if !(1..=2).contains(&serial.stop_bits) => Err(Error::config(
                format!("stop bits must be 1 or 2, got {}", serial.stop_bits),
            )),
            _ => Ok(()),
        }
    }
}

impl fmt::Display for LinkSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tcp(tcp) => write!(f, "tcp://{}:{}", tcp.address, tcp.port),
            Self::Udp(udp) => write!(f, "udp://{}:{}", udp.address, udp.port),
            Self::Serial(serial) => write!(f, "serial://{}@{}", serial.port_name, serial.baud_rate),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
