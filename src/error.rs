//! Error types for device links.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use device_link::{Link, Result};
//!
//! fn poll(link: &Link) -> Result<()> {
//!     while let Some(chunk) = link.receive()? {
//!         println!("{} bytes", chunk.len());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Configuration | [`Error::Config`] |
//! | Transport | [`Error::Connection`], [`Error::ConnectionTimeout`], [`Error::ConnectionClosed`], [`Error::NotConnected`] |
//! | Queue | [`Error::QueueOverflow`] |
//! | Lifecycle | [`Error::Disposed`] |
//! | External | [`Error::Io`], [`Error::Serial`], [`Error::Json`] |

// ============================================================================
// Imports
// ============================================================================

use std::io::Error as IoError;
use std::result::Result as StdResult;
use std::time::Duration;

use thiserror::Error;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
///
/// All fallible operations in this crate return this type.
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
///
/// Transport variants are expected steady-state events: the supervising task
/// reports them through [`LinkEvent::Error`](crate::LinkEvent::Error) and
/// reconnects rather than returning them to callers.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    ///
    /// Returned when link settings or options are invalid.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    // ========================================================================
    // Transport Errors
    // ========================================================================
    /// Connection attempt failed.
    ///
    /// Returned when the remote endpoint refuses or cannot be resolved.
    #[error("Connection failed: {message}")]
    Connection {
        /// Description of the connection error.
        message: String,
    },

    /// Connection attempt did not complete in time.
    #[error("Connection timeout after {timeout_ms}ms")]
    ConnectionTimeout {
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    /// Peer closed the stream (zero-length read).
    #[error("Connection closed by peer")]
    ConnectionClosed,

    /// No transport channel is open.
    #[error("Not connected")]
    NotConnected,

    // ========================================================================
    // Queue Errors
    // ========================================================================
    /// Bounded queue was full and an entry was evicted.
    #[error("Queue overflow: capacity {capacity}, {dropped} entries dropped so far")]
    QueueOverflow {
        /// Queue capacity.
        capacity: usize,
        /// Running total of evicted entries.
        dropped: u64,
    },

    // ========================================================================
    // Lifecycle Errors
    // ========================================================================
    /// Link used after disposal.
    #[error("Link has been disposed")]
    Disposed,

    // ========================================================================
    // External Errors
    // ========================================================================
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] IoError),

    /// Serial port error.
    #[error("Serial error: {0}")]
    Serial(#[from] tokio_serial::Error),

    /// JSON deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a connection error.
    #[inline]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Creates a connection timeout error.
    #[inline]
    pub fn connection_timeout(timeout: Duration) -> Self {
        Self::ConnectionTimeout {
            timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
        }
    }

    /// Creates a queue overflow error.
    #[inline]
    pub fn queue_overflow(capacity: usize, dropped: u64) -> Self {
        Self::QueueOverflow { capacity, dropped }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this is a transport fault that triggers a reconnect.
    #[inline]
    #[must_use]
    pub fn is_transport_fault(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. }
                | Self::ConnectionTimeout { .. }
                | Self::ConnectionClosed
                | Self::NotConnected
                | Self::Io(_)
                | Self::Serial(_)
        )
    }

    /// Returns `true` if this is a use-after-dispose error.
    #[inline]
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        matches!(self, Self::Disposed)
    }

    /// Returns `true` if this error is recoverable.
    ///
    /// Transport faults and overflows leave the link usable.
    #[inline]
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        self.is_transport_fault() || matches!(self, Self::QueueOverflow { .. })
    }
}

// ============================================================================
// Tests
// ============================================================================
