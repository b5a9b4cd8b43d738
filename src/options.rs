//! Runtime tuning for a link.
//!
//! Provides a type-safe interface for the knobs that are not part of the
//! transport address: queue bound, retry delay, connect timeout and read size.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use device_link::LinkOptions;
//!
//! let options = LinkOptions::new()
//!     .with_queue_capacity(32)
//!     .with_reconnect_delay(Duration::from_secs(1));
//!
//! assert_eq!(options.queue_capacity, 32);
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Default inbound queue bound.
pub const DEFAULT_QUEUE_CAPACITY: usize = 100;

/// Default delay before retrying a failed connect.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(3);

/// Default bound on a single connect attempt.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default size of the receive buffer.
pub const DEFAULT_READ_BUFFER_SIZE: usize = 4096;

// ============================================================================
// LinkOptions
// ============================================================================

/// Link tuning options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkOptions {
    /// Maximum number of unread chunks (or decoded messages) kept.
    pub queue_capacity: usize,

    /// Delay before retrying after a failed connect attempt.
    pub reconnect_delay: Duration,

    /// Upper bound on one connect attempt.
    pub connect_timeout: Duration,

    /// Bytes requested per read from the transport.
    pub read_buffer_size: usize,
}

impl Default for LinkOptions {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Constructors
// ============================================================================

impl LinkOptions {
    /// Creates options with default settings.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
        }
    }
}

// ============================================================================
// Builder Methods
// ============================================================================

impl LinkOptions {
    /// Sets the inbound queue bound.
    #[inline]
    #[must_use]
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Sets the retry delay after a failed connect.
    #[inline]
    #[must_use]
    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    /// Sets the connect timeout.
    #[inline]
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the receive buffer size.
    #[inline]
    #[must_use]
    pub fn with_read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size;
        self
    }
}

// ============================================================================
// Validation
// ============================================================================

impl LinkOptions {
    /// Validates the options.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if any bound is zero.
    pub fn validate(&self) -> Result<()> {
        if self.queue_capacity == 0 {
            return Err(Error::config("queue capacity must be at least 1"));
        }
        if self.read_buffer_size == 0 {
            return Err(Error::config("read buffer size must be at least 1"));
        }
        if self.connect_timeout.is_zero() {
            return Err(Error::config("connect timeout must be non-zero"));
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
