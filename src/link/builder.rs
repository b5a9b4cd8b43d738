//! Fluent link configuration.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use device_link::{Link, SerialFrame};
//!
//! # async fn example() -> device_link::Result<()> {
//! let framed = Link::builder()
//!     .tcp("10.0.0.7", 5000)
//!     .queue_capacity(32)
//!     .reconnect_delay(Duration::from_secs(1))
//!     .build_framed(SerialFrame::new().with_header([0x01]).with_footer([0x03]))?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use crate::error::{Error, Result};
use crate::framing::{FramedLink, SerialFrame};
use crate::options::LinkOptions;
use crate::settings::LinkSettings;

use super::Link;

// ============================================================================
// LinkBuilder
// ============================================================================

/// Builder for [`Link`] and [`FramedLink`].
#[derive(Debug, Clone)]
pub struct LinkBuilder {
    settings: Option<LinkSettings>,
    options: LinkOptions,
    enabled: bool,
}

impl Default for LinkBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl LinkBuilder {
    /// Creates a builder with default options, enabled on build.
    #[must_use]
    pub fn new() -> Self {
        Self {
            settings: None,
            options: LinkOptions::new(),
            enabled: true,
        }
    }

    // ========================================================================
    // Transport
    // ========================================================================

    /// Uses a TCP client transport.
    #[must_use]
    pub fn tcp(mut self, address: impl Into<String>, port: u16) -> Self {
        self.settings = Some(LinkSettings::tcp(address, port));
        self
    }

    /// Uses a UDP transport with an ephemeral local port.
    #[must_use]
    pub fn udp(mut self, address: impl Into<String>, port: u16) -> Self {
        self.settings = Some(LinkSettings::udp(address, port));
        self
    }

    /// Uses a serial port with 8N1 framing.
    #[must_use]
    pub fn serial(mut self, port_name: impl Into<String>, baud_rate: u32) -> Self {
        self.settings = Some(LinkSettings::serial(port_name, baud_rate));
        self
    }

    /// Uses prepared settings.
    #[must_use]
    pub fn settings(mut self, settings: LinkSettings) -> Self {
        self.settings = Some(settings);
        self
    }

    // ========================================================================
    // Options
    // ========================================================================

    /// Replaces all options.
    #[must_use]
    pub fn options(mut self, options: LinkOptions) -> Self {
        self.options = options;
        self
    }

    /// Sets the inbound queue capacity.
    #[must_use]
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.options.queue_capacity = capacity;
        self
    }

    /// Sets the delay between failed connect attempts.
    #[must_use]
    pub fn reconnect_delay(mut self, delay: Duration) -> Self {
        self.options.reconnect_delay = delay;
        self
    }

    /// Sets the per-attempt connect timeout.
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.options.connect_timeout = timeout;
        self
    }

    /// Sets whether the link starts enabled.
    #[must_use]
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Starts the link disabled.
    #[must_use]
    pub fn disabled(self) -> Self {
        self.enabled(false)
    }

    // ========================================================================
    // Build
    // ========================================================================

    /// Builds a byte-oriented link.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if no transport was chosen
    /// - [`Error::Config`] if settings or options are invalid
    /// - [`Error::Config`] if called outside a tokio runtime
    pub fn build(self) -> Result<Link> {
        let settings = self.require_settings()?;
        Link::open(settings, self.options, self.enabled)
    }

    /// Builds a message-oriented link using `frame` delimiters.
    ///
    /// # Errors
    ///
    /// Same as [`build`](Self::build).
    pub fn build_framed(self, frame: SerialFrame) -> Result<FramedLink> {
        let settings = self.require_settings()?;
        FramedLink::open(settings, frame, self.options, self.enabled)
    }

    fn require_settings(&self) -> Result<LinkSettings> {
        self.settings
            .clone()
            .ok_or_else(|| Error::config("no transport configured; call tcp(), udp() or serial()"))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let builder = LinkBuilder::new();
        assert!(builder.settings.is_none());
        assert!(builder.enabled);
        assert_eq!(builder.options, LinkOptions::default());
    }

    #[test]
    fn test_chained_options() {
        let builder = LinkBuilder::new()
            .udp("10.0.0.1", 7000)
            .queue_capacity(8)
            .reconnect_delay(Duration::from_millis(250))
            .connect_timeout(Duration::from_secs(2))
            .disabled();

        assert_eq!(builder.settings, Some(LinkSettings::udp("10.0.0.1", 7000)));
        assert_eq!(builder.options.queue_capacity, 8);
        assert_eq!(builder.options.reconnect_delay, Duration::from_millis(250));
        assert_eq!(builder.options.connect_timeout, Duration::from_secs(2));
        assert!(!builder.enabled);
    }

    #[test]
    fn test_build_without_transport_fails() {
        let err = LinkBuilder::new().build().unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[tokio::test]
    async fn test_build_disabled_tcp_link() {
        let link = LinkBuilder::new().tcp("127.0.0.1", 9).disabled().build().unwrap();
        assert!(!link.is_enabled());
        assert_eq!(link.address(), "127.0.0.1");
        assert_eq!(link.port(), 9);
        link.dispose();
    }

    #[tokio::test]
    async fn test_build_rejects_zero_capacity() {
        let err = LinkBuilder::new()
            .tcp("127.0.0.1", 9)
            .queue_capacity(0)
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }
}
