//! Message framing over byte links.
//!
//! Devices on serial lines (and serial-over-IP bridges) commonly wrap each
//! text message in fixed start and end byte sequences. This module turns a
//! byte [`Link`](crate::Link) into a message link:
//!
//! | Type | Role |
//! |------|------|
//! | [`SerialFrame`] | Header/footer definition |
//! | [`FramingCodec`] | Incremental decoder and encoder |
//! | [`FramedLink`] | Link + codec + message queue |
//!
//! # Example
//!
//! ```no_run
//! use device_link::{FramedLink, LinkOptions, LinkSettings, SerialFrame};
//!
//! # async fn example() -> device_link::Result<()> {
//! let frame = SerialFrame::new().with_header([0x02]).with_footer([0x03]);
//! let link = FramedLink::open(
//!     LinkSettings::serial("/dev/ttyUSB0", 9600),
//!     frame,
//!     LinkOptions::default(),
//!     true,
//! )?;
//!
//! link.send_message("STATUS?");
//! if let Some(reply) = link.receive()? {
//!     println!("{reply}");
//! }
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Submodules
// ============================================================================

/// Incremental frame decoder.
pub mod codec;

/// Message-oriented link.
pub mod framed;

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};

// ============================================================================
// Re-exports
// ============================================================================

pub use codec::FramingCodec;
pub use framed::FramedLink;

// ============================================================================
// SerialFrame
// ============================================================================

/// Header and footer byte sequences delimiting one message.
///
/// A missing sequence is treated as empty. With neither sequence set, every
/// chunk fed to the decoder is flushed as one message; with a header but no
/// footer, no message ever completes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerialFrame {
    /// Start-of-message sequence.
    #[serde(default)]
    pub header: Option<Vec<u8>>,
    /// End-of-message sequence.
    #[serde(default)]
    pub footer: Option<Vec<u8>>,
}

impl SerialFrame {
    /// Creates a frame with no delimiters.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the header sequence.
    #[must_use]
    pub fn with_header(mut self, header: impl Into<Vec<u8>>) -> Self {
        self.header = Some(header.into()).filter(|h: &Vec<u8>| !h.is_empty());
        self
    }

    /// Sets the footer sequence.
    #[must_use]
    pub fn with_footer(mut self, footer: impl Into<Vec<u8>>) -> Self {
        self.footer = Some(footer.into()).filter(|f: &Vec<u8>| !f.is_empty());
        self
    }

    /// Header bytes, empty if unset.
    #[inline]
    #[must_use]
    pub fn header(&self) -> &[u8] {
        self.header.as_deref().unwrap_or_default()
    }

    /// Footer bytes, empty if unset.
    #[inline]
    #[must_use]
    pub fn footer(&self) -> &[u8] {
        self.footer.as_deref().unwrap_or_default()
    }

    /// Returns `true` if a header or footer is set.
    #[inline]
    #[must_use]
    pub fn is_configured(&self) -> bool {
        !self.header().is_empty() || !self.footer().is_empty()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_has_no_delimiters() {
        let frame = SerialFrame::new();
        assert!(frame.header().is_empty());
        assert!(frame.footer().is_empty());
        assert!(!frame.is_configured());
    }

    #[test]
    fn test_empty_sequence_is_unset() {
        let frame = SerialFrame::new().with_header(Vec::new()).with_footer([0x03]);
        assert_eq!(frame.header, None);
        assert_eq!(frame.footer(), &[0x03]);
        assert!(frame.is_configured());
    }

    #[test]
    fn test_deserialize_partial() {
        let frame: SerialFrame = serde_json::from_str(r#"{"footer":[13,10]}"#).unwrap();
        assert_eq!(frame.header, None);
        assert_eq!(frame.footer(), b"\r\n");
    }
}
