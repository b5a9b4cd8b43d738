//! Incremental frame decoder.
//!
//! The decoder keeps two cursors (header match, footer match) and a body
//! buffer across calls, so a frame may arrive split over any number of
//! chunks. Every byte is handled by the first rule that applies:
//!
//! | # | Condition | Action |
//! |---|-----------|--------|
//! | 1 | matches `header[h]`, not the last header byte | advance `h` |
//! | 2 | matches the last header byte | reset both cursors and the body |
//! | 3 | matches `footer[f]`, not the last footer byte | advance `f` |
//! | 4 | matches the last footer byte | emit the body if non-blank, reset `f` and the body |
//! | 5 | otherwise | reset `h`, append the byte to the body |
//!
//! Delimiter bytes are never part of the body. A header completing mid-message
//! abandons whatever was accumulated. Without a footer nothing ever completes,
//! unless no header is set either: then each fed chunk is one message.

// ============================================================================
// Imports
// ============================================================================

use tracing::trace;

use super::SerialFrame;

// ============================================================================
// FramingCodec
// ============================================================================

/// Stateful header/footer matcher.
#[derive(Debug, Clone)]
pub struct FramingCodec {
    header: Vec<u8>,
    footer: Vec<u8>,
    header_pos: usize,
    footer_pos: usize,
    body: Vec<u8>,
}

impl FramingCodec {
    /// Creates a decoder for `frame`.
    #[must_use]
    pub fn new(frame: &SerialFrame) -> Self {
        Self {
            header: frame.header().to_vec(),
            footer: frame.footer().to_vec(),
            header_pos: 0,
            footer_pos: 0,
            body: Vec::new(),
        }
    }

    /// Consumes `bytes` and returns every message completed by them.
    ///
    /// Message bytes are decoded as UTF-8 (lossily). Messages that are empty or
    /// whitespace-only are dropped; others are returned untrimmed.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<String> {
        let mut messages = Vec::new();

        for &byte in bytes {
            if let Some(message) = self.step(byte) {
                messages.push(message);
            }
        }

        if self.header.is_empty()
            && self.footer.is_empty()
            && let Some(message) = self.take_body()
        {
            messages.push(message);
        }

        messages
    }

    /// Wraps `message` in the header and footer.
    #[must_use]
    pub fn encode(&self, message: &str) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.header.len() + message.len() + self.footer.len());
        out.extend_from_slice(&self.header);
        out.extend_from_slice(message.as_bytes());
        out.extend_from_slice(&self.footer);
        out
    }

    /// Drops partial matches and the accumulated body.
    pub fn reset(&mut self) {
        self.header_pos = 0;
        self.footer_pos = 0;
        self.body.clear();
    }

    /// Number of body bytes accumulated for the current frame.
    #[inline]
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.body.len()
    }

    fn step(&mut self, byte: u8) -> Option<String> {
        if let Some(&expected) = self.header.get(self.header_pos)
            && expected == byte
        {
            if self.header_pos + 1 < self.header.len() {
                self.header_pos += 1;
            } else {
                trace!(discarded = self.body.len(), "Frame header");
                self.reset();
            }
            return None;
        }

        if let Some(&expected) = self.footer.get(self.footer_pos)
            && expected == byte
        {
            if self.footer_pos + 1 < self.footer.len() {
                self.footer_pos += 1;
                return None;
            }
            self.footer_pos = 0;
            return self.take_body();
        }

        self.header_pos = 0;
        self.body.push(byte);
        None
    }

    /// Empties the body, returning it if it holds a non-blank message.
    fn take_body(&mut self) -> Option<String> {
        let body = std::mem::take(&mut self.body);
        let message = String::from_utf8_lossy(&body).into_owned();
        if message.trim().is_empty() {
            None
        } else {
            Some(message)
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
