//! Bounded inbound queue.
//!
//! [`InboundQueue`] buffers received chunks (or decoded messages) between the
//! supervising task and callers of `receive`. It never grows past its
//! capacity.
//!
//! # Overflow Policy
//!
//! When a push arrives at capacity, the most recently added entry that has not
//! been consumed yet is evicted and the new entry is appended in its place.
//! Older unread entries survive. Every eviction increments a counter and is
//! reported to the caller through [`PushOutcome::Overflowed`].
//!
//! ```text
//! capacity 3:  [a, b, c]  push(d)  ->  [a, b, d]   (c dropped)
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

// ============================================================================
// PushOutcome
// ============================================================================

/// Result of [`InboundQueue::push`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    /// Entry appended without loss.
    Enqueued,
    /// Entry appended after evicting one entry.
    Overflowed {
        /// Running total of evictions for this queue.
        dropped: u64,
    },
}

impl PushOutcome {
    /// Returns `true` if an entry was evicted.
    #[inline]
    #[must_use]
    pub fn is_overflow(&self) -> bool {
        matches!(self, Self::Overflowed { .. })
    }
}

// ============================================================================
// InboundQueue
// ============================================================================

/// Bounded, thread-safe FIFO with tail eviction.
#[derive(Debug)]
pub struct InboundQueue<T> {
    /// Buffered entries, oldest first.
    entries: Mutex<VecDeque<T>>,
    /// Maximum number of entries.
    capacity: usize,
    /// Total entries evicted since creation.
    dropped: AtomicU64,
}

impl<T> InboundQueue<T> {
    /// Creates an empty queue with the given bound.
    ///
    /// A capacity of zero is treated as one.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            dropped: AtomicU64::new(0),
        }
    }

    /// Appends an entry, evicting the newest unread entry when full.
    pub fn push(&self, entry: T) -> PushOutcome {
        let mut entries = self.entries.lock();

        let outcome = if entries.len() >= self.capacity {
            entries.pop_back();
            let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
            PushOutcome::Overflowed { dropped }
        } else {
            PushOutcome::Enqueued
        };

        entries.push_back(entry);
        outcome
    }

    /// Removes and returns the oldest entry.
    #[must_use]
    pub fn pop(&self) -> Option<T> {
        self.entries.lock().pop_front()
    }

    /// Returns `true` if at least one entry is buffered.
    #[inline]
    #[must_use]
    pub fn has_data(&self) -> bool {
        !self.entries.lock().is_empty()
    }

    /// Number of buffered entries.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Returns `true` if nothing is buffered.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        !self.has_data()
    }

    /// Maximum number of entries.
    #[inline]
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Total entries evicted since creation.
    #[inline]
    #[must_use]
    pub fn overflow_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Discards all buffered entries. The overflow counter is kept.
    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fifo_order() {
        let queue = InboundQueue::new(4);
        queue.push(1);
        queue.push(2);
        queue.push(3);

        assert_eq!(queue.pop(), Some(1));
        assert_eq!(queue.pop(), Some(2));
        assert_eq!(queue.pop(), Some(3));
        assert_eq!(queue.pop(), None);
    }

    #[test]
    fn test_overflow_count_matches_excess_pushes() {
        const CAPACITY: usize = 100;

        for pushes in [0usize, 1, 99, 100, 101, 150, 357] {
            let queue = InboundQueue::new(CAPACITY);
            let mut signals = 0;

            for i in 0..pushes {
                if queue.push(i).is_overflow() {
                    signals += 1;
                }
                assert!(queue.len() <= CAPACITY);
            }

            let expected = pushes.saturating_sub(CAPACITY);
            assert_eq!(signals, expected, "pushes = {pushes}");
            assert_eq!(queue.overflow_count(), expected as u64);
        }
    }

    #[test]
    fn test_overflow_evicts_newest_unread_entry() {
        let queue = InboundQueue::new(3);
        queue.push("a");
        queue.push("b");
        queue.push("c");

        assert_eq!(queue.push("d"), PushOutcome::Overflowed { dropped: 1 });
        assert_eq!(queue.push("e"), PushOutcome::Overflowed { dropped: 2 });

        // Oldest entries survive; each overflow replaces the tail.
        assert_eq!(queue.pop(), Some("a"));
        assert_eq!(queue.pop(), Some("b"));
        assert_eq!(queue.pop(), Some("e"));
        assert_eq!(queue.pop(), None);
    }

    #[test]
    fn test_pop_frees_room() {
        let queue = InboundQueue::new(2);
        queue.push(1);
        queue.push(2);
        let _ = queue.pop();

        assert_eq!(queue.push(3), PushOutcome::Enqueued);
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn test_clear_keeps_counter() {
        let queue = InboundQueue::new(1);
        queue.push(1);
        queue.push(2);
        queue.clear();

        assert!(queue.is_empty());
        assert!(!queue.has_data());
        assert_eq!(queue.overflow_count(), 1);
    }

    #[test]
    fn test_zero_capacity_is_one() {
        let queue = InboundQueue::new(0);
        assert_eq!(queue.capacity(), 1);
        assert_eq!(queue.push(1), PushOutcome::Enqueued);
        assert!(queue.push(2).is_overflow());
    }
}
