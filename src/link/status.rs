//! Connection and enabled state.
//!
//! Status lives in atomics so any thread can read a consistent snapshot while
//! each field keeps a single writer: the supervising task writes the
//! connection state, the public handle writes the enabled and disposed flags.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

// ============================================================================
// ConnectionState
// ============================================================================

/// Connection life-cycle state of a link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// No transport open.
    Disconnected,
    /// A connect attempt is in flight.
    Connecting,
    /// Transport open and receiving.
    Connected,
}

impl ConnectionState {
    const fn as_u8(self) -> u8 {
        match self {
            Self::Disconnected => 0,
            Self::Connecting => 1,
            Self::Connected => 2,
        }
    }

    const fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Connecting,
            2 => Self::Connected,
            _ => Self::Disconnected,
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
        };
        f.write_str(name)
    }
}

// ============================================================================
// LinkSnapshot
// ============================================================================

/// Point-in-time view of a link's status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkSnapshot {
    /// Connection state.
    pub state: ConnectionState,
    /// Whether the link is enabled.
    pub enabled: bool,
    /// Whether the link has been disposed.
    pub disposed: bool,
}

impl LinkSnapshot {
    /// Returns `true` if the transport is open.
    #[inline]
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }
}

// ============================================================================
// LinkStatus
// ============================================================================

/// Atomic status cell shared between a link handle and its supervisor.
#[derive(Debug)]
pub(crate) struct LinkStatus {
    state: AtomicU8,
    enabled: AtomicBool,
    disposed: AtomicBool,
}

impl LinkStatus {
    pub(crate) fn new(enabled: bool) -> Self {
        Self {
            state: AtomicU8::new(ConnectionState::Disconnected.as_u8()),
            enabled: AtomicBool::new(enabled),
            disposed: AtomicBool::new(false),
        }
    }

    pub(crate) fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Stores a new state and returns the previous one.
    pub(crate) fn swap_state(&self, state: ConnectionState) -> ConnectionState {
        ConnectionState::from_u8(self.state.swap(state.as_u8(), Ordering::AcqRel))
    }

    pub(crate) fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    pub(crate) fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Release);
    }

    pub(crate) fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    /// Marks the status disposed. Returns `false` if it already was.
    pub(crate) fn mark_disposed(&self) -> bool {
        !self.disposed.swap(true, Ordering::AcqRel)
    }

    pub(crate) fn snapshot(&self) -> LinkSnapshot {
        LinkSnapshot {
            state: self.state(),
            enabled: self.is_enabled(),
            disposed: self.is_disposed(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
