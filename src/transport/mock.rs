//! In-memory transport for link tests.
//!
//! Each `open` creates a fresh channel fed by an unbounded sender kept in
//! [`MockState`], so tests can inject inbound chunks, fail connects or writes,
//! and drop the peer.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::error::{Error, Result};

use super::{Channel, Transport, TransportKind};

// ============================================================================
// MockState
// ============================================================================

/// Shared knobs and counters.
#[derive(Default)]
pub(crate) struct MockState {
    pub connects: AtomicUsize,
    pub in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    pub fail_connect: AtomicBool,
    pub fail_send: AtomicBool,
    pub sent: Mutex<Vec<Vec<u8>>>,
    peer: Mutex<Option<mpsc::UnboundedSender<Vec<u8>>>>,
}

impl MockState {
    /// Delivers a chunk to the current channel. Returns `false` if none is open.
    pub fn inject(&self, bytes: &[u8]) -> bool {
        match &*self.peer.lock() {
            Some(tx) => tx.send(bytes.to_vec()).is_ok(),
            None => false,
        }
    }

    /// Drops the peer side; the channel then reads zero bytes.
    pub fn hang_up(&self) {
        self.peer.lock().take();
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn sent(&self) -> Vec<Vec<u8>> {
        self.sent.lock().clone()
    }
}

// ============================================================================
// MockTransport
// ============================================================================

pub(crate) struct MockTransport {
    pub state: Arc<MockState>,
    connectionless: bool,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            state: Arc::new(MockState::default()),
            connectionless: false,
        }
    }

    pub fn connectionless() -> Self {
        Self {
            connectionless: true,
            ..Self::new()
        }
    }
}

#[async_trait]
impl Transport for MockTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Custom
    }

    fn endpoint(&self) -> String {
        "mock".into()
    }

    fn is_connectionless(&self) -> bool {
        self.connectionless
    }

    async fn open(&self) -> Result<Box<dyn Channel>> {
        let state = &self.state;
        state.connects.fetch_add(1, Ordering::SeqCst);
        let now = state.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        state.max_in_flight.fetch_max(now, Ordering::SeqCst);

        tokio::time::sleep(Duration::from_millis(5)).await;
        state.in_flight.fetch_sub(1, Ordering::SeqCst);

        if state.fail_connect.load(Ordering::SeqCst) {
            return Err(Error::connection("mock refused"));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        *state.peer.lock() = Some(tx);

        Ok(Box::new(MockChannel {
            state: Arc::clone(state),
            rx,
            pending: Vec::new(),
        }))
    }
}

// ============================================================================
// MockChannel
// ============================================================================

struct MockChannel {
    state: Arc<MockState>,
    rx: mpsc::UnboundedReceiver<Vec<u8>>,
    pending: Vec<u8>,
}

#[async_trait]
impl Channel for MockChannel {
    async fn send(&mut self, bytes: &[u8]) -> Result<()> {
        if self.state.fail_send.load(Ordering::SeqCst) {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "mock write fault",
            )));
        }
        self.state.sent.lock().push(bytes.to_vec());
        Ok(())
    }

    async fn receive(&mut self, buf: &mut [u8]) -> Result<usize> {
        if self.pending.is_empty() {
            match self.rx.recv().await {
                Some(chunk) => self.pending = chunk,
                None => return Ok(0),
            }
        }
        let n = self.pending.len().min(buf.len());
        buf[..n].copy_from_slice(&self.pending[..n]);
        self.pending.drain(..n);
        Ok(n)
    }

    async fn close(&mut self) {
        self.rx.close();
    }
}
