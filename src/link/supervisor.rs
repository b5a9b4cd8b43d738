//! Supervising task.
//!
//! Every link runs exactly one supervisor. It owns the transport channel,
//! drives the connect/reconnect state machine and is the only writer of the
//! connection state. Callers reach it through a command channel.
//!
//! # State Machine
//!
//! ```text
//!                connect()                 open ok
//! Disconnected ───────────► Connecting ───────────► Connected
//!      ▲                         │                      │
//!      │   open failed:          │                      │ read/write fault,
//!      │   retry after delay     │                      │ zero-length read:
//!      └─────────────────────────┘                      │ reconnect at once
//!      └────────────────────────────────────────────────┘
//! ```
//!
//! Disable tears the channel down (stream transports) and cancels any pending
//! connect or retry. Connectionless transports keep their socket and discard
//! inbound data while disabled.

// ============================================================================
// Imports
// ============================================================================

use std::future::pending;
use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until, timeout};
use tracing::{debug, info, trace, warn};

use crate::error::{Error, Result};
use crate::events::LinkEvent;
use crate::options::LinkOptions;
use crate::queue::PushOutcome;
use crate::transport::{Channel, Transport};

use super::LinkShared;
use super::status::ConnectionState;

// ============================================================================
// Types
// ============================================================================

/// In-flight connect attempt.
type ConnectTask = JoinHandle<Result<Box<dyn Channel>>>;

/// Commands from link handles to the supervisor.
#[derive(Debug)]
pub(crate) enum Command {
    /// Write a payload.
    Send(Vec<u8>),
    /// Apply an enabled-state change.
    SetEnabled(bool),
    /// Close the transport and exit.
    Shutdown,
}

// ============================================================================
// Supervisor
// ============================================================================

pub(crate) struct Supervisor {
    /// State shared with link handles.
    shared: Arc<LinkShared>,
    /// Opens channels.
    transport: Arc<dyn Transport>,
    /// Tuning.
    options: LinkOptions,
    /// Commands from handles.
    commands: mpsc::UnboundedReceiver<Command>,
    /// Open channel, if connected.
    channel: Option<Box<dyn Channel>>,
    /// In-flight connect; doubles as the "connect pending" marker.
    pending_connect: Option<ConnectTask>,
    /// Scheduled retry.
    retry_at: Option<Instant>,
    /// Receive buffer.
    read_buf: Vec<u8>,
}

impl Supervisor {
    /// Spawns the supervisor and returns its command sender.
    pub(crate) fn spawn(
        runtime: &Handle,
        shared: Arc<LinkShared>,
        transport: Arc<dyn Transport>,
        options: LinkOptions,
    ) -> mpsc::UnboundedSender<Command> {
        let (command_tx, commands) = mpsc::unbounded_channel();

        let supervisor = Self {
            shared,
            transport,
            read_buf: vec![0u8; options.read_buffer_size],
            options,
            commands,
            channel: None,
            pending_connect: None,
            retry_at: None,
        };
        runtime.spawn(supervisor.run());

        command_tx
    }

    /// Main loop.
    async fn run(mut self) {
        info!(
            link = %self.shared.id,
            endpoint = %self.transport.endpoint(),
            kind = %self.transport.kind(),
            "Link supervisor started"
        );

        self.connect();

        loop {
            let retry_at = self.retry_at;

            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(Command::Send(bytes)) => self.handle_send(bytes).await,
                    Some(Command::SetEnabled(enabled)) => self.handle_set_enabled(enabled).await,
                    Some(Command::Shutdown) => {
                        debug!(link = %self.shared.id, "Shutdown command received");
                        break;
                    }
                    None => {
                        debug!(link = %self.shared.id, "All link handles dropped");
                        break;
                    }
                },

                result = join_connect(&mut self.pending_connect), if self.pending_connect.is_some() => {
                    self.pending_connect = None;
                    self.on_connect_finished(result).await;
                }

                read = read_channel(&mut self.channel, &mut self.read_buf), if self.channel.is_some() => {
                    self.on_read(read).await;
                }

                () = sleep_until(retry_at.unwrap_or_else(Instant::now)), if retry_at.is_some() => {
                    self.retry_at = None;
                    debug!(link = %self.shared.id, "Retrying connect");
                    self.connect();
                }
            }
        }

        self.cancel_connect();
        self.close_channel().await;
        self.set_state(ConnectionState::Disconnected);

        info!(link = %self.shared.id, "Link supervisor stopped");
    }
}

// ============================================================================
// Supervisor - Commands
// ============================================================================

impl Supervisor {
    async fn handle_send(&mut self, bytes: Vec<u8>) {
        if !self.is_active() {
            trace!(link = %self.shared.id, "Send ignored while disabled");
            return;
        }

        if self.channel.is_none() {
            debug!(
                link = %self.shared.id,
                len = bytes.len(),
                "Send dropped while disconnected"
            );
            self.report(Error::NotConnected, "send");
            return;
        }
        let Some(channel) = self.channel.as_mut() else {
            return;
        };

        let result = channel.send(&bytes).await;
        match result {
            Ok(()) => trace!(link = %self.shared.id, len = bytes.len(), "Sent"),
            Err(e) if self.transport.is_connectionless() => {
                warn!(link = %self.shared.id, error = %e, "Datagram send failed");
                self.report(e, "send");
            }
            Err(e) => self.fault(e, "send").await,
        }
    }

    async fn handle_set_enabled(&mut self, enabled: bool) {
        if enabled {
            if self.channel.is_none() {
                self.connect();
            }
            return;
        }

        self.cancel_connect();

        if !self.transport.is_connectionless() {
            self.close_channel().await;
            self.set_state(ConnectionState::Disconnected);
        }
    }
}

// ============================================================================
// Supervisor - Connection Lifecycle
// ============================================================================

impl Supervisor {
    /// Starts a connect attempt unless one is pending or not wanted.
    fn connect(&mut self) {
        if !self.is_active() {
            return;
        }
        if self.pending_connect.is_some() {
            debug!(link = %self.shared.id, "Connect already in flight");
            return;
        }
        if self.channel.is_some() {
            return;
        }

        self.retry_at = None;
        self.set_state(ConnectionState::Connecting);

        let transport = Arc::clone(&self.transport);
        let connect_timeout = self.options.connect_timeout;

        debug!(
            link = %self.shared.id,
            endpoint = %transport.endpoint(),
            "Connecting"
        );

        self.pending_connect = Some(tokio::spawn(async move {
            timeout(connect_timeout, transport.open())
                .await
                .map_err(|_| Error::connection_timeout(connect_timeout))?
        }));
    }

    async fn on_connect_finished(&mut self, result: Result<Box<dyn Channel>>) {
        match result {
            Ok(mut channel) => {
                if !self.is_active() {
                    channel.close().await;
                    self.set_state(ConnectionState::Disconnected);
                    return;
                }

                self.channel = Some(channel);
                info!(
                    link = %self.shared.id,
                    endpoint = %self.transport.endpoint(),
                    "Link connected"
                );
                self.set_state(ConnectionState::Connected);
            }
            Err(e) => {
                warn!(
                    link = %self.shared.id,
                    endpoint = %self.transport.endpoint(),
                    error = %e,
                    "Connect failed"
                );
                self.set_state(ConnectionState::Disconnected);
                self.report(e, format!("connect to {}", self.transport.endpoint()));
                self.schedule_retry();
            }
        }
    }

    fn schedule_retry(&mut self) {
        if !self.is_active() {
            return;
        }
        let delay = self.options.reconnect_delay;
        self.retry_at = Some(Instant::now() + delay);
        debug!(
            link = %self.shared.id,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            "Reconnect scheduled"
        );
    }

    /// Drops any pending connect and scheduled retry.
    fn cancel_connect(&mut self) {
        if let Some(task) = self.pending_connect.take() {
            task.abort();
            debug!(link = %self.shared.id, "Pending connect cancelled");
        }
        self.retry_at = None;
    }

    async fn close_channel(&mut self) {
        if let Some(mut channel) = self.channel.take() {
            channel.close().await;
            debug!(link = %self.shared.id, "Channel closed");
        }
    }

    /// Tears the channel down after a fault and reconnects immediately.
    async fn fault(&mut self, error: Error, context: &str) {
        warn!(
            link = %self.shared.id,
            context,
            error = %error,
            "Transport fault"
        );

        self.close_channel().await;
        self.set_state(ConnectionState::Disconnected);
        self.report(error, context);
        self.connect();
    }
}

// ============================================================================
// Supervisor - Receive Path
// ============================================================================

impl Supervisor {
    async fn on_read(&mut self, read: Result<usize>) {
        let connectionless = self.transport.is_connectionless();

        match read {
            Ok(0) if connectionless => {}
            Ok(0) => self.fault(Error::ConnectionClosed, "receive").await,
            Ok(n) => self.enqueue(n),
            Err(e) if connectionless => {
                warn!(link = %self.shared.id, error = %e, "Datagram receive failed");
                self.report(e, "receive");
            }
            Err(e) => self.fault(e, "receive").await,
        }
    }

    fn enqueue(&mut self, len: usize) {
        if !self.is_active() {
            trace!(link = %self.shared.id, len, "Inbound data discarded while disabled");
            return;
        }

        let chunk = self.read_buf[..len].to_vec();
        let outcome = self.shared.queue.push(chunk);

        if let PushOutcome::Overflowed { dropped } = outcome {
            warn!(
                link = %self.shared.id,
                capacity = self.shared.queue.capacity(),
                dropped,
                "Inbound queue overflow"
            );
            self.report(
                Error::queue_overflow(self.shared.queue.capacity(), dropped),
                "inbound queue",
            );
        }

        trace!(link = %self.shared.id, len, "Chunk queued");
        self.shared.events.emit(&LinkEvent::DataReceived);
    }
}

// ============================================================================
// Supervisor - Helpers
// ============================================================================

impl Supervisor {
    fn is_active(&self) -> bool {
        let status = &self.shared.status;
        status.is_enabled() && !status.is_disposed()
    }

    /// Stores a state and raises `ConnectedChanged` when connectivity flips.
    fn set_state(&self, state: ConnectionState) {
        let previous = self.shared.status.swap_state(state);
        let was_connected = previous == ConnectionState::Connected;
        let is_connected = state == ConnectionState::Connected;

        if was_connected != is_connected {
            self.shared
                .events
                .emit(&LinkEvent::ConnectedChanged(is_connected));
        }
    }

    fn report(&self, error: Error, context: impl Into<String>) {
        self.shared.events.emit(&LinkEvent::error(error, context));
    }
}

/// Awaits the pending connect, or never resolves if there is none.
async fn join_connect(slot: &mut Option<ConnectTask>) -> Result<Box<dyn Channel>> {
    match slot {
        Some(task) => match task.await {
            Ok(result) => result,
            Err(e) => Err(Error::connection(format!("connect task failed: {e}"))),
        },
        None => pending_forever().await,
    }
}

/// Reads from the channel, or never resolves if there is none.
async fn read_channel(channel: &mut Option<Box<dyn Channel>>, buf: &mut [u8]) -> Result<usize> {
    match channel {
        Some(channel) => channel.receive(buf).await,
        None => pending_forever().await,
    }
}

async fn pending_forever<T>() -> T {
    pending().await
}
