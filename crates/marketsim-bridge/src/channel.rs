//! The two pub/sub channels between the bridge and the simulation process.
//!
//! Transports plug in through two traits:
//!
//! - [`CommandPublisher`] -- one-to-one, bridge -> process
//! - [`TelemetrySource`] -- process -> bridge, drained by a single reader
//!
//! Command handlers never talk to the transport directly. They push onto
//! the [`CommandChannel`], an in-process FIFO drained by one forwarder
//! task, so commands reach the transport in the order they were accepted.
//! Both channels outlive any individual simulation process; a command sent
//! while nothing is subscribed is simply not received.

use std::future::Future;

use marketsim_protocol::Command;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::ChannelError;

/// Commands buffered between handlers and the forwarder.
const COMMAND_BUFFER: usize = 64;

/// Sends encoded command lines to the simulation process.
pub trait CommandPublisher: Send + Sync + 'static {
    /// Publish one command line.
    fn publish(&self, line: String) -> impl Future<Output = Result<(), ChannelError>> + Send;
}

/// Yields raw telemetry frames emitted by the simulation process.
pub trait TelemetrySource: Send + 'static {
    /// Wait for the next frame.
    ///
    /// Errors are treated as transient by the listener; the source is
    /// polled again after a backoff.
    fn recv(&mut self) -> impl Future<Output = Result<Vec<u8>, ChannelError>> + Send;
}

/// Handle for submitting commands, cheap to clone and share between
/// request handlers.
#[derive(Debug, Clone)]
pub struct CommandChannel {
    tx: mpsc::Sender<String>,
}

/// Receiving end of a [`CommandChannel`], consumed by the forwarder.
#[derive(Debug)]
pub struct CommandQueue {
    rx: mpsc::Receiver<String>,
}

impl CommandChannel {
    /// Create a channel and the queue that drains it.
    pub fn new() -> (Self, CommandQueue) {
        let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
        (Self { tx }, CommandQueue { rx })
    }

    /// Encode and enqueue a command. Waits while the buffer is full.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::Closed`] once the forwarder has stopped.
    pub async fn send(&self, command: &Command) -> Result<(), ChannelError> {
        let line = command.encode();
        debug!(command = %line, "queueing command");
        if self.tx.send(line).await.is_err() {
            return Err(ChannelError::Closed);
        }
        Ok(())
    }
}

impl CommandQueue {
    /// Next queued line, or `None` once every [`CommandChannel`] is gone.
    pub async fn recv(&mut self) -> Option<String> {
        self.rx.recv().await
    }
}

/// Drain `queue` into `publisher` until cancelled.
///
/// Publish failures are logged and the command dropped; there is no retry.
pub async fn run_command_forwarder<P: CommandPublisher>(
    mut queue: CommandQueue,
    publisher: P,
    shutdown: CancellationToken,
) {
    info!("command forwarder started");
    loop {
        let line = tokio::select! {
            biased;
            () = shutdown.cancelled() => break,
            line = queue.recv() => line,
        };
        let Some(line) = line else {
            break;
        };
        match publisher.publish(line).await {
            Ok(()) => {}
            Err(e) => warn!(error = %e, "dropping command"),
        }
    }
    info!("command forwarder stopped");
}
