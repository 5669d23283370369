//! In-process channel transport.
//!
//! Stands in for the broker when the bridge is exercised without one:
//! tests feed telemetry frames through a [`TelemetryFeed`] and inspect
//! forwarded commands through a [`CommandTap`].

use tokio::sync::mpsc;

use crate::channel::{CommandPublisher, TelemetrySource};
use crate::error::ChannelError;

/// Create a connected telemetry feed and source.
pub fn telemetry() -> (TelemetryFeed, LoopbackTelemetry) {
    let (tx, rx) = mpsc::unbounded_channel();
    (TelemetryFeed { tx }, LoopbackTelemetry { rx })
}

/// Create a connected command publisher and tap.
pub fn commands() -> (LoopbackPublisher, CommandTap) {
    let (tx, rx) = mpsc::unbounded_channel();
    (LoopbackPublisher { tx }, CommandTap { rx })
}

/// Writing end of a loopback telemetry channel; plays the simulation
/// process.
#[derive(Debug, Clone)]
pub struct TelemetryFeed {
    tx: mpsc::UnboundedSender<Result<Vec<u8>, ChannelError>>,
}

impl TelemetryFeed {
    /// Emit one text line.
    pub fn send_line(&self, line: &str) {
        self.send_frame(line.as_bytes().to_vec());
    }

    /// Emit one raw frame.
    pub fn send_frame(&self, frame: Vec<u8>) {
        // A dropped source means nobody is listening, same as the broker.
        let _ = self.tx.send(Ok(frame));
    }

    /// Make the next receive fail with `error`.
    pub fn fail(&self, error: ChannelError) {
        let _ = self.tx.send(Err(error));
    }
}

/// Reading end of a loopback telemetry channel.
#[derive(Debug)]
pub struct LoopbackTelemetry {
    rx: mpsc::UnboundedReceiver<Result<Vec<u8>, ChannelError>>,
}

impl TelemetrySource for LoopbackTelemetry {
    async fn recv(&mut self) -> Result<Vec<u8>, ChannelError> {
        self.rx.recv().await.unwrap_or(Err(ChannelError::Closed))
    }
}

/// Publishing end of a loopback command channel.
#[derive(Debug, Clone)]
pub struct LoopbackPublisher {
    tx: mpsc::UnboundedSender<String>,
}

impl CommandPublisher for LoopbackPublisher {
    async fn publish(&self, line: String) -> Result<(), ChannelError> {
        self.tx.send(line).map_err(|_unsent| ChannelError::Closed)
    }
}

/// Receiving end of a loopback command channel; plays the simulation
/// process.
#[derive(Debug)]
pub struct CommandTap {
    rx: mpsc::UnboundedReceiver<String>,
}

impl CommandTap {
    /// Wait for the next forwarded command line.
    pub async fn recv(&mut self) -> Option<String> {
        self.rx.recv().await
    }

    /// The next forwarded command line, if one is already waiting.
    pub fn try_recv(&mut self) -> Option<String> {
        self.rx.try_recv().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn feed_reaches_source_in_order() {
        let (feed, mut source) = telemetry();
        feed.send_line("DATA 1 2");
        feed.fail(ChannelError::Receive("x".to_owned()));
        assert_eq!(source.recv().await, Ok(b"DATA 1 2".to_vec()));
        assert_eq!(
            source.recv().await,
            Err(ChannelError::Receive("x".to_owned()))
        );
    }

    #[tokio::test]
    async fn dropped_feed_reads_as_closed() {
        let (feed, mut source) = telemetry();
        drop(feed);
        assert_eq!(source.recv().await, Err(ChannelError::Closed));
    }

    #[tokio::test]
    async fn publisher_reaches_tap() {
        let (publisher, mut tap) = commands();
        assert!(publisher.publish("PAUSE".to_owned()).await.is_ok());
        assert_eq!(tap.try_recv().as_deref(), Some("PAUSE"));
        assert_eq!(tap.try_recv(), None);

        drop(tap);
        assert_eq!(
            publisher.publish("RESUME".to_owned()).await,
            Err(ChannelError::Closed)
        );
    }
}
