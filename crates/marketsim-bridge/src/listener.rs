//! The long-lived task that drains the telemetry channel.
//!
//! Each frame is decoded and, on success, handed to the [`EventFanout`]
//! as a [`ClientEvent`]. Undecodable frames and receive errors are
//! logged, followed by a short backoff, and otherwise ignored. Nothing
//! short of cancellation ends the loop.
//!
//! Delivery is at most once: frames are never retried, and a frame that
//! arrives while no viewer is connected is simply not seen by anyone.

use std::time::Duration;

use marketsim_protocol::{ClientEvent, Telemetry};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::channel::TelemetrySource;
use crate::error::ChannelError;
use crate::fanout::EventFanout;

/// Counters reported when the listener stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListenerStats {
    /// Frames decoded and published to the fan-out.
    pub delivered: u64,
    /// Frames dropped because they did not decode.
    pub dropped: u64,
    /// Receive attempts that failed.
    pub receive_errors: u64,
}

/// Decodes telemetry from a [`TelemetrySource`] into the fan-out.
#[derive(Debug)]
pub struct TelemetryListener<S> {
    source: S,
    fanout: EventFanout,
    backoff: Duration,
    stats: ListenerStats,
}

impl<S: TelemetrySource> TelemetryListener<S> {
    /// Create a listener. `backoff` is the pause after any failure.
    pub const fn new(source: S, fanout: EventFanout, backoff: Duration) -> Self {
        Self {
            source,
            fanout,
            backoff,
            stats: ListenerStats {
                delivered: 0,
                dropped: 0,
                receive_errors: 0,
            },
        }
    }

    /// Run until `shutdown` is cancelled.
    ///
    /// Cancellation is observed between frames and during a backoff, never
    /// in the middle of publishing one.
    pub async fn run(mut self, shutdown: CancellationToken) -> ListenerStats {
        info!("telemetry listener started");
        loop {
            let received = tokio::select! {
                biased;
                () = shutdown.cancelled() => break,
                received = self.source.recv() => received,
            };

            let failed = match received {
                Ok(frame) => !self.handle_frame(&frame),
                Err(e) => {
                    self.record_receive_error(&e);
                    true
                }
            };

            if failed && Self::pause(self.backoff, &shutdown).await {
                break;
            }
        }
        info!(
            delivered = self.stats.delivered,
            dropped = self.stats.dropped,
            receive_errors = self.stats.receive_errors,
            "telemetry listener stopped"
        );
        self.stats
    }

    /// Decode one frame and publish it. Returns `false` if it was dropped.
    fn handle_frame(&mut self, frame: &[u8]) -> bool {
        match Telemetry::decode_frame(frame) {
            Ok(telemetry) => {
                let viewers = self.fanout.publish(ClientEvent::from(telemetry));
                self.stats.delivered = self.stats.delivered.saturating_add(1);
                debug!(viewers, "telemetry relayed");
                true
            }
            Err(e) => {
                self.stats.dropped = self.stats.dropped.saturating_add(1);
                debug!(error = %e, "dropping undecodable telemetry");
                false
            }
        }
    }

    fn record_receive_error(&mut self, error: &ChannelError) {
        self.stats.receive_errors = self.stats.receive_errors.saturating_add(1);
        warn!(error = %error, "telemetry receive failed");
    }

    /// Sleep for `backoff`. Returns `true` if cancelled meanwhile.
    ///
    /// Takes no `&self` so the `run` future stays `Send` for sources that
    /// are not `Sync`.
    async fn pause(backoff: Duration, shutdown: &CancellationToken) -> bool {
        tokio::select! {
            biased;
            () = shutdown.cancelled() => true,
            () = tokio::time::sleep(backoff) => false,
        }
    }
}
