//! Assembly and shutdown of the running bridge.
//!
//! [`Bridge::start`] wires the components together and spawns the two
//! long-lived tasks: the telemetry listener and the command forwarder.
//! Both observe one [`CancellationToken`]; [`Bridge::shutdown`] cancels
//! it, waits for them, and then terminates any active simulation.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::channel::{run_command_forwarder, CommandChannel, CommandPublisher, TelemetrySource};
use crate::config::BridgeConfig;
use crate::dispatch::Dispatcher;
use crate::fanout::EventFanout;
use crate::listener::{ListenerStats, TelemetryListener};
use crate::supervisor::Supervisor;

/// A running bridge.
#[derive(Debug)]
pub struct Bridge {
    dispatcher: Dispatcher,
    fanout: EventFanout,
    shutdown: CancellationToken,
    listener: JoinHandle<ListenerStats>,
    forwarder: JoinHandle<()>,
}

impl Bridge {
    /// Start the bridge over the given transport halves.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start<P, S>(config: &BridgeConfig, publisher: P, source: S) -> Self
    where
        P: CommandPublisher,
        S: TelemetrySource,
    {
        let shutdown = CancellationToken::new();
        let fanout = EventFanout::new(config.fanout.capacity);
        let supervisor = Arc::new(Supervisor::new(&config.supervisor));
        let (commands, queue) = CommandChannel::new();

        let forwarder = tokio::spawn(run_command_forwarder(queue, publisher, shutdown.clone()));
        let listener = TelemetryListener::new(source, fanout.clone(), config.listener.backoff());
        let listener = tokio::spawn(listener.run(shutdown.clone()));

        let dispatcher = Dispatcher::new(supervisor, commands, config.supervisor.stop_grace());
        info!(
            default_mode = %config.supervisor.default_mode,
            modes = config.supervisor.binaries.len(),
            "bridge started"
        );

        Self {
            dispatcher,
            fanout,
            shutdown,
            listener,
            forwarder,
        }
    }

    /// Request router for viewer traffic.
    pub const fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Broadcast hub viewers subscribe to.
    pub const fn fanout(&self) -> &EventFanout {
        &self.fanout
    }

    /// The simulation supervisor.
    pub const fn supervisor(&self) -> &Arc<Supervisor> {
        self.dispatcher.supervisor()
    }

    /// Token cancelled when shutdown begins; other subsystems (the HTTP
    /// server) can tie their own lifetime to it.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Stop the background tasks and terminate any active simulation.
    ///
    /// Returns the listener's counters.
    pub async fn shutdown(self) -> ListenerStats {
        info!("bridge shutting down");
        self.shutdown.cancel();

        if let Err(e) = self.forwarder.await {
            warn!(error = %e, "command forwarder task failed");
        }
        let stats = match self.listener.await {
            Ok(stats) => stats,
            Err(e) => {
                warn!(error = %e, "telemetry listener task failed");
                ListenerStats::default()
            }
        };

        self.dispatcher.supervisor().stop().await;
        info!("bridge stopped");
        stats
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::future::Future;
    use std::marker::PhantomData;
    use std::time::Duration;

    use marketsim_protocol::ClientEvent;

    use super::*;
    use crate::error::ChannelError;
    use crate::loopback::{self, LoopbackTelemetry};

    /// A source that may move between threads but not be shared.
    struct ThreadBound {
        inner: LoopbackTelemetry,
        _not_sync: PhantomData<Cell<()>>,
    }

    impl TelemetrySource for ThreadBound {
        fn recv(&mut self) -> impl Future<Output = Result<Vec<u8>, ChannelError>> + Send {
            self.inner.recv()
        }
    }

    fn quiet_config() -> BridgeConfig {
        let mut config = BridgeConfig::default();
        config.supervisor.binaries.clear();
        config.supervisor.stop_grace_ms = 0;
        config
    }

    #[tokio::test]
    async fn starts_with_a_source_that_is_not_sync() {
        let (feed, inner) = loopback::telemetry();
        let (publisher, _tap) = loopback::commands();
        let source = ThreadBound {
            inner,
            _not_sync: PhantomData,
        };

        let bridge = Bridge::start(&quiet_config(), publisher, source);
        let mut rx = bridge.fanout().subscribe();
        feed.send_line("METRICS 0.05 1200");

        let event = tokio::time::timeout(Duration::from_secs(5), rx.recv()).await;
        assert!(matches!(
            event,
            Ok(Ok(ClientEvent::MarketMetrics { .. }))
        ));

        let stats = bridge.shutdown().await;
        assert_eq!(stats.delivered, 1);
    }
}
