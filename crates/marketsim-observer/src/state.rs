//! Shared application state for the viewer API server.
//!
//! [`AppState`] is a thin view over a running bridge: the dispatcher that
//! carries out viewer requests, the fan-out viewers subscribe to, and the
//! shutdown token that closes open sockets when the bridge stops.

use marketsim_bridge::{Bridge, Dispatcher, EventFanout, ProcessStatus};
use marketsim_protocol::ClientEvent;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

/// Shared state for the Axum application.
///
/// Wrapped in [`Arc`](std::sync::Arc) and injected via Axum's `State`
/// extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Request router into the bridge.
    pub dispatcher: Dispatcher,
    /// Telemetry broadcast hub.
    pub fanout: EventFanout,
    /// Cancelled when the bridge shuts down.
    pub shutdown: CancellationToken,
}

impl AppState {
    /// Create state from its parts.
    pub const fn new(
        dispatcher: Dispatcher,
        fanout: EventFanout,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            dispatcher,
            fanout,
            shutdown,
        }
    }

    /// Create state serving a running bridge.
    pub fn from_bridge(bridge: &Bridge) -> Self {
        Self::new(
            bridge.dispatcher().clone(),
            bridge.fanout().clone(),
            bridge.shutdown_token(),
        )
    }

    /// Subscribe to the telemetry broadcast.
    ///
    /// Returns a receiver that yields every event published after this
    /// call.
    pub fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
        self.fanout.subscribe()
    }

    /// Current simulation process status.
    pub fn process_status(&self) -> ProcessStatus {
        self.dispatcher.supervisor().refresh()
    }
}
