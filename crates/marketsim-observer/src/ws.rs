//! `WebSocket` handler: the bidirectional viewer connection.
//!
//! Clients connect to `GET /ws`. Every text frame they send is a JSON
//! request envelope (`{"event": ..., "data": {...}}`); every frame they
//! receive is a JSON [`ClientEvent`].
//!
//! Telemetry comes from the shared broadcast, so all connected clients
//! see the same stream. A client that falls behind skips ahead to the
//! newest event. Rejected requests produce an `error` event for the
//! requesting client only.
//!
//! Requests from one connection are handled one at a time, in arrival
//! order, on a task of their own, so a `start_simulation` waiting out
//! its settle interval never holds up telemetry delivery.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use marketsim_bridge::Dispatcher;
use marketsim_protocol::ClientEvent;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::state::AppState;

/// Requests a single connection may have waiting before new ones are
/// rejected.
const PENDING_REQUESTS: usize = 32;

/// Upgrade an HTTP request to a `WebSocket` connection.
///
/// # Route
///
/// `GET /ws`
pub async fn ws_viewer(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_ws(socket, state))
}

/// Carry out one request, returning the `error` event to send back if it
/// was rejected.
pub async fn handle_request(dispatcher: &Dispatcher, text: &str) -> Option<ClientEvent> {
    match dispatcher.handle_text(text).await {
        Ok(()) => None,
        Err(e) => {
            debug!(error = %e, "request rejected");
            Some(ClientEvent::error(e.client_message()))
        }
    }
}

/// Handle the `WebSocket` lifecycle until the client leaves or the bridge
/// shuts down.
async fn handle_ws(mut socket: WebSocket, state: Arc<AppState>) {
    let id = Uuid::new_v4();
    debug!(client = %id, "WebSocket client connected");

    let mut rx = state.subscribe();
    let (request_tx, request_rx) = mpsc::channel::<String>(PENDING_REQUESTS);
    let (reply_tx, mut reply_rx) = mpsc::channel::<ClientEvent>(PENDING_REQUESTS);
    tokio::spawn(run_requests(
        id,
        state.dispatcher.clone(),
        request_rx,
        reply_tx,
    ));

    loop {
        tokio::select! {
            () = state.shutdown.cancelled() => {
                debug!(client = %id, "bridge shutting down, closing WebSocket");
                let _ = socket.send(Message::Close(None)).await;
                break;
            }
            // Telemetry for everybody.
            result = rx.recv() => {
                match result {
                    Ok(event) => {
                        if !send_event(&mut socket, &event).await {
                            debug!(client = %id, "WebSocket client disconnected (send failed)");
                            break;
                        }
                    }
                    Err(RecvError::Lagged(n)) => {
                        debug!(client = %id, skipped = n, "WebSocket client lagged, skipping ahead");
                    }
                    Err(RecvError::Closed) => {
                        debug!(client = %id, "broadcast channel closed, shutting down WebSocket");
                        break;
                    }
                }
            }
            // Replies for this client only.
            Some(event) = reply_rx.recv() => {
                if !send_event(&mut socket, &event).await {
                    debug!(client = %id, "WebSocket client disconnected (send failed)");
                    break;
                }
            }
            msg = socket.recv() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        match request_tx.try_send(text.as_str().to_owned()) {
                            Ok(()) => {}
                            Err(mpsc::error::TrySendError::Full(_)) => {
                                let busy = ClientEvent::error("Too many pending requests.");
                                if !send_event(&mut socket, &busy).await {
                                    break;
                                }
                            }
                            Err(mpsc::error::TrySendError::Closed(_)) => break,
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        debug!(client = %id, "WebSocket client disconnected");
                        break;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if socket.send(Message::Pong(data)).await.is_err() {
                            debug!(client = %id, "WebSocket client disconnected (pong failed)");
                            break;
                        }
                    }
                    Some(Err(e)) => {
                        debug!(client = %id, "WebSocket error: {e}");
                        break;
                    }
                    _ => {
                        // Binary and pong frames carry nothing for us.
                    }
                }
            }
        }
    }
    // Requests already accepted still run to completion.
}

/// Handle one connection's requests sequentially.
async fn run_requests(
    id: Uuid,
    dispatcher: Dispatcher,
    mut requests: mpsc::Receiver<String>,
    replies: mpsc::Sender<ClientEvent>,
) {
    while let Some(text) = requests.recv().await {
        if let Some(error) = handle_request(&dispatcher, &text).await {
            // The connection may be gone by now; nobody else wants it.
            let _ = replies.send(error).await;
        }
    }
    debug!(client = %id, "request handler finished");
}

/// Serialize and send one event. Returns `false` if the socket is gone.
async fn send_event(socket: &mut WebSocket, event: &ClientEvent) -> bool {
    let json = match serde_json::to_string(event) {
        Ok(j) => j,
        Err(e) => {
            warn!("Failed to serialize client event: {e}");
            return true;
        }
    };
    socket.send(Message::Text(json.into())).await.is_ok()
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use marketsim_bridge::loopback;
    use marketsim_bridge::{Bridge, BridgeConfig};

    use super::*;

    fn quiet_config() -> BridgeConfig {
        let mut config = BridgeConfig::default();
        config.supervisor.settle_interval_ms = 0;
        config.supervisor.stop_grace_ms = 0;
        config.supervisor.binaries.clear();
        config
    }

    #[tokio::test]
    async fn accepted_requests_produce_no_reply() {
        let (_feed, source) = loopback::telemetry();
        let (publisher, mut tap) = loopback::commands();
        let bridge = Bridge::start(&quiet_config(), publisher, source);

        let reply = handle_request(bridge.dispatcher(), r#"{"event":"pause_simulation"}"#).await;
        assert_eq!(reply, None);
        let line = tokio::time::timeout(Duration::from_secs(5), tap.recv()).await;
        assert_eq!(line.ok().flatten().as_deref(), Some("PAUSE"));

        bridge.shutdown().await;
    }

    #[tokio::test]
    async fn rejected_requests_produce_an_error_event() {
        let (_feed, source) = loopback::telemetry();
        let (publisher, _tap) = loopback::commands();
        let bridge = Bridge::start(&quiet_config(), publisher, source);

        let reply = handle_request(
            bridge.dispatcher(),
            r#"{"event":"start_simulation","data":{"mode":"volatile","makers":1,"fundamental":1,"momentum":1,"noise":1}}"#,
        )
        .await;
        assert_eq!(reply, Some(ClientEvent::error("Binary volatile not found.")));

        let reply = handle_request(bridge.dispatcher(), "{").await;
        assert!(matches!(reply, Some(ClientEvent::Error { .. })));

        bridge.shutdown().await;
    }
}
