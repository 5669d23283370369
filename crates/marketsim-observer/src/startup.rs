//! Viewer server startup helper for embedding in the relay binary.
//!
//! Provides [`spawn_observer`] which binds the listening socket up front
//! and then runs the server on a background Tokio task, so a port
//! conflict is reported before the relay considers itself started.
//!
//! # Usage
//!
//! ```rust,ignore
//! use marketsim_observer::startup::spawn_observer;
//!
//! let state = Arc::new(AppState::from_bridge(&bridge));
//! let handle = spawn_observer(&config, state, bridge.shutdown_token()).await?;
//! // ... later, after the token is cancelled:
//! handle.await?;
//! ```

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::server::{ServerConfig, ServerError};
use crate::state::AppState;

/// Errors that can occur when spawning the viewer server.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    /// The server failed to bind or start.
    #[error("server start error: {0}")]
    Server(#[from] ServerError),
}

/// A server running on a background task.
#[derive(Debug)]
pub struct ObserverHandle {
    /// The address actually bound (useful with port 0).
    pub addr: SocketAddr,
    /// The server task; completes after graceful shutdown.
    pub task: JoinHandle<Result<(), ServerError>>,
}

/// Bind and spawn the viewer HTTP server on a background Tokio task.
///
/// The server runs until `shutdown` is cancelled, then finishes in-flight
/// requests and closes open `WebSocket` connections.
///
/// # Errors
///
/// Returns [`StartupError::Server`] if the address is invalid or cannot
/// be bound. This is detected before the background task is spawned.
pub async fn spawn_observer(
    config: &ServerConfig,
    state: Arc<AppState>,
    shutdown: CancellationToken,
) -> Result<ObserverHandle, StartupError> {
    let listener = crate::server::bind(config).await?;
    let addr = listener
        .local_addr()
        .map_err(|e| ServerError::Bind(format!("failed to read bound address: {e}")))?;

    let task = tokio::spawn(crate::server::serve(listener, state, shutdown));
    tracing::info!(%addr, "viewer server spawned on background task");

    Ok(ObserverHandle { addr, task })
}
