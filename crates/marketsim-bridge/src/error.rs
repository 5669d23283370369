//! Error types for the bridge.
//!
//! Lifecycle and request failures are recovered at the request boundary
//! and reported to the originating viewer only; see
//! [`BridgeError::client_message`]. Telemetry decode failures never reach
//! this type: the listener drops them where they occur.

use marketsim_protocol::RequestError;

/// Errors raised while handling a viewer request.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// The requested mode is unknown or its executable does not exist.
    #[error("binary for mode {mode:?} not found at {path}")]
    BinaryNotFound {
        /// The requested mode.
        mode: String,
        /// The configured path, or the mode name if it has no entry.
        path: String,
    },

    /// The OS refused to create the simulation process.
    #[error("failed to spawn simulation {mode:?}: {source}")]
    Spawn {
        /// The requested mode.
        mode: String,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The command or telemetry channel failed.
    #[error(transparent)]
    Channel(#[from] ChannelError),

    /// The request failed validation.
    #[error(transparent)]
    InvalidRequest(#[from] RequestError),
}

impl BridgeError {
    /// The message sent to the viewer in an `error` event.
    pub fn client_message(&self) -> String {
        match self {
            Self::BinaryNotFound { path, .. } => format!("Binary {path} not found."),
            Self::Spawn { source, .. } => source.to_string(),
            Self::Channel(e) => e.to_string(),
            Self::InvalidRequest(e) => e.to_string(),
        }
    }
}

/// Failures of the pub/sub plumbing between bridge and process.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChannelError {
    /// The channel has been shut down.
    #[error("channel closed")]
    Closed,

    /// Could not reach the transport.
    #[error("transport connect failed: {0}")]
    Connect(String),

    /// Could not subscribe to a subject.
    #[error("subscribe failed: {0}")]
    Subscribe(String),

    /// A message could not be published.
    #[error("publish failed: {0}")]
    Publish(String),

    /// A receive was interrupted; the next one may succeed.
    #[error("receive interrupted: {0}")]
    Receive(String),
}
