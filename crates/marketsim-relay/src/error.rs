//! Error types for the relay binary.

use marketsim_bridge::{ChannelError, ConfigError};
use marketsim_observer::{ServerError, StartupError};

/// Top-level error for the relay binary.
///
/// Each variant wraps a specific subsystem error, providing a single
/// error type that `main` can propagate with `?`.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: ConfigError,
    },

    /// The NATS transport could not be set up.
    #[error("transport error: {source}")]
    Transport {
        /// The underlying channel error.
        #[from]
        source: ChannelError,
    },

    /// The viewer server failed to start.
    #[error("observer error: {source}")]
    Startup {
        /// The underlying startup error.
        #[from]
        source: StartupError,
    },

    /// The viewer server stopped with an error.
    #[error("observer error: {source}")]
    Server {
        /// The underlying server error.
        #[from]
        source: ServerError,
    },
}
