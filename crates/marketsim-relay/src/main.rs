//! Relay binary for the market simulation.
//!
//! Wires the bridge to NATS and serves viewers over HTTP and `WebSocket`
//! until interrupted.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `marketsim-config.yaml`
//! 2. Initialize structured logging (tracing)
//! 3. Connect to NATS and subscribe to the telemetry subject
//! 4. Start the bridge (telemetry listener + command forwarder)
//! 5. Start the viewer server
//! 6. Wait for Ctrl-C / `SIGTERM`
//!
//! # Shutdown Sequence
//!
//! 1. Cancel the shutdown token (listener, forwarder, open sockets)
//! 2. Let the viewer server drain
//! 3. Terminate the active simulation process, if any

mod error;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use marketsim_bridge::{Bridge, BridgeConfig, LogFormat, NatsTransport};
use marketsim_observer::{spawn_observer, AppState, ServerConfig};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::error::RelayError;

/// Default configuration file, relative to the working directory.
const DEFAULT_CONFIG_PATH: &str = "marketsim-config.yaml";

/// Application entry point for the relay.
///
/// # Errors
///
/// Returns an error if configuration, the NATS connection, or the viewer
/// server cannot be set up.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load configuration. Logging depends on it, so failures here are
    //    reported through the returned error only.
    let config_path = config_path(|name| std::env::var(name).ok());
    let config = load_config(&config_path)?;

    // 2. Initialize structured logging.
    init_tracing(&config);
    info!(
        path = %config_path.display(),
        nats_url = %config.transport.nats_url,
        port = config.server.port,
        default_mode = %config.supervisor.default_mode,
        "marketsim-relay starting"
    );

    run(config).await?;
    Ok(())
}

async fn run(config: BridgeConfig) -> Result<(), RelayError> {
    // 3. Connect to NATS.
    let transport = NatsTransport::connect(&config.transport).await?;
    let source = transport.telemetry_source().await?;
    let publisher = transport.command_publisher();

    // 4. Start the bridge.
    let bridge = Bridge::start(&config, publisher, source);
    let shutdown = bridge.shutdown_token();

    // 5. Start the viewer server.
    let state = Arc::new(AppState::from_bridge(&bridge));
    let server = match spawn_observer(&ServerConfig::from(&config.server), state, shutdown.clone()).await {
        Ok(server) => server,
        Err(e) => {
            bridge.shutdown().await;
            return Err(e.into());
        }
    };
    info!(addr = %server.addr, "viewer server started");

    // 6. Run until interrupted or the server dies on its own.
    let mut server_task = server.task;
    let early_exit = tokio::select! {
        () = shutdown_signal() => None,
        result = &mut server_task => Some(result),
    };

    // Shutdown: token first, then the server, then the simulation.
    shutdown.cancel();
    let served = match early_exit {
        Some(result) => result,
        None => server_task.await,
    };
    let stats = bridge.shutdown().await;
    info!(
        delivered = stats.delivered,
        dropped = stats.dropped,
        receive_errors = stats.receive_errors,
        "marketsim-relay stopped"
    );

    match served {
        Ok(result) => result.map_err(RelayError::from),
        Err(e) => {
            warn!(error = %e, "viewer server task failed");
            Ok(())
        }
    }
}

/// Resolve the configuration path: `MARKETSIM_CONFIG` if set, otherwise
/// the default file name.
fn config_path(lookup: impl Fn(&str) -> Option<String>) -> PathBuf {
    lookup("MARKETSIM_CONFIG")
        .filter(|p| !p.trim().is_empty())
        .map_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from)
}

/// Load configuration, falling back to defaults when the file is absent.
///
/// Environment overrides apply either way.
fn load_config(path: &Path) -> Result<BridgeConfig, RelayError> {
    let config = if path.exists() {
        BridgeConfig::from_file(path)?
    } else {
        BridgeConfig::parse("")?
    };
    Ok(config)
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins over the configured level.
fn init_tracing(config: &BridgeConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .init(),
        LogFormat::Pretty => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .init(),
    }
}

/// Resolve when the process is asked to stop.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("received Ctrl-C"),
        () = terminate => info!("received SIGTERM"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_path_defaults_to_working_directory_file() {
        assert_eq!(config_path(|_| None), PathBuf::from("marketsim-config.yaml"));
        assert_eq!(
            config_path(|_| Some("  ".to_owned())),
            PathBuf::from("marketsim-config.yaml")
        );
    }

    #[test]
    fn config_path_honours_override() {
        let path = config_path(|name| {
            (name == "MARKETSIM_CONFIG").then(|| "/etc/marketsim.yaml".to_owned())
        });
        assert_eq!(path, PathBuf::from("/etc/marketsim.yaml"));
    }

    #[test]
    fn missing_config_file_yields_defaults() {
        let config = load_config(Path::new("/definitely/not/here.yaml"));
        assert!(config.is_ok());
    }

    #[test]
    fn project_config_file_loads() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("..")
            .join("..")
            .join(DEFAULT_CONFIG_PATH);
        if path.exists() {
            let config = load_config(&path);
            assert!(config.is_ok(), "{config:?}");
        }
    }
}
