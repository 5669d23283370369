//! Viewer API server for the market simulation bridge.
//!
//! This crate provides an Axum HTTP server that exposes:
//!
//! - **`WebSocket` endpoint** (`/ws`) that streams decoded telemetry to
//!   every viewer and accepts simulation requests from each of them
//! - **REST endpoints** for the process status and for submitting a
//!   request without a socket
//! - **Dashboard page** (`GET /`) that drives the simulation from a
//!   browser
//!
//! # Architecture
//!
//! All traffic goes through the running [`Bridge`]: requests through its
//! dispatcher, telemetry from its fan-out. The server owns no simulation
//! state of its own.
//!
//! [`Bridge`]: marketsim_bridge::Bridge

pub mod error;
pub mod handlers;
pub mod router;
pub mod server;
pub mod startup;
pub mod state;
pub mod ws;

// Re-export primary types for convenience.
pub use error::ObserverError;
pub use router::build_router;
pub use server::{start_server, ServerConfig, ServerError};
pub use startup::{spawn_observer, ObserverHandle, StartupError};
pub use state::AppState;
