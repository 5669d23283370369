//! Process supervision and telemetry relay for the market simulation.
//!
//! The bridge sits between one externally built simulation executable and
//! any number of viewers:
//!
//! ```text
//!  viewer request ─► Dispatcher ─► CommandChannel ─► forwarder ─► command subject ─► process
//!                        │
//!                        └► Supervisor (spawn / terminate, one process at a time)
//!
//!  process ─► telemetry subject ─► TelemetryListener ─► EventFanout ─► every viewer
//! ```
//!
//! # Modules
//!
//! - [`config`] -- YAML configuration with environment overrides
//! - [`error`] -- [`BridgeError`], [`ChannelError`]
//! - [`supervisor`] -- The single simulation process slot
//! - [`channel`] -- Transport traits and the ordered command queue
//! - [`nats`] -- NATS implementation of the transport traits
//! - [`loopback`] -- In-process implementation of the transport traits
//! - [`listener`] -- The telemetry listener loop
//! - [`fanout`] -- Broadcast of decoded events to viewers
//! - [`dispatch`] -- Viewer request handling
//! - [`bridge`] -- Wiring and shutdown

pub mod bridge;
pub mod channel;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod fanout;
pub mod listener;
pub mod loopback;
pub mod nats;
pub mod supervisor;

pub use bridge::Bridge;
pub use channel::{CommandChannel, CommandPublisher, TelemetrySource};
pub use config::{BridgeConfig, ConfigError, LogFormat};
pub use dispatch::Dispatcher;
pub use error::{BridgeError, ChannelError};
pub use fanout::EventFanout;
pub use listener::{ListenerStats, TelemetryListener};
pub use nats::NatsTransport;
pub use supervisor::{ProcessState, ProcessStatus, Supervisor};
