//! Wire protocol and client-facing types for the market simulation bridge.
//!
//! The simulation process and the bridge talk over two pub/sub channels
//! using a compact, line-oriented text protocol. This crate owns that
//! protocol and the typed shapes that flow on either side of it. Types
//! exposed to browser viewers are exported to `TypeScript` via `ts-rs`.
//!
//! # Modules
//!
//! - [`wire`] -- Message kinds, tokenizing, field parsing, [`DecodeError`]
//! - [`telemetry`] -- Process-to-bridge messages ([`Telemetry`])
//! - [`command`] -- Bridge-to-process messages ([`Command`])
//! - [`event`] -- Decoded events broadcast to viewers ([`ClientEvent`])
//! - [`request`] -- Validated viewer requests ([`ClientRequest`])

pub mod command;
pub mod event;
pub mod request;
pub mod telemetry;
pub mod wire;

// Re-export all public types at crate root for convenience.
pub use command::{Command, Scenario, Side, SimConfig};
pub use event::ClientEvent;
pub use request::{ClientRequest, RequestEnvelope, RequestError, MAX_COUNT};
pub use telemetry::Telemetry;
pub use wire::{DecodeError, MessageKind, WireMessage};
