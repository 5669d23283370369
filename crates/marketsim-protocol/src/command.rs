//! Commands sent from the bridge to the simulation process.
//!
//! A [`Command`] is always well-formed by construction: every field is
//! typed, and encoding is pure formatting. Raw viewer input never becomes
//! a command without passing through [`crate::request`] first.

use std::fmt;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::wire::{self, DecodeError, MessageKind};

/// Order side. Encoded as `0` (buy) or `1` (sell).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum Side {
    /// Bid.
    Buy,
    /// Ask.
    Sell,
}

impl Side {
    /// Normalize a viewer-supplied side. `"buy"` (any case) is a buy;
    /// every other string is treated as a sell.
    pub fn from_client(side: &str) -> Self {
        if side.trim().eq_ignore_ascii_case("buy") {
            Self::Buy
        } else {
            Self::Sell
        }
    }

    /// Wire code for this side.
    pub const fn code(self) -> u8 {
        match self {
            Self::Buy => 0,
            Self::Sell => 1,
        }
    }

    /// Parse a wire code.
    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Buy),
            1 => Some(Self::Sell),
            _ => None,
        }
    }
}

/// Market scenario the simulation should switch into.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum Scenario {
    /// Regular trading.
    #[default]
    Normal,
    /// Pump-and-dump.
    Pump,
    /// Short squeeze.
    Squeeze,
}

impl Scenario {
    /// Normalize a viewer-supplied scenario name. Unknown names fall back
    /// to [`Scenario::Normal`].
    pub fn from_name(name: &str) -> Self {
        match name {
            "pump" => Self::Pump,
            "squeeze" => Self::Squeeze,
            _ => Self::Normal,
        }
    }

    /// Wire code for this scenario.
    pub const fn code(self) -> u8 {
        match self {
            Self::Normal => 0,
            Self::Pump => 1,
            Self::Squeeze => 2,
        }
    }

    /// Parse a wire code.
    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Normal),
            1 => Some(Self::Pump),
            2 => Some(Self::Squeeze),
            _ => None,
        }
    }
}

/// Agent population the simulation starts with.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct SimConfig {
    /// Number of market makers.
    pub makers: u32,
    /// Number of fundamental traders.
    pub fundamental: u32,
    /// Number of momentum traders.
    pub momentum: u32,
    /// Number of noise traders.
    pub noise: u32,
}

/// A bridge -> process message.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Begin the run with the given population.
    Start(SimConfig),
    /// Suspend the matching loop.
    Pause,
    /// Resume after [`Command::Pause`].
    Resume,
    /// Ask the process to exit its run loop.
    Stop,
    /// Inject a user limit order.
    Order {
        /// Order side.
        side: Side,
        /// Number of shares.
        quantity: u32,
        /// Limit price.
        price: f64,
    },
    /// Switch market scenario.
    Scenario(Scenario),
}

impl Command {
    /// The kind tag of this command.
    pub const fn kind(&self) -> MessageKind {
        match self {
            Self::Start(_) => MessageKind::Start,
            Self::Pause => MessageKind::Pause,
            Self::Resume => MessageKind::Resume,
            Self::Stop => MessageKind::Stop,
            Self::Order { .. } => MessageKind::Order,
            Self::Scenario(_) => MessageKind::Scenario,
        }
    }

    /// Render the command as a single wire line.
    pub fn encode(&self) -> String {
        self.to_string()
    }

    /// Decode a command line.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::UnexpectedKind`] for telemetry tags and the
    /// usual arity/field errors for malformed commands.
    pub fn decode(line: &str) -> Result<Self, DecodeError> {
        let (kind, fields) = wire::split(line)?;
        Self::from_fields(kind, &fields)
    }

    pub(crate) fn from_fields(kind: MessageKind, fields: &[&str]) -> Result<Self, DecodeError> {
        match (kind, fields) {
            (MessageKind::Start, [makers, fundamental, momentum, noise]) => {
                Ok(Self::Start(SimConfig {
                    makers: wire::parse_field(kind, "makers", makers)?,
                    fundamental: wire::parse_field(kind, "fundamental", fundamental)?,
                    momentum: wire::parse_field(kind, "momentum", momentum)?,
                    noise: wire::parse_field(kind, "noise", noise)?,
                }))
            }
            (MessageKind::Pause, []) => Ok(Self::Pause),
            (MessageKind::Resume, []) => Ok(Self::Resume),
            (MessageKind::Stop, []) => Ok(Self::Stop),
            (MessageKind::Order, [side, quantity, price]) => {
                let code: u8 = wire::parse_field(kind, "side", side)?;
                let side = Side::from_code(code).ok_or_else(|| wire::invalid(kind, "side", side))?;
                Ok(Self::Order {
                    side,
                    quantity: wire::parse_field(kind, "quantity", quantity)?,
                    price: wire::parse_float(kind, "price", price)?,
                })
            }
            (MessageKind::Scenario, [code]) => {
                let value: u8 = wire::parse_field(kind, "scenario", code)?;
                Scenario::from_code(value)
                    .map(Self::Scenario)
                    .ok_or_else(|| wire::invalid(kind, "scenario", code))
            }
            (
                MessageKind::Start
                | MessageKind::Pause
                | MessageKind::Resume
                | MessageKind::Stop
                | MessageKind::Order
                | MessageKind::Scenario,
                other,
            ) => Err(wire::arity_error(kind, other.len())),
            (telemetry, _) => Err(DecodeError::UnexpectedKind(telemetry)),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = self.kind();
        match self {
            Self::Start(config) => wire::write_line(
                f,
                kind,
                &[
                    &config.makers,
                    &config.fundamental,
                    &config.momentum,
                    &config.noise,
                ],
            ),
            Self::Pause | Self::Resume | Self::Stop => wire::write_line(f, kind, &[]),
            Self::Order {
                side,
                quantity,
                price,
            } => wire::write_line(f, kind, &[&side.code(), quantity, price]),
            Self::Scenario(scenario) => wire::write_line(f, kind, &[&scenario.code()]),
        }
    }
}
