//! Telemetry emitted by the simulation process.
//!
//! Decoding is strict about arity (except for `SENTIMENT`) and numeric
//! fields; `TRADE`'s `agent` and `side` are free-form tokens and are
//! passed through unchanged.

use std::fmt;

use crate::wire::{self, DecodeError, MessageKind};

/// A process -> bridge message.
#[derive(Debug, Clone, PartialEq)]
pub enum Telemetry {
    /// Last price and traded volume for the current step.
    Data {
        /// Last traded price.
        price: f64,
        /// Volume traded this step.
        volume: i64,
    },
    /// A single executed trade.
    Trade {
        /// Agent class that initiated the trade.
        agent: String,
        /// Side as reported by the process (`BUY` / `SELL`).
        side: String,
        /// Executed quantity.
        qty: i64,
        /// Execution price.
        price: f64,
    },
    /// Buy/sell volumes per agent class, in process-defined order.
    Sentiment(Vec<i64>),
    /// Scenario-specific indicators.
    ScenarioMetrics {
        /// Pump hype level.
        hype: f64,
        /// Bubble size relative to fundamental value.
        bubble: f64,
        /// Outstanding short interest.
        short_interest: i64,
        /// Panic level.
        panic: f64,
    },
    /// Order book metrics.
    Metrics {
        /// Best ask minus best bid.
        spread: f64,
        /// Resting liquidity in the book.
        liquidity: i64,
    },
}

impl Telemetry {
    /// The kind tag of this message.
    pub const fn kind(&self) -> MessageKind {
        match self {
            Self::Data { .. } => MessageKind::Data,
            Self::Trade { .. } => MessageKind::Trade,
            Self::Sentiment(_) => MessageKind::Sentiment,
            Self::ScenarioMetrics { .. } => MessageKind::ScenarioMetrics,
            Self::Metrics { .. } => MessageKind::Metrics,
        }
    }

    /// Decode a telemetry line.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::UnexpectedKind`] for command tags and the
    /// usual arity/field errors for malformed telemetry.
    pub fn decode(line: &str) -> Result<Self, DecodeError> {
        let (kind, fields) = wire::split(line)?;
        Self::from_fields(kind, &fields)
    }

    /// Decode a raw transport frame.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::NotUtf8`] if the frame is not text, otherwise
    /// the same errors as [`Telemetry::decode`].
    pub fn decode_frame(frame: &[u8]) -> Result<Self, DecodeError> {
        Self::decode(std::str::from_utf8(frame)?)
    }

    /// Render the message as a single wire line.
    pub fn encode(&self) -> String {
        self.to_string()
    }

    pub(crate) fn from_fields(kind: MessageKind, fields: &[&str]) -> Result<Self, DecodeError> {
        match (kind, fields) {
            (MessageKind::Data, [price, volume]) => Ok(Self::Data {
                price: wire::parse_float(kind, "price", price)?,
                volume: wire::parse_field(kind, "volume", volume)?,
            }),
            (MessageKind::Trade, [agent, side, qty, price]) => Ok(Self::Trade {
                agent: (*agent).to_owned(),
                side: (*side).to_owned(),
                qty: wire::parse_field(kind, "qty", qty)?,
                price: wire::parse_float(kind, "price", price)?,
            }),
            (MessageKind::Sentiment, values) => values
                .iter()
                .map(|v| wire::parse_field(kind, "sentiment", v))
                .collect::<Result<Vec<i64>, _>>()
                .map(Self::Sentiment),
            (MessageKind::ScenarioMetrics, [hype, bubble, short_interest, panic]) => {
                Ok(Self::ScenarioMetrics {
                    hype: wire::parse_float(kind, "hype", hype)?,
                    bubble: wire::parse_float(kind, "bubble", bubble)?,
                    short_interest: wire::parse_field(kind, "short_interest", short_interest)?,
                    panic: wire::parse_float(kind, "panic", panic)?,
                })
            }
            (MessageKind::Metrics, [spread, liquidity]) => Ok(Self::Metrics {
                spread: wire::parse_float(kind, "spread", spread)?,
                liquidity: wire::parse_field(kind, "liquidity", liquidity)?,
            }),
            (
                MessageKind::Data
                | MessageKind::Trade
                | MessageKind::ScenarioMetrics
                | MessageKind::Metrics,
                other,
            ) => Err(wire::arity_error(kind, other.len())),
            (command, _) => Err(DecodeError::UnexpectedKind(command)),
        }
    }
}

impl fmt::Display for Telemetry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = self.kind();
        match self {
            Self::Data { price, volume } => wire::write_line(f, kind, &[price, volume]),
            Self::Trade {
                agent,
                side,
                qty,
                price,
            } => wire::write_line(f, kind, &[agent, side, qty, price]),
            Self::Sentiment(values) => {
                f.write_str(kind.tag())?;
                for v in values {
                    write!(f, " {v}")?;
                }
                Ok(())
            }
            Self::ScenarioMetrics {
                hype,
                bubble,
                short_interest,
                panic,
            } => wire::write_line(f, kind, &[hype, bubble, short_interest, panic]),
            Self::Metrics { spread, liquidity } => wire::write_line(f, kind, &[spread, liquidity]),
        }
    }
}
