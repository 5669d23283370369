//! Line-oriented wire protocol shared with the simulation process.
//!
//! Every message is one line of space-separated tokens. The first token is
//! a [`MessageKind`] tag and the remaining tokens are positional fields
//! whose count and types are fixed per kind. `SENTIMENT` is the only
//! variable-arity kind: every token after its tag is an integer.
//!
//! Numbers are rendered with Rust's `Display` implementations, which are
//! locale-independent and parse back losslessly through `FromStr`.
//!
//! A message that fails to decode is rejected on its own; callers keep
//! reading the stream.

use std::fmt;
use std::str::FromStr;

use crate::command::Command;
use crate::telemetry::Telemetry;

/// Tag identifying a wire message's semantic type and field layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    /// `DATA price volume` -- last trade price and traded volume.
    Data,
    /// `TRADE agent side qty price` -- a single executed trade.
    Trade,
    /// `SENTIMENT n...` -- per-agent-class buy/sell volumes.
    Sentiment,
    /// `SCENARIO_METRICS hype bubble short_interest panic`.
    ScenarioMetrics,
    /// `METRICS spread liquidity` -- book-level market metrics.
    Metrics,
    /// `START makers fundamental momentum noise` -- initial configuration.
    Start,
    /// `PAUSE`.
    Pause,
    /// `RESUME`.
    Resume,
    /// `STOP`.
    Stop,
    /// `ORDER side quantity price` -- a user order, side `0` buy / `1` sell.
    Order,
    /// `SCENARIO code` -- `0` normal, `1` pump, `2` squeeze.
    Scenario,
}

impl MessageKind {
    /// Every kind the protocol defines, telemetry kinds first.
    pub const ALL: [Self; 11] = [
        Self::Data,
        Self::Trade,
        Self::Sentiment,
        Self::ScenarioMetrics,
        Self::Metrics,
        Self::Start,
        Self::Pause,
        Self::Resume,
        Self::Stop,
        Self::Order,
        Self::Scenario,
    ];

    /// The literal tag token used on the wire.
    pub const fn tag(self) -> &'static str {
        match self {
            Self::Data => "DATA",
            Self::Trade => "TRADE",
            Self::Sentiment => "SENTIMENT",
            Self::ScenarioMetrics => "SCENARIO_METRICS",
            Self::Metrics => "METRICS",
            Self::Start => "START",
            Self::Pause => "PAUSE",
            Self::Resume => "RESUME",
            Self::Stop => "STOP",
            Self::Order => "ORDER",
            Self::Scenario => "SCENARIO",
        }
    }

    /// Look up a kind by its wire tag. Tags are case-sensitive.
    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.tag() == tag)
    }

    /// Whether this kind travels process -> bridge.
    pub const fn is_telemetry(self) -> bool {
        matches!(
            self,
            Self::Data | Self::Trade | Self::Sentiment | Self::ScenarioMetrics | Self::Metrics
        )
    }

    /// Fixed number of fields after the tag, or `None` for variable arity.
    pub const fn arity(self) -> Option<usize> {
        match self {
            Self::Sentiment => None,
            Self::Pause | Self::Resume | Self::Stop => Some(0),
            Self::Scenario => Some(1),
            Self::Data | Self::Metrics => Some(2),
            Self::Start | Self::ScenarioMetrics | Self::Trade | Self::Order => Some(4),
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Why a single wire line could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// The line contained no tokens.
    #[error("empty message")]
    Empty,

    /// The frame was not valid UTF-8.
    #[error("message is not valid UTF-8: {0}")]
    NotUtf8(#[from] std::str::Utf8Error),

    /// The first token is not a known tag.
    #[error("unknown message kind {0:?}")]
    UnknownKind(String),

    /// The tag is known but belongs to the other direction.
    #[error("{0} is not valid in this direction")]
    UnexpectedKind(MessageKind),

    /// Wrong number of fields for a fixed-arity kind.
    #[error("{kind} expects {expected} fields, found {found}")]
    Arity {
        /// The message kind being decoded.
        kind: MessageKind,
        /// Number of fields the kind requires.
        expected: usize,
        /// Number of fields present on the line.
        found: usize,
    },

    /// A field failed numeric conversion or was out of range.
    #[error("{kind} field `{field}` has invalid value {token:?}")]
    InvalidField {
        /// The message kind being decoded.
        kind: MessageKind,
        /// Name of the offending field.
        field: &'static str,
        /// The raw token.
        token: String,
    },
}

/// A decoded wire message from either direction.
#[derive(Debug, Clone, PartialEq)]
pub enum WireMessage {
    /// A process -> bridge message.
    Telemetry(Telemetry),
    /// A bridge -> process message.
    Command(Command),
}

impl WireMessage {
    /// Decode a line of either direction, dispatching on its tag.
    ///
    /// # Errors
    ///
    /// Returns a [`DecodeError`] describing the first problem found.
    pub fn decode(line: &str) -> Result<Self, DecodeError> {
        let (kind, fields) = split(line)?;
        if kind.is_telemetry() {
            Telemetry::from_fields(kind, &fields).map(Self::Telemetry)
        } else {
            Command::from_fields(kind, &fields).map(Self::Command)
        }
    }

    /// The kind tag of this message.
    pub const fn kind(&self) -> MessageKind {
        match self {
            Self::Telemetry(t) => t.kind(),
            Self::Command(c) => c.kind(),
        }
    }

    /// Render the message as a single wire line.
    pub fn encode(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for WireMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Telemetry(t) => fmt::Display::fmt(t, f),
            Self::Command(c) => fmt::Display::fmt(c, f),
        }
    }
}

/// Split a line into its kind and the remaining field tokens.
pub(crate) fn split(line: &str) -> Result<(MessageKind, Vec<&str>), DecodeError> {
    let mut tokens = line.split_whitespace();
    let tag = tokens.next().ok_or(DecodeError::Empty)?;
    let kind = MessageKind::from_tag(tag).ok_or_else(|| DecodeError::UnknownKind(tag.to_owned()))?;
    Ok((kind, tokens.collect()))
}

/// Build an arity error for `kind` given the fields actually present.
pub(crate) const fn arity_error(kind: MessageKind, found: usize) -> DecodeError {
    let expected = match kind.arity() {
        Some(n) => n,
        None => 0,
    };
    DecodeError::Arity {
        kind,
        expected,
        found,
    }
}

/// Parse a single integer-like field.
pub(crate) fn parse_field<T: FromStr>(
    kind: MessageKind,
    field: &'static str,
    token: &str,
) -> Result<T, DecodeError> {
    token.parse().map_err(|_parse_err: T::Err| invalid(kind, field, token))
}

/// Parse a floating-point field. Non-finite values are rejected because
/// they have no JSON representation on the viewer side.
pub(crate) fn parse_float(
    kind: MessageKind,
    field: &'static str,
    token: &str,
) -> Result<f64, DecodeError> {
    let value: f64 = parse_field(kind, field, token)?;
    if value.is_finite() {
        Ok(value)
    } else {
        Err(invalid(kind, field, token))
    }
}

pub(crate) fn invalid(kind: MessageKind, field: &'static str, token: &str) -> DecodeError {
    DecodeError::InvalidField {
        kind,
        field,
        token: token.to_owned(),
    }
}

/// Write a tag followed by space-separated fields.
pub(crate) fn write_line(
    f: &mut fmt::Formatter<'_>,
    kind: MessageKind,
    fields: &[&dyn fmt::Display],
) -> fmt::Result {
    f.write_str(kind.tag())?;
    for field in fields {
        write!(f, " {field}")?;
    }
    Ok(())
}
