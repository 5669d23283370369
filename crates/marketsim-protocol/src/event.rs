//! Events broadcast to connected viewers.
//!
//! Serialized as `{"event": <name>, "data": <payload>}` so the browser can
//! dispatch on the event name the same way for every message.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::telemetry::Telemetry;

/// The typed, decoded form of a telemetry message, plus the `error` event
/// used to reject a viewer's request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum ClientEvent {
    /// Decoded `DATA`.
    MarketData {
        /// Last traded price.
        price: f64,
        /// Volume traded this step.
        volume: i64,
    },
    /// Decoded `TRADE`.
    TradeLog {
        /// Agent class that initiated the trade.
        agent: String,
        /// Side as reported by the process.
        side: String,
        /// Executed quantity.
        qty: i64,
        /// Execution price.
        price: f64,
    },
    /// Decoded `SENTIMENT`.
    ServerSentiment(Vec<i64>),
    /// Decoded `SCENARIO_METRICS`.
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
    /// Decoded `METRICS`.
    MarketMetrics {
        /// Best ask minus best bid.
        spread: f64,
        /// Resting liquidity in the book.
        liquidity: i64,
    },
    /// A request from this viewer was rejected.
    Error {
        /// Human-readable reason.
        message: String,
    },
}

impl ClientEvent {
    /// Build an `error` event.
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    /// The event name as it appears on the viewer side.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::MarketData { .. } => "market_data",
            Self::TradeLog { .. } => "trade_log",
            Self::ServerSentiment(_) => "server_sentiment",
            Self::ScenarioMetrics { .. } => "scenario_metrics",
            Self::MarketMetrics { .. } => "market_metrics",
            Self::Error { .. } => "error",
        }
    }
}

impl From<Telemetry> for ClientEvent {
    fn from(telemetry: Telemetry) -> Self {
        match telemetry {
            Telemetry::Data { price, volume } => Self::MarketData { price, volume },
            Telemetry::Trade {
                agent,
                side,
                qty,
                price,
            } => Self::TradeLog {
                agent,
                side,
                qty,
                price,
            },
            Telemetry::Sentiment(values) => Self::ServerSentiment(values),
            Telemetry::ScenarioMetrics {
                hype,
                bubble,
                short_interest,
                panic,
            } => Self::ScenarioMetrics {
                hype,
                bubble,
                short_interest,
                panic,
            },
            Telemetry::Metrics { spread, liquidity } => Self::MarketMetrics { spread, liquidity },
        }
    }
}
