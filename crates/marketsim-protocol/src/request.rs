//! Requests sent by viewers, validated into a closed set of variants.
//!
//! Viewers send a JSON envelope `{"event": <name>, "data": {...}}`. The
//! envelope is parsed into [`ClientRequest`], and every field is checked
//! and normalized on the way in, so a `ClientRequest` always maps onto a
//! well-formed [`Command`].
//!
//! Numeric fields accept JSON numbers or numeric strings, since HTML form
//! inputs hand the browser strings. Counts are capped at [`MAX_COUNT`],
//! the largest value the simulation process reads as a signed 32-bit int.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::command::{Command, Scenario, Side, SimConfig};

/// Largest accepted quantity or population count.
pub const MAX_COUNT: u32 = i32::MAX.unsigned_abs();

/// Raw viewer message as received over the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct RequestEnvelope {
    /// Request name, e.g. `start_simulation`.
    pub event: String,
    /// Request payload; may be omitted for parameterless requests.
    #[serde(default)]
    pub data: serde_json::Value,
}

/// Why a viewer request was rejected.
#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    /// The message was not a JSON envelope.
    #[error("malformed request: {0}")]
    Json(#[from] serde_json::Error),

    /// The event name is not a known request.
    #[error("unknown request {0:?}")]
    UnknownEvent(String),

    /// The payload did not have the expected shape.
    #[error("invalid {event} payload: {source}")]
    Payload {
        /// The request being parsed.
        event: &'static str,
        /// The underlying deserialization error.
        source: serde_json::Error,
    },

    /// A field was present but out of range.
    #[error("invalid {field}: {reason}")]
    InvalidField {
        /// Name of the offending field.
        field: &'static str,
        /// What was wrong with it.
        reason: String,
    },
}

/// A validated viewer request.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientRequest {
    /// Launch a simulation (replacing any running one) and configure it.
    StartSimulation {
        /// Logical binary name; `None` selects the configured default.
        mode: Option<String>,
        /// Initial agent population.
        config: SimConfig,
    },
    /// Pause the running simulation.
    PauseSimulation,
    /// Resume a paused simulation.
    ResumeSimulation,
    /// Stop and terminate the running simulation.
    StopSimulation,
    /// Inject a user order.
    PlaceOrder {
        /// Normalized side.
        side: Side,
        /// Number of shares, at least 1.
        quantity: u32,
        /// Limit price, finite and positive.
        price: f64,
    },
    /// Switch market scenario.
    SetScenario(Scenario),
}

impl ClientRequest {
    /// Parse and validate a JSON envelope.
    ///
    /// # Errors
    ///
    /// Returns a [`RequestError`] if the text is not an envelope, names an
    /// unknown request, or carries an invalid payload.
    pub fn parse(text: &str) -> Result<Self, RequestError> {
        let envelope: RequestEnvelope = serde_json::from_str(text)?;
        Self::from_envelope(envelope)
    }

    /// Validate an already-deserialized envelope.
    ///
    /// # Errors
    ///
    /// Returns a [`RequestError`] for unknown requests or invalid payloads.
    pub fn from_envelope(envelope: RequestEnvelope) -> Result<Self, RequestError> {
        let RequestEnvelope { event, data } = envelope;
        let data = if data.is_null() {
            serde_json::Value::Object(serde_json::Map::new())
        } else {
            data
        };

        match event.as_str() {
            "start_simulation" => {
                let raw: RawStart = payload("start_simulation", data)?;
                Ok(Self::StartSimulation {
                    mode: raw.mode.filter(|m| !m.trim().is_empty()),
                    config: SimConfig {
                        makers: raw.makers.to_count("makers")?,
                        fundamental: raw.fundamental.to_count("fundamental")?,
                        momentum: raw.momentum.to_count("momentum")?,
                        noise: raw.noise.to_count("noise")?,
                    },
                })
            }
            "pause_simulation" => Ok(Self::PauseSimulation),
            "resume_simulation" => Ok(Self::ResumeSimulation),
            "stop_simulation" => Ok(Self::StopSimulation),
            "place_order" => {
                let raw: RawOrder = payload("place_order", data)?;
                let quantity = raw.quantity.to_count("quantity")?;
                if quantity == 0 {
                    return Err(RequestError::InvalidField {
                        field: "quantity",
                        reason: "must be at least 1".to_owned(),
                    });
                }
                let price = raw.price.to_f64("price")?;
                if !(price.is_finite() && price > 0.0) {
                    return Err(RequestError::InvalidField {
                        field: "price",
                        reason: format!("must be a positive number, got {price}"),
                    });
                }
                Ok(Self::PlaceOrder {
                    side: Side::from_client(&raw.side),
                    quantity,
                    price,
                })
            }
            "set_scenario" => {
                let raw: RawScenario = payload("set_scenario", data)?;
                Ok(Self::SetScenario(
                    raw.kind.as_deref().map_or(Scenario::Normal, Scenario::from_name),
                ))
            }
            _ => Err(RequestError::UnknownEvent(event)),
        }
    }

    /// The request name as it appears on the viewer side.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::StartSimulation { .. } => "start_simulation",
            Self::PauseSimulation => "pause_simulation",
            Self::ResumeSimulation => "resume_simulation",
            Self::StopSimulation => "stop_simulation",
            Self::PlaceOrder { .. } => "place_order",
            Self::SetScenario(_) => "set_scenario",
        }
    }

    /// The wire command this request translates into.
    pub fn command(&self) -> Command {
        match self {
            Self::StartSimulation { config, .. } => Command::Start(*config),
            Self::PauseSimulation => Command::Pause,
            Self::ResumeSimulation => Command::Resume,
            Self::StopSimulation => Command::Stop,
            Self::PlaceOrder {
                side,
                quantity,
                price,
            } => Command::Order {
                side: *side,
                quantity: *quantity,
                price: *price,
            },
            Self::SetScenario(scenario) => Command::Scenario(*scenario),
        }
    }
}

fn payload<T: serde::de::DeserializeOwned>(
    event: &'static str,
    data: serde_json::Value,
) -> Result<T, RequestError> {
    serde_json::from_value(data).map_err(|source| RequestError::Payload { event, source })
}

#[derive(Debug, Deserialize)]
struct RawStart {
    #[serde(default)]
    mode: Option<String>,
    makers: Numeric,
    fundamental: Numeric,
    momentum: Numeric,
    noise: Numeric,
}

#[derive(Debug, Deserialize)]
struct RawOrder {
    side: String,
    quantity: Numeric,
    price: Numeric,
}

#[derive(Debug, Deserialize)]
struct RawScenario {
    #[serde(rename = "type", default)]
    kind: Option<String>,
}

/// A number that may arrive as a JSON number or a numeric string.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Numeric {
    Number(serde_json::Number),
    Text(String),
}

impl Numeric {
    fn to_count(&self, field: &'static str) -> Result<u32, RequestError> {
        let parsed = match self {
            Self::Number(n) => n.as_u64().and_then(|v| u32::try_from(v).ok()),
            Self::Text(s) => s.trim().parse().ok(),
        };
        match parsed {
            Some(count) if count <= MAX_COUNT => Ok(count),
            Some(_) => Err(RequestError::InvalidField {
                field,
                reason: format!("must be at most {MAX_COUNT}, got {}", self.describe()),
            }),
            None => Err(RequestError::InvalidField {
                field,
                reason: format!("expected a non-negative integer, got {}", self.describe()),
            }),
        }
    }

    fn to_f64(&self, field: &'static str) -> Result<f64, RequestError> {
        let parsed = match self {
            Self::Number(n) => n.as_f64(),
            Self::Text(s) => s.trim().parse().ok(),
        };
        parsed.ok_or_else(|| RequestError::InvalidField {
            field,
            reason: format!("expected a number, got {}", self.describe()),
        })
    }

    fn describe(&self) -> String {
        match self {
            Self::Number(n) => n.to_string(),
            Self::Text(s) => format!("{s:?}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> Result<ClientRequest, RequestError> {
        ClientRequest::parse(text)
    }

    #[test]
    fn place_order_normalizes_side_to_code() {
        let req = parse(r#"{"event":"place_order","data":{"side":"buy","quantity":10,"price":101.5}}"#);
        let cmd = req.map(|r| r.command().encode()).ok();
        assert_eq!(cmd.as_deref(), Some("ORDER 0 10 101.5"));
    }

    #[test]
    fn place_order_accepts_numeric_strings() {
        let req = parse(
            r#"{"event":"place_order","data":{"side":"sell","quantity":"25","price":"99.75"}}"#,
        );
        assert_eq!(
            req.ok(),
            Some(ClientRequest::PlaceOrder {
                side: Side::Sell,
                quantity: 25,
                price: 99.75
            })
        );
    }

    #[test]
    fn place_order_rejects_out_of_range_fields() {
        let zero = parse(r#"{"event":"place_order","data":{"side":"buy","quantity":0,"price":10}}"#);
        assert!(matches!(
            zero,
            Err(RequestError::InvalidField {
                field: "quantity",
                ..
            })
        ));

        let negative =
            parse(r#"{"event":"place_order","data":{"side":"buy","quantity":-3,"price":10}}"#);
        assert!(matches!(
            negative,
            Err(RequestError::InvalidField {
                field: "quantity",
                ..
            })
        ));

        let free = parse(r#"{"event":"place_order","data":{"side":"buy","quantity":1,"price":0}}"#);
        assert!(matches!(
            free,
            Err(RequestError::InvalidField { field: "price", .. })
        ));

        let junk =
            parse(r#"{"event":"place_order","data":{"side":"buy","quantity":1,"price":"cheap"}}"#);
        assert!(matches!(
            junk,
            Err(RequestError::InvalidField { field: "price", .. })
        ));
    }

    #[test]
    fn counts_stop_at_the_signed_int_limit() {
        let largest = parse(
            r#"{"event":"place_order","data":{"side":"buy","quantity":2147483647,"price":1.5}}"#,
        );
        assert_eq!(
            largest.map(|r| r.command().encode()).ok().as_deref(),
            Some("ORDER 0 2147483647 1.5")
        );

        let over = parse(
            r#"{"event":"place_order","data":{"side":"buy","quantity":2147483648,"price":1.5}}"#,
        );
        assert!(matches!(
            over,
            Err(RequestError::InvalidField {
                field: "quantity",
                ..
            })
        ));

        let unsigned_max = parse(
            r#"{"event":"place_order","data":{"side":"buy","quantity":"4294967295","price":1.5}}"#,
        );
        assert!(matches!(
            unsigned_max,
            Err(RequestError::InvalidField {
                field: "quantity",
                ..
            })
        ));

        let crowd = parse(
            r#"{"event":"start_simulation","data":{"makers":5,"fundamental":20,"momentum":10,"noise":2147483648}}"#,
        );
        assert!(matches!(
            crowd,
            Err(RequestError::InvalidField { field: "noise", .. })
        ));
    }

    #[test]
    fn place_order_requires_all_fields() {
        let req = parse(r#"{"event":"place_order","data":{"side":"buy"}}"#);
        assert!(matches!(
            req,
            Err(RequestError::Payload {
                event: "place_order",
                ..
            })
        ));
    }

    #[test]
    fn set_scenario_maps_names_and_defaults_to_normal() {
        let squeeze = parse(r#"{"event":"set_scenario","data":{"type":"squeeze"}}"#);
        assert_eq!(
            squeeze.map(|r| r.command().encode()).ok().as_deref(),
            Some("SCENARIO 2")
        );

        let unknown = parse(r#"{"event":"set_scenario","data":{"type":"moonshot"}}"#);
        assert_eq!(
            unknown.map(|r| r.command().encode()).ok().as_deref(),
            Some("SCENARIO 0")
        );

        let missing = parse(r#"{"event":"set_scenario"}"#);
        assert_eq!(missing.ok(), Some(ClientRequest::SetScenario(Scenario::Normal)));
    }

    #[test]
    fn start_simulation_carries_mode_and_population() {
        let req = parse(
            r#"{"event":"start_simulation","data":{"mode":"volatile","makers":5,"fundamental":20,"momentum":"10","noise":50}}"#,
        );
        let Ok(ClientRequest::StartSimulation { mode, config }) = req else {
            unreachable!("start_simulation should parse: {req:?}");
        };
        assert_eq!(mode.as_deref(), Some("volatile"));
        assert_eq!(
            Command::Start(config).encode(),
            "START 5 20 10 50"
        );
    }

    #[test]
    fn start_simulation_without_mode_uses_default() {
        let req = parse(
            r#"{"event":"start_simulation","data":{"makers":1,"fundamental":1,"momentum":1,"noise":1}}"#,
        );
        assert!(matches!(
            req,
            Ok(ClientRequest::StartSimulation { mode: None, .. })
        ));
    }

    #[test]
    fn parameterless_requests_ignore_payload() {
        assert_eq!(
            parse(r#"{"event":"pause_simulation"}"#).ok(),
            Some(ClientRequest::PauseSimulation)
        );
        assert_eq!(
            parse(r#"{"event":"resume_simulation","data":{}}"#).ok(),
            Some(ClientRequest::ResumeSimulation)
        );
        assert_eq!(
            parse(r#"{"event":"stop_simulation","data":null}"#).map(|r| r.name()).ok(),
            Some("stop_simulation")
        );
    }

    #[test]
    fn unknown_and_malformed_requests_are_rejected() {
        assert!(matches!(
            parse(r#"{"event":"launch_rockets"}"#),
            Err(RequestError::UnknownEvent(name)) if name == "launch_rockets"
        ));
        assert!(matches!(parse("PAUSE"), Err(RequestError::Json(_))));
    }
}
