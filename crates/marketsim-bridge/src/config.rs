//! Configuration loading and typed config structures for the bridge.
//!
//! The canonical configuration lives in `marketsim-config.yaml` in the
//! working directory. This module defines strongly-typed structs that
//! mirror the YAML structure; every field has a default, so an empty or
//! missing file yields a working configuration.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// An environment override held an unusable value.
    #[error("invalid value for {name}: {value:?}")]
    Override {
        /// The environment variable name.
        name: &'static str,
        /// The rejected value.
        value: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level bridge configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct BridgeConfig {
    /// HTTP/WebSocket listener settings.
    #[serde(default)]
    pub server: ServerSection,

    /// Pub/sub transport endpoints.
    #[serde(default)]
    pub transport: TransportConfig,

    /// Simulation process supervision.
    #[serde(default)]
    pub supervisor: SupervisorConfig,

    /// Telemetry listener tuning.
    #[serde(default)]
    pub listener: ListenerConfig,

    /// Viewer fan-out tuning.
    #[serde(default)]
    pub fanout: FanoutConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl BridgeConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// Environment variables override YAML values:
    /// - `NATS_URL` overrides `transport.nats_url`
    /// - `MARKETSIM_PORT` overrides `server.port`
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if the content is not valid YAML, or
    /// [`ConfigError::Override`] if an override is malformed.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string and apply environment
    /// overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let mut config = Self::parse_without_env(yaml)?;
        config.apply_overrides(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    /// Parse configuration from a YAML string, ignoring the environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML.
    pub fn parse_without_env(yaml: &str) -> Result<Self, ConfigError> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yml::from_str(yaml)?)
    }

    /// Apply overrides from a variable lookup (normally the process
    /// environment).
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Override`] if `MARKETSIM_PORT` is not a port.
    pub fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(url) = lookup("NATS_URL") {
            self.transport.nats_url = url;
        }
        if let Some(port) = lookup("MARKETSIM_PORT") {
            self.server.port = port.trim().parse().map_err(|_bad_port: std::num::ParseIntError| {
                ConfigError::Override {
                    name: "MARKETSIM_PORT",
                    value: port.clone(),
                }
            })?;
        }
        Ok(())
    }
}

/// HTTP/WebSocket listener settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServerSection {
    /// Bind address.
    #[serde(default = "default_host")]
    pub host: String,

    /// TCP port.
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Pub/sub endpoints shared with the simulation process.
///
/// Both subjects are fixed and well-known; they outlive any single
/// simulation process.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TransportConfig {
    /// NATS server URL.
    #[serde(default = "default_nats_url")]
    pub nats_url: String,

    /// Subject the process publishes telemetry on.
    #[serde(default = "default_telemetry_subject")]
    pub telemetry_subject: String,

    /// Subject the bridge publishes commands on.
    #[serde(default = "default_command_subject")]
    pub command_subject: String,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            nats_url: default_nats_url(),
            telemetry_subject: default_telemetry_subject(),
            command_subject: default_command_subject(),
        }
    }
}

/// An executable the supervisor can launch.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BinarySpec {
    /// Path to the executable, relative to the working directory.
    pub path: PathBuf,

    /// Fixed arguments passed on every launch.
    #[serde(default)]
    pub args: Vec<String>,
}

impl BinarySpec {
    /// A spec with no arguments.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            args: Vec::new(),
        }
    }

    /// Append launch arguments.
    #[must_use]
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }
}

/// Simulation process supervision settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SupervisorConfig {
    /// Mode used when a start request names none.
    #[serde(default = "default_mode")]
    pub default_mode: String,

    /// Delay after spawn before the `START` command is sent.
    #[serde(default = "default_settle_interval_ms")]
    pub settle_interval_ms: u64,

    /// Delay between sending `STOP` and terminating the process.
    #[serde(default = "default_stop_grace_ms")]
    pub stop_grace_ms: u64,

    /// Bounded wait for the process to exit after `SIGTERM`.
    #[serde(default = "default_terminate_timeout_ms")]
    pub terminate_timeout_ms: u64,

    /// Mode name to executable.
    #[serde(default = "default_binaries")]
    pub binaries: BTreeMap<String, BinarySpec>,
}

impl SupervisorConfig {
    /// Settle interval as a [`Duration`].
    pub const fn settle_interval(&self) -> Duration {
        Duration::from_millis(self.settle_interval_ms)
    }

    /// Stop grace period as a [`Duration`].
    pub const fn stop_grace(&self) -> Duration {
        Duration::from_millis(self.stop_grace_ms)
    }

    /// Termination wait as a [`Duration`].
    pub const fn terminate_timeout(&self) -> Duration {
        Duration::from_millis(self.terminate_timeout_ms)
    }
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            default_mode: default_mode(),
            settle_interval_ms: default_settle_interval_ms(),
            stop_grace_ms: default_stop_grace_ms(),
            terminate_timeout_ms: default_terminate_timeout_ms(),
            binaries: default_binaries(),
        }
    }
}

/// Telemetry listener tuning.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ListenerConfig {
    /// Pause after a decode failure or receive error.
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
}

impl ListenerConfig {
    /// Backoff as a [`Duration`].
    pub const fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            backoff_ms: default_backoff_ms(),
        }
    }
}

/// Viewer fan-out tuning.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FanoutConfig {
    /// Events buffered per viewer before it is considered lagged.
    #[serde(default = "default_fanout_capacity")]
    pub capacity: usize,
}

impl Default for FanoutConfig {
    fn default() -> Self {
        Self {
            capacity: default_fanout_capacity(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Pretty,
    /// One JSON object per line.
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format.
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

fn default_host() -> String {
    "0.0.0.0".to_owned()
}

const fn default_port() -> u16 {
    8000
}

fn default_nats_url() -> String {
    "nats://127.0.0.1:4222".to_owned()
}

fn default_telemetry_subject() -> String {
    "marketsim.telemetry".to_owned()
}

fn default_command_subject() -> String {
    "marketsim.commands".to_owned()
}

fn default_mode() -> String {
    "moderate".to_owned()
}

const fn default_settle_interval_ms() -> u64 {
    500
}

const fn default_stop_grace_ms() -> u64 {
    100
}

const fn default_terminate_timeout_ms() -> u64 {
    2000
}

fn default_binaries() -> BTreeMap<String, BinarySpec> {
    [
        ("moderate", "./limit_order_book_moderate"),
        ("volatile", "./limit_order_book_volatile"),
        ("very_volatile", "./limit_order_book_very_volatile"),
        ("most_volatile", "./limit_order_book_most_volatile"),
    ]
    .into_iter()
    .map(|(mode, path)| (mode.to_owned(), BinarySpec::new(path)))
    .collect()
}

const fn default_backoff_ms() -> u64 {
    100
}

const fn default_fanout_capacity() -> usize {
    256
}

fn default_log_level() -> String {
    "info".to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = BridgeConfig::default();
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.supervisor.default_mode, "moderate");
        assert_eq!(config.supervisor.settle_interval(), Duration::from_millis(500));
        assert_eq!(config.supervisor.binaries.len(), 4);
        assert!(config.supervisor.binaries.contains_key("most_volatile"));
        assert_eq!(config.listener.backoff(), Duration::from_millis(100));
        assert_eq!(config.logging.format, LogFormat::Pretty);
    }

    #[test]
    fn parse_full_yaml() {
        let yaml = r#"
server:
  host: "127.0.0.1"
  port: 9000

transport:
  nats_url: "nats://testhost:4222"
  telemetry_subject: "lob.out"
  command_subject: "lob.in"

supervisor:
  default_mode: "fast"
  settle_interval_ms: 250
  stop_grace_ms: 50
  terminate_timeout_ms: 1000
  binaries:
    fast:
      path: "/opt/lob/fast"
      args: ["--seed", "7"]
    slow:
      path: "/opt/lob/slow"

listener:
  backoff_ms: 20

fanout:
  capacity: 64

logging:
  level: "debug"
  format: "json"
"#;

        let config = BridgeConfig::parse_without_env(yaml);
        assert!(config.is_ok(), "{config:?}");
        let config = config.ok().unwrap_or_default();

        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.transport.command_subject, "lob.in");
        assert_eq!(config.supervisor.default_mode, "fast");
        assert_eq!(config.supervisor.stop_grace(), Duration::from_millis(50));
        assert_eq!(config.supervisor.binaries.len(), 2);
        assert_eq!(
            config.supervisor.binaries.get("fast"),
            Some(&BinarySpec::new("/opt/lob/fast").with_args(["--seed", "7"]))
        );
        assert_eq!(config.fanout.capacity, 64);
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn parse_minimal_yaml() {
        let config = BridgeConfig::parse_without_env("server:\n  port: 8100\n");
        let config = config.ok().unwrap_or_default();
        assert_eq!(config.server.port, 8100);
        // Everything else uses defaults
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.transport.telemetry_subject, "marketsim.telemetry");
        assert_eq!(config.supervisor.binaries.len(), 4);
    }

    #[test]
    fn parse_empty_yaml() {
        let config = BridgeConfig::parse_without_env("");
        assert!(config.is_ok());
    }

    #[test]
    fn overrides_replace_transport_and_port() {
        let mut config = BridgeConfig::default();
        let result = config.apply_overrides(|name| match name {
            "NATS_URL" => Some("nats://broker:4222".to_owned()),
            "MARKETSIM_PORT" => Some("8123".to_owned()),
            _ => None,
        });
        assert!(result.is_ok());
        assert_eq!(config.transport.nats_url, "nats://broker:4222");
        assert_eq!(config.server.port, 8123);
    }

    #[test]
    fn bad_port_override_is_rejected() {
        let mut config = BridgeConfig::default();
        let result = config.apply_overrides(|name| {
            (name == "MARKETSIM_PORT").then(|| "eighty".to_owned())
        });
        assert!(matches!(
            result,
            Err(ConfigError::Override {
                name: "MARKETSIM_PORT",
                ..
            })
        ));
        assert_eq!(config.server.port, 8000);
    }

    #[test]
    fn load_project_config_file() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("..")
            .join("..")
            .join("marketsim-config.yaml");
        if path.exists() {
            let config = BridgeConfig::from_file(&path);
            assert!(config.is_ok(), "Failed to load project config: {config:?}");
        }
    }
}
