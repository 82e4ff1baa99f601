//! Monitor configuration
//!
//! Loaded from an optional TOML file, then overridden by `OBD_` prefixed
//! environment variables (`OBD_SERIAL__DEVICE=/dev/ttyUSB1`).

use config::{Config, ConfigError, Environment, File};
use obd_session::{Pid, SerialConfig, SessionConfig};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Polling configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    /// Pause between polling rounds (milliseconds)
    pub interval_ms: u64,
    /// Mode 01 PIDs to poll
    pub pids: Vec<u8>,
    /// Consecutive failures before a PID is reported as unhealthy
    pub max_retries: u8,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_ms: 200,
            pids: Pid::ALL.iter().map(|pid| pid.as_hex()).collect(),
            max_retries: 3,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Maximum level ("trace", "debug", "info", "warn", "error")
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Complete monitor configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Serial link
    pub serial: SerialConfig,
    /// Session timing
    pub session: SessionConfig,
    /// Polling schedule
    pub poll: PollConfig,
    /// Logging
    pub log: LogConfig,
    /// Talk to the built-in simulator instead of a serial device
    pub mock: bool,
}

impl MonitorConfig {
    /// Load configuration from `path` (if given) and the environment
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }

        builder
            .add_source(Environment::with_prefix("OBD").separator("__"))
            .build()?
            .try_deserialize()
    }
}
