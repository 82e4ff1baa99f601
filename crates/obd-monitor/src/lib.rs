//! OBD-II Monitor
//!
//! Polls live values from an ELM327 adapter (or the built-in simulator)
//! and reports them as log lines or JSON.

mod config;
mod poller;

pub use config::{LogConfig, MonitorConfig, PollConfig};
pub use poller::{Monitor, MonitorError, Poller};

use obd_session::PidResponse;
use tracing::subscriber::SetGlobalDefaultError;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

/// Initialize logging
pub fn init_logging(config: &LogConfig) -> Result<(), SetGlobalDefaultError> {
    let level = config.level.parse::<Level>().unwrap_or(Level::INFO);

    if config.json {
        let subscriber = FmtSubscriber::builder()
            .with_max_level(level)
            .with_target(true)
            .json()
            .finish();
        tracing::subscriber::set_global_default(subscriber)
    } else {
        let subscriber = FmtSubscriber::builder()
            .with_max_level(level)
            .with_target(true)
            .finish();
        tracing::subscriber::set_global_default(subscriber)
    }
}

/// Render a reading as a single JSON line
pub fn to_json_line(reading: &PidResponse) -> serde_json::Result<String> {
    serde_json::to_string(reading)
}

/// Log a reading with its unit
pub fn log_reading(reading: &PidResponse) {
    info!(
        pid = format_args!("{:02X}", reading.pid),
        raw = %reading.payload,
        "{:.2} {}",
        reading.value,
        reading.unit().unwrap_or("")
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_line() {
        let reading = PidResponse::decode(0x01, 0x0C, "0C00".to_string(), 7).unwrap();
        let line = to_json_line(&reading).unwrap();
        let value: serde_json::Value = serde_json::from_str(&line).unwrap();

        assert_eq!(value["pid"], 12);
        assert_eq!(value["value"], 768.0);
        assert_eq!(value["payload"], "0C00");
        assert_eq!(value["timestamp_ms"], 7);
    }
}
