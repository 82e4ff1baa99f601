//! Session and serial configuration

use serde::{Deserialize, Serialize};

/// Serial link configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    /// Serial device path (e.g. "/dev/ttyUSB0" or "COM3")
    pub device: String,
    /// Baud rate (ELM327 default: 38400)
    pub baud_rate: u32,
    /// Read timeout used as the byte poll interval (milliseconds)
    pub poll_interval_ms: u64,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            device: "/dev/ttyUSB0".to_string(),
            baud_rate: 38400,
            poll_interval_ms: 5,
        }
    }
}

/// Protocol timing and behavior of a session.
///
/// All timeouts are milliseconds; `0` means wait forever.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Budget for each handshake wait (acknowledgment and prompt)
    pub handshake_timeout_ms: u64,
    /// Budget for a whole PID query, header and payload together
    pub query_timeout_ms: u64,
    /// Budget for each supported-PID capability response
    pub capability_timeout_ms: u64,
    /// Adapter-side response timeout programmed with ATST (4ms resolution)
    pub adapter_timeout_ms: u32,
    /// Wait for the power-up prompt before sending ATZ
    pub await_initial_prompt: bool,
    /// Follow the supported-PID chain into 0x21-0xA0
    pub extended_ranges: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            handshake_timeout_ms: 5000,
            query_timeout_ms: 200,
            capability_timeout_ms: 1000,
            adapter_timeout_ms: 152,
            await_initial_prompt: false,
            extended_ranges: true,
        }
    }
}

impl SessionConfig {
    /// ATST argument for the configured adapter timeout
    pub fn adapter_timeout_units(&self) -> u8 {
        (self.adapter_timeout_ms / 4).clamp(1, 255) as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_adapter_timeout_is_152ms() {
        let config = SessionConfig::default();
        assert_eq!(config.adapter_timeout_units(), 0x26);
    }

    #[test]
    fn test_adapter_timeout_is_clamped() {
        let config = SessionConfig {
            adapter_timeout_ms: 0,
            ..Default::default()
        };
        assert_eq!(config.adapter_timeout_units(), 1);

        let config = SessionConfig {
            adapter_timeout_ms: 5000,
            ..Default::default()
        };
        assert_eq!(config.adapter_timeout_units(), 255);
    }

    #[test]
    fn test_serial_defaults() {
        let config = SerialConfig::default();
        assert_eq!(config.baud_rate, 38400);
        assert_eq!(config.device, "/dev/ttyUSB0");
    }
}
