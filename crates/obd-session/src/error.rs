//! OBD-II Error Types

use crate::session::InitStep;
use thiserror::Error;

/// Errors that can occur during OBD-II communication
#[derive(Debug, Error)]
pub enum ObdError {
    /// Serial port connection error
    #[error("Serial port error: {0}")]
    Serial(String),

    /// Timeout waiting for response
    #[error("Timeout waiting for OBD response after {0}ms")]
    Timeout(u64),

    /// The interpreter reported NO DATA for the request
    #[error("Adapter reported no data")]
    NoData,

    /// The interpreter stopped the request
    #[error("Adapter stopped the request")]
    Stopped,

    /// The interpreter did not understand the command
    #[error("Adapter rejected the command")]
    Rejected,

    /// Invalid response from adapter
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// PID not supported by vehicle
    #[error("PID {pid:02X} not supported in mode {mode:02X}")]
    PidNotSupported { mode: u8, pid: u8 },

    /// Session used before the handshake completed
    #[error("Session is not initialized")]
    NotInitialized,

    /// Payload could not be converted to a value
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// Handshake failure
    #[error(transparent)]
    Init(#[from] InitError),
}

impl From<std::io::Error> for ObdError {
    fn from(err: std::io::Error) -> Self {
        ObdError::Serial(err.to_string())
    }
}

/// Errors raised while running the AT handshake
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InitError {
    /// The acknowledgment or prompt for a step never arrived
    #[error("Handshake step {0} was not acknowledged in time")]
    HandshakeTimeout(InitStep),

    /// The adapter answered a step with `?`
    #[error("Adapter rejected handshake step {0}")]
    Rejected(InitStep),

    /// Writing a handshake command failed
    #[error("Transport error during handshake: {0}")]
    Transport(String),
}

/// Errors converting a hex payload to a physical value
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// No conversion formula is known for the PID
    #[error("No formula for PID {0:02X}")]
    UnknownPid(u8),

    /// Payload does not carry enough hex digits
    #[error("Malformed payload for PID {pid:02X}: {payload:?}")]
    MalformedPayload { pid: u8, payload: String },
}
