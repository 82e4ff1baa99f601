//! Request frames and AT commands

use crate::mode::RESPONSE_OFFSET;

/// Command terminator expected by the interpreter
pub const TERMINATOR: char = '\r';

/// Number of responses the interpreter should wait for before returning.
/// A single ECU is assumed, which saves the adapter's full timeout.
pub const RESPONSE_COUNT: u8 = 1;

/// A mode/PID diagnostic request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Request {
    /// OBD mode
    pub mode: u8,
    /// Parameter ID
    pub pid: u8,
}

impl Request {
    /// Create a new request
    pub fn new(mode: u8, pid: u8) -> Self {
        Self { mode, pid }
    }

    /// Wire frame, e.g. `010C1\r` for mode 0x01 PID 0x0C
    pub fn frame(&self) -> String {
        format!(
            "{:02X}{:02X}{}{}",
            self.mode, self.pid, RESPONSE_COUNT, TERMINATOR
        )
    }

    /// Header that opens a positive response, e.g. `410C`
    pub fn response_header(&self) -> String {
        format!(
            "{:02X}{:02X}",
            self.mode.wrapping_add(RESPONSE_OFFSET),
            self.pid
        )
    }
}

/// AT configuration commands used by the handshake
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AtCommand {
    /// Reset all (ATZ)
    Reset,
    /// Echo off (ATE0)
    EchoOff,
    /// Spaces between response bytes off (ATS0)
    SpacesOff,
    /// Line feeds after carriage returns off (ATL0)
    LinefeedsOff,
    /// Response timeout in units of 4ms (ATSTxx)
    SetTimeout(u8),
    /// Adaptive timing mode (ATATn)
    AdaptiveTiming(u8),
}

impl AtCommand {
    /// Get the ELM327 command text, without terminator
    pub fn to_elm_command(&self) -> String {
        match self {
            AtCommand::Reset => "ATZ".to_string(),
            AtCommand::EchoOff => "ATE0".to_string(),
            AtCommand::SpacesOff => "ATS0".to_string(),
            AtCommand::LinefeedsOff => "ATL0".to_string(),
            AtCommand::SetTimeout(units) => format!("ATST{:02X}", units),
            AtCommand::AdaptiveTiming(mode) => format!("ATAT{}", mode),
        }
    }

    /// Token the interpreter answers with on success
    pub fn ack(&self) -> &'static str {
        match self {
            // ATZ replies with the identification banner, e.g. "ELM327 v1.5"
            AtCommand::Reset => "ELM327",
            _ => "OK",
        }
    }

    /// Wire frame including the terminator
    pub fn frame(&self) -> String {
        format!("{}{}", self.to_elm_command(), TERMINATOR)
    }
}
