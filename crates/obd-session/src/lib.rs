//! OBD-II Session Engine
//!
//! This crate drives an ELM327-compatible OBD-II interpreter over a
//! byte-oriented link: the AT handshake, mode/PID request frames,
//! response scanning under a timeout, hex decoding and per-PID unit
//! conversion. All waits are blocking; the transport and clock are
//! supplied by the caller.

mod clock;
mod command;
mod config;
mod error;
pub mod hex;
mod pid;
mod registry;
mod scanner;
mod session;
mod sim;
mod transport;

pub use clock::{Clock, MonotonicClock, StepClock};
pub use command::{AtCommand, Request};
pub use config::{SerialConfig, SessionConfig};
pub use error::{DecodeError, InitError, ObdError};
pub use pid::{decode, decode_or_zero, Pid, PidResponse};
pub use registry::SupportedPidTable;
pub use scanner::{ScanOutcome, Scanner};
pub use session::{InitStep, Session};
pub use sim::SimulatedAdapter;
pub use transport::{MemoryTransport, SerialTransport, Transport};

/// OBD-II mode constants
pub mod mode {
    /// Current data
    pub const CURRENT_DATA: u8 = 0x01;
    /// Offset added to the request mode in a positive response header
    pub const RESPONSE_OFFSET: u8 = 0x40;
}

/// Prompt character the interpreter emits when it is ready for a command
pub const PROMPT: u8 = b'>';

/// Capacity of the payload buffer for a single-frame PID response
pub const PAYLOAD_CAPACITY: usize = 10;
