//! OBD-II Session for ELM327 Adapters
//!
//! Owns the transport for its whole life. A session starts uninitialized;
//! [`Session::initialize`] runs the AT handshake and makes it ready for
//! queries. There is no teardown.

use crate::clock::Clock;
use crate::command::{AtCommand, Request};
use crate::config::SessionConfig;
use crate::error::{InitError, ObdError};
use crate::pid::{Pid, PidResponse};
use crate::registry::{query_range, SupportedPidTable};
use crate::scanner::{ScanOutcome, Scanner};
use crate::transport::Transport;
use crate::PAYLOAD_CAPACITY;
use std::fmt;
use tracing::{debug, info, warn};

/// Aggressive adaptive timing (ATAT2)
const ADAPTIVE_TIMING_AGGRESSIVE: u8 = 2;

/// Steps of the initialization handshake, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitStep {
    /// Wait for the power-up prompt (optional)
    Prompt,
    /// ATZ
    Reset,
    /// ATE0
    EchoOff,
    /// ATS0
    SpacesOff,
    /// ATL0
    LinefeedsOff,
    /// ATST
    SetTimeout,
    /// ATAT2
    AdaptiveTiming,
}

impl InitStep {
    /// The command a step sends, given the session configuration
    pub fn command(&self, config: &SessionConfig) -> Option<AtCommand> {
        match self {
            InitStep::Prompt => None,
            InitStep::Reset => Some(AtCommand::Reset),
            InitStep::EchoOff => Some(AtCommand::EchoOff),
            InitStep::SpacesOff => Some(AtCommand::SpacesOff),
            InitStep::LinefeedsOff => Some(AtCommand::LinefeedsOff),
            InitStep::SetTimeout => Some(AtCommand::SetTimeout(config.adapter_timeout_units())),
            InitStep::AdaptiveTiming => Some(AtCommand::AdaptiveTiming(ADAPTIVE_TIMING_AGGRESSIVE)),
        }
    }
}

impl fmt::Display for InitStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            InitStep::Prompt => "prompt",
            InitStep::Reset => "reset",
            InitStep::EchoOff => "echo-off",
            InitStep::SpacesOff => "spaces-off",
            InitStep::LinefeedsOff => "linefeeds-off",
            InitStep::SetTimeout => "set-timeout",
            InitStep::AdaptiveTiming => "adaptive-timing",
        };
        f.write_str(name)
    }
}

/// The six configuration exchanges, in wire order
const HANDSHAKE: [InitStep; 6] = [
    InitStep::Reset,
    InitStep::EchoOff,
    InitStep::SpacesOff,
    InitStep::LinefeedsOff,
    InitStep::SetTimeout,
    InitStep::AdaptiveTiming,
];

/// Request/response session with one ELM327 interpreter
pub struct Session<T, C> {
    scanner: Scanner<T, C>,
    config: SessionConfig,
    supported: SupportedPidTable,
    ready: bool,
}

impl<T: Transport, C: Clock> Session<T, C> {
    /// Create an uninitialized session over `transport`
    pub fn new(transport: T, clock: C, config: SessionConfig) -> Self {
        Self {
            scanner: Scanner::new(transport, clock),
            config,
            supported: SupportedPidTable::new(),
            ready: false,
        }
    }

    /// Run the AT handshake. No retry or rollback: the first step that is
    /// not acknowledged in time aborts initialization.
    pub fn initialize(&mut self) -> Result<(), InitError> {
        info!("Initializing OBD adapter");
        self.ready = false;

        if self.config.await_initial_prompt {
            self.await_step_token(InitStep::Prompt, ">")?;
        }

        for step in HANDSHAKE {
            let Some(command) = step.command(&self.config) else {
                continue;
            };
            debug!("Handshake step {}: {}", step, command.to_elm_command());

            self.scanner
                .write(command.frame().as_bytes())
                .map_err(|e| InitError::Transport(e.to_string()))?;
            self.await_step_token(step, command.ack())?;
            self.await_step_token(step, ">")?;
        }

        self.ready = true;
        info!("OBD adapter initialized successfully");
        Ok(())
    }

    fn await_step_token(&mut self, step: InitStep, token: &str) -> Result<(), InitError> {
        match self
            .scanner
            .await_token(token, self.config.handshake_timeout_ms)
        {
            ScanOutcome::Found => Ok(()),
            ScanOutcome::TimedOut => {
                warn!("Handshake step {} timed out waiting for {:?}", step, token);
                Err(InitError::HandshakeTimeout(step))
            }
            outcome => {
                warn!("Handshake step {} failed: {:?}", step, outcome);
                Err(InitError::Rejected(step))
            }
        }
    }

    /// Whether the handshake has completed
    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// Transmit a mode/PID request frame. Does not consult the registry.
    pub fn send(&mut self, mode: u8, pid: u8) -> Result<(), ObdError> {
        let request = Request::new(mode, pid);
        self.scanner.write(request.frame().as_bytes())?;
        Ok(())
    }

    /// Query the supported-PID masks and rebuild the registry.
    ///
    /// The table is cleared first. A failure on the first range is an
    /// error; a failure on a chained range keeps what was already read.
    pub fn refresh_supported_pids(&mut self) -> Result<&SupportedPidTable, ObdError> {
        if !self.ready {
            return Err(ObdError::NotInitialized);
        }

        self.supported.clear();
        let timeout_ms = self.config.capability_timeout_ms;
        let mut base = 0x00;

        loop {
            self.scanner.drain();
            match query_range(&mut self.scanner, base, timeout_ms) {
                Ok(mask) => {
                    self.supported.apply_mask(base, mask);
                    if !self.config.extended_ranges {
                        break;
                    }
                    match SupportedPidTable::next_range(base, mask) {
                        Some(next) => base = next,
                        None => break,
                    }
                }
                Err(e) if base == 0x00 => return Err(e),
                Err(e) => {
                    warn!("Supported PID range {:02X} unavailable: {}", base, e);
                    break;
                }
            }
        }

        info!(
            "Vehicle supports {} mode 01 PIDs",
            self.supported.supported_pids().len()
        );
        Ok(&self.supported)
    }

    /// Whether the registry marks `pid` as supported in `mode`
    pub fn is_supported(&self, mode: u8, pid: u8) -> bool {
        self.supported.is_supported(mode, pid)
    }

    /// The current registry
    pub fn supported_pids(&self) -> &SupportedPidTable {
        &self.supported
    }

    /// Query a PID and return the decoded response
    pub fn query(&mut self, mode: u8, pid: u8) -> Result<PidResponse, ObdError> {
        if !self.ready {
            return Err(ObdError::NotInitialized);
        }
        if !self.is_supported(mode, pid) {
            return Err(ObdError::PidNotSupported { mode, pid });
        }

        let payload = self.request_payload(Request::new(mode, pid))?;
        let timestamp_ms = self.scanner.clock().now_ms();
        let response = PidResponse::decode(mode, pid, payload, timestamp_ms)?;

        debug!("PID {:02X} = {}", pid, response.value);
        Ok(response)
    }

    /// Query one of the PIDs with a known formula in mode 01
    pub fn query_pid(&mut self, pid: Pid) -> Result<PidResponse, ObdError> {
        self.query(crate::mode::CURRENT_DATA, pid.as_hex())
    }

    /// Send `request` and return the raw payload following its response header.
    ///
    /// Header and payload share one `query_timeout_ms` budget.
    fn request_payload(&mut self, request: Request) -> Result<String, ObdError> {
        let timeout_ms = self.config.query_timeout_ms;

        self.scanner.drain();
        let start = self.scanner.clock().now_ms();
        self.send(request.mode, request.pid)?;

        self.scanner
            .await_token(&request.response_header(), timeout_ms)
            .into_result(timeout_ms)?;

        let remaining = self.scanner.remaining_ms(start, timeout_ms);
        let line = self.scanner.read_line(PAYLOAD_CAPACITY, remaining);
        Ok(String::from_utf8_lossy(&line).into_owned())
    }

    /// Session configuration
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Direct access to the scanner, e.g. for [`Scanner::wait_for_data`]
    pub fn scanner_mut(&mut self) -> &mut Scanner<T, C> {
        &mut self.scanner
    }

    /// Give back the transport and clock
    pub fn into_parts(self) -> (T, C) {
        self.scanner.into_parts()
    }
}
