//! Response Scanner
//!
//! Busy-polls the transport one byte at a time. Every wait is bounded by
//! an explicit elapsed-time check made on each iteration; a timeout of
//! zero waits forever.

use crate::clock::Clock;
use crate::error::ObdError;
use crate::hex::SEPARATOR;
use crate::transport::Transport;
use crate::PROMPT;
use std::io;
use tracing::{debug, trace};

/// Failure token for a request the vehicle did not answer
const NO_DATA: &[u8] = b"NODATA";
/// Failure token for a request interrupted by the adapter
const STOPPED: &[u8] = b"STOPPED";
/// Reply to a command the adapter does not understand
const REJECTED: &[u8] = b"?";

/// Result of waiting for a token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanOutcome {
    /// Target token seen
    Found,
    /// Adapter reported NO DATA
    NoData,
    /// Adapter reported STOPPED
    Stopped,
    /// Adapter answered `?`
    Rejected,
    /// Budget exhausted before any token
    TimedOut,
}

impl ScanOutcome {
    /// Map a non-`Found` outcome to the matching error
    pub fn into_result(self, timeout_ms: u64) -> Result<(), ObdError> {
        match self {
            ScanOutcome::Found => Ok(()),
            ScanOutcome::NoData => Err(ObdError::NoData),
            ScanOutcome::Stopped => Err(ObdError::Stopped),
            ScanOutcome::Rejected => Err(ObdError::Rejected),
            ScanOutcome::TimedOut => Err(ObdError::Timeout(timeout_ms)),
        }
    }
}

/// Token scanner over a transport and a clock
pub struct Scanner<T, C> {
    transport: T,
    clock: C,
}

impl<T: Transport, C: Clock> Scanner<T, C> {
    /// Create a scanner owning the transport and clock
    pub fn new(transport: T, clock: C) -> Self {
        Self { transport, clock }
    }

    /// Borrow the transport
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Mutably borrow the transport
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Borrow the clock
    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Give back the transport and clock
    pub fn into_parts(self) -> (T, C) {
        (self.transport, self.clock)
    }

    /// Write a frame to the transport
    pub fn write(&mut self, frame: &[u8]) -> io::Result<()> {
        debug!("Sending {:?}", String::from_utf8_lossy(frame));
        self.transport.write(frame)
    }

    /// Wait until `target` appears in the stream, or a failure token does.
    ///
    /// Separator characters are skipped before matching and the match is
    /// ASCII case-insensitive, so `NO DATA` is recognized as `NODATA`.
    pub fn await_token(&mut self, target: &str, timeout_ms: u64) -> ScanOutcome {
        let target: Vec<u8> = target
            .bytes()
            .filter(|&c| c != SEPARATOR)
            .map(|c| c.to_ascii_uppercase())
            .collect();
        if target.is_empty() {
            return ScanOutcome::Found;
        }

        let capacity = target.len().max(STOPPED.len());
        let mut window: Vec<u8> = Vec::with_capacity(capacity + 1);
        let start = self.clock.now_ms();

        loop {
            if self.expired(start, timeout_ms) {
                debug!(
                    "Timed out after {}ms waiting for {:?}",
                    timeout_ms,
                    String::from_utf8_lossy(&target)
                );
                return ScanOutcome::TimedOut;
            }

            let Some(byte) = self.transport.read_byte() else {
                std::hint::spin_loop();
                continue;
            };
            trace!("Received {:?}", byte as char);
            if byte == SEPARATOR {
                continue;
            }

            window.push(byte.to_ascii_uppercase());
            if window.len() > capacity {
                window.remove(0);
            }

            if window.ends_with(&target) {
                return ScanOutcome::Found;
            }
            if window.ends_with(NO_DATA) {
                return ScanOutcome::NoData;
            }
            if window.ends_with(STOPPED) {
                return ScanOutcome::Stopped;
            }
            if window.ends_with(REJECTED) {
                return ScanOutcome::Rejected;
            }
        }
    }

    /// Collect bytes until CR, LF or the prompt, or until `max_len` bytes.
    ///
    /// The terminator is consumed but not returned. If the budget runs out
    /// the bytes collected so far are returned.
    pub fn read_line(&mut self, max_len: usize, timeout_ms: u64) -> Vec<u8> {
        let mut line = Vec::with_capacity(max_len);
        let start = self.clock.now_ms();

        while line.len() < max_len {
            if self.expired(start, timeout_ms) {
                debug!("Timed out reading line after {} bytes", line.len());
                break;
            }

            let Some(byte) = self.transport.read_byte() else {
                std::hint::spin_loop();
                continue;
            };
            if byte == b'\r' || byte == b'\n' || byte == PROMPT {
                break;
            }
            line.push(byte);
        }

        line
    }

    /// Wait until at least one byte is pending, without consuming it
    pub fn wait_for_data(&mut self, timeout_ms: u64) -> bool {
        let start = self.clock.now_ms();

        loop {
            if self.transport.peek() {
                return true;
            }
            if self.expired(start, timeout_ms) {
                return false;
            }
            std::hint::spin_loop();
        }
    }

    /// Consume input until `byte` has been seen `count` times
    pub fn skip_past(&mut self, byte: u8, count: usize, timeout_ms: u64) -> bool {
        let mut seen = 0;
        let start = self.clock.now_ms();

        while seen < count {
            if self.expired(start, timeout_ms) {
                return false;
            }
            match self.transport.read_byte() {
                Some(b) if b == byte => seen += 1,
                Some(_) => {}
                None => std::hint::spin_loop(),
            }
        }

        true
    }

    /// Discard everything currently pending, returning the number of bytes dropped
    pub fn drain(&mut self) -> usize {
        let mut dropped = 0;
        while self.transport.read_byte().is_some() {
            dropped += 1;
        }
        if dropped > 0 {
            debug!("Discarded {} stale bytes", dropped);
        }
        dropped
    }

    /// Budget left of `timeout_ms` measured from `start`.
    ///
    /// Zero stays zero (wait forever). A spent budget returns 1 so the next
    /// wait gives up on its first check instead of waiting forever.
    pub fn remaining_ms(&self, start: u64, timeout_ms: u64) -> u64 {
        if timeout_ms == 0 {
            return 0;
        }
        let elapsed = self.clock.now_ms().saturating_sub(start);
        timeout_ms.saturating_sub(elapsed).max(1)
    }

    fn expired(&self, start: u64, timeout_ms: u64) -> bool {
        timeout_ms != 0 && self.clock.now_ms().saturating_sub(start) >= timeout_ms
    }
}
