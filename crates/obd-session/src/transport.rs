//! Byte transports the session talks through

use crate::config::SerialConfig;
use crate::error::ObdError;
use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::time::Duration;
use tokio_serial::SerialPort;
use tracing::{info, warn};

/// Byte-oriented, half-duplex link to the interpreter
pub trait Transport {
    /// Write all bytes to the link
    fn write(&mut self, bytes: &[u8]) -> io::Result<()>;

    /// Poll for one byte; `None` when nothing is pending
    fn read_byte(&mut self) -> Option<u8>;

    /// Whether at least one byte is pending, without consuming it
    fn peek(&mut self) -> bool;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn write(&mut self, bytes: &[u8]) -> io::Result<()> {
        (**self).write(bytes)
    }

    fn read_byte(&mut self) -> Option<u8> {
        (**self).read_byte()
    }

    fn peek(&mut self) -> bool {
        (**self).peek()
    }
}

/// Serial port transport for USB/Bluetooth ELM327 adapters
pub struct SerialTransport {
    port: Box<dyn SerialPort>,
    /// Byte read by `peek` and not yet handed out
    pending: Option<u8>,
}

impl SerialTransport {
    /// Open the configured serial device
    pub fn open(config: &SerialConfig) -> Result<Self, ObdError> {
        info!(
            "Opening serial device {} at {} baud",
            config.device, config.baud_rate
        );

        let port = tokio_serial::new(config.device.as_str(), config.baud_rate)
            .timeout(Duration::from_millis(config.poll_interval_ms.max(1)))
            .open()
            .map_err(|e| ObdError::Serial(e.to_string()))?;

        Ok(Self {
            port,
            pending: None,
        })
    }

    fn poll(&mut self) -> Option<u8> {
        let mut byte = [0u8; 1];
        match self.port.read(&mut byte) {
            Ok(1) => Some(byte[0]),
            Ok(_) => None,
            Err(e) if matches!(e.kind(), io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock) => {
                None
            }
            Err(e) => {
                warn!("Serial read error: {}", e);
                None
            }
        }
    }
}

impl Transport for SerialTransport {
    fn write(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.port.write_all(bytes)?;
        self.port.flush()
    }

    fn read_byte(&mut self) -> Option<u8> {
        self.pending.take().or_else(|| self.poll())
    }

    fn peek(&mut self) -> bool {
        if self.pending.is_none() {
            self.pending = self.poll();
        }
        self.pending.is_some()
    }
}

/// In-memory transport with scripted input, recording everything written.
///
/// Replies queued with [`MemoryTransport::queue_reply`] are released one
/// per write, so stale-input draining before a request does not eat them.
#[derive(Debug, Default)]
pub struct MemoryTransport {
    input: VecDeque<u8>,
    replies: VecDeque<Vec<u8>>,
    written: Vec<u8>,
}

impl MemoryTransport {
    /// Create an empty transport
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a transport whose input is preloaded with `bytes`
    pub fn with_input(bytes: &[u8]) -> Self {
        let mut transport = Self::new();
        transport.push_input(bytes);
        transport
    }

    /// Append bytes to the pending input
    pub fn push_input(&mut self, bytes: &[u8]) {
        self.input.extend(bytes);
    }

    /// Queue bytes to become readable after the next unanswered write
    pub fn queue_reply(&mut self, bytes: &[u8]) {
        self.replies.push_back(bytes.to_vec());
    }

    /// Everything written so far
    pub fn written(&self) -> &[u8] {
        &self.written
    }

    /// Number of input bytes not yet consumed
    pub fn remaining(&self) -> usize {
        self.input.len()
    }
}

impl Transport for MemoryTransport {
    fn write(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.written.extend_from_slice(bytes);
        if let Some(reply) = self.replies.pop_front() {
            self.input.extend(reply);
        }
        Ok(())
    }

    fn read_byte(&mut self) -> Option<u8> {
        self.input.pop_front()
    }

    fn peek(&mut self) -> bool {
        !self.input.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_transport_roundtrip() {
        let mut transport = MemoryTransport::with_input(b"OK");
        transport.write(b"ATE0\r").unwrap();

        assert!(transport.peek());
        assert_eq!(transport.read_byte(), Some(b'O'));
        assert_eq!(transport.read_byte(), Some(b'K'));
        assert_eq!(transport.read_byte(), None);
        assert!(!transport.peek());
        assert_eq!(transport.written(), b"ATE0\r");
    }

    #[test]
    fn test_queued_replies_follow_writes() {
        let mut transport = MemoryTransport::new();
        transport.queue_reply(b"OK");
        assert!(!transport.peek());

        transport.write(b"ATE0\r").unwrap();
        assert_eq!(transport.remaining(), 2);

        // no reply left for the second write
        transport.write(b"ATS0\r").unwrap();
        assert_eq!(transport.remaining(), 2);
    }

    #[test]
    fn test_boxed_transport_delegates() {
        let mut transport: Box<dyn Transport> = Box::new(MemoryTransport::with_input(b">"));
        assert!(transport.peek());
        assert_eq!(transport.read_byte(), Some(b'>'));
    }

    #[test]
    fn test_open_missing_device_fails() {
        let config = SerialConfig {
            device: "/dev/obd-session-does-not-exist".to_string(),
            ..SerialConfig::default()
        };
        assert!(matches!(
            SerialTransport::open(&config),
            Err(ObdError::Serial(_))
        ));
    }
}
