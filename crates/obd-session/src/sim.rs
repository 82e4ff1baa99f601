//! Simulated ELM327 Adapter
//!
//! An in-process stand-in for the interpreter, used in tests and by the
//! monitor's mock mode. It honors the echo/spaces/linefeed settings, answers
//! the capability chain from its configured masks and reports NO DATA for
//! anything it has no value for.

use crate::hex::decode_u16;
use crate::mode::{CURRENT_DATA, RESPONSE_OFFSET};
use crate::pid::Pid;
use crate::transport::Transport;
use crate::PROMPT;
use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, VecDeque};
use std::hash::{Hash, Hasher};
use std::io;

/// Banner printed after a reset
const BANNER: &str = "ELM327 v1.5";

/// Capability range bases (0x00, 0x20, ... 0x80)
const RANGE_BASES: [u8; 5] = [0x00, 0x20, 0x40, 0x60, 0x80];

/// Simulated adapter plus vehicle
#[derive(Debug)]
pub struct SimulatedAdapter {
    echo: bool,
    spaces: bool,
    linefeeds: bool,
    /// Command bytes received since the last carriage return
    line: Vec<u8>,
    output: VecDeque<u8>,
    /// Capability mask per range, indexed like `RANGE_BASES`
    masks: [u32; 5],
    /// Fixed payloads per PID
    values: HashMap<u8, String>,
    /// Generate varying readings for the known PIDs
    jitter: bool,
    queries: u64,
}

impl Default for SimulatedAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedAdapter {
    /// A vehicle supporting RPM, speed, MAF and fuel level with fixed readings
    pub fn new() -> Self {
        let mut values = HashMap::new();
        values.insert(Pid::Rpm.as_hex(), "1AF8".to_string());
        values.insert(Pid::Speed.as_hex(), "64".to_string());
        values.insert(Pid::Maf.as_hex(), "0123".to_string());
        values.insert(Pid::FuelLevel.as_hex(), "80".to_string());

        Self {
            echo: true,
            spaces: true,
            linefeeds: true,
            line: Vec::new(),
            output: VecDeque::new(),
            // 0x0C, 0x0D and 0x10 among others; 0x20 chains to the next range
            // 0x21 and 0x2F
            masks: [0xBE1F_A813, 0x8002_0000, 0, 0, 0],
            values,
            jitter: false,
            queries: 0,
        }
    }

    /// Replace the capability mask for the range starting at `base`
    pub fn with_supported_mask(mut self, base: u8, mask: u32) -> Self {
        if let Some(index) = RANGE_BASES.iter().position(|&b| b == base) {
            self.masks[index] = mask;
        }
        self
    }

    /// Set the raw hex payload returned for `pid`
    pub fn with_value(mut self, pid: u8, payload: &str) -> Self {
        self.values.insert(pid, payload.to_string());
        self
    }

    /// Produce pseudo-random but plausible readings for the known PIDs
    pub fn with_jitter(mut self) -> Self {
        self.jitter = true;
        self
    }

    fn is_supported(&self, pid: u8) -> bool {
        if pid == 0x00 {
            return true;
        }
        let range = usize::from((pid - 1) / 0x20);
        let bit = u32::from((pid - 1) % 0x20);
        self.masks
            .get(range)
            .map(|mask| mask & (1 << (31 - bit)) != 0)
            .unwrap_or(false)
    }

    fn respond(&mut self, body: &str) {
        let newline = if self.linefeeds { "\r\n" } else { "\r" };
        for b in body.bytes() {
            self.output.push_back(b);
        }
        for b in newline.bytes().chain(newline.bytes()) {
            self.output.push_back(b);
        }
        self.output.push_back(PROMPT);
    }

    fn hex_bytes(&self, digits: &str) -> String {
        if !self.spaces {
            return digits.to_string();
        }
        let mut spaced = String::with_capacity(digits.len() * 3 / 2);
        for (i, c) in digits.chars().enumerate() {
            spaced.push(c);
            if i % 2 == 1 {
                spaced.push(' ');
            }
        }
        spaced
    }

    fn handle_line(&mut self) {
        let command: String = std::mem::take(&mut self.line)
            .into_iter()
            .filter(|b| !b.is_ascii_whitespace())
            .map(|b| b.to_ascii_uppercase() as char)
            .collect();

        if command.is_empty() {
            self.output.push_back(PROMPT);
        } else if let Some(at) = command.strip_prefix("AT") {
            self.handle_at(at);
        } else {
            self.handle_request(&command);
        }
    }

    fn handle_at(&mut self, at: &str) {
        match at {
            "Z" => {
                self.echo = true;
                self.spaces = true;
                self.linefeeds = true;
                self.respond(&format!("\r{}", BANNER));
            }
            "E0" | "E1" => {
                self.echo = at == "E1";
                self.respond("OK");
            }
            "S0" | "S1" => {
                self.spaces = at == "S1";
                self.respond("OK");
            }
            "L0" | "L1" => {
                self.linefeeds = at == "L1";
                self.respond("OK");
            }
            _ if at.starts_with("ST") || at.starts_with("AT") || at.starts_with("SP") => {
                self.respond("OK")
            }
            _ => self.respond("?"),
        }
    }

    fn handle_request(&mut self, command: &str) {
        // MMPP with an optional response count digit
        if !(4..=5).contains(&command.len()) || !command.bytes().all(|b| b.is_ascii_hexdigit()) {
            self.respond("?");
            return;
        }

        let mode = (decode_u16(&command[..2]) & 0xFF) as u8;
        let pid = (decode_u16(&command[2..4]) & 0xFF) as u8;
        if mode != CURRENT_DATA || !self.is_supported(pid) {
            self.respond("NO DATA");
            return;
        }

        let payload = if let Some(index) = RANGE_BASES.iter().position(|&b| b == pid) {
            Some(format!("{:08X}", self.masks[index]))
        } else if self.jitter {
            self.jitter_payload(pid)
                .or_else(|| self.values.get(&pid).cloned())
        } else {
            self.values.get(&pid).cloned()
        };

        match payload {
            Some(payload) => {
                let header = format!("{:02X}{:02X}", mode + RESPONSE_OFFSET, pid);
                let body = self.hex_bytes(&format!("{}{}", header, payload));
                self.respond(&body);
            }
            None => self.respond("NO DATA"),
        }
    }

    fn jitter_payload(&mut self, pid: u8) -> Option<String> {
        self.queries += 1;
        let mut hasher = DefaultHasher::new();
        self.queries.hash(&mut hasher);
        pid.hash(&mut hasher);
        let hash = hasher.finish();

        let payload = match Pid::try_from(pid).ok()? {
            // 800-3500 RPM
            Pid::Rpm => format!("{:04X}", (800 + (hash % 2700) as u16) * 4),
            // 0-120 km/h
            Pid::Speed => format!("{:02X}", hash % 120),
            // 5-50 g/s
            Pid::Maf => format!("{:04X}", 500 + (hash % 4500) as u16),
            // 20-90%
            Pid::FuelLevel => format!("{:02X}", 51 + (hash % 179)),
        };
        Some(payload)
    }
}

impl Transport for SimulatedAdapter {
    fn write(&mut self, bytes: &[u8]) -> io::Result<()> {
        for &b in bytes {
            if self.echo {
                self.output.push_back(b);
            }
            match b {
                b'\r' => self.handle_line(),
                b'\n' => {}
                _ => self.line.push(b),
            }
        }
        Ok(())
    }

    fn read_byte(&mut self) -> Option<u8> {
        self.output.pop_front()
    }

    fn peek(&mut self) -> bool {
        !self.output.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::StepClock;
    use crate::config::SessionConfig;
    use crate::error::ObdError;
    use crate::session::Session;

    fn drain(adapter: &mut SimulatedAdapter) -> String {
        let mut out = Vec::new();
        while let Some(b) = adapter.read_byte() {
            out.push(b);
        }
        String::from_utf8_lossy(&out).into_owned()
    }

    fn ready_session() -> Session<SimulatedAdapter, StepClock> {
        let mut session = Session::new(
            SimulatedAdapter::new(),
            StepClock::new(1),
            SessionConfig::default(),
        );
        session.initialize().unwrap();
        session
    }

    #[test]
    fn test_reset_prints_banner_with_echo() {
        let mut adapter = SimulatedAdapter::new();
        adapter.write(b"ATZ\r").unwrap();
        assert_eq!(drain(&mut adapter), "ATZ\r\rELM327 v1.5\r\n\r\n>");
    }

    #[test]
    fn test_settings_change_formatting() {
        let mut adapter = SimulatedAdapter::new();
        adapter.write(b"ATE0\r").unwrap();
        drain(&mut adapter);

        adapter.write(b"010C1\r").unwrap();
        assert_eq!(drain(&mut adapter), "41 0C 1A F8 \r\n\r\n>");

        adapter.write(b"ATS0\rATL0\r").unwrap();
        drain(&mut adapter);
        adapter.write(b"010C1\r").unwrap();
        assert_eq!(drain(&mut adapter), "410C1AF8\r\r>");
    }

    #[test]
    fn test_unknown_commands() {
        let mut adapter = SimulatedAdapter::new();
        adapter.write(b"ATE0\rATXYZ\r").unwrap();
        assert!(drain(&mut adapter).ends_with("?\r\n\r\n>"));

        adapter.write(b"0902\r").unwrap();
        assert!(drain(&mut adapter).starts_with("NO DATA"));
    }

    #[test]
    fn test_session_against_simulator() {
        let mut session = ready_session();
        let table = session.refresh_supported_pids().unwrap();
        assert_eq!(table.supported_pids().len(), 17 + 2);

        let rpm = session.query_pid(Pid::Rpm).unwrap();
        assert_eq!(rpm.value, 1726.0);

        let fuel = session.query_pid(Pid::FuelLevel).unwrap();
        assert!((fuel.value - 50.196).abs() < 0.001);

        let maf = session.query_pid(Pid::Maf).unwrap();
        assert!((maf.value - 2.91).abs() < 0.001);
    }

    #[test]
    fn test_session_no_data_for_missing_value() {
        // PID 0x01 is supported by the default mask but has no value
        let mut session = ready_session();
        session.refresh_supported_pids().unwrap();
        assert!(matches!(session.query(0x01, 0x01), Err(ObdError::NoData)));
    }

    #[test]
    fn test_jitter_stays_in_range() {
        let adapter = SimulatedAdapter::new().with_jitter();
        let mut session = Session::new(adapter, StepClock::new(1), SessionConfig::default());
        session.initialize().unwrap();
        session.refresh_supported_pids().unwrap();

        for _ in 0..20 {
            let rpm = session.query_pid(Pid::Rpm).unwrap().value;
            assert!((800.0..3500.0).contains(&rpm));
            let speed = session.query_pid(Pid::Speed).unwrap().value;
            assert!((0.0..75.0).contains(&speed));
        }
    }

    #[test]
    fn test_custom_mask_limits_queries() {
        let adapter = SimulatedAdapter::new()
            .with_supported_mask(0x00, 0x0010_0000)
            .with_value(0x0C, "0000");
        let mut session = Session::new(adapter, StepClock::new(1), SessionConfig::default());
        session.initialize().unwrap();
        session.refresh_supported_pids().unwrap();

        assert!(session.is_supported(0x01, 0x0C));
        assert!(!session.is_supported(0x01, 0x0D));
        assert_eq!(session.query_pid(Pid::Rpm).unwrap().value, 0.0);
    }
}
