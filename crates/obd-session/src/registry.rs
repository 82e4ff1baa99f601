//! Supported-PID Registry
//!
//! The reply to mode 01 PID 0x00 is a 32-bit mask: bit N, counted from the
//! most significant bit, marks PID N+1 as supported. The last bit of each
//! mask announces the next range (0x20, 0x40, ...), which is queried the
//! same way.

use crate::clock::Clock;
use crate::command::Request;
use crate::error::ObdError;
use crate::hex::{decode_u16, leading_digits, SEPARATOR};
use crate::mode::CURRENT_DATA;
use crate::scanner::Scanner;
use crate::transport::Transport;
use tracing::debug;

/// Number of mode 01 PIDs tracked (0x00-0x9F)
pub const MODE01_PID_COUNT: usize = 160;

/// PIDs covered by one capability mask
const RANGE_WIDTH: u8 = 0x20;

/// Hex digits in a capability mask
const MASK_DIGITS: usize = 8;

/// Which PIDs the vehicle answers, per mode
#[derive(Debug, Clone)]
pub struct SupportedPidTable {
    mode01: [bool; MODE01_PID_COUNT],
}

impl Default for SupportedPidTable {
    fn default() -> Self {
        Self::new()
    }
}

impl SupportedPidTable {
    /// Create a table with nothing supported
    pub fn new() -> Self {
        Self {
            mode01: [false; MODE01_PID_COUNT],
        }
    }

    /// Whether `pid` is supported in `mode`. Unknown modes and PIDs are not.
    pub fn is_supported(&self, mode: u8, pid: u8) -> bool {
        if mode != CURRENT_DATA {
            return false;
        }
        self.mode01
            .get(usize::from(pid))
            .copied()
            .unwrap_or(false)
    }

    /// Mark every PID as unsupported
    pub fn clear(&mut self) {
        self.mode01 = [false; MODE01_PID_COUNT];
    }

    /// Record the mask returned for the range starting at `base`
    pub fn apply_mask(&mut self, base: u8, mask: u32) {
        for bit in 0..u32::from(RANGE_WIDTH) {
            let pid = usize::from(base) + bit as usize + 1;
            if pid >= MODE01_PID_COUNT {
                break;
            }
            self.mode01[pid] = mask & (1 << (31 - bit)) != 0;
        }
    }

    /// Supported mode 01 PIDs in ascending order
    pub fn supported_pids(&self) -> Vec<u8> {
        self.mode01
            .iter()
            .enumerate()
            .filter(|(_, supported)| **supported)
            .map(|(pid, _)| pid as u8)
            .collect()
    }

    /// Base of the range announced by `mask`, if any is left to query
    pub fn next_range(base: u8, mask: u32) -> Option<u8> {
        let next = base.checked_add(RANGE_WIDTH)?;
        if mask & 1 == 1 && usize::from(next) < MODE01_PID_COUNT {
            Some(next)
        } else {
            None
        }
    }
}

/// Parse the eight hex digits of a capability mask
pub fn parse_mask(payload: &str) -> Option<u32> {
    let digits: String = payload
        .chars()
        .filter(|&c| c != SEPARATOR as char)
        .collect();
    if leading_digits(&digits, MASK_DIGITS) < MASK_DIGITS {
        return None;
    }

    let hi = u32::from(decode_u16(&digits[..4]));
    let lo = u32::from(decode_u16(&digits[4..MASK_DIGITS]));
    Some((hi << 16) | lo)
}

/// Send the capability request for `base` and read back its mask.
///
/// Waits for the `41PP` response header, so failure replies surface as
/// their own error kinds. Header and mask share one budget.
pub(crate) fn query_range<T: Transport, C: Clock>(
    scanner: &mut Scanner<T, C>,
    base: u8,
    timeout_ms: u64,
) -> Result<u32, ObdError> {
    let request = Request::new(CURRENT_DATA, base);
    let start = scanner.clock().now_ms();
    scanner.write(request.frame().as_bytes())?;

    scanner
        .await_token(&request.response_header(), timeout_ms)
        .into_result(timeout_ms)?;

    let remaining = scanner.remaining_ms(start, timeout_ms);
    let line = scanner.read_line(MASK_DIGITS + 4, remaining);
    let payload = String::from_utf8_lossy(&line);
    let mask = parse_mask(&payload)
        .ok_or_else(|| ObdError::InvalidResponse(format!("capability mask {:?}", payload)))?;

    debug!("Supported PIDs {:02X}-{:02X}: {:08X}", base + 1, base + RANGE_WIDTH, mask);
    Ok(mask)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::StepClock;
    use crate::transport::MemoryTransport;

    #[test]
    fn test_nothing_supported_before_refresh() {
        let table = SupportedPidTable::new();
        for pid in 0..=u8::MAX {
            assert!(!table.is_supported(CURRENT_DATA, pid));
        }
    }

    #[test]
    fn test_other_modes_never_supported() {
        let mut table = SupportedPidTable::new();
        table.apply_mask(0x00, u32::MAX);
        for pid in 0..=u8::MAX {
            assert!(!table.is_supported(0x02, pid));
        }
    }

    #[test]
    fn test_apply_mask_matches_bits() {
        let mut table = SupportedPidTable::new();
        let mask = 0xBE1F_A813;
        table.apply_mask(0x00, mask);

        assert!(table.is_supported(CURRENT_DATA, 0x0C));
        assert!(table.is_supported(CURRENT_DATA, 0x0D));
        assert!(table.is_supported(CURRENT_DATA, 0x01));
        assert!(!table.is_supported(CURRENT_DATA, 0x02));
        // PID 0x00 itself is never marked
        assert!(!table.is_supported(CURRENT_DATA, 0x00));

        for pid in 1..=0x20u8 {
            let expected = mask & (1 << (32 - u32::from(pid))) != 0;
            assert_eq!(table.is_supported(CURRENT_DATA, pid), expected, "PID {:02X}", pid);
        }
        for pid in 0x21..=u8::MAX {
            assert!(!table.is_supported(CURRENT_DATA, pid));
        }
    }

    #[test]
    fn test_last_range_is_truncated() {
        let mut table = SupportedPidTable::new();
        table.apply_mask(0x80, u32::MAX);
        assert!(table.is_supported(CURRENT_DATA, 0x9F));
        assert!(!table.is_supported(CURRENT_DATA, 0xA0));
        assert_eq!(table.supported_pids().len(), 31);
    }

    #[test]
    fn test_next_range() {
        assert_eq!(SupportedPidTable::next_range(0x00, 0xBE1F_A813), Some(0x20));
        assert_eq!(SupportedPidTable::next_range(0x00, 0xBE1F_A812), None);
        assert_eq!(SupportedPidTable::next_range(0x80, 0xFFFF_FFFF), None);
    }

    #[test]
    fn test_parse_mask() {
        assert_eq!(parse_mask("BE1FA813"), Some(0xBE1F_A813));
        assert_eq!(parse_mask("BE 1F A8 13"), Some(0xBE1F_A813));
        assert_eq!(parse_mask("BE1F"), None);
        assert_eq!(parse_mask("NODATA"), None);
    }

    #[test]
    fn test_query_range_reads_mask() {
        let transport = MemoryTransport::with_input(b"4100BE1FA813\r\r>");
        let mut scanner = Scanner::new(transport, StepClock::new(1));

        let mask = query_range(&mut scanner, 0x00, 100).unwrap();
        assert_eq!(mask, 0xBE1F_A813);
        assert_eq!(scanner.transport().written(), b"01001\r");
    }

    #[test]
    fn test_query_range_spaced_reply() {
        let transport = MemoryTransport::with_input(b"41 20 80 02 00 00 \r\r>");
        let mut scanner = Scanner::new(transport, StepClock::new(1));
        assert_eq!(query_range(&mut scanner, 0x20, 100).unwrap(), 0x8002_0000);
    }

    #[test]
    fn test_query_range_failure_replies() {
        let mut scanner = Scanner::new(
            MemoryTransport::with_input(b"NO DATA\r\r>"),
            StepClock::new(1),
        );
        assert!(matches!(
            query_range(&mut scanner, 0x00, 100),
            Err(ObdError::NoData)
        ));
        // answered at once, not after the whole budget
        assert!(scanner.clock().elapsed_ms() < 50);

        let mut scanner = Scanner::new(
            MemoryTransport::with_input(b"STOPPED\r\r>"),
            StepClock::new(1),
        );
        assert!(matches!(
            query_range(&mut scanner, 0x00, 100),
            Err(ObdError::Stopped)
        ));

        let mut scanner = Scanner::new(MemoryTransport::with_input(b"?\r>"), StepClock::new(1));
        assert!(matches!(
            query_range(&mut scanner, 0x00, 100),
            Err(ObdError::Rejected)
        ));
    }

    #[test]
    fn test_query_range_times_out() {
        let mut scanner = Scanner::new(MemoryTransport::new(), StepClock::new(1));
        assert!(matches!(
            query_range(&mut scanner, 0x00, 50),
            Err(ObdError::Timeout(50))
        ));
    }
}
