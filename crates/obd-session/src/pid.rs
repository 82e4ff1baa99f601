//! OBD-II PID Definitions and Response Parsing
//!
//! Converts the hex payload that follows a mode 01 response header into a
//! physical value. Only the PIDs below carry a formula; anything else is
//! reported as [`DecodeError::UnknownPid`] instead of a silent zero.

use crate::error::DecodeError;
use crate::hex::{decode_u16, decode_u8, leading_digits, SEPARATOR};
use serde::{Deserialize, Serialize};

/// km/h to mph
const KMH_TO_MPH: f32 = 0.621371;

/// Mode 01 PIDs with a known conversion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Pid {
    /// Engine RPM (0x0C)
    Rpm = 0x0C,
    /// Vehicle speed (0x0D), reported in mph
    Speed = 0x0D,
    /// Mass air flow rate (0x10)
    Maf = 0x10,
    /// Fuel tank level input (0x2F)
    FuelLevel = 0x2F,
}

impl Pid {
    /// All PIDs with a formula
    pub const ALL: [Pid; 4] = [Pid::Rpm, Pid::Speed, Pid::Maf, Pid::FuelLevel];

    /// Get the PID hex value
    pub fn as_hex(&self) -> u8 {
        *self as u8
    }

    /// Number of hex digits the formula consumes
    pub fn payload_digits(&self) -> usize {
        match self {
            Pid::Rpm | Pid::Maf => 4,
            Pid::Speed | Pid::FuelLevel => 2,
        }
    }

    /// Unit of the decoded value
    pub fn unit(&self) -> &'static str {
        match self {
            Pid::Rpm => "rpm",
            Pid::Speed => "mph",
            Pid::Maf => "g/s",
            Pid::FuelLevel => "%",
        }
    }

    /// Apply the conversion formula to a payload
    ///
    /// Separators anywhere in the payload are ignored, so `" 1A F8"` reads
    /// the same as `"1AF8"`.
    pub fn decode(&self, payload: &str) -> Result<f32, DecodeError> {
        let digits: String = payload
            .chars()
            .filter(|&c| c != SEPARATOR as char)
            .collect();
        if leading_digits(&digits, self.payload_digits()) < self.payload_digits() {
            return Err(DecodeError::MalformedPayload {
                pid: self.as_hex(),
                payload: payload.to_string(),
            });
        }

        let value = match self {
            // RPM: ((A*256)+B)/4
            Pid::Rpm => decode_u16(&digits) as f32 / 4.0,
            // Speed: A km/h, converted to mph
            Pid::Speed => decode_u8(&digits) as f32 * KMH_TO_MPH,
            // MAF: ((A*256)+B)/100 g/s
            Pid::Maf => decode_u16(&digits) as f32 / 100.0,
            // Fuel level: A*100/255 %
            Pid::FuelLevel => decode_u8(&digits) as f32 * 100.0 / 255.0,
        };

        Ok(value)
    }
}

impl TryFrom<u8> for Pid {
    type Error = DecodeError;

    fn try_from(pid: u8) -> Result<Self, Self::Error> {
        match pid {
            0x0C => Ok(Pid::Rpm),
            0x0D => Ok(Pid::Speed),
            0x10 => Ok(Pid::Maf),
            0x2F => Ok(Pid::FuelLevel),
            other => Err(DecodeError::UnknownPid(other)),
        }
    }
}

/// Convert a raw hex payload for `pid` to its physical value
pub fn decode(pid: u8, payload: &str) -> Result<f32, DecodeError> {
    Pid::try_from(pid)?.decode(payload)
}

/// Like [`decode`], but folds every failure into `0.0`.
///
/// For callers that treat "no reading" and "zero reading" alike.
pub fn decode_or_zero(pid: u8, payload: &str) -> f32 {
    decode(pid, payload).unwrap_or(0.0)
}

/// Response from a PID query
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PidResponse {
    /// Mode the request was sent in
    pub mode: u8,
    /// The PID that was queried
    pub pid: u8,
    /// Session clock reading when the payload was read (ms)
    pub timestamp_ms: u64,
    /// Decoded value
    pub value: f32,
    /// Raw hex payload that followed the response header
    pub payload: String,
}

impl PidResponse {
    /// Create a new PID response by decoding the payload
    pub fn decode(
        mode: u8,
        pid: u8,
        payload: String,
        timestamp_ms: u64,
    ) -> Result<Self, DecodeError> {
        let value = decode(pid, &payload)?;
        Ok(Self {
            mode,
            pid,
            timestamp_ms,
            value,
            payload,
        })
    }

    /// Unit of the value, when the PID is known
    pub fn unit(&self) -> Option<&'static str> {
        Pid::try_from(self.pid).ok().map(|pid| pid.unit())
    }
}
