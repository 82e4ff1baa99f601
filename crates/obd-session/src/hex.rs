//! ASCII hex decoding for interpreter payloads
//!
//! The two decoders deliberately differ: [`decode_u16`] keeps whatever it
//! accumulated before the first invalid character, while [`decode_u8`]
//! rejects the whole pair when either character is invalid.

/// Separator the interpreter may leave between hex bytes
pub const SEPARATOR: u8 = b' ';

/// Value of a single ASCII hex digit
pub fn hex_digit(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'A'..=b'F' => Some(c - b'A' + 10),
        b'a'..=b'f' => Some(c - b'a' + 10),
        _ => None,
    }
}

/// Decode up to four hex digits, most significant first.
///
/// Separators are skipped without counting as a digit. Any other
/// non-hex character ends decoding and the partial value is returned.
pub fn decode_u16(s: &str) -> u16 {
    let mut value: u16 = 0;
    let mut digits = 0;

    for &c in s.as_bytes() {
        if digits == 4 {
            break;
        }
        if c == SEPARATOR {
            continue;
        }
        let Some(nibble) = hex_digit(c) else {
            break;
        };
        value = (value << 4) | u16::from(nibble);
        digits += 1;
    }

    value
}

/// Decode exactly two hex digits.
///
/// Returns 0 when the input is shorter than two characters or when either
/// character is not a hex digit.
pub fn decode_u8(s: &str) -> u8 {
    let bytes = s.as_bytes();
    if bytes.len() < 2 {
        return 0;
    }

    match (hex_digit(bytes[0]), hex_digit(bytes[1])) {
        (Some(hi), Some(lo)) => (hi << 4) | lo,
        _ => 0,
    }
}

/// Count the hex digits before the first terminating character, up to `max`
pub fn leading_digits(s: &str, max: usize) -> usize {
    s.bytes()
        .filter(|&c| c != SEPARATOR)
        .take_while(|&c| hex_digit(c).is_some())
        .take(max)
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_decode_u16() {
        assert_eq!(decode_u16("0C"), 12);
        assert_eq!(decode_u16("0C00"), 0x0C00);
        assert_eq!(decode_u16("ffff"), 0xFFFF);
        assert_eq!(decode_u16(""), 0);
    }

    #[test]
    fn test_decode_u16_stops_at_invalid_digit() {
        assert_eq!(decode_u16("1G"), 1);
        assert_eq!(decode_u16("G1"), 0);
        assert_eq!(decode_u16("1A\r"), 0x1A);
    }

    #[test]
    fn test_decode_u16_skips_separators() {
        assert_eq!(decode_u16("1A F8"), 0x1AF8);
        assert_eq!(decode_u16(" 0C"), 12);
    }

    #[test]
    fn test_decode_u16_reads_at_most_four_digits() {
        assert_eq!(decode_u16("BE1FA813"), 0xBE1F);
    }

    #[test]
    fn test_decode_u8() {
        assert_eq!(decode_u8("0C"), 12);
        assert_eq!(decode_u8("ff"), 255);
        assert_eq!(decode_u8("7Bxx"), 0x7B);
    }

    #[test]
    fn test_decode_u8_is_stricter_than_decode_u16() {
        // decode_u16 keeps the partial value, decode_u8 gives up entirely
        assert_eq!(decode_u16("1G"), 1);
        assert_eq!(decode_u8("1G"), 0);
        assert_eq!(decode_u8("G0"), 0);
        assert_eq!(decode_u8("1"), 0);
        assert_eq!(decode_u8(""), 0);
    }

    #[test]
    fn test_leading_digits() {
        assert_eq!(leading_digits("1AF8", 4), 4);
        assert_eq!(leading_digits("1A F8", 4), 4);
        assert_eq!(leading_digits("1G", 4), 1);
        assert_eq!(leading_digits("BE1FA813", 4), 4);
        assert_eq!(leading_digits("", 2), 0);
    }

    proptest! {
        #[test]
        fn prop_decode_u16_matches_formatting(value: u16) {
            prop_assert_eq!(decode_u16(&format!("{:04X}", value)), value);
            prop_assert_eq!(decode_u16(&format!("{:04x}", value)), value);
        }

        #[test]
        fn prop_decode_u8_matches_formatting(value: u8) {
            prop_assert_eq!(decode_u8(&format!("{:02X}", value)), value);
        }

        #[test]
        fn prop_decode_u16_never_panics(s in "\\PC{0,12}") {
            let _ = decode_u16(&s);
            let _ = decode_u8(&s);
        }
    }
}
