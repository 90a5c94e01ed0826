//! AIS 6-bit ASCII armoring.
//!
//! Each payload character carries 6 bits: subtract 48 from the code point,
//! and subtract a further 8 when the result exceeds 40 (the alphabet skips
//! the `X`..`_` block). Only `0`..`W` and `` ` ``..`w` belong to the
//! armor alphabet; any other character fails the whole payload.

use crate::bits::BitBuffer;
use crate::types::{AisError, Result};

/// Decode one armored character into its 6-bit value.
pub fn armor_value(ch: u8) -> Option<u8> {
    match ch {
        b'0'..=b'W' => Some(ch - 48),
        b'`'..=b'w' => Some(ch - 56),
        _ => None,
    }
}

/// Encode a 6-bit value as its armored character.
pub fn armor_char(value: u8) -> char {
    let value = value & 0x3F;
    if value < 40 {
        (value + 48) as char
    } else {
        (value + 56) as char
    }
}

/// De-armor a payload into a bit buffer of exactly `6 * payload.len()` bits.
pub fn decode_payload(payload: &str) -> Result<BitBuffer> {
    let mut buf = BitBuffer::with_capacity(payload.len() * 6);
    for (offset, ch) in payload.bytes().enumerate() {
        let value = armor_value(ch).ok_or(AisError::ArmorDecode {
            ch: ch as char,
            offset,
        })?;
        buf.push_uint(u64::from(value), 6);
    }
    Ok(buf)
}

/// Armor a bit buffer. The final group is zero-padded; returns the payload
/// and the number of fill bits added.
pub fn encode_payload(bits: &BitBuffer) -> (String, u8) {
    let raw = bits.as_slice();
    let mut payload = String::with_capacity(raw.len().div_ceil(6));
    let mut fill = 0u8;

    for group in raw.chunks(6) {
        let mut value = group.iter().fold(0u8, |acc, &b| (acc << 1) | b);
        if group.len() < 6 {
            fill = (6 - group.len()) as u8;
            value <<= fill;
        }
        payload.push(armor_char(value));
    }

    (payload, fill)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_armor_value_boundaries() {
        assert_eq!(armor_value(b'0'), Some(0));
        assert_eq!(armor_value(b'W'), Some(39));
        assert_eq!(armor_value(b'`'), Some(40));
        assert_eq!(armor_value(b'w'), Some(63));
    }

    #[test]
    fn test_armor_value_out_of_range() {
        assert_eq!(armor_value(b' '), None);
        assert_eq!(armor_value(b'/'), None);
        assert_eq!(armor_value(b'x'), None);
        assert_eq!(armor_value(b'~'), None);
        // The skipped block between `W` and `` ` ``
        for ch in b'X'..=b'_' {
            assert_eq!(armor_value(ch), None, "{:?}", ch as char);
        }
    }

    #[test]
    fn test_decode_rejects_skipped_block() {
        match decode_payload("1Y") {
            Err(AisError::ArmorDecode { ch, offset }) => {
                assert_eq!(ch, 'Y');
                assert_eq!(offset, 1);
            }
            other => panic!("expected armor failure, got {other:?}"),
        }
        assert!(decode_payload("_").is_err());
    }

    #[test]
    fn test_armor_char_inverse() {
        for v in 0..64u8 {
            let ch = armor_char(v);
            assert_eq!(armor_value(ch as u8), Some(v), "value {v} via {ch:?}");
        }
    }

    #[test]
    fn test_decode_length_is_six_per_char() {
        for payload in ["", "1", "177KQJ5000G?tO`K>RA1wUbN0TKH", "H42O55i18tMET00000000000000"] {
            let buf = decode_payload(payload).unwrap();
            assert_eq!(buf.len(), payload.len() * 6);
        }
    }

    #[test]
    fn test_decode_message_type_bits() {
        let buf = decode_payload("1").unwrap();
        assert_eq!(buf.to_bit_string(), "000001");
        let buf = decode_payload("w").unwrap();
        assert_eq!(buf.to_bit_string(), "111111");
    }

    #[test]
    fn test_decode_rejects_bad_character() {
        match decode_payload("15M6 7") {
            Err(AisError::ArmorDecode { ch, offset }) => {
                assert_eq!(ch, ' ');
                assert_eq!(offset, 4);
            }
            other => panic!("expected armor failure, got {other:?}"),
        }
    }

    #[test]
    fn test_encode_fill_bits() {
        let mut bits = BitBuffer::default();
        bits.push_uint(0b1111, 4);
        let (payload, fill) = encode_payload(&bits);
        assert_eq!(fill, 2);
        assert_eq!(payload, armor_char(0b111100).to_string());
    }

    #[test]
    fn test_encode_decode_payload() {
        let payload = "B5NJ;PP005l4ot5Isbl03wsUkP06";
        let bits = decode_payload(payload).unwrap();
        let (encoded, fill) = encode_payload(&bits);
        assert_eq!(encoded, payload);
        assert_eq!(fill, 0);
    }
}
