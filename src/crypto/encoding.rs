//! Minimal little-endian byte encoding of nonnegative integers.
//!
//! Every integer that crosses the bulletin board is serialized as the
//! little-endian byte string of minimal length (a single zero byte for the
//! value zero). Commitment determinism depends on this encoding: the HMAC
//! input for a committed value is exactly its minimal encoding.

use num_bigint::BigUint;

/// Encode a small value (`u`, `v`, vote components) as minimal-length
/// little-endian bytes. Zero encodes as `[0]`.
pub fn encode_value(value: u64) -> Vec<u8> {
    let bytes = value.to_le_bytes();
    let len = bytes.iter().rposition(|&b| b != 0).map_or(1, |pos| pos + 1);
    bytes[..len].to_vec()
}

/// Interpret little-endian bytes as a `u64`. Returns `None` when the value
/// does not fit.
pub fn decode_value(bytes: &[u8]) -> Option<u64> {
    let significant = bytes.iter().rposition(|&b| b != 0).map_or(0, |pos| pos + 1);
    if significant > 8 {
        return None;
    }
    let mut buf = [0u8; 8];
    buf[..significant].copy_from_slice(&bytes[..significant]);
    Some(u64::from_le_bytes(buf))
}

/// Minimal little-endian encoding of an arbitrary-precision integer.
pub fn bigint_to_bytes(value: &BigUint) -> Vec<u8> {
    value.to_bytes_le()
}

/// Inverse of [`bigint_to_bytes`] (tolerates non-minimal input).
pub fn bytes_to_bigint(bytes: &[u8]) -> BigUint {
    BigUint::from_bytes_le(bytes)
}

/// Expand minimal little-endian bytes to a fixed-width array, zero-padding
/// the high end. Returns `None` when the value needs more than `W` bytes.
pub fn fixed_width<const W: usize>(bytes: &[u8]) -> Option<[u8; W]> {
    let significant = bytes.iter().rposition(|&b| b != 0).map_or(0, |pos| pos + 1);
    if significant > W {
        return None;
    }
    let mut out = [0u8; W];
    out[..significant].copy_from_slice(&bytes[..significant]);
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_encodes_as_single_byte() {
        assert_eq!(encode_value(0), vec![0]);
        assert_eq!(decode_value(&[0]), Some(0));
    }

    #[test]
    fn encoding_is_minimal() {
        assert_eq!(encode_value(1), vec![1]);
        assert_eq!(encode_value(256), vec![0, 1]);
        assert_eq!(encode_value(u64::MAX), vec![0xff; 8]);
    }

    #[test]
    fn decode_inverts_encode() {
        for value in [0u64, 1, 4, 255, 256, 65_535, 1 << 40, u64::MAX] {
            assert_eq!(decode_value(&encode_value(value)), Some(value));
        }
    }

    #[test]
    fn decode_rejects_oversized_values() {
        assert_eq!(decode_value(&[0xff; 9]), None);
        // Trailing zero bytes are not significant.
        assert_eq!(decode_value(&[1, 0, 0, 0, 0, 0, 0, 0, 0]), Some(1));
    }

    #[test]
    fn bigint_round_trip_matches_minimal_form() {
        let value = BigUint::from_bytes_le(&[7, 0, 13, 0, 0]);
        let encoded = bigint_to_bytes(&value);
        assert_eq!(encoded, vec![7, 0, 13]);
        assert_eq!(bytes_to_bigint(&encoded), value);
    }

    #[test]
    fn fixed_width_pads_high_end() {
        let padded: [u8; 4] = fixed_width(&[9, 1]).unwrap();
        assert_eq!(padded, [9, 1, 0, 0]);
        assert!(fixed_width::<2>(&[1, 2, 3]).is_none());
        assert_eq!(fixed_width::<2>(&[1, 2, 0]), Some([1, 2]));
    }
}
