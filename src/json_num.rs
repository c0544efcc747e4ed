//! Serde helpers for byte strings carried as JSON integers.
//!
//! Bulletin-board records hold commitments, commitment keys, and ballot ids
//! as arbitrary-precision JSON numbers: the integer value of the minimal
//! little-endian byte encoding. `serde_json`'s `arbitrary_precision`
//! feature keeps the full 256-bit values intact.

use num_bigint::BigUint;
use serde::de::Error as DeError;
use serde::ser::Error as SerError;
use serde::{Deserialize, Deserializer, Serializer};

use crate::crypto::{bigint_to_bytes, bytes_to_bigint};

fn to_number(bytes: &[u8]) -> Result<serde_json::Number, serde_json::Error> {
    let digits = bytes_to_bigint(bytes).to_str_radix(10);
    serde_json::from_str(&digits)
}

fn from_number(number: &serde_json::Number) -> Option<Vec<u8>> {
    let digits = number.to_string();
    let value = BigUint::parse_bytes(digits.as_bytes(), 10)?;
    Some(bigint_to_bytes(&value))
}

/// Byte strings as JSON integers (minimal little-endian interpretation).
pub mod bytes {
    use super::*;

    pub fn serialize<S>(value: &Vec<u8>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let number = to_number(value).map_err(SerError::custom)?;
        serde::Serialize::serialize(&number, serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let number = serde_json::Number::deserialize(deserializer)?;
        from_number(&number)
            .ok_or_else(|| DeError::custom("expected a nonnegative JSON integer"))
    }
}

/// Optional byte strings; absent fields stay absent.
pub mod bytes_opt {
    use super::*;

    pub fn serialize<S>(value: &Option<Vec<u8>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(bytes) => super::bytes::serialize(bytes, serializer),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Vec<u8>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        super::bytes::deserialize(deserializer).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;

    #[derive(Serialize, Deserialize, Debug, PartialEq, Eq)]
    struct Wrapper {
        #[serde(with = "super::bytes")]
        value: Vec<u8>,
    }

    #[test]
    fn little_endian_integer_round_trip() {
        let wrapper = Wrapper {
            value: vec![0x39, 0x05],
        };
        let json = serde_json::to_string(&wrapper).unwrap();
        // 0x0539 little-endian = 1337.
        assert_eq!(json, r#"{"value":1337}"#);
        let restored: Wrapper = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, wrapper);
    }

    #[test]
    fn values_beyond_u64_survive() {
        let wrapper = Wrapper {
            value: vec![0xff; 32],
        };
        let json = serde_json::to_string(&wrapper).unwrap();
        let restored: Wrapper = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.value, wrapper.value);
    }

    #[test]
    fn zero_round_trips_as_one_byte() {
        let json = r#"{"value":0}"#;
        let restored: Wrapper = serde_json::from_str(json).unwrap();
        assert_eq!(restored.value, vec![0]);
    }

    #[test]
    fn fractional_numbers_are_rejected() {
        assert!(serde_json::from_str::<Wrapper>(r#"{"value":1.5}"#).is_err());
        assert!(serde_json::from_str::<Wrapper>(r#"{"value":-3}"#).is_err());
    }
}
