//! Canonical encoding
//!
//! Everything that is hashed or signed goes through [`encode`]. The output is
//! JSON with object keys in lexicographic order and no whitespace, so the same
//! logical value always yields the same bytes. Struct field order, map
//! insertion order and formatting settings of the caller have no influence.
//!
//! Byte fields are base64 strings (see [`crate::Binary`]) and token amounts are
//! decimal strings (see `cw_math::Uint`).

use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

/// Upper bound on the encoded size of a transaction accepted by default
pub const DEFAULT_MAX_TX_BYTES: usize = 1024 * 1024;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EncodingError {
    #[error("serialization failed:: {0}")]
    Serialize(String),

    #[error("deserialization failed:: {0}")]
    Deserialize(String),

    #[error("payload too large: {size} bytes exceeds limit of {max}")]
    Oversized { size: usize, max: usize },

    #[error("invalid field {field}:: {reason}")]
    InvalidField { field: &'static str, reason: String },
}

impl EncodingError {
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field,
            reason: reason.into(),
        }
    }
}

/// Encode a value into its canonical byte form
pub fn encode<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, EncodingError> {
    // Round-tripping through `Value` sorts every object's keys, since the
    // map type backing `Value` is ordered.
    let value =
        serde_json::to_value(value).map_err(|e| EncodingError::Serialize(e.to_string()))?;
    serde_json::to_vec(&value).map_err(|e| EncodingError::Serialize(e.to_string()))
}

/// Encode and enforce a size limit
pub fn encode_bounded<T: Serialize + ?Sized>(
    value: &T,
    max: usize,
) -> Result<Vec<u8>, EncodingError> {
    let bytes = encode(value)?;
    if bytes.len() > max {
        return Err(EncodingError::Oversized {
            size: bytes.len(),
            max,
        });
    }
    Ok(bytes)
}

/// Decode bytes produced by [`encode`]
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, EncodingError> {
    serde_json::from_slice(bytes).map_err(|e| EncodingError::Deserialize(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::collections::HashMap;

    #[derive(Serialize, Deserialize)]
    struct Unordered {
        zebra: u32,
        apple: String,
        nested: HashMap<String, u32>,
    }

    #[test]
    fn test_keys_are_sorted_at_every_level() {
        let mut nested = HashMap::new();
        nested.insert("b".to_string(), 2);
        nested.insert("a".to_string(), 1);
        nested.insert("c".to_string(), 3);

        let bytes = encode(&Unordered {
            zebra: 1,
            apple: "x".to_string(),
            nested,
        })
        .unwrap();

        assert_eq!(
            String::from_utf8(bytes).unwrap(),
            r#"{"apple":"x","nested":{"a":1,"b":2,"c":3},"zebra":1}"#
        );
    }

    #[test]
    fn test_whitespace_in_source_does_not_matter() {
        let spaced: serde_json::Value =
            serde_json::from_str("{ \"b\" : [1, 2],\n \"a\": {\"y\": true, \"x\": null} }").unwrap();
        let compact: serde_json::Value =
            serde_json::from_str(r#"{"a":{"x":null,"y":true},"b":[1,2]}"#).unwrap();
        assert_eq!(encode(&spaced).unwrap(), encode(&compact).unwrap());
    }

    #[test]
    fn test_bounded_rejects_oversized() {
        let payload = "x".repeat(100);
        let err = encode_bounded(&payload, 50).unwrap_err();
        assert_eq!(err, EncodingError::Oversized { size: 102, max: 50 });
        assert!(encode_bounded(&payload, 200).is_ok());
    }
}
