//! Address and hash types for cw-sdk

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    #[error("invalid hex:: {0}")]
    InvalidHex(String),

    #[error("invalid length: expected {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
}

/// 32-byte SHA-256 hash, used for transaction and code hashes
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Hash([u8; 32]);

impl Hash {
    pub const LENGTH: usize = 32;

    pub const fn from_array(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// SHA-256 of the given bytes
    pub fn of(bytes: &[u8]) -> Self {
        Self(Sha256::digest(bytes).into())
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, AddressError> {
        let array: [u8; 32] = bytes.try_into().map_err(|_| AddressError::InvalidLength {
            expected: Self::LENGTH,
            actual: bytes.len(),
        })?;
        Ok(Self(array))
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Uppercase hex without prefix, the form CometBFT reports tx hashes in
    pub fn to_upper_hex(&self) -> String {
        hex::encode_upper(self.0)
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

/// Accepts upper or lower case hex, with or without a `0x` prefix
impl FromStr for Hash {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(s).map_err(|e| AddressError::InvalidHex(e.to_string()))?;
        Self::from_slice(&bytes)
    }
}

impl Serialize for Hash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Hash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Hash::from_str(&s).map_err(serde::de::Error::custom)
    }
}

/// Account or contract address - 32 bytes, rendered as `0x`-prefixed hex
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Addr([u8; 32]);

impl Addr {
    pub const LENGTH: usize = 32;

    pub const fn from_array(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, AddressError> {
        let array: [u8; 32] = bytes.try_into().map_err(|_| AddressError::InvalidLength {
            expected: Self::LENGTH,
            actual: bytes.len(),
        })?;
        Ok(Self(array))
    }

    /// Derive the address of a contract instantiated by `deployer`:
    /// sha256(deployer || code_hash || salt)
    pub fn compute(deployer: &Addr, code_hash: &Hash, salt: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(deployer.0);
        hasher.update(code_hash.as_bytes());
        hasher.update(salt);
        Self(hasher.finalize().into())
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for Addr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl FromStr for Addr {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(s).map_err(|e| AddressError::InvalidHex(e.to_string()))?;
        Self::from_slice(&bytes)
    }
}

impl Serialize for Addr {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Addr {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Addr::from_str(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const USER: &str = "0x9f6de9773b30d62ce431caf26a7fd3f54f06d4071adaf9a8eadfec968bcbf022";

    #[test]
    fn test_addr_display_roundtrip() {
        let addr = Addr::from_str(USER).unwrap();
        assert_eq!(addr.to_string(), USER);
        assert_eq!(Addr::from_str(&USER[2..]).unwrap(), addr);
    }

    #[test]
    fn test_addr_rejects_bad_input() {
        assert!(matches!(
            Addr::from_str("0x1234"),
            Err(AddressError::InvalidLength { actual: 2, .. })
        ));
        assert!(matches!(
            Addr::from_str("0xzz"),
            Err(AddressError::InvalidHex(_))
        ));
    }

    #[test]
    fn test_compute_is_deterministic_and_salted() {
        let deployer = Addr::from_str(USER).unwrap();
        let code_hash = Hash::of(b"\0asm wrapper");
        let a = Addr::compute(&deployer, &code_hash, b"wrapper");
        let b = Addr::compute(&deployer, &code_hash, b"wrapper");
        let c = Addr::compute(&deployer, &code_hash, b"wrapper-2");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, deployer);
    }

    #[test]
    fn test_hash_parses_upper_hex() {
        let hash = Hash::of(b"tx");
        assert_eq!(Hash::from_str(&hash.to_upper_hex()).unwrap(), hash);
        assert_eq!(Hash::from_str(&format!("0x{hash}")).unwrap(), hash);
    }
}
