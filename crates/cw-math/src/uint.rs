//! Arbitrary precision unsigned integer type

use num_bigint::BigUint;
use num_traits::{ToPrimitive, Zero};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Add;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseUintError {
    #[error("empty amount")]
    Empty,

    #[error("negative amount not allowed:: {0}")]
    Negative(String),

    #[error("invalid amount:: {0}")]
    Invalid(String),
}

/// Arbitrary precision non-negative integer.
///
/// Serialized as a decimal string so that amounts never pass through a
/// floating point representation on the wire.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Uint(BigUint);

impl Serialize for Uint {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for Uint {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Uint::from_str(&s).map_err(serde::de::Error::custom)
    }
}

impl Uint {
    /// Create a new Uint from u64
    pub fn from_u64(n: u64) -> Self {
        Self(BigUint::from(n))
    }

    /// Create a new Uint from u128
    pub fn from_u128(n: u128) -> Self {
        Self(BigUint::from(n))
    }

    /// Zero value
    pub fn zero() -> Self {
        Self(BigUint::zero())
    }

    /// Check if zero
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Subtraction that returns `None` instead of underflowing
    pub fn checked_sub(&self, other: &Self) -> Option<Self> {
        if other.0 > self.0 {
            None
        } else {
            Some(Self(&self.0 - &other.0))
        }
    }

    /// Lossy conversion, `None` if the value does not fit
    pub fn to_u128(&self) -> Option<u128> {
        self.0.to_u128()
    }
}

impl From<u64> for Uint {
    fn from(n: u64) -> Self {
        Self::from_u64(n)
    }
}

impl From<u128> for Uint {
    fn from(n: u128) -> Self {
        Self::from_u128(n)
    }
}

impl From<BigUint> for Uint {
    fn from(n: BigUint) -> Self {
        Self(n)
    }
}

impl FromStr for Uint {
    type Err = ParseUintError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(ParseUintError::Empty);
        }
        if s.starts_with('-') {
            return Err(ParseUintError::Negative(s.to_string()));
        }
        // BigUint accepts a leading '+' and underscores, the wire format does not
        if !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ParseUintError::Invalid(s.to_string()));
        }
        BigUint::from_str(s)
            .map(Self)
            .map_err(|_| ParseUintError::Invalid(s.to_string()))
    }
}

impl fmt::Display for Uint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Add for Uint {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self(self.0 + other.0)
    }
}

impl Zero for Uint {
    fn zero() -> Self {
        Self(BigUint::zero())
    }

    fn is_zero(&self) -> bool {
        self.0.is_zero()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rejects_negative_and_garbage() {
        assert_eq!(
            Uint::from_str("-5"),
            Err(ParseUintError::Negative("-5".to_string()))
        );
        assert!(matches!(Uint::from_str("+5"), Err(ParseUintError::Invalid(_))));
        assert!(matches!(Uint::from_str("1_000"), Err(ParseUintError::Invalid(_))));
        assert_eq!(Uint::from_str(""), Err(ParseUintError::Empty));
    }

    #[test]
    fn test_large_values_survive_serde() {
        let big = "340282366920938463463374607431768211456000";
        let value: Uint = serde_json::from_str(&format!("\"{big}\"")).unwrap();
        assert_eq!(value.to_string(), big);
        assert_eq!(serde_json::to_string(&value).unwrap(), format!("\"{big}\""));
    }

    #[test]
    fn test_checked_sub_underflow() {
        let five = Uint::from_u64(5);
        let seven = Uint::from_u64(7);
        assert_eq!(seven.checked_sub(&five), Some(Uint::from_u64(2)));
        assert_eq!(five.checked_sub(&seven), None);
    }
}
