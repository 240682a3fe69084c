//! Fixed-point decimal type used for gas prices

use crate::uint::Uint;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Non-negative fixed-point decimal, serialized as a string
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Dec(Decimal);

impl Dec {
    pub fn zero() -> Self {
        Self(Decimal::ZERO)
    }

    pub fn from_u64(n: u64) -> Self {
        Self(Decimal::from(n))
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Multiply by an integer and round up, as used for fee computation
    pub fn mul_ceil(&self, n: u64) -> Option<Uint> {
        let product = self.0.checked_mul(Decimal::from(n))?;
        product.ceil().to_u128().map(Uint::from_u128)
    }
}

impl FromStr for Dec {
    type Err = rust_decimal::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = Decimal::from_str(s)?;
        if value.is_sign_negative() && !value.is_zero() {
            return Err(rust_decimal::Error::ErrorString(format!(
                "negative decimal not allowed: {s}"
            )));
        }
        Ok(Self(value))
    }
}

impl TryFrom<String> for Dec {
    type Error = rust_decimal::Error;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Dec::from_str(&s)
    }
}

impl From<Dec> for String {
    fn from(d: Dec) -> Self {
        d.to_string()
    }
}

impl fmt::Display for Dec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.normalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mul_ceil() {
        let price = Dec::from_str("0.025").unwrap();
        assert_eq!(price.mul_ceil(200_000), Some(Uint::from_u64(5_000)));
        assert_eq!(price.mul_ceil(1), Some(Uint::from_u64(1)));
        assert_eq!(Dec::zero().mul_ceil(1_000), Some(Uint::zero()));
    }

    #[test]
    fn test_rejects_negative() {
        assert!(Dec::from_str("-0.1").is_err());
        assert_eq!(Dec::from_str("1.50").unwrap().to_string(), "1.5");
    }
}
