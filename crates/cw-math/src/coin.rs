//! Coin and Coins types for handling tokens

use crate::uint::{ParseUintError, Uint};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoinError {
    #[error("invalid denomination:: {0}")]
    InvalidDenom(String),

    #[error("invalid amount:: {0}")]
    InvalidAmount(#[from] ParseUintError),

    #[error("duplicate denomination:: {0}")]
    DuplicateDenom(String),

    #[error("insufficient {denom}: have {have}, need {need}")]
    Insufficient {
        denom: String,
        have: Uint,
        need: Uint,
    },

    #[error("cannot parse coin:: {0}")]
    Parse(String),
}

/// A single coin with denomination and amount
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Coin {
    pub denom: String,
    pub amount: Uint,
}

impl Coin {
    /// Create a new coin, validating the denomination
    pub fn new(denom: impl Into<String>, amount: impl Into<Uint>) -> Result<Self, CoinError> {
        let denom = denom.into();
        if !is_valid_denom(&denom) {
            return Err(CoinError::InvalidDenom(denom));
        }

        Ok(Self {
            denom,
            amount: amount.into(),
        })
    }

    /// Check if coin is zero
    pub fn is_zero(&self) -> bool {
        self.amount.is_zero()
    }
}

// Deserialization goes through `Coin::new` so denoms arriving from the node
// are held to the same rules as locally constructed coins.
impl<'de> Deserialize<'de> for Coin {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct CoinData {
            denom: String,
            amount: Uint,
        }

        let data = CoinData::deserialize(deserializer)?;
        Coin::new(data.denom, data.amount).map_err(serde::de::Error::custom)
    }
}

impl fmt::Display for Coin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.amount, self.denom)
    }
}

/// Parses the `888uatom` shorthand used on the command line
impl FromStr for Coin {
    type Err = CoinError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let split = s
            .find(|c: char| !c.is_ascii_digit())
            .ok_or_else(|| CoinError::Parse(s.to_string()))?;
        if split == 0 {
            return Err(CoinError::Parse(s.to_string()));
        }
        let amount = Uint::from_str(&s[..split])?;
        Coin::new(&s[split..], amount)
    }
}

/// A collection of coins, always sorted by denomination
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Coins(Vec<Coin>);

impl Coins {
    /// Create a new Coins collection from a vector of coins
    /// Enforces sorting by denomination and no duplicates
    pub fn new(mut coins: Vec<Coin>) -> Result<Self, CoinError> {
        coins.retain(|c| !c.is_zero());
        coins.sort_by(|a, b| a.denom.cmp(&b.denom));

        for window in coins.windows(2) {
            if window[0].denom == window[1].denom {
                return Err(CoinError::DuplicateDenom(window[0].denom.clone()));
            }
        }

        Ok(Self(coins))
    }

    /// Create an empty Coins collection
    pub fn empty() -> Self {
        Self(Vec::new())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of distinct denoms
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Get coins as slice
    pub fn as_slice(&self) -> &[Coin] {
        &self.0
    }

    /// Coins in denom order
    pub fn into_vec(self) -> Vec<Coin> {
        self.0
    }

    /// Add a coin to the collection, merging with an existing denom
    pub fn add(&mut self, coin: Coin) -> Result<(), CoinError> {
        if coin.is_zero() {
            return Ok(());
        }

        match self.0.binary_search_by(|c| c.denom.as_str().cmp(&coin.denom)) {
            Ok(idx) => {
                let merged = self.0[idx].amount.clone() + coin.amount;
                self.0[idx].amount = merged;
            }
            Err(idx) => self.0.insert(idx, coin),
        }

        Ok(())
    }

    /// Remove an amount of a denom, failing if the balance is too small
    pub fn deduct(&mut self, coin: &Coin) -> Result<(), CoinError> {
        if coin.is_zero() {
            return Ok(());
        }

        let have = self.amount_of(&coin.denom);
        let remaining = have
            .checked_sub(&coin.amount)
            .ok_or_else(|| CoinError::Insufficient {
                denom: coin.denom.clone(),
                have: have.clone(),
                need: coin.amount.clone(),
            })?;

        if let Ok(idx) = self.0.binary_search_by(|c| c.denom.as_str().cmp(&coin.denom)) {
            if remaining.is_zero() {
                self.0.remove(idx);
            } else {
                self.0[idx].amount = remaining;
            }
        }

        Ok(())
    }

    /// Find amount of a specific denomination
    pub fn amount_of(&self, denom: &str) -> Uint {
        self.0
            .iter()
            .find(|c| c.denom == denom)
            .map(|c| c.amount.clone())
            .unwrap_or_else(Uint::zero)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Coin> {
        self.0.iter()
    }
}

impl<'de> Deserialize<'de> for Coins {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let coins = Vec::<Coin>::deserialize(deserializer)?;
        Coins::new(coins).map_err(serde::de::Error::custom)
    }
}

impl<'a> IntoIterator for &'a Coins {
    type Item = &'a Coin;
    type IntoIter = std::slice::Iter<'a, Coin>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl TryFrom<Vec<Coin>> for Coins {
    type Error = CoinError;

    fn try_from(coins: Vec<Coin>) -> Result<Self, Self::Error> {
        Coins::new(coins)
    }
}

impl fmt::Display for Coins {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s: Vec<String> = self.0.iter().map(|c| c.to_string()).collect();
        write!(f, "{}", s.join(","))
    }
}

/// Parses a comma separated list such as `888uatom,999uosmo`
impl FromStr for Coins {
    type Err = CoinError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().is_empty() {
            return Ok(Self::empty());
        }
        let coins = s
            .split(',')
            .map(|part| Coin::from_str(part.trim()))
            .collect::<Result<Vec<_>, _>>()?;
        Coins::new(coins)
    }
}

/// Validate denomination format
pub fn is_valid_denom(denom: &str) -> bool {
    if denom.is_empty() || denom.len() > 127 {
        return false;
    }

    // Must start with a letter
    if !denom.starts_with(|c: char| c.is_ascii_alphabetic()) {
        return false;
    }

    denom
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '/' | ':' | '.' | '_' | '-'))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coin(denom: &str, amount: u64) -> Coin {
        Coin::new(denom, amount).unwrap()
    }

    #[test]
    fn test_coins_sorted_and_zero_free() {
        let coins = Coins::new(vec![coin("uosmo", 999), coin("uatom", 888), coin("ujuno", 0)])
            .unwrap();
        let denoms: Vec<_> = coins.iter().map(|c| c.denom.as_str()).collect();
        assert_eq!(denoms, vec!["uatom", "uosmo"]);
    }

    #[test]
    fn test_coins_reject_duplicates() {
        let err = Coins::new(vec![coin("uatom", 1), coin("uatom", 2)]).unwrap_err();
        assert_eq!(err, CoinError::DuplicateDenom("uatom".to_string()));
    }

    #[test]
    fn test_add_and_deduct() {
        let mut coins = Coins::empty();
        coins.add(coin("uosmo", 5)).unwrap();
        coins.add(coin("uatom", 3)).unwrap();
        coins.add(coin("uosmo", 5)).unwrap();
        assert_eq!(coins.to_string(), "3uatom,10uosmo");

        coins.deduct(&coin("uatom", 3)).unwrap();
        assert_eq!(coins.to_string(), "10uosmo");

        let err = coins.deduct(&coin("uosmo", 11)).unwrap_err();
        assert!(matches!(err, CoinError::Insufficient { .. }));
    }

    #[test]
    fn test_parse_coin_list() {
        let coins: Coins = "999uosmo, 888uatom".parse().unwrap();
        assert_eq!(coins.amount_of("uatom"), Uint::from_u64(888));
        assert_eq!(coins.amount_of("uosmo"), Uint::from_u64(999));
        assert!("uatom".parse::<Coin>().is_err());
        assert!("12".parse::<Coin>().is_err());
    }

    #[test]
    fn test_deserialize_enforces_invariants() {
        let dup = r#"[{"denom":"uatom","amount":"1"},{"denom":"uatom","amount":"2"}]"#;
        assert!(serde_json::from_str::<Coins>(dup).is_err());

        let negative = r#"[{"denom":"uatom","amount":"-1"}]"#;
        assert!(serde_json::from_str::<Coins>(negative).is_err());

        let bad_denom = r#"[{"denom":"1atom","amount":"1"}]"#;
        assert!(serde_json::from_str::<Coins>(bad_denom).is_err());
    }

    #[test]
    fn test_denom_validation() {
        assert!(is_valid_denom("uatom"));
        assert!(is_valid_denom("wrapped/uatom"));
        assert!(!is_valid_denom(""));
        assert!(!is_valid_denom("9lives"));
        assert!(!is_valid_denom("u atom"));
    }
}
