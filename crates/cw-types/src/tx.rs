//! Transaction types

use crate::{
    encoding::{self, EncodingError},
    Addr, Binary, Hash, Message,
};
use cw_math::{Coin, Coins, Dec};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Fee attached to a transaction
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fee {
    pub amount: Coins,
    pub gas_limit: u64,
}

impl Fee {
    pub fn new(amount: Coins, gas_limit: u64) -> Self {
        Self { amount, gas_limit }
    }
}

/// Price of one unit of gas, e.g. `0.025uatom`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct GasPrice {
    pub denom: String,
    pub amount: Dec,
}

impl GasPrice {
    pub fn new(denom: impl Into<String>, amount: Dec) -> Self {
        Self {
            denom: denom.into(),
            amount,
        }
    }

    /// Fee for the given gas limit, rounded up
    pub fn fee_for(&self, gas_limit: u64) -> Result<Fee, EncodingError> {
        let amount = self
            .amount
            .mul_ceil(gas_limit)
            .ok_or_else(|| EncodingError::invalid("fee", "gas price overflow"))?;
        let coin = Coin::new(self.denom.clone(), amount)
            .map_err(|e| EncodingError::invalid("fee", e.to_string()))?;
        let amount =
            Coins::new(vec![coin]).map_err(|e| EncodingError::invalid("fee", e.to_string()))?;
        Ok(Fee { amount, gas_limit })
    }
}

impl fmt::Display for GasPrice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.amount, self.denom)
    }
}

impl FromStr for GasPrice {
    type Err = EncodingError;

    /// Parse gas price string (e.g., "0.025uatom")
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let split_pos = s
            .find(|c: char| c.is_alphabetic())
            .ok_or_else(|| EncodingError::invalid("gas_price", "missing denom"))?;

        let (amount, denom) = s.split_at(split_pos);
        if amount.is_empty() {
            return Err(EncodingError::invalid("gas_price", "missing amount"));
        }
        let amount = Dec::from_str(amount)
            .map_err(|e| EncodingError::invalid("gas_price", e.to_string()))?;

        Ok(Self::new(denom, amount))
    }
}

impl TryFrom<String> for GasPrice {
    type Error = EncodingError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<GasPrice> for String {
    fn from(price: GasPrice) -> Self {
        price.to_string()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyType {
    Secp256k1,
    Ed25519,
}

impl fmt::Display for KeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyType::Secp256k1 => f.write_str("secp256k1"),
            KeyType::Ed25519 => f.write_str("ed25519"),
        }
    }
}

/// Public key as carried inside a transaction
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PubKey {
    #[serde(rename = "type")]
    pub key_type: KeyType,
    pub value: Binary,
}

/// The document a sender signs
///
/// The chain ID is part of what is signed but is not repeated in the
/// transaction itself; the node fills in its own.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignDoc {
    pub sender: Addr,
    pub msgs: Vec<Message>,
    pub fee: Fee,
    pub memo: String,
    pub chain_id: String,
    pub sequence: u64,
}

impl SignDoc {
    pub fn to_bytes(&self) -> Result<Vec<u8>, EncodingError> {
        encoding::encode(self)
    }
}

/// A signed transaction
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tx {
    pub sender: Addr,
    pub msgs: Vec<Message>,
    pub fee: Fee,
    pub memo: String,
    pub sequence: u64,
    pub public_key: PubKey,
    pub signature: Binary,
}

impl Tx {
    /// Rebuild the document the signature was produced over
    pub fn sign_doc(&self, chain_id: &str) -> SignDoc {
        SignDoc {
            sender: self.sender,
            msgs: self.msgs.clone(),
            fee: self.fee.clone(),
            memo: self.memo.clone(),
            chain_id: chain_id.to_string(),
            sequence: self.sequence,
        }
    }

    pub fn to_bytes(&self, max_bytes: usize) -> Result<Vec<u8>, EncodingError> {
        encoding::encode_bounded(self, max_bytes)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, EncodingError> {
        encoding::decode(bytes)
    }
}

/// Transaction hash as the node computes it
pub fn tx_hash(tx_bytes: &[u8]) -> Hash {
    Hash::of(tx_bytes)
}
