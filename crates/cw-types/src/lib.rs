//! Core types for cw-sdk
//!
//! Addresses, hashes, messages, transactions, node queries and the canonical
//! encoding that everything signed passes through.

pub mod address;
pub mod admin;
pub mod binary;
pub mod encoding;
pub mod events;
pub mod msgs;
pub mod query;
pub mod tx;

pub use address::{AddressError, Addr, Hash};
pub use admin::AdminOption;
pub use binary::Binary;
pub use encoding::{decode, encode, EncodingError, DEFAULT_MAX_TX_BYTES};
pub use events::{Attribute, Event};
pub use msgs::{Message, MessageKind, MsgOutcome};
pub use query::QueryRequest;
pub use tx::{tx_hash, Fee, GasPrice, KeyType, PubKey, SignDoc, Tx};

pub use cw_math::{Coin, Coins, Dec, Uint};
