//! Message types
//!
//! The message catalog is fixed per protocol version, so messages are a closed
//! enum. Each variant knows how to validate itself and how to pick its result
//! out of the events the node emits for it.

use crate::{
    encoding::EncodingError,
    events::{attribute_values, Event},
    Addr, Binary, Hash,
};
use cw_math::{is_valid_denom, Coins};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Wasm modules start with `\0asm`
pub const WASM_MAGIC: &[u8; 4] = b"\0asm";

/// Longest salt accepted for contract address derivation
pub const MAX_SALT_LENGTH: usize = 70;

/// Send coins from the sender to another account or contract
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgTransfer {
    pub sender: Addr,
    pub to: Addr,
    pub coins: Coins,
}

/// Upload wasm byte code
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgStoreCode {
    pub sender: Addr,
    pub wasm_byte_code: Binary,
}

/// Create a contract from previously stored code
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgInstantiate {
    pub sender: Addr,
    pub code_hash: Hash,
    pub msg: Value,
    pub salt: Binary,
    pub funds: Coins,
    pub admin: Option<Addr>,
}

impl MsgInstantiate {
    /// Address the contract will be created at
    pub fn contract_address(&self) -> Addr {
        Addr::compute(&self.sender, &self.code_hash, &self.salt)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgExecute {
    pub sender: Addr,
    pub contract: Addr,
    pub msg: Value,
    pub funds: Coins,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgMigrate {
    pub sender: Addr,
    pub contract: Addr,
    pub new_code_hash: Hash,
    pub msg: Value,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Message {
    Transfer(MsgTransfer),
    StoreCode(MsgStoreCode),
    Instantiate(MsgInstantiate),
    Execute(MsgExecute),
    Migrate(MsgMigrate),
}

/// Variant tag, used for logging and outcome dispatch
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MessageKind {
    Transfer,
    StoreCode,
    Instantiate,
    Execute,
    Migrate,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::Transfer => "transfer",
            MessageKind::StoreCode => "store_code",
            MessageKind::Instantiate => "instantiate",
            MessageKind::Execute => "execute",
            MessageKind::Migrate => "migrate",
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a message produced once its transaction was included
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MsgOutcome {
    Transferred,
    CodeStored { code_hash: Option<Hash> },
    Instantiated { contract: Option<Addr> },
    Executed,
    Migrated,
}

impl Message {
    pub fn transfer(sender: Addr, to: Addr, coins: Coins) -> Self {
        Message::Transfer(MsgTransfer { sender, to, coins })
    }

    pub fn store_code(sender: Addr, wasm_byte_code: impl Into<Binary>) -> Self {
        Message::StoreCode(MsgStoreCode {
            sender,
            wasm_byte_code: wasm_byte_code.into(),
        })
    }

    pub fn instantiate(
        sender: Addr,
        code_hash: Hash,
        msg: Value,
        salt: impl Into<Binary>,
        funds: Coins,
        admin: Option<Addr>,
    ) -> Self {
        Message::Instantiate(MsgInstantiate {
            sender,
            code_hash,
            msg,
            salt: salt.into(),
            funds,
            admin,
        })
    }

    pub fn execute(sender: Addr, contract: Addr, msg: Value, funds: Coins) -> Self {
        Message::Execute(MsgExecute {
            sender,
            contract,
            msg,
            funds,
        })
    }

    pub fn migrate(sender: Addr, contract: Addr, new_code_hash: Hash, msg: Value) -> Self {
        Message::Migrate(MsgMigrate {
            sender,
            contract,
            new_code_hash,
            msg,
        })
    }

    pub fn kind(&self) -> MessageKind {
        match self {
            Message::Transfer(_) => MessageKind::Transfer,
            Message::StoreCode(_) => MessageKind::StoreCode,
            Message::Instantiate(_) => MessageKind::Instantiate,
            Message::Execute(_) => MessageKind::Execute,
            Message::Migrate(_) => MessageKind::Migrate,
        }
    }

    pub fn sender(&self) -> &Addr {
        match self {
            Message::Transfer(msg) => &msg.sender,
            Message::StoreCode(msg) => &msg.sender,
            Message::Instantiate(msg) => &msg.sender,
            Message::Execute(msg) => &msg.sender,
            Message::Migrate(msg) => &msg.sender,
        }
    }

    /// Stateless checks that do not need the chain
    pub fn validate_basic(&self) -> Result<(), EncodingError> {
        match self {
            Message::Transfer(msg) => {
                if msg.sender == msg.to {
                    return Err(EncodingError::invalid(
                        "to",
                        "cannot transfer coins to the sender",
                    ));
                }
                if msg.coins.is_empty() {
                    return Err(EncodingError::invalid("coins", "cannot be empty"));
                }
                validate_coins("coins", &msg.coins)
            }
            Message::StoreCode(msg) => {
                if !msg.wasm_byte_code.starts_with(WASM_MAGIC) {
                    return Err(EncodingError::invalid(
                        "wasm_byte_code",
                        "not a wasm module",
                    ));
                }
                Ok(())
            }
            Message::Instantiate(msg) => {
                if msg.salt.is_empty() || msg.salt.len() > MAX_SALT_LENGTH {
                    return Err(EncodingError::invalid(
                        "salt",
                        format!("length must be between 1 and {MAX_SALT_LENGTH} bytes"),
                    ));
                }
                validate_coins("funds", &msg.funds)
            }
            Message::Execute(msg) => validate_coins("funds", &msg.funds),
            Message::Migrate(_) => Ok(()),
        }
    }

    /// Extract this message's result from the events of an included
    /// transaction
    pub fn parse_outcome(&self, events: &[Event]) -> MsgOutcome {
        match self {
            Message::Transfer(_) => MsgOutcome::Transferred,
            Message::StoreCode(msg) => {
                let expected = Hash::of(&msg.wasm_byte_code);
                let code_hash = attribute_values(events, "store_code", "code_hash")
                    .filter_map(|value| value.parse::<Hash>().ok())
                    .find(|hash| *hash == expected);
                MsgOutcome::CodeStored { code_hash }
            }
            Message::Instantiate(msg) => {
                let expected = msg.contract_address();
                let contract = attribute_values(events, "instantiate", "contract_address")
                    .filter_map(|value| value.parse::<Addr>().ok())
                    .find(|addr| *addr == expected);
                MsgOutcome::Instantiated { contract }
            }
            Message::Execute(_) => MsgOutcome::Executed,
            Message::Migrate(_) => MsgOutcome::Migrated,
        }
    }
}

// `Coins` fields are public, so a hand-built set may not have gone through
// `Coins::new`.
fn validate_coins(field: &'static str, coins: &Coins) -> Result<(), EncodingError> {
    for coin in coins {
        if !is_valid_denom(&coin.denom) {
            return Err(EncodingError::invalid(
                field,
                format!("invalid denom {}", coin.denom),
            ));
        }
        if coin.is_zero() {
            return Err(EncodingError::invalid(
                field,
                format!("zero amount for {}", coin.denom),
            ));
        }
    }
    Ok(())
}
