//! Query requests and responses understood by the node's app query handler

use crate::{Addr, Hash, PubKey};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// ABCI query path for [`QueryRequest`]s
pub const APP_QUERY_PATH: &str = "/app";

/// ABCI query path for gas simulation; the payload is an encoded transaction
pub const SIMULATE_QUERY_PATH: &str = "/simulate";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryRequest {
    Info {},
    Balance { address: Addr, denom: String },
    Balances { address: Addr },
    Account { address: Addr },
    Code { hash: Hash },
    Contract { address: Addr },
    WasmSmart { contract: Addr, msg: Value },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockInfo {
    pub height: u64,
    pub timestamp: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InfoResponse {
    pub chain_id: String,
    pub last_finalized_block: BlockInfo,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountResponse {
    pub address: Addr,
    pub sequence: u64,
    #[serde(default)]
    pub public_key: Option<PubKey>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeResponse {
    pub hash: Hash,
    pub size: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractInfo {
    pub address: Addr,
    pub code_hash: Hash,
    pub admin: Option<Addr>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulateResponse {
    pub gas_used: u64,
}
