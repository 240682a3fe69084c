//! Error taxonomy for the transaction lifecycle
//!
//! The split that matters to callers is whether a failure happened before the
//! transaction left this process or after the node saw it. A node-side
//! rejection may already have consumed the account sequence.

use crate::config::ConfigError;
use cw_crypto::SigningError;
use cw_types::{EncodingError, Hash};
use thiserror::Error;

/// Failures talking to the node
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RpcError {
    #[error("request timed out")]
    Timeout,

    /// No connection could be opened; nothing was sent
    #[error("connection failed:: {0}")]
    Connection(String),

    /// The connection dropped after the request went out
    #[error("connection interrupted:: {0}")]
    Interrupted(String),

    #[error("http status {status}")]
    Http { status: u16 },

    #[error("rpc error {code}:: {message}")]
    Rpc { code: i64, message: String },

    #[error("query failed with code {code}:: {log}")]
    QueryFailed { code: u32, log: String },

    #[error("malformed response:: {0}")]
    MalformedResponse(String),

    #[error("cancelled")]
    Cancelled,
}

impl RpcError {
    /// Network-level failures worth retrying for idempotent requests
    pub fn is_transient(&self) -> bool {
        match self {
            RpcError::Timeout | RpcError::Connection(_) | RpcError::Interrupted(_) => true,
            RpcError::Http { status } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    /// False only when the request certainly never left this process
    pub fn may_have_been_delivered(&self) -> bool {
        !matches!(self, RpcError::Connection(_))
    }
}

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("encoding error:: {0}")]
    Encoding(#[from] EncodingError),

    #[error("signing error:: {0}")]
    Signing(#[from] SigningError),

    #[error("rpc error:: {0}")]
    Rpc(#[from] RpcError),

    #[error("config error:: {0}")]
    Config(#[from] ConfigError),

    #[error("invalid message:: {0}")]
    InvalidMessage(String),

    /// The broadcast call failed after the request may have gone out. The
    /// node may hold the transaction.
    #[error("broadcast of {hash} failed:: {source}")]
    BroadcastFailed {
        hash: Hash,
        #[source]
        source: RpcError,
    },

    /// The node refused the sequence number
    #[error("sequence mismatch: sent {got}, node expected {}", display_expected(.expected))]
    SequenceMismatch { expected: Option<u64>, got: u64 },

    /// The node refused the transaction before execution
    #[error("transaction rejected with code {code}:: {log}")]
    Rejected { code: u32, log: String },

    /// The transaction was included but execution failed
    #[error("transaction {hash} failed at height {height} with code {code}:: {log}")]
    TransactionFailed {
        hash: Hash,
        height: u64,
        code: u32,
        log: String,
    },

    /// The transaction was included but its events did not carry the
    /// expected result
    #[error("transaction {hash}:: {reason}")]
    UnexpectedEvents { hash: Hash, reason: String },

    #[error("chain id mismatch: configured {configured}, node reports {reported}")]
    ChainIdMismatch { configured: String, reported: String },
}

fn display_expected(expected: &Option<u64>) -> String {
    expected.map_or_else(|| "unknown".to_string(), |e| e.to_string())
}

impl ClientError {
    /// True when the node has seen the transaction, or may have, so its
    /// sequence may already be consumed
    pub fn reached_node(&self) -> bool {
        matches!(
            self,
            ClientError::BroadcastFailed { .. }
                | ClientError::SequenceMismatch { .. }
                | ClientError::Rejected { .. }
                | ClientError::TransactionFailed { .. }
                | ClientError::UnexpectedEvents { .. }
        )
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            ClientError::Rpc(RpcError::Cancelled)
                | ClientError::BroadcastFailed {
                    source: RpcError::Cancelled,
                    ..
                }
        )
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
