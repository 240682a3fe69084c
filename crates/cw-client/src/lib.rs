//! Transaction lifecycle client for cw-sdk nodes
//!
//! Builds, signs and broadcasts transactions against a CometBFT node,
//! keeps per-account sequence numbers consistent under concurrency, and
//! waits for inclusion. Queries go through the node's ABCI query endpoint
//! and are retried on transient failures; broadcasts never are.

pub mod cancel;
pub mod client;
pub mod config;
pub mod error;
pub mod mock;
pub mod retry;
pub mod sequence;
pub mod transport;
pub mod tx_builder;
pub mod waiter;

pub use cancel::{cancellation, CancelHandle, Cancellation};
pub use client::{Client, SigningOptions};
pub use config::{ClientConfig, ConfigError};
pub use error::{ClientError, Result, RpcError};
pub use mock::MockNode;
pub use retry::RetryPolicy;
pub use sequence::{AccountState, SequenceTracker};
pub use transport::{Broadcast, HttpRpc, NodeRpc, RpcTransport};
pub use tx_builder::{AccountSnapshot, SignedTx, TxBuilder};
pub use waiter::{ConfirmationWaiter, TransactionResult};
