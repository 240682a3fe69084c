//! Node RPC transport
//!
//! [`NodeRpc`] is the raw node surface: broadcast, ABCI query and tx lookup.
//! [`HttpRpc`] speaks CometBFT JSON-RPC over HTTP. [`RpcTransport`] layers the
//! lifecycle rules on top: queries are retried with backoff, broadcasts are
//! sent exactly once, and everything honours cancellation.

use crate::cancel::Cancellation;
use crate::error::{ClientError, RpcError};
use crate::retry::{retry_with_backoff, RetryPolicy};
use crate::tx_builder::SignedTx;
use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use cw_types::{
    query::{APP_QUERY_PATH, SIMULATE_QUERY_PATH},
    Event, Hash, QueryRequest,
};
use reqwest::Client as HttpClient;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// Cosmos `ErrWrongSequence`
pub const CODE_WRONG_SEQUENCE: u32 = 32;

/// CheckTx result for a broadcast transaction
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct BroadcastResponse {
    #[serde(default)]
    pub code: u32,
    #[serde(default)]
    pub log: String,
    pub hash: Hash,
}

/// ABCI query result
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct QueryResponse {
    pub code: u32,
    pub log: String,
    pub value: Vec<u8>,
    pub height: u64,
}

/// Execution result of an included transaction
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TxStatus {
    pub hash: Hash,
    pub height: u64,
    pub code: u32,
    pub log: String,
    pub gas_wanted: u64,
    pub gas_used: u64,
    pub events: Vec<Event>,
}

/// Raw node RPC surface
#[async_trait]
pub trait NodeRpc: Send + Sync {
    /// Submit a transaction; returns once the node has run CheckTx
    async fn broadcast_tx(&self, tx_bytes: &[u8]) -> Result<BroadcastResponse, RpcError>;

    async fn abci_query(&self, path: &str, data: &[u8]) -> Result<QueryResponse, RpcError>;

    /// Look up a transaction by hash; `None` while it is not yet in a block
    async fn tx(&self, hash: &Hash) -> Result<Option<TxStatus>, RpcError>;
}

#[derive(Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: serde_json::Value,
}

#[derive(Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcErrorBody>,
}

#[derive(Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
    #[serde(default)]
    data: Option<String>,
}

#[derive(Deserialize)]
struct AbciQueryResult {
    response: AbciQueryBody,
}

#[derive(Deserialize)]
struct AbciQueryBody {
    #[serde(default)]
    code: u32,
    #[serde(default)]
    log: String,
    #[serde(default)]
    value: Option<String>,
    #[serde(default, deserialize_with = "u64_from_str_or_num")]
    height: u64,
}

#[derive(Deserialize)]
struct TxResult {
    hash: Hash,
    #[serde(deserialize_with = "u64_from_str_or_num")]
    height: u64,
    tx_result: ExecTxResult,
}

#[derive(Deserialize)]
struct ExecTxResult {
    #[serde(default)]
    code: u32,
    #[serde(default)]
    log: String,
    #[serde(default, deserialize_with = "u64_from_str_or_num")]
    gas_wanted: u64,
    #[serde(default, deserialize_with = "u64_from_str_or_num")]
    gas_used: u64,
    #[serde(default)]
    events: Vec<Event>,
}

// CometBFT encodes int64 as JSON strings
fn u64_from_str_or_num<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Num(u64),
        Str(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Num(n) => Ok(n),
        Raw::Str(s) => s.parse().map_err(serde::de::Error::custom),
    }
}

/// CometBFT JSON-RPC over HTTP
///
/// Queries and tx lookups are bounded by `request_timeout`. Broadcasts carry
/// no HTTP timeout of their own; [`RpcTransport::broadcast`] bounds them with
/// the per-call broadcast timeout.
pub struct HttpRpc {
    url: Url,
    http_client: HttpClient,
    request_timeout: Duration,
}

impl HttpRpc {
    pub fn new(endpoint: &str, request_timeout: Duration) -> Result<Self, RpcError> {
        let url = Url::parse(endpoint)
            .map_err(|e| RpcError::Connection(format!("invalid endpoint {endpoint}: {e}")))?;
        let http_client = HttpClient::builder()
            .build()
            .map_err(|e| RpcError::Connection(e.to_string()))?;
        Ok(Self {
            url,
            http_client,
            request_timeout,
        })
    }

    async fn rpc_request<T>(
        &self,
        method: &str,
        params: serde_json::Value,
        timeout: Option<Duration>,
    ) -> Result<T, RpcError>
    where
        T: DeserializeOwned,
    {
        let request = RpcRequest {
            jsonrpc: "2.0",
            id: rand::random::<u32>() as u64,
            method,
            params,
        };

        let mut builder = self.http_client.post(self.url.clone()).json(&request);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let response = builder.send().await.map_err(map_reqwest_error)?;

        let status = response.status();
        let body = response.bytes().await.map_err(map_reqwest_error)?;

        // JSON-RPC errors may arrive with a non-2xx status; prefer the body
        let rpc_response: RpcResponse<T> = match serde_json::from_slice(&body) {
            Ok(parsed) => parsed,
            Err(_) if !status.is_success() => {
                return Err(RpcError::Http {
                    status: status.as_u16(),
                })
            }
            Err(e) => return Err(RpcError::MalformedResponse(e.to_string())),
        };

        if let Some(error) = rpc_response.error {
            let message = match error.data {
                Some(data) if !data.is_empty() => format!("{}: {data}", error.message),
                _ => error.message,
            };
            return Err(RpcError::Rpc {
                code: error.code,
                message,
            });
        }

        rpc_response
            .result
            .ok_or_else(|| RpcError::MalformedResponse("missing result field".to_string()))
    }
}

fn map_reqwest_error(e: reqwest::Error) -> RpcError {
    if e.is_timeout() {
        RpcError::Timeout
    } else if let Some(status) = e.status() {
        RpcError::Http {
            status: status.as_u16(),
        }
    } else if e.is_decode() {
        RpcError::MalformedResponse(e.to_string())
    } else if e.is_connect() || e.is_builder() {
        RpcError::Connection(e.to_string())
    } else {
        RpcError::Interrupted(e.to_string())
    }
}

#[async_trait]
impl NodeRpc for HttpRpc {
    async fn broadcast_tx(&self, tx_bytes: &[u8]) -> Result<BroadcastResponse, RpcError> {
        let params = serde_json::json!({
            "tx": general_purpose::STANDARD.encode(tx_bytes),
        });
        self.rpc_request("broadcast_tx_sync", params, None).await
    }

    async fn abci_query(&self, path: &str, data: &[u8]) -> Result<QueryResponse, RpcError> {
        let params = serde_json::json!({
            "path": path,
            "data": hex::encode(data),
            "height": "0",
            "prove": false,
        });
        let result: AbciQueryResult = self
            .rpc_request("abci_query", params, Some(self.request_timeout))
            .await?;
        let value = match result.response.value {
            Some(encoded) if !encoded.is_empty() => general_purpose::STANDARD
                .decode(encoded)
                .map_err(|e| RpcError::MalformedResponse(format!("query value: {e}")))?,
            _ => Vec::new(),
        };

        Ok(QueryResponse {
            code: result.response.code,
            log: result.response.log,
            value,
            height: result.response.height,
        })
    }

    async fn tx(&self, hash: &Hash) -> Result<Option<TxStatus>, RpcError> {
        let params = serde_json::json!({
            "hash": general_purpose::STANDARD.encode(hash.as_bytes()),
            "prove": false,
        });

        let lookup = self.rpc_request("tx", params, Some(self.request_timeout));
        let result: TxResult = match lookup.await {
            Ok(result) => result,
            Err(RpcError::Rpc { code: -32603, message }) if message.contains("not found") => {
                return Ok(None)
            }
            Err(e) => return Err(e),
        };

        Ok(Some(TxStatus {
            hash: result.hash,
            height: result.height,
            code: result.tx_result.code,
            log: result.tx_result.log,
            gas_wanted: result.tx_result.gas_wanted,
            gas_used: result.tx_result.gas_used,
            events: result.tx_result.events,
        }))
    }
}

/// How a broadcast ended when it did not fail outright
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Broadcast {
    /// CheckTx passed
    Accepted(Hash),
    /// No answer in time; the transaction may or may not be in the mempool
    TimedOut(Hash),
}

impl Broadcast {
    pub fn hash(&self) -> Hash {
        match self {
            Broadcast::Accepted(hash) | Broadcast::TimedOut(hash) => *hash,
        }
    }
}

/// Retry, cancellation and response classification over a [`NodeRpc`]
#[derive(Clone)]
pub struct RpcTransport {
    rpc: Arc<dyn NodeRpc>,
    retry: RetryPolicy,
}

impl RpcTransport {
    pub fn new(rpc: Arc<dyn NodeRpc>, retry: RetryPolicy) -> Self {
        Self { rpc, retry }
    }

    /// Send a signed transaction once. A timeout yields
    /// [`Broadcast::TimedOut`]; it is never retried, since the node may
    /// already hold the transaction. Any other failure after the request
    /// may have gone out is [`ClientError::BroadcastFailed`].
    pub async fn broadcast(
        &self,
        signed: &SignedTx,
        timeout: Duration,
        cancel: &Cancellation,
    ) -> Result<Broadcast, ClientError> {
        let hash = signed.hash;
        if cancel.is_cancelled() {
            return Err(RpcError::Cancelled.into());
        }
        let sent = cancel
            .run(async {
                match tokio::time::timeout(timeout, self.rpc.broadcast_tx(&signed.bytes)).await {
                    Ok(result) => result,
                    Err(_) => Err(RpcError::Timeout),
                }
            })
            .await;

        let response = match sent {
            Ok(response) => response,
            Err(RpcError::Timeout) => {
                warn!(hash = %hash, "Broadcast timed out; outcome unknown");
                return Ok(Broadcast::TimedOut(hash));
            }
            Err(e) if e.may_have_been_delivered() => {
                warn!(
                    hash = %hash,
                    error = %e,
                    "Broadcast failed; node may hold the transaction"
                );
                return Err(ClientError::BroadcastFailed { hash, source: e });
            }
            Err(e) => return Err(e.into()),
        };

        if response.code != 0 {
            if let Some(expected) = parse_sequence_mismatch(response.code, &response.log) {
                return Err(ClientError::SequenceMismatch {
                    expected,
                    got: signed.tx.sequence,
                });
            }
            return Err(ClientError::Rejected {
                code: response.code,
                log: response.log,
            });
        }

        if response.hash != hash {
            warn!(local = %hash, node = %response.hash, "Node reported a different tx hash");
        }
        debug!(hash = %hash, sequence = signed.tx.sequence, "Broadcast accepted");
        Ok(Broadcast::Accepted(hash))
    }

    /// Raw ABCI query with retries; non-zero result codes are errors
    pub async fn query(
        &self,
        path: &str,
        data: &[u8],
        cancel: &Cancellation,
    ) -> Result<Vec<u8>, RpcError> {
        let response = retry_with_backoff("abci_query", &self.retry, cancel, || {
            self.rpc.abci_query(path, data)
        })
        .await?;

        if response.code != 0 {
            return Err(RpcError::QueryFailed {
                code: response.code,
                log: response.log,
            });
        }
        Ok(response.value)
    }

    /// Typed query against the app query handler
    pub async fn query_app<T: DeserializeOwned>(
        &self,
        request: &QueryRequest,
        cancel: &Cancellation,
    ) -> Result<T, ClientError> {
        let data = cw_types::encode(request)?;
        let value = self.query(APP_QUERY_PATH, &data, cancel).await?;
        Ok(cw_types::decode(&value)?)
    }

    /// Gas used by an unsigned transaction, as estimated by the node
    pub async fn simulate(
        &self,
        tx_bytes: &[u8],
        cancel: &Cancellation,
    ) -> Result<u64, ClientError> {
        let value = self.query(SIMULATE_QUERY_PATH, tx_bytes, cancel).await?;
        let response: cw_types::query::SimulateResponse = cw_types::decode(&value)?;
        Ok(response.gas_used)
    }

    /// Inclusion lookup, retried like a query. `None` is not retried; the
    /// confirmation waiter does its own polling.
    pub async fn tx_status(
        &self,
        hash: &Hash,
        cancel: &Cancellation,
    ) -> Result<Option<TxStatus>, RpcError> {
        retry_with_backoff("tx", &self.retry, cancel, || self.rpc.tx(hash)).await
    }
}

/// If a CheckTx failure is a sequence mismatch, the sequence the node
/// expected (when it says)
pub fn parse_sequence_mismatch(code: u32, log: &str) -> Option<Option<u64>> {
    let lower = log.to_ascii_lowercase();
    let is_mismatch = code == CODE_WRONG_SEQUENCE
        || lower.contains("sequence mismatch")
        || lower.contains("incorrect account sequence");
    if !is_mismatch {
        return None;
    }

    let expected = lower.find("expected ").and_then(|idx| {
        lower[idx + "expected ".len()..]
            .split(|c: char| !c.is_ascii_digit())
            .next()
            .and_then(|digits| digits.parse().ok())
    });
    Some(expected)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_sequence_mismatch() {
        assert_eq!(
            parse_sequence_mismatch(
                32,
                "account sequence mismatch, expected 5, got 4: incorrect account sequence"
            ),
            Some(Some(5))
        );
        assert_eq!(
            parse_sequence_mismatch(1, "Sequence mismatch for account"),
            Some(None)
        );
        assert_eq!(parse_sequence_mismatch(5, "insufficient funds"), None);
    }

    #[test]
    fn test_u64_from_str_or_num() {
        #[derive(Deserialize)]
        struct H {
            #[serde(deserialize_with = "u64_from_str_or_num")]
            height: u64,
        }
        let a: H = serde_json::from_str(r#"{"height":"42"}"#).unwrap();
        let b: H = serde_json::from_str(r#"{"height":42}"#).unwrap();
        assert_eq!(a.height, 42);
        assert_eq!(b.height, 42);
        assert!(serde_json::from_str::<H>(r#"{"height":"x"}"#).is_err());
    }
}
