//! CometBFT JSON-RPC wire handling

use base64::{engine::general_purpose, Engine as _};
use cw_client::{Client, ClientConfig, ClientError, HttpRpc, NodeRpc, RpcError};
use cw_types::{
    query::{BlockInfo, InfoResponse},
    Hash,
};
use mockito::{Matcher, Server};
use serde_json::json;
use std::time::Duration;

fn rpc(server: &Server) -> HttpRpc {
    HttpRpc::new(&server.url(), Duration::from_secs(2)).unwrap()
}

fn abci_value<T: serde::Serialize>(value: &T) -> String {
    general_purpose::STANDARD.encode(cw_types::encode(value).unwrap())
}

#[tokio::test]
async fn test_broadcast_tx_sync() {
    let mut server = Server::new_async().await;
    let tx_bytes = b"signed tx".to_vec();
    let hash = Hash::of(&tx_bytes);

    let mock = server
        .mock("POST", "/")
        .match_body(Matcher::PartialJson(json!({
            "method": "broadcast_tx_sync",
            "params": {"tx": general_purpose::STANDARD.encode(&tx_bytes)}
        })))
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "jsonrpc": "2.0",
                "id": 1,
                "result": {"code": 0, "data": "", "log": "", "codespace": "", "hash": hash.to_upper_hex()}
            })
            .to_string(),
        )
        .create_async()
        .await;

    let response = rpc(&server).broadcast_tx(&tx_bytes).await.unwrap();
    assert_eq!(response.code, 0);
    assert_eq!(response.hash, hash);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_broadcast_reports_check_tx_failure() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/")
        .with_body(
            json!({
                "jsonrpc": "2.0",
                "id": 1,
                "result": {
                    "code": 32,
                    "log": "account sequence mismatch, expected 4, got 3: incorrect account sequence",
                    "hash": Hash::of(b"x").to_upper_hex()
                }
            })
            .to_string(),
        )
        .create_async()
        .await;

    let response = rpc(&server).broadcast_tx(b"x").await.unwrap();
    assert_eq!(response.code, 32);
    assert!(response.log.contains("expected 4"));
}

#[tokio::test]
async fn test_abci_query_decodes_value() {
    let mut server = Server::new_async().await;
    let info = InfoResponse {
        chain_id: "wire-1".to_string(),
        last_finalized_block: BlockInfo {
            height: 12,
            timestamp: 1_700_000_000,
        },
    };

    server
        .mock("POST", "/")
        .match_body(Matcher::PartialJson(json!({
            "method": "abci_query",
            "params": {"path": "/app", "height": "0", "prove": false}
        })))
        .with_body(
            json!({
                "jsonrpc": "2.0",
                "id": 1,
                "result": {"response": {"code": 0, "log": "", "value": abci_value(&info), "height": "12"}}
            })
            .to_string(),
        )
        .expect_at_least(1)
        .create_async()
        .await;

    let response = rpc(&server).abci_query("/app", b"{}").await.unwrap();
    assert_eq!(response.height, 12);
    let decoded: InfoResponse = cw_types::decode(&response.value).unwrap();
    assert_eq!(decoded, info);

    let client = Client::connect(ClientConfig::new(server.url())).await.unwrap();
    assert_eq!(client.chain_id(), "wire-1");
}

#[tokio::test]
async fn test_tx_not_found_is_none() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/")
        .match_body(Matcher::PartialJson(json!({"method": "tx"})))
        .with_body(
            json!({
                "jsonrpc": "2.0",
                "id": 1,
                "error": {"code": -32603, "message": "Internal error", "data": "tx (ABCD) not found"}
            })
            .to_string(),
        )
        .create_async()
        .await;

    let status = rpc(&server).tx(&Hash::of(b"missing")).await.unwrap();
    assert!(status.is_none());
}

#[tokio::test]
async fn test_tx_found_carries_result() {
    let mut server = Server::new_async().await;
    let hash = Hash::of(b"included");
    server
        .mock("POST", "/")
        .match_body(Matcher::PartialJson(json!({
            "method": "tx",
            "params": {"hash": general_purpose::STANDARD.encode(hash.as_bytes())}
        })))
        .with_body(
            json!({
                "jsonrpc": "2.0",
                "id": 1,
                "result": {
                    "hash": hash.to_upper_hex(),
                    "height": "42",
                    "tx_result": {
                        "code": 0,
                        "log": "",
                        "gas_wanted": "200000",
                        "gas_used": "81234",
                        "events": [{"type": "transfer", "attributes": [{"key": "amount", "value": "5uatom"}]}]
                    }
                }
            })
            .to_string(),
        )
        .create_async()
        .await;

    let status = rpc(&server).tx(&hash).await.unwrap().unwrap();
    assert_eq!(status.height, 42);
    assert_eq!(status.gas_used, 81_234);
    assert_eq!(status.events[0].attribute("amount"), Some("5uatom"));
}

#[tokio::test]
async fn test_http_errors_are_classified() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/")
        .with_status(503)
        .with_body("upstream unavailable")
        .create_async()
        .await;

    let err = rpc(&server).tx(&Hash::of(b"any")).await.unwrap_err();
    assert_eq!(err, RpcError::Http { status: 503 });
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_connect_fails_when_node_is_down() {
    let mut config = ClientConfig::new("http://127.0.0.1:1");
    config.max_query_retries = 0;
    let err = Client::connect(config).await.err().unwrap();
    assert!(matches!(err, ClientError::Rpc(RpcError::Connection(_))));
}

#[tokio::test]
async fn test_request_timeout_bounds_lookups_but_not_broadcasts() {
    let mut server = Server::new_async().await;
    let hash = Hash::of(b"slow");
    let body = json!({
        "jsonrpc": "2.0",
        "id": 1,
        "result": {"code": 0, "log": "", "hash": hash.to_upper_hex()}
    })
    .to_string();
    let slow_body = move |w: &mut dyn std::io::Write| {
        std::thread::sleep(Duration::from_millis(300));
        w.write_all(body.as_bytes())
    };

    server
        .mock("POST", "/")
        .match_body(Matcher::PartialJson(json!({"method": "broadcast_tx_sync"})))
        .with_chunked_body(slow_body.clone())
        .create_async()
        .await;
    server
        .mock("POST", "/")
        .match_body(Matcher::PartialJson(json!({"method": "tx"})))
        .with_chunked_body(slow_body)
        .create_async()
        .await;

    let rpc = HttpRpc::new(&server.url(), Duration::from_millis(100)).unwrap();
    let response = rpc.broadcast_tx(b"slow").await.unwrap();
    assert_eq!(response.hash, hash);

    let err = rpc.tx(&hash).await.unwrap_err();
    assert_eq!(err, RpcError::Timeout);
}
