//! HttpTransport against a local axum node

use std::net::SocketAddr;
use std::time::Duration;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use conduit_client::{Client, ClientConfig, ClientError, HttpTransport, Transport};
use serde_json::{json, Value};

async fn rpc(Json(request): Json<Value>) -> Response {
    let id = request["id"].clone();
    let method = request["method"].as_str().unwrap_or_default().to_string();
    match method.as_str() {
        "eth_chainId" => Json(json!({"jsonrpc": "2.0", "id": id, "result": "0x539"})).into_response(),
        "eth_blockNumber" => {
            Json(json!({"jsonrpc": "2.0", "id": id, "result": "0x10"})).into_response()
        }
        "eth_getTransactionReceipt" => {
            Json(json!({"jsonrpc": "2.0", "id": id, "result": null})).into_response()
        }
        "echo_params" => Json(json!({"jsonrpc": "2.0", "id": id, "result": request["params"]}))
            .into_response(),
        "eth_sendTransaction" => Json(json!({
            "jsonrpc": "2.0",
            "id": id,
            "error": {"code": -32000, "message": "insufficient funds for gas * price + value"}
        }))
        .into_response(),
        "broken_body" => (StatusCode::OK, "{not json").into_response(),
        "wrong_id" => {
            let other = id.as_u64().unwrap_or_default() + 100;
            Json(json!({"jsonrpc": "2.0", "id": other, "result": "0x1"})).into_response()
        }
        "server_error" => (StatusCode::INTERNAL_SERVER_ERROR, "boom").into_response(),
        _ => Json(json!({
            "jsonrpc": "2.0",
            "id": id,
            "error": {"code": -32601, "message": "method not found"}
        }))
        .into_response(),
    }
}

async fn serve() -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = Router::new().route("/", post(rpc));
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

async fn transport() -> HttpTransport {
    let addr = serve().await;
    HttpTransport::new(&format!("http://{}", addr), Duration::from_secs(5)).unwrap()
}

#[tokio::test]
async fn test_result_and_null_result() {
    let transport = transport().await;
    let block = transport.request_json("eth_blockNumber", vec![]).await.unwrap();
    assert_eq!(block, json!("0x10"));

    let receipt = transport
        .request_json("eth_getTransactionReceipt", vec![json!("0x00")])
        .await
        .unwrap();
    assert!(receipt.is_null());

    let echoed = transport
        .request_json("echo_params", vec![json!("0xab"), json!(true)])
        .await
        .unwrap();
    assert_eq!(echoed, json!(["0xab", true]));
}

#[tokio::test]
async fn test_error_envelope_is_rpc_error() {
    let transport = transport().await;
    let err = transport
        .request_json("eth_sendTransaction", vec![json!({"from": "0x01"})])
        .await
        .unwrap_err();
    match err {
        ClientError::Rpc {
            method,
            code,
            message,
            ..
        } => {
            assert_eq!(method, "eth_sendTransaction");
            assert_eq!(code, -32000);
            assert!(message.contains("insufficient funds"));
        }
        other => panic!("expected an rpc error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_bad_responses_are_transport_errors() {
    let transport = transport().await;

    let err = transport.request_json("broken_body", vec![]).await.unwrap_err();
    assert!(matches!(&err, ClientError::Transport { message, .. } if message.contains("malformed")));

    let err = transport.request_json("wrong_id", vec![]).await.unwrap_err();
    assert!(matches!(&err, ClientError::Transport { message, .. } if message.contains("does not match")));

    let err = transport.request_json("server_error", vec![]).await.unwrap_err();
    assert!(matches!(&err, ClientError::Transport { message, .. } if message.starts_with("HTTP 500")));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_connection_refused() {
    // bind then drop to find a port nobody listens on
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let transport =
        HttpTransport::new(&format!("http://{}", addr), Duration::from_secs(2)).unwrap();
    let err = transport.request_json("eth_chainId", vec![]).await.unwrap_err();
    assert!(matches!(err, ClientError::Transport { .. }));
}

#[tokio::test]
async fn test_client_over_http() {
    let addr = serve().await;
    let client = Client::connect(&format!("http://{}", addr)).await.unwrap();
    assert_eq!(client.chain_id().await.unwrap(), 1337);
    assert_eq!(client.block_number().await.unwrap(), 16);

    let config = ClientConfig {
        read_retries: 0,
        ..ClientConfig::new(format!("http://{}", addr))
    };
    let client = Client::from_config(config).unwrap();
    let err = client.client_version().await.unwrap_err();
    assert!(matches!(err, ClientError::Rpc { code: -32601, .. }));
}
