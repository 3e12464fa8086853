//! Substrate JSON-RPC client over a WebSocket
//!
//! One socket per client, opened lazily. Before each use the socket is
//! checked for a close or failure that arrived while it was idle, and is
//! reopened if so. Calls are serialized over the socket, so concurrent
//! callers interleave at the granularity of single remote calls.
//!
//! `ws://` and `wss://` endpoints are both accepted; TLS uses rustls with
//! the webpki root store.

use async_trait::async_trait;
use futures_util::{FutureExt, SinkExt, StreamExt};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use super::codec::{self, RuntimeLayout, TIMESTAMP_NOW_KEY};
use super::{BlockBody, BlockHash, BlockHeader, LedgerClient, Operation};
use crate::error::{LedgerError, Result};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Debug, Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Value,
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    id: Option<u64>,
    #[serde(default)]
    result: Value,
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcHeader {
    number: String,
    #[serde(default)]
    parent_hash: String,
    #[serde(default)]
    state_root: String,
    #[serde(default)]
    extrinsics_root: String,
    #[serde(default)]
    digest: RpcDigest,
}

impl RpcHeader {
    fn number(&self) -> Result<u64> {
        parse_number(&self.number)
    }

    fn encoded_size(&self, number: u64) -> Result<u64> {
        let logs = self
            .digest
            .logs
            .iter()
            .map(|log| codec::decode_hex(log))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(codec::header_size(number, &logs))
    }
}

#[derive(Debug, Default, Deserialize)]
struct RpcDigest {
    #[serde(default)]
    logs: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RpcSignedBlock {
    block: RpcBlock,
}

#[derive(Debug, Deserialize)]
struct RpcBlock {
    header: RpcHeader,
    extrinsics: Vec<String>,
}

/// [`LedgerClient`] backed by a node's WebSocket JSON-RPC endpoint.
pub struct RpcLedgerClient {
    endpoint: String,
    layout: RuntimeLayout,
    socket: Mutex<Option<Socket>>,
    request_id: AtomicU64,
}

impl RpcLedgerClient {
    pub fn new(endpoint: impl Into<String>, layout: RuntimeLayout) -> Self {
        Self {
            endpoint: endpoint.into(),
            layout,
            socket: Mutex::new(None),
            request_id: AtomicU64::new(1),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn open(&self) -> Result<Socket> {
        tracing::info!(endpoint = %self.endpoint, "Connecting to ledger node");
        let (socket, _) = connect_async(self.endpoint.as_str()).await?;
        tracing::info!(endpoint = %self.endpoint, "Connected to ledger node");
        Ok(socket)
    }

    /// The held socket if the node has not closed it, otherwise a new one.
    async fn live_socket<'s>(&self, slot: &'s mut Option<Socket>) -> Result<&'s mut Socket> {
        if let Some(socket) = slot.as_mut() {
            if !drain_idle_frames(socket).await {
                tracing::warn!(
                    endpoint = %self.endpoint,
                    "Ledger connection lost while idle, reconnecting"
                );
                *slot = None;
            }
        }
        if slot.is_none() {
            *slot = Some(self.open().await?);
        }
        slot.as_mut()
            .ok_or_else(|| LedgerError::ConnectionError("socket unavailable".to_string()))
    }

    /// Perform one JSON-RPC call. A `null` result is returned as `Value::Null`.
    async fn call(&self, method: &str, params: Value) -> Result<Value> {
        let mut guard = self.socket.lock().await;
        let socket = self.live_socket(&mut guard).await?;

        let id = self.request_id.fetch_add(1, Ordering::SeqCst);
        let request = serde_json::to_string(&JsonRpcRequest {
            jsonrpc: "2.0",
            id,
            method,
            params,
        })?;

        let outcome = exchange(socket, id, request).await;
        if let Err(e) = &outcome {
            if e.is_connection() {
                tracing::warn!(method, error = %e, "Dropping ledger connection");
                *guard = None;
            }
        }
        outcome
    }

    async fn call_typed<R: DeserializeOwned>(&self, method: &str, params: Value) -> Result<R> {
        match self.call(method, params).await? {
            Value::Null => Err(LedgerError::NotFound(format!("{} returned null", method))),
            value => Ok(serde_json::from_value(value)?),
        }
    }
}

/// Consume frames that arrived while no call was in flight. Returns `false`
/// when the node has closed the socket or the stream has failed.
async fn drain_idle_frames(socket: &mut Socket) -> bool {
    loop {
        match socket.next().now_or_never() {
            None => return true,
            Some(Some(Ok(Message::Ping(data)))) => {
                if socket.send(Message::Pong(data)).await.is_err() {
                    return false;
                }
            }
            Some(Some(Ok(Message::Close(_)))) | Some(Some(Err(_))) | Some(None) => return false,
            // late replies and notifications
            Some(Some(Ok(_))) => continue,
        }
    }
}

async fn exchange(socket: &mut Socket, id: u64, request: String) -> Result<Value> {
    socket.send(Message::Text(request)).await?;

    loop {
        let frame = match socket.next().await {
            Some(frame) => frame?,
            None => return Err(LedgerError::ConnectionError("connection closed".to_string())),
        };
        let payload = match frame {
            Message::Text(text) => text.into_bytes(),
            Message::Binary(bytes) => bytes,
            Message::Ping(data) => {
                socket.send(Message::Pong(data)).await?;
                continue;
            }
            Message::Close(_) => {
                return Err(LedgerError::ConnectionError("connection closed by node".to_string()))
            }
            _ => continue,
        };

        let response: JsonRpcResponse = serde_json::from_slice(&payload)?;
        // subscription notifications carry no id
        if response.id != Some(id) {
            continue;
        }
        if let Some(error) = response.error {
            return Err(LedgerError::RpcError {
                code: error.code,
                message: error.message,
            });
        }
        return Ok(response.result);
    }
}

fn parse_number(value: &str) -> Result<u64> {
    u64::from_str_radix(value.trim_start_matches("0x"), 16)
        .map_err(|e| LedgerError::DecodeError(format!("invalid block number {}: {}", value, e)))
}

#[async_trait]
impl LedgerClient for RpcLedgerClient {
    async fn connect(&self) -> Result<()> {
        let mut guard = self.socket.lock().await;
        self.live_socket(&mut guard).await?;
        Ok(())
    }

    async fn head_number(&self) -> Result<u64> {
        let header: RpcHeader = self.call_typed("chain_getHeader", json!([])).await?;
        header.number()
    }

    async fn hash_for(&self, number: u64) -> Result<BlockHash> {
        match self.call("chain_getBlockHash", json!([number])).await? {
            Value::String(hash) => Ok(hash),
            Value::Null => Err(LedgerError::NotFound(format!("no block at height {}", number))),
            other => Err(LedgerError::DecodeError(format!("unexpected block hash {}", other))),
        }
    }

    async fn header_for(&self, hash: &str) -> Result<BlockHeader> {
        let header: RpcHeader = self
            .call_typed("chain_getHeader", json!([hash]))
            .await
            .map_err(|e| match e {
                LedgerError::NotFound(_) => LedgerError::NotFound(format!("header {}", hash)),
                other => other,
            })?;
        let number = header.number()?;
        let encoded_size = header.encoded_size(number)?;

        Ok(BlockHeader {
            number,
            hash: hash.to_string(),
            parent_hash: header.parent_hash,
            state_root: header.state_root,
            extrinsics_root: header.extrinsics_root,
            digest_logs: header.digest.logs,
            encoded_size,
        })
    }

    async fn body_for(&self, hash: &str) -> Result<BlockBody> {
        let signed: RpcSignedBlock = self
            .call_typed("chain_getBlock", json!([hash]))
            .await
            .map_err(|e| match e {
                LedgerError::NotFound(_) => LedgerError::NotFound(format!("block {}", hash)),
                other => other,
            })?;
        let RpcBlock { header, extrinsics } = signed.block;
        let number = header.number()?;

        let mut operations = Vec::with_capacity(extrinsics.len());
        for raw in &extrinsics {
            let bytes = codec::decode_hex(raw)?;
            match codec::decode_extrinsic(&bytes, &self.layout) {
                Ok(op) => operations.push(op),
                Err(e) => {
                    tracing::warn!(block = number, error = %e, "Undecodable extrinsic");
                    operations.push(Operation::opaque(codec::extrinsic_hash(&bytes)));
                }
            }
        }

        Ok(BlockBody {
            number,
            header_size: header.encoded_size(number)?,
            operations,
        })
    }

    async fn timestamp_for(&self, hash: &str) -> Result<u64> {
        match self
            .call("state_getStorage", json!([TIMESTAMP_NOW_KEY, hash]))
            .await?
        {
            Value::String(raw) => Ok(codec::decode_timestamp(&raw)?),
            Value::Null => Err(LedgerError::NotFound(format!("no timestamp at block {}", hash))),
            other => Err(LedgerError::DecodeError(format!("unexpected timestamp {}", other))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::net::TcpListener;
    use tokio_tungstenite::accept_async;

    /// Local WebSocket node. `respond` maps (connection index, request) to
    /// the frames sent back; a `Close` frame ends that connection.
    async fn mock_node<F>(respond: F) -> (String, Arc<AtomicUsize>)
    where
        F: Fn(usize, &Value) -> Vec<Message> + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let endpoint = format!("ws://{}", listener.local_addr().unwrap());
        let connections = Arc::new(AtomicUsize::new(0));
        let counter = connections.clone();
        let respond = Arc::new(respond);

        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let connection = counter.fetch_add(1, Ordering::SeqCst);
                let respond = respond.clone();
                tokio::spawn(async move {
                    let Ok(mut ws) = accept_async(stream).await else {
                        return;
                    };
                    while let Some(Ok(frame)) = ws.next().await {
                        let Message::Text(text) = frame else {
                            continue;
                        };
                        let request: Value = serde_json::from_str(&text).unwrap();
                        for message in (*respond)(connection, &request) {
                            let closing = matches!(message, Message::Close(_));
                            if ws.send(message).await.is_err() || closing {
                                return;
                            }
                        }
                    }
                });
            }
        });

        (endpoint, connections)
    }

    fn reply(request: &Value, result: Value) -> Message {
        Message::Text(json!({"jsonrpc": "2.0", "id": request["id"], "result": result}).to_string())
    }

    fn header(number: u64) -> Value {
        json!({
            "parentHash": "0x01",
            "number": format!("0x{:x}", number),
            "stateRoot": "0x02",
            "extrinsicsRoot": "0x03",
            "digest": { "logs": ["0x0642414245"] }
        })
    }

    fn client(endpoint: &str) -> RpcLedgerClient {
        RpcLedgerClient::new(endpoint, RuntimeLayout::default())
    }

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_number("0x1a").unwrap(), 26);
        assert_eq!(parse_number("0x0").unwrap(), 0);
        assert!(parse_number("0xzz").is_err());
    }

    #[test]
    fn test_response_with_null_result() {
        let response: JsonRpcResponse =
            serde_json::from_str(r#"{"jsonrpc":"2.0","id":7,"result":null}"#).unwrap();
        assert_eq!(response.id, Some(7));
        assert!(response.result.is_null());
        assert!(response.error.is_none());
    }

    #[test]
    fn test_response_with_error() {
        let response: JsonRpcResponse = serde_json::from_str(
            r#"{"jsonrpc":"2.0","id":3,"error":{"code":-32601,"message":"Method not found"}}"#,
        )
        .unwrap();
        let error = response.error.unwrap();
        assert_eq!(error.code, -32601);
        assert_eq!(error.message, "Method not found");
    }

    #[test]
    fn test_block_response_shape() {
        let raw = r#"{
            "block": {
                "header": {
                    "parentHash": "0x00",
                    "number": "0x2",
                    "stateRoot": "0x00",
                    "extrinsicsRoot": "0x00",
                    "digest": { "logs": ["0x0642414245"] }
                },
                "extrinsics": ["0x280401000b0068e5cf8b01"]
            },
            "justifications": null
        }"#;
        let signed: RpcSignedBlock = serde_json::from_str(raw).unwrap();
        assert_eq!(parse_number(&signed.block.header.number).unwrap(), 2);
        assert_eq!(signed.block.header.digest.logs.len(), 1);
        assert_eq!(signed.block.extrinsics.len(), 1);
    }

    #[tokio::test]
    async fn test_unreachable_node_is_a_connection_error() {
        let client = RpcLedgerClient::new("ws://127.0.0.1:1", RuntimeLayout::default());
        let err = client.head_number().await.unwrap_err();
        assert!(err.is_connection(), "unexpected error: {:?}", err);
    }

    #[tokio::test]
    async fn test_reply_is_matched_by_request_id() {
        let (endpoint, _) = mock_node(|_, request| {
            let id = request["id"].as_u64().unwrap_or_default();
            vec![
                Message::Ping(vec![1, 2, 3]),
                Message::Text(
                    json!({
                        "jsonrpc": "2.0",
                        "method": "chain_newHead",
                        "params": { "subscription": "s1", "result": header(0x63) }
                    })
                    .to_string(),
                ),
                Message::Text(
                    json!({"jsonrpc": "2.0", "id": id + 100, "result": header(0x63)}).to_string(),
                ),
                reply(request, header(5)),
            ]
        })
        .await;

        let client = client(&endpoint);
        assert_eq!(client.head_number().await.unwrap(), 5);
        assert_eq!(client.head_number().await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_null_and_error_replies() {
        let (endpoint, connections) = mock_node(|_, request| match request["method"].as_str() {
            Some("chain_getBlockHash") => vec![reply(request, Value::Null)],
            Some("state_getStorage") => vec![Message::Text(
                json!({
                    "jsonrpc": "2.0",
                    "id": request["id"],
                    "error": { "code": -32000, "message": "state already discarded" }
                })
                .to_string(),
            )],
            _ => vec![Message::Close(None)],
        })
        .await;

        let client = client(&endpoint);
        let err = client.hash_for(99).await.unwrap_err();
        assert!(matches!(err, LedgerError::NotFound(_)), "unexpected error: {:?}", err);

        match client.timestamp_for("0x01").await.unwrap_err() {
            LedgerError::RpcError { code, message } => {
                assert_eq!(code, -32000);
                assert_eq!(message, "state already discarded");
            }
            other => panic!("unexpected error: {:?}", other),
        }
        // RPC-level errors keep the socket
        assert_eq!(connections.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_header_for_reads_header_only() {
        let (endpoint, _) = mock_node(|_, request| match request["method"].as_str() {
            Some("chain_getHeader") => vec![reply(request, header(2))],
            _ => vec![Message::Close(None)],
        })
        .await;

        let header = client(&endpoint).header_for("0xbeef").await.unwrap();
        assert_eq!(header.number, 2);
        assert_eq!(header.hash, "0xbeef");
        assert_eq!(header.parent_hash, "0x01");
        assert_eq!(header.digest_logs, vec!["0x0642414245".to_string()]);
        assert_eq!(
            header.encoded_size,
            codec::header_size(2, &[codec::decode_hex("0x0642414245").unwrap()])
        );
    }

    #[tokio::test]
    async fn test_close_mid_call_reconnects_on_next_call() {
        let (endpoint, connections) = mock_node(|connection, request| {
            match (connection, request["method"].as_str()) {
                (0, Some("chain_getBlock")) => vec![Message::Close(None)],
                _ => vec![reply(request, header(7))],
            }
        })
        .await;

        let client = client(&endpoint);
        let err = client.body_for("0x07").await.unwrap_err();
        assert!(err.is_connection(), "unexpected error: {:?}", err);

        assert_eq!(client.head_number().await.unwrap(), 7);
        assert_eq!(connections.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_connect_reopens_socket_closed_while_idle() {
        let (endpoint, connections) = mock_node(|connection, request| {
            let mut frames = vec![reply(request, header(3))];
            if connection == 0 {
                frames.push(Message::Close(None));
            }
            frames
        })
        .await;

        let client = client(&endpoint);
        assert_eq!(client.head_number().await.unwrap(), 3);
        tokio::time::sleep(Duration::from_millis(100)).await;

        client.connect().await.unwrap();
        assert_eq!(connections.load(Ordering::SeqCst), 2);
        assert_eq!(client.head_number().await.unwrap(), 3);
        assert_eq!(connections.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_secure_endpoint_attempts_tls() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        // plain TCP peer that hangs up before any handshake
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                drop(stream);
            }
        });

        let err = client(&format!("wss://{}", addr)).connect().await.unwrap_err();
        assert!(err.is_connection(), "unexpected error: {:?}", err);
        assert!(!err.to_string().contains("TLS support not compiled in"), "{}", err);
    }
}
