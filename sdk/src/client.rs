//! JSON-RPC client for the chain node

use crate::{
    types::{parse_quantity, BlockTag, CallMsg},
    Result, SdkError,
};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};
use tracing::debug;

/// Method namespace of the reference node implementation.
pub const DEFAULT_NAMESPACE: &str = "platon";

/// Upper bound on a single request, connection included.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Node operations the agent depends on.
///
/// Addresses are passed in their human-readable (bech32) form, as the node
/// expects them.
#[async_trait]
pub trait ChainClient: Send + Sync {
    async fn block_number(&self) -> Result<u64>;

    async fn gas_price(&self) -> Result<u128>;

    async fn get_balance(&self, address: &str, block: BlockTag) -> Result<u128>;

    async fn get_transaction_count(&self, address: &str, block: BlockTag) -> Result<u64>;

    /// Execute a read-only message call and return the raw output.
    async fn call(&self, msg: &CallMsg, block: BlockTag) -> Result<Vec<u8>>;

    async fn send_raw_transaction(&self, raw: &[u8]) -> Result<()>;

    /// Submit into the pending pool explicitly.
    async fn send_pending_transaction(&self, raw: &[u8]) -> Result<()>;

    /// Network id reported by `net_version`.
    async fn network_id(&self) -> Result<u64>;
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

/// HTTP JSON-RPC 2.0 client
pub struct RpcClient {
    http: reqwest::Client,
    url: String,
    namespace: String,
    next_id: AtomicU64,
}

impl RpcClient {
    pub fn new(url: &str) -> Result<Self> {
        Self::with_options(url, DEFAULT_NAMESPACE, DEFAULT_REQUEST_TIMEOUT)
    }

    /// Client with a custom method namespace; every request fails with a
    /// transport error once `timeout` elapses.
    pub fn with_options(url: &str, namespace: &str, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()?;
        Ok(Self {
            http,
            url: url.to_string(),
            namespace: namespace.to_string(),
            next_id: AtomicU64::new(1),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn method(&self, name: &str) -> String {
        format!("{}_{}", self.namespace, name)
    }

    async fn request(&self, method: &str, params: Value) -> Result<Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });
        debug!(method, id, "rpc request");

        let response: RpcResponse = self
            .http
            .post(&self.url)
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if let Some(err) = response.error {
            return Err(SdkError::Rpc {
                code: err.code,
                message: err.message,
            });
        }
        response.result.ok_or_else(|| SdkError::EmptyResponse {
            method: method.to_string(),
        })
    }

    async fn request_quantity(&self, method: &str, params: Value) -> Result<u128> {
        let value = self.request(method, params).await?;
        let s = value
            .as_str()
            .ok_or_else(|| SdkError::InvalidQuantity(value.to_string()))?;
        parse_quantity(s)
    }
}

#[async_trait]
impl ChainClient for RpcClient {
    async fn block_number(&self) -> Result<u64> {
        let height = self
            .request_quantity(&self.method("blockNumber"), json!([]))
            .await?;
        u64::try_from(height).map_err(|_| SdkError::InvalidQuantity(height.to_string()))
    }

    async fn gas_price(&self) -> Result<u128> {
        self.request_quantity(&self.method("gasPrice"), json!([]))
            .await
    }

    async fn get_balance(&self, address: &str, block: BlockTag) -> Result<u128> {
        self.request_quantity(
            &self.method("getBalance"),
            json!([address, block.to_param()]),
        )
        .await
    }

    async fn get_transaction_count(&self, address: &str, block: BlockTag) -> Result<u64> {
        let nonce = self
            .request_quantity(
                &self.method("getTransactionCount"),
                json!([address, block.to_param()]),
            )
            .await?;
        u64::try_from(nonce).map_err(|_| SdkError::InvalidQuantity(nonce.to_string()))
    }

    async fn call(&self, msg: &CallMsg, block: BlockTag) -> Result<Vec<u8>> {
        let value = self
            .request(&self.method("call"), json!([msg.to_param(), block.to_param()]))
            .await?;
        let s = value
            .as_str()
            .ok_or_else(|| SdkError::InvalidQuantity(value.to_string()))?;
        Ok(hex::decode(s.trim_start_matches("0x"))?)
    }

    async fn send_raw_transaction(&self, raw: &[u8]) -> Result<()> {
        let encoded = format!("0x{}", hex::encode(raw));
        self.request(&self.method("sendRawTransaction"), json!([encoded]))
            .await?;
        Ok(())
    }

    async fn send_pending_transaction(&self, raw: &[u8]) -> Result<()> {
        let encoded = format!("0x{}", hex::encode(raw));
        self.request(
            &self.method("sendRawTransaction"),
            json!([encoded, "pending"]),
        )
        .await?;
        Ok(())
    }

    async fn network_id(&self) -> Result<u64> {
        // decimal, not a hex quantity
        let value = self.request("net_version", json!([])).await?;
        let s = value
            .as_str()
            .ok_or_else(|| SdkError::InvalidQuantity(value.to_string()))?;
        s.parse()
            .map_err(|_| SdkError::InvalidQuantity(format!("invalid net_version result {s:?}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_namespace() {
        let client = RpcClient::new("http://127.0.0.1:6789").unwrap();
        assert_eq!(client.method("blockNumber"), "platon_blockNumber");

        let client =
            RpcClient::with_options("http://127.0.0.1:6789", "chain", DEFAULT_REQUEST_TIMEOUT)
                .unwrap();
        assert_eq!(client.method("gasPrice"), "chain_gasPrice");
        assert_eq!(client.url(), "http://127.0.0.1:6789");
    }

    #[test]
    fn test_response_parsing() {
        let ok: RpcResponse = serde_json::from_str(r#"{"jsonrpc":"2.0","id":1,"result":"0x1"}"#).unwrap();
        assert_eq!(ok.result.unwrap(), "0x1");

        let err: RpcResponse = serde_json::from_str(
            r#"{"jsonrpc":"2.0","id":1,"error":{"code":-32000,"message":"nonce too low"}}"#,
        )
        .unwrap();
        let err = err.error.unwrap();
        assert_eq!(err.code, -32000);
        assert_eq!(err.message, "nonce too low");
    }
}
