//! JSON-RPC client for read-only contract calls.

use super::ChainError;
use reqwest::Client;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::debug;

/// Thin JSON-RPC 2.0 client over HTTP POST.
#[derive(Debug)]
pub struct RpcClient {
    url: String,
    http_client: Client,
    next_id: AtomicU64,
}

impl RpcClient {
    /// Create a client for the given endpoint with a per-request timeout.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, ChainError> {
        let http_client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            url: url.into(),
            http_client,
            next_id: AtomicU64::new(1),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// `eth_call` against the latest block. Returns the raw return data.
    pub async fn eth_call(&self, to: &str, calldata: &str) -> Result<String, ChainError> {
        let response = self
            .rpc_call("eth_call", json!([{ "to": to, "data": calldata }, "latest"]))
            .await?;
        result_str(&response, "eth_call")
    }

    /// `eth_chainId` as a number.
    pub async fn chain_id(&self) -> Result<u64, ChainError> {
        let response = self.rpc_call("eth_chainId", json!([])).await?;
        let raw = result_str(&response, "eth_chainId")?;
        parse_hex_u64(&raw)
    }

    async fn rpc_call(&self, method: &str, params: Value) -> Result<Value, ChainError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": id
        });

        debug!("rpc {} #{} -> {}", method, id, self.url);

        let response = self.http_client.post(&self.url).json(&request).send().await?;

        if !response.status().is_success() {
            return Err(ChainError::Status(response.status().as_u16()));
        }

        let value: Value = response.json().await?;
        if let Some(error) = value.get("error") {
            let message = error
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| error.to_string());
            return Err(ChainError::Rpc {
                method: method.to_string(),
                message,
            });
        }

        Ok(value)
    }
}

fn result_str(response: &Value, method: &str) -> Result<String, ChainError> {
    response
        .get("result")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| ChainError::MissingResult(method.to_string()))
}

/// Parse a `0x`-prefixed hex quantity.
pub fn parse_hex_u64(raw: &str) -> Result<u64, ChainError> {
    let digits = raw
        .trim()
        .strip_prefix("0x")
        .ok_or_else(|| ChainError::Decode(format!("quantity {raw} is not 0x-prefixed")))?;
    u64::from_str_radix(digits, 16)
        .map_err(|e| ChainError::Decode(format!("invalid quantity {raw}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex_u64() {
        assert_eq!(parse_hex_u64("0xe52").unwrap(), 3666);
        assert_eq!(parse_hex_u64(" 0x1 ").unwrap(), 1);
        assert!(parse_hex_u64("e52").is_err());
        assert!(parse_hex_u64("0xnope").is_err());
    }

    #[test]
    fn test_result_str() {
        let ok = json!({"jsonrpc": "2.0", "id": 1, "result": "0x01"});
        assert_eq!(result_str(&ok, "eth_call").unwrap(), "0x01");

        let missing = json!({"jsonrpc": "2.0", "id": 1});
        assert!(matches!(
            result_str(&missing, "eth_call"),
            Err(ChainError::MissingResult(_))
        ));
    }
}
