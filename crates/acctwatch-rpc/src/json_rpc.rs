use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};

use acctwatch_core::{constants, Block, BlockId, Chunk, NodeStatus, Provider, ProviderError};
use async_trait::async_trait;
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(constants::REQUEST_TIMEOUT_SECS);

// Error causes the node reports for lookups of blocks/chunks it does not have.
const NOT_FOUND_CAUSES: &[&str] = &["UNKNOWN_BLOCK", "UNKNOWN_CHUNK", "GARBAGE_COLLECTED_BLOCK"];

#[derive(Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Value,
}

#[derive(Deserialize)]
struct JsonRpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    cause: Option<ErrorCause>,
}

#[derive(Debug, Deserialize)]
struct ErrorCause {
    name: String,
}

impl JsonRpcError {
    fn into_provider_error(self) -> ProviderError {
        let cause = self.cause.as_ref().map(|c| c.name.as_str());
        let data = match &self.data {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => String::new(),
        };
        let not_found = cause.is_some_and(|c| NOT_FOUND_CAUSES.contains(&c))
            || data.contains("DB Not Found")
            || data.contains("does not exist");
        if not_found {
            let detail = if data.is_empty() { self.message } else { data };
            return ProviderError::NotFound(detail);
        }
        let message = if data.is_empty() {
            self.message
        } else {
            format!("{}: {data}", self.message)
        };
        ProviderError::Rpc {
            code: self.code,
            message,
        }
    }
}

/// Talks to a node's JSON-RPC endpoint over HTTP POST.
#[derive(Debug)]
pub struct JsonRpcProvider {
    client: Client,
    url: String,
    next_id: AtomicU64,
}

impl JsonRpcProvider {
    pub fn new(url: impl Into<String>) -> Result<Self, ProviderError> {
        Self::with_timeout(url, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(url: impl Into<String>, timeout: Duration) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::Unavailable(format!("failed to build HTTP client: {e}")))?;
        let url = url.into();
        info!(%url, ?timeout, "json-rpc provider ready");
        Ok(Self {
            client,
            url,
            next_id: AtomicU64::new(1),
        })
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T, ProviderError> {
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            method,
            params,
        };
        debug!(method, id = request.id, params = %request.params, "rpc call");

        let response = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout
                } else {
                    ProviderError::Unavailable(format!("{method} request failed: {e}"))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::Http(status.as_u16()));
        }

        let body = response.text().await.map_err(|e| {
            if e.is_timeout() {
                ProviderError::Timeout
            } else {
                ProviderError::Unavailable(format!("failed to read {method} response: {e}"))
            }
        })?;

        let parsed: JsonRpcResponse = serde_json::from_str(&body)
            .map_err(|e| ProviderError::Decode(format!("{method}: {e}")))?;
        if let Some(error) = parsed.error {
            return Err(error.into_provider_error());
        }
        let result = parsed
            .result
            .filter(|v| !v.is_null())
            .ok_or_else(|| ProviderError::Decode(format!("{method}: missing result")))?;
        serde_json::from_value(result).map_err(|e| ProviderError::Decode(format!("{method}: {e}")))
    }
}

#[async_trait]
impl Provider for JsonRpcProvider {
    async fn status(&self) -> Result<NodeStatus, ProviderError> {
        self.call("status", json!([])).await
    }

    async fn block(&self, id: &BlockId) -> Result<Block, ProviderError> {
        self.call("block", json!([id])).await
    }

    async fn chunk(&self, chunk_hash: &str) -> Result<Chunk, ProviderError> {
        self.call("chunk", json!([chunk_hash])).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rpc_error(value: Value) -> ProviderError {
        serde_json::from_value::<JsonRpcError>(value)
            .unwrap()
            .into_provider_error()
    }

    #[test]
    fn unknown_block_cause_is_not_found() {
        let err = rpc_error(json!({
            "name": "HANDLER_ERROR",
            "cause": {"name": "UNKNOWN_BLOCK", "info": {}},
            "code": -32000,
            "message": "Server error",
            "data": "DB Not Found Error: BLOCK HEIGHT: 12"
        }));
        assert_eq!(
            err,
            ProviderError::NotFound("DB Not Found Error: BLOCK HEIGHT: 12".into())
        );
    }

    #[test]
    fn legacy_not_found_data_is_recognized() {
        let err = rpc_error(json!({
            "code": -32000,
            "message": "Server error",
            "data": "Chunk Missing (unavailable on the node): abc does not exist"
        }));
        assert!(matches!(err, ProviderError::NotFound(_)));
    }

    #[test]
    fn other_errors_keep_code_and_detail() {
        let err = rpc_error(json!({
            "code": -32601,
            "message": "Method not found",
            "data": "nope"
        }));
        assert_eq!(
            err,
            ProviderError::Rpc {
                code: -32601,
                message: "Method not found: nope".into()
            }
        );
    }

    #[test]
    fn request_shape() {
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            id: 7,
            method: "block",
            params: json!([BlockId::Height(42)]),
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({"jsonrpc": "2.0", "id": 7, "method": "block", "params": [42]})
        );
    }
}
