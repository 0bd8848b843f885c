#![allow(dead_code)]

use serde_json::{json, Value};
use wiremock::{
    matchers::{body_partial_json, method},
    Mock, MockServer, ResponseTemplate,
};

pub fn rpc_result(result: Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({"jsonrpc": "2.0", "id": 1, "result": result}))
}

pub fn rpc_error(error: Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({"jsonrpc": "2.0", "id": 1, "error": error}))
}

/// Answer every `method` call whose params match `params` with `response`.
pub async fn mount(server: &MockServer, rpc_method: &str, params: Value, response: ResponseTemplate) {
    Mock::given(method("POST"))
        .and(body_partial_json(json!({"method": rpc_method, "params": params})))
        .respond_with(response)
        .mount(server)
        .await;
}

pub fn block_json(height: u64, hash: &str, prev_hash: Option<&str>, chunks: &[&str]) -> Value {
    json!({
        "author": "validator.near",
        "header": {"height": height, "hash": hash, "prev_hash": prev_hash, "timestamp": 1_600_000_000u64},
        "chunks": chunks.iter().map(|c| json!({"chunk_hash": c, "shard_id": 0})).collect::<Vec<_>>(),
    })
}

pub fn chunk_json(transactions: Value) -> Value {
    json!({"author": "validator.near", "header": {}, "transactions": transactions, "receipts": []})
}
