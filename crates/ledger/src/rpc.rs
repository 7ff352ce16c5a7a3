//! Starknet JSON-RPC reader

use crate::client::LedgerReader;
use crate::error::{LedgerError, LedgerResult};
use crate::types::{AbiInput, ContractCall};
use async_trait::async_trait;
use num_bigint::BigUint;
use serde_json::Value;
use std::time::Duration;
use tokenxllm_common::felt::{felt_to_hex, parse_felt};
use tracing::debug;

/// RPC client for view calls, nonces and class ABIs
pub struct StarknetRpcClient {
    rpc_url: String,
    client: reqwest::Client,
}

impl StarknetRpcClient {
    pub fn new(rpc_url: String, timeout: Duration) -> LedgerResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LedgerError::Transport(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { rpc_url, client })
    }

    pub fn rpc_url(&self) -> &str {
        &self.rpc_url
    }

    async fn request(&self, method: &str, params: Value) -> LedgerResult<Value> {
        let payload = serde_json::json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": 1
        });

        let response = self
            .client
            .post(&self.rpc_url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| LedgerError::Transport(format!("Request failed: {}", e)))?;

        let json: Value = response
            .json()
            .await
            .map_err(|e| LedgerError::InvalidResponse(format!("Invalid response: {}", e)))?;

        if let Some(error) = json.get("error") {
            return Err(LedgerError::Rpc {
                code: error.get("code").and_then(Value::as_i64).unwrap_or_default(),
                message: rpc_error_message(error),
            });
        }

        json.get("result")
            .cloned()
            .ok_or_else(|| LedgerError::InvalidResponse(format!("{} returned no result", method)))
    }

    pub async fn chain_id(&self) -> LedgerResult<BigUint> {
        let result = self.request("starknet_chainId", serde_json::json!([])).await?;
        felt_from_value(&result)
    }
}

#[async_trait]
impl LedgerReader for StarknetRpcClient {
    async fn call(&self, call: &ContractCall) -> LedgerResult<Vec<BigUint>> {
        debug!("starknet_call {} on {}", call.function, felt_to_hex(&call.to));
        let params = serde_json::json!({
            "request": call.to_json(),
            "block_id": "latest",
        });

        let result = self.request("starknet_call", params).await?;
        let items = result
            .as_array()
            .ok_or_else(|| LedgerError::InvalidResponse(format!("{} result is not an array", call.function)))?;
        items.iter().map(felt_from_value).collect()
    }

    async fn get_nonce(&self, account: &BigUint) -> LedgerResult<BigUint> {
        let params = serde_json::json!({
            "block_id": "latest",
            "contract_address": felt_to_hex(account),
        });
        let result = self.request("starknet_getNonce", params).await?;
        felt_from_value(&result)
    }

    async fn entry_point_inputs(
        &self,
        contract: &BigUint,
        function: &str,
    ) -> LedgerResult<Option<Vec<AbiInput>>> {
        let params = serde_json::json!({
            "block_id": "latest",
            "contract_address": felt_to_hex(contract),
        });
        let class = self.request("starknet_getClassAt", params).await?;

        // Sierra classes carry the ABI as a JSON string, legacy classes as an array
        let abi = match class.get("abi") {
            Some(Value::String(raw)) => serde_json::from_str(raw)
                .map_err(|e| LedgerError::InvalidResponse(format!("Unparseable ABI: {}", e)))?,
            Some(other) => other.clone(),
            None => return Ok(None),
        };

        Ok(find_entry_point_inputs(&abi, function))
    }
}

/// Searches an ABI (including nested `interface` items) for a function's inputs.
pub fn find_entry_point_inputs(abi: &Value, function: &str) -> Option<Vec<AbiInput>> {
    let items = abi.as_array()?;
    for item in items {
        match item.get("type").and_then(Value::as_str) {
            Some("function") if item.get("name").and_then(Value::as_str) == Some(function) => {
                let inputs = item.get("inputs").cloned().unwrap_or(Value::Array(vec![]));
                return serde_json::from_value(inputs).ok();
            }
            Some("interface") => {
                if let Some(found) = item.get("items").and_then(|nested| find_entry_point_inputs(nested, function)) {
                    return Some(found);
                }
            }
            _ => {}
        }
    }
    None
}

fn felt_from_value(value: &Value) -> LedgerResult<BigUint> {
    let text = value
        .as_str()
        .ok_or_else(|| LedgerError::InvalidResponse(format!("expected felt string, got {}", value)))?;
    parse_felt(text).map_err(|e| LedgerError::InvalidResponse(e.to_string()))
}

/// Joins the top-level message with any nested execution detail
pub(crate) fn rpc_error_message(error: &Value) -> String {
    let message = error
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or("unknown error")
        .to_string();
    match error.get("data") {
        Some(Value::Null) | None => message,
        Some(Value::String(data)) => format!("{}: {}", message, data),
        Some(data) => format!("{}: {}", message, data),
    }
}
