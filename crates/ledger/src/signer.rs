//! Signer relay: hands invoke requests to an external signing service.
//!
//! The relay speaks JSON-RPC (`signer_sendInvoke`) and is expected to run on a
//! trusted local interface, since requests carry the account key.

use crate::client::TransactionSender;
use crate::error::SubmitFailure;
use crate::rpc::rpc_error_message;
use crate::types::InvokeRequest;
use async_trait::async_trait;
use num_bigint::BigUint;
use serde_json::Value;
use std::time::Duration;
use tokenxllm_common::felt::{felt_to_hex, parse_felt};
use tracing::debug;

pub struct RelaySigner {
    signer_url: String,
    client: reqwest::Client,
}

impl RelaySigner {
    pub fn new(signer_url: String, timeout: Duration) -> Result<Self, SubmitFailure> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SubmitFailure::Transport(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { signer_url, client })
    }

    fn payload(request: &InvokeRequest) -> Value {
        serde_json::json!({
            "jsonrpc": "2.0",
            "method": "signer_sendInvoke",
            "params": {
                "sender_address": request.account.address_hex(),
                "private_key": felt_to_hex(&request.account.private_key),
                "calls": request.calls.iter().map(|c| c.to_json()).collect::<Vec<_>>(),
                "nonce": felt_to_hex(&request.nonce),
                "version": request.version.as_hex(),
            },
            "id": 1
        })
    }
}

#[async_trait]
impl TransactionSender for RelaySigner {
    async fn send_invoke(&self, request: &InvokeRequest) -> Result<BigUint, SubmitFailure> {
        debug!(
            "Relaying {} call(s) from {} with nonce {} ({})",
            request.calls.len(),
            request.account.address_hex(),
            request.nonce,
            request.version
        );

        let response = self
            .client
            .post(&self.signer_url)
            .json(&Self::payload(request))
            .send()
            .await
            .map_err(|e| SubmitFailure::Transport(format!("Request failed: {}", e)))?;

        let json: Value = response
            .json()
            .await
            .map_err(|e| SubmitFailure::Transport(format!("Invalid response: {}", e)))?;

        if let Some(error) = json.get("error") {
            let code = error.get("code").and_then(Value::as_i64);
            return Err(SubmitFailure::classify(code, &rpc_error_message(error)));
        }

        let hash = json
            .get("result")
            .and_then(|r| r.get("transaction_hash").or(Some(r)))
            .and_then(Value::as_str)
            .ok_or_else(|| SubmitFailure::Transport("signer returned no transaction hash".to_string()))?;

        parse_felt(hash).map_err(|e| SubmitFailure::Transport(format!("Bad transaction hash: {}", e)))
    }
}
