use num_bigint::BigUint;
use serde::{Deserialize, Serialize};
use std::fmt;
use tokenxllm_common::felt::{felt_to_hex, selector_from_name};

/// A single contract invocation: target, entry point name and felt calldata
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractCall {
    pub to: BigUint,
    pub function: String,
    pub calldata: Vec<BigUint>,
}

impl ContractCall {
    pub fn new(to: BigUint, function: impl Into<String>, calldata: Vec<BigUint>) -> Self {
        Self {
            to,
            function: function.into(),
            calldata,
        }
    }

    pub fn selector(&self) -> BigUint {
        selector_from_name(&self.function)
    }

    /// Wire form shared by `starknet_call` and the signer relay
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "contract_address": felt_to_hex(&self.to),
            "entry_point_selector": felt_to_hex(&self.selector()),
            "calldata": self.calldata.iter().map(felt_to_hex).collect::<Vec<_>>(),
        })
    }
}

/// Invoke transaction versions, tried in configured order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TxVersion {
    V3,
    V1,
}

impl TxVersion {
    pub fn as_hex(&self) -> &'static str {
        match self {
            TxVersion::V3 => "0x3",
            TxVersion::V1 => "0x1",
        }
    }
}

impl fmt::Display for TxVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TxVersion::V3 => f.write_str("v3"),
            TxVersion::V1 => f.write_str("v1"),
        }
    }
}

impl std::str::FromStr for TxVersion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "v3" | "3" => Ok(TxVersion::V3),
            "v1" | "1" => Ok(TxVersion::V1),
            other => Err(format!("unknown transaction version '{}'", other)),
        }
    }
}

/// Signing identity handed to the signer collaborator
#[derive(Clone, PartialEq, Eq)]
pub struct SigningAccount {
    pub address: BigUint,
    pub private_key: BigUint,
}

impl SigningAccount {
    pub fn address_hex(&self) -> String {
        felt_to_hex(&self.address)
    }
}

impl fmt::Debug for SigningAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningAccount")
            .field("address", &self.address_hex())
            .field("private_key", &"<redacted>")
            .finish()
    }
}

/// Everything the signer needs to produce and broadcast one invoke transaction
#[derive(Debug, Clone)]
pub struct InvokeRequest {
    pub account: SigningAccount,
    pub calls: Vec<ContractCall>,
    pub nonce: BigUint,
    pub version: TxVersion,
}

/// One declared input of a contract entry point
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AbiInput {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
}
