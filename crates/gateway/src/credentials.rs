//! Signing credential resolution.
//!
//! Credentials come from explicit settings first, then from a starknet
//! accounts file. The result is resolved once per process and cached;
//! absence means the gateway runs read-only.

use crate::config::{clean_value, GatewayConfig};
use num_bigint::BigUint;
use once_cell::sync::OnceCell;
use serde_json::Value;
use std::path::PathBuf;
use tokenxllm_common::felt::{felt_to_hex, parse_felt};
use tokenxllm_ledger::SigningAccount;
use tracing::{debug, info, warn};

const NETWORK_KEYS: [&str; 4] = ["alpha-sepolia", "sepolia", "SN_SEPOLIA", "Sepolia"];

/// Where credentials may come from
#[derive(Debug, Clone, Default)]
pub struct CredentialSource {
    pub private_key: Option<String>,
    pub account_address: Option<String>,
    pub accounts_file: Option<PathBuf>,
    pub account_name: String,
}

impl CredentialSource {
    pub fn from_config(config: &GatewayConfig) -> Self {
        Self {
            private_key: config.private_key.as_deref().and_then(clean_value),
            account_address: config.account_address.as_deref().and_then(clean_value),
            accounts_file: config.resolved_accounts_file(),
            account_name: config.account_name.clone(),
        }
    }

    /// Resolves a signing account; explicit values win field by field
    pub fn resolve(&self) -> Option<SigningAccount> {
        let mut private_key = self.private_key.clone();
        let mut address = self.account_address.clone();

        if private_key.is_none() || address.is_none() {
            if let Some((file_key, file_address)) = self.load_from_accounts_file() {
                private_key = private_key.or(Some(file_key));
                address = address.or(Some(file_address));
            }
        }

        let (private_key, address) = match (private_key, address) {
            (Some(key), Some(address)) => (key, address),
            _ => return None,
        };

        match (parse_felt(&private_key), parse_felt(&address)) {
            (Ok(private_key), Ok(address)) => Some(SigningAccount {
                address,
                private_key,
            }),
            _ => {
                warn!("Configured signing credentials are not valid felts; writes disabled");
                None
            }
        }
    }

    fn load_from_accounts_file(&self) -> Option<(String, String)> {
        let path = self.accounts_file.as_ref()?;
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) => {
                debug!("Accounts file {} not readable: {}", path.display(), e);
                return None;
            }
        };
        let data: Value = match serde_json::from_str(&raw) {
            Ok(data) => data,
            Err(e) => {
                warn!("Accounts file {} is not valid JSON: {}", path.display(), e);
                return None;
            }
        };

        for network in NETWORK_KEYS {
            let entry = data.get(network).and_then(|accounts| accounts.get(&self.account_name));
            if let Some(found) = entry.and_then(account_fields) {
                return Some(found);
            }
        }

        find_account(&data)
    }
}

/// Key and address from one account entry, under either naming style
fn account_fields(entry: &Value) -> Option<(String, String)> {
    let key = entry.get("private_key").or_else(|| entry.get("privateKey"))?;
    let address = entry.get("address").or_else(|| entry.get("account_address"))?;
    Some((value_text(key)?, value_text(address)?))
}

/// Depth-first search for the first object carrying a key and an address
fn find_account(value: &Value) -> Option<(String, String)> {
    match value {
        Value::Object(map) => {
            let key = map
                .iter()
                .find(|(k, _)| matches!(k.to_lowercase().as_str(), "private_key" | "privatekey"))
                .map(|(_, v)| v);
            let address = map
                .iter()
                .find(|(k, _)| k.to_lowercase() == "address")
                .map(|(_, v)| v);
            if let (Some(key), Some(address)) = (key.and_then(value_text), address.and_then(value_text)) {
                return Some((key, address));
            }
            map.values().find_map(find_account)
        }
        Value::Array(items) => items.iter().find_map(find_account),
        _ => None,
    }
}

fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => clean_value(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Process-wide credential cache, resolved lazily on first use
pub struct CredentialStore {
    source: CredentialSource,
    cached: OnceCell<Option<SigningAccount>>,
}

impl CredentialStore {
    pub fn new(source: CredentialSource) -> Self {
        Self {
            source,
            cached: OnceCell::new(),
        }
    }

    /// Store with a fixed outcome, bypassing resolution
    pub fn fixed(account: Option<SigningAccount>) -> Self {
        Self {
            source: CredentialSource::default(),
            cached: OnceCell::with_value(account),
        }
    }

    pub fn account(&self) -> Option<&SigningAccount> {
        self.cached
            .get_or_init(|| {
                let resolved = self.source.resolve();
                match &resolved {
                    Some(account) => info!("Signing account resolved: {}", account.address_hex()),
                    None => info!("No signing credentials found; running read-only"),
                }
                resolved
            })
            .as_ref()
    }

    pub fn writes_enabled(&self) -> bool {
        self.account().is_some()
    }

    pub fn address_hex(&self) -> Option<String> {
        self.account().map(|account| felt_to_hex(&account.address))
    }

    pub fn address(&self) -> Option<&BigUint> {
        self.account().map(|account| &account.address)
    }
}
