//! Gateway configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tokenxllm_common::utils::logging::LoggingConfig;
use tokenxllm_common::DEFAULT_DECIMALS;
use tokenxllm_ledger::TxVersion;

/// How `authorize_usage` expects its `units` argument
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthorizeEncoding {
    /// Probe the deployed ABI once at startup
    Auto,
    Felt,
    U256,
}

impl FromStr for AuthorizeEncoding {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "auto" => Ok(AuthorizeEncoding::Auto),
            "felt" | "felt252" | "u64" => Ok(AuthorizeEncoding::Felt),
            "u256" => Ok(AuthorizeEncoding::U256),
            other => Err(format!("unknown authorize encoding '{}'", other)),
        }
    }
}

/// Gateway service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Server address
    pub server_addr: String,

    /// Starknet JSON-RPC endpoint
    pub rpc_url: String,

    /// Token contract address
    pub aic_addr: Option<String>,

    /// Usage manager contract address
    pub um_addr: Option<String>,

    /// Token decimals used for display conversion
    pub decimals: u32,

    /// Explicit signing key; takes precedence over the accounts file
    pub private_key: Option<String>,

    /// Explicit account address
    pub account_address: Option<String>,

    /// Accounts file used when no explicit credential is set
    pub accounts_file: Option<PathBuf>,

    /// Entry of the accounts file to use
    pub account_name: String,

    /// Endpoint of the signing relay
    pub signer_url: String,

    /// Transaction versions, tried in order
    pub tx_versions: Vec<TxVersion>,

    /// Calldata shape for `authorize_usage`
    pub authorize_encoding: AuthorizeEncoding,

    /// Enable the faucet endpoints
    pub faucet_enabled: bool,

    /// Tokens minted per faucet claim
    pub faucet_amount: String,

    /// Cooldown between claims for one address (seconds)
    pub faucet_cooldown_seconds: u64,

    /// Enable CORS
    pub cors_enabled: bool,

    /// HTTP timeout for ledger and signer requests (seconds)
    pub rpc_timeout_secs: u64,

    pub logging: LoggingConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            server_addr: "0.0.0.0:8000".to_string(),
            rpc_url: "https://starknet-sepolia.public.blastapi.io/rpc/v0_7".to_string(),
            aic_addr: None,
            um_addr: None,
            decimals: DEFAULT_DECIMALS,
            private_key: None,
            account_address: None,
            accounts_file: None,
            account_name: "dev".to_string(),
            signer_url: "http://127.0.0.1:8010".to_string(),
            tx_versions: vec![TxVersion::V3, TxVersion::V1],
            authorize_encoding: AuthorizeEncoding::Auto,
            faucet_enabled: true,
            faucet_amount: "50".to_string(),
            faucet_cooldown_seconds: 86400, // 24 hours
            cors_enabled: true,
            rpc_timeout_secs: 30,
            logging: LoggingConfig::default(),
        }
    }
}

impl GatewayConfig {
    /// Overlay process environment variables on top of the current values.
    ///
    /// Returns one notice per variable that was set but ignored, for the
    /// caller to log once logging is up.
    #[must_use]
    pub fn apply_env(&mut self) -> Vec<String> {
        self.apply_vars(|name| std::env::var(name).ok())
    }

    /// Same as [`apply_env`](Self::apply_env) over an arbitrary variable source
    pub fn apply_vars(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Vec<String> {
        let mut env = EnvOverlay { lookup, ignored: Vec::new() };

        if let Some(addr) = env.string("SERVER_ADDR") {
            self.server_addr = addr;
        }

        if let Some(rpc_url) = env.string("RPC_URL") {
            self.rpc_url = rpc_url;
        }

        if let Some(addr) = env.string("AIC_ADDR") {
            self.aic_addr = Some(addr);
        }

        if let Some(addr) = env.string("UM_ADDR") {
            self.um_addr = Some(addr);
        }

        if let Some(decimals) = env.parse("AIC_DECIMALS") {
            self.decimals = decimals;
        }

        if let Some(key) = env.string("PRIVATE_KEY") {
            self.private_key = Some(key);
        }

        if let Some(address) = env.string("ACCOUNT_ADDRESS") {
            self.account_address = Some(address);
        }

        if let Some(path) = env.string("ACCOUNTS_FILE") {
            self.accounts_file = Some(PathBuf::from(path));
        }

        if let Some(name) = env.string("ACCOUNT_NAME") {
            self.account_name = name;
        }

        if let Some(url) = env.string("SIGNER_URL") {
            self.signer_url = url;
        }

        if let Some(raw) = env.string("TX_VERSIONS") {
            match parse_tx_versions(&raw) {
                Ok(versions) => self.tx_versions = versions,
                Err(e) => env.ignored.push(format!("Ignoring TX_VERSIONS: {}", e)),
            }
        }

        if let Some(raw) = env.string("AUTHORIZE_ENCODING") {
            match raw.parse() {
                Ok(encoding) => self.authorize_encoding = encoding,
                Err(e) => env.ignored.push(format!("Ignoring AUTHORIZE_ENCODING: {}", e)),
            }
        }

        if let Some(raw) = env.string("FAUCET_ENABLED") {
            self.faucet_enabled = parse_bool(&raw);
        }

        if let Some(amount) = env.string("FAUCET_AMOUNT") {
            self.faucet_amount = amount;
        }

        if let Some(cooldown) = env.parse("FAUCET_COOLDOWN_SECONDS") {
            self.faucet_cooldown_seconds = cooldown;
        }

        if let Some(raw) = env.string("CORS_ENABLED") {
            self.cors_enabled = parse_bool(&raw);
        }

        if let Some(timeout) = env.parse("RPC_TIMEOUT_SECS") {
            self.rpc_timeout_secs = timeout;
        }

        env.ignored
    }

    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_secs(self.rpc_timeout_secs)
    }

    /// Default accounts file under the user's home directory
    pub fn resolved_accounts_file(&self) -> Option<PathBuf> {
        self.accounts_file.clone().or_else(|| {
            std::env::var_os("HOME").map(|home| {
                PathBuf::from(home)
                    .join(".starknet_accounts")
                    .join("starknet_open_zeppelin_accounts.json")
            })
        })
    }
}

/// Variable source plus the notices for values it could not use
struct EnvOverlay<F> {
    lookup: F,
    ignored: Vec<String>,
}

impl<F: Fn(&str) -> Option<String>> EnvOverlay<F> {
    /// Blanks and `<placeholder>` values count as unset
    fn string(&self, name: &str) -> Option<String> {
        (self.lookup)(name).and_then(|v| clean_value(&v))
    }

    fn parse<T: FromStr>(&mut self, name: &str) -> Option<T> {
        let raw = self.string(name)?;
        match raw.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                self.ignored.push(format!("Ignoring {}: cannot parse '{}'", name, raw));
                None
            }
        }
    }
}

pub(crate) fn clean_value(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.contains('<') {
        None
    } else {
        Some(trimmed.to_string())
    }
}

pub fn parse_bool(raw: &str) -> bool {
    matches!(
        raw.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

pub fn parse_tx_versions(raw: &str) -> Result<Vec<TxVersion>, String> {
    let versions = raw
        .split(',')
        .filter(|part| !part.trim().is_empty())
        .map(str::parse)
        .collect::<Result<Vec<TxVersion>, _>>()?;
    if versions.is_empty() {
        return Err("no transaction versions listed".to_string());
    }
    Ok(versions)
}
