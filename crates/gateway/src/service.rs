//! Gateway operations over the token and usage-manager contracts

use crate::accounting::{counter_from_felt, free_remaining, reconcile, AllowanceCheck, UsageBreakdown};
use crate::config::{AuthorizeEncoding, GatewayConfig};
use crate::credentials::CredentialStore;
use crate::error::{GatewayError, GatewayResult};
use crate::faucet::{FaucetLimiter, FaucetPolicy};
use crate::metrics::GatewayMetrics;
use crate::submitter::TransactionSubmitter;
use num_bigint::BigUint;
use num_traits::Zero;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use tokenxllm_common::felt::{decode_short_string, felt_to_hex, parse_felt};
use tokenxllm_common::{format_units, TokenAmount, U256};
use tokenxllm_ledger::{ContractCall, LedgerReader, TransactionSender, TxVersion};
use tracing::{debug, info, warn};

/// Source of unix time in seconds
pub trait Clock: Send + Sync {
    fn now(&self) -> u64;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> u64 {
        chrono::Utc::now().timestamp().max(0) as u64
    }
}

/// Calldata shape of the `units` argument of `authorize_usage`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitsEncoding {
    Felt,
    U256,
}

impl UnitsEncoding {
    pub fn calldata(&self, units: u64) -> Vec<BigUint> {
        match self {
            UnitsEncoding::Felt => vec![BigUint::from(units)],
            UnitsEncoding::U256 => U256::from_limbs(units as u128, 0).to_calldata().to_vec(),
        }
    }

    /// Encoding implied by a declared Cairo type
    pub fn from_abi_type(ty: &str) -> Self {
        let ty = ty.to_lowercase();
        if ty.ends_with("u256") || ty.ends_with("uint256") {
            UnitsEncoding::U256
        } else {
            UnitsEncoding::Felt
        }
    }
}

/// Resolves the `authorize_usage` encoding, probing the deployed ABI in `auto` mode
pub async fn negotiate_units_encoding(
    reader: &dyn LedgerReader,
    um_addr: Option<&BigUint>,
    mode: AuthorizeEncoding,
) -> UnitsEncoding {
    match mode {
        AuthorizeEncoding::Felt => return UnitsEncoding::Felt,
        AuthorizeEncoding::U256 => return UnitsEncoding::U256,
        AuthorizeEncoding::Auto => {}
    }

    let Some(um_addr) = um_addr else {
        return UnitsEncoding::Felt;
    };

    match reader.entry_point_inputs(um_addr, "authorize_usage").await {
        Ok(Some(inputs)) => match inputs.first() {
            Some(input) => {
                let encoding = UnitsEncoding::from_abi_type(&input.ty);
                info!("authorize_usage takes {} ({:?})", input.ty, encoding);
                encoding
            }
            None => {
                warn!("authorize_usage declares no inputs; defaulting to felt");
                UnitsEncoding::Felt
            }
        },
        Ok(None) => {
            warn!("authorize_usage not found in usage manager ABI; defaulting to felt");
            UnitsEncoding::Felt
        }
        Err(e) => {
            warn!("ABI probe failed ({}); defaulting to felt", e);
            UnitsEncoding::Felt
        }
    }
}

#[derive(Debug, Serialize)]
pub struct FaucetSettings {
    pub enabled: bool,
    #[serde(rename = "amount_AIC")]
    pub amount_aic: String,
    pub amount_wei: String,
    pub cooldown_seconds: u64,
}

#[derive(Debug, Serialize)]
pub struct ConfigInfo {
    pub rpc_url: String,
    pub aic_addr: Option<String>,
    pub um_addr: Option<String>,
    pub decimals: u32,
    pub writes_enabled: bool,
    pub account_address: Option<String>,
    pub tx_versions: Vec<TxVersion>,
    pub authorize_encoding: UnitsEncoding,
    pub faucet: FaucetSettings,
}

#[derive(Debug, Serialize)]
pub struct BalanceResponse {
    pub balance_wei: String,
    #[serde(rename = "balance_AIC")]
    pub balance_aic: String,
}

#[derive(Debug, Serialize)]
pub struct AllowanceResponse {
    pub allowance_wei: String,
    #[serde(rename = "allowance_AIC")]
    pub allowance_aic: String,
}

#[derive(Debug, Serialize)]
pub struct UsedResponse {
    pub used_units: u64,
}

#[derive(Debug, Serialize)]
pub struct EpochResponse {
    pub epoch_id: u64,
}

#[derive(Debug, Serialize)]
pub struct FreeQuotaResponse {
    pub free_quota: u64,
    pub price_per_unit_wei: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub used_units: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub free_remaining: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct UsageEstimate {
    #[serde(flatten)]
    pub breakdown: UsageBreakdown,
    #[serde(rename = "expected_cost_AIC")]
    pub expected_cost_aic: String,
}

#[derive(Debug, Serialize)]
pub struct TokenInfo {
    pub name: String,
    pub symbol: String,
    pub decimals: u64,
    pub total_supply_wei: String,
    #[serde(rename = "total_supply_AIC")]
    pub total_supply_aic: String,
}

#[derive(Debug, Serialize)]
pub struct TxResponse {
    pub tx_hash: String,
}

#[derive(Debug, Serialize)]
pub struct AuthorizeResponse {
    pub tx_hash: String,
    pub units: u64,
    pub encoding: UnitsEncoding,
    /// Free/paid split computed before submission, when the reads succeeded
    pub expected: Option<UsageBreakdown>,
    /// Signer's allowance to the usage manager just before submission
    pub allowance_before_wei: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct FaucetInfo {
    pub enabled: bool,
    pub writes_enabled: bool,
    #[serde(rename = "amount_AIC")]
    pub amount_aic: String,
    pub amount_wei: String,
    pub cooldown_seconds: u64,
    pub address: Option<String>,
    pub eligible: Option<bool>,
    pub seconds_remaining: Option<u64>,
    pub last_claim_timestamp: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct FaucetClaimResponse {
    pub tx_hash: String,
    pub to: String,
    #[serde(rename = "amount_AIC")]
    pub amount_aic: String,
    pub amount_wei: String,
    pub claimed_at: u64,
    pub previous_claim_timestamp: Option<u64>,
    pub next_claim_at: u64,
}

#[derive(Debug, Deserialize)]
pub struct ApproveRequest {
    pub amount: TokenAmount,
    pub spender: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AuthorizeRequest {
    pub units: u64,
}

/// Snapshot returned by `authorize`, checked against the current allowance
#[derive(Debug, Deserialize)]
pub struct VerifyAuthorizationRequest {
    /// Defaults to the signing account
    pub user: Option<String>,
    pub allowance_before_wei: String,
    pub expected_cost_wei: String,
}

#[derive(Debug, Deserialize)]
pub struct MintRequest {
    pub to: String,
    pub amount: TokenAmount,
}

#[derive(Debug, Deserialize)]
pub struct SetPriceRequest {
    pub price: TokenAmount,
}

#[derive(Debug, Deserialize)]
pub struct SetQuotaRequest {
    pub quota: u64,
}

#[derive(Debug, Deserialize)]
pub struct FaucetClaimRequest {
    #[serde(alias = "address")]
    pub to: String,
}

/// Shared state behind every HTTP handler
pub struct GatewayService {
    rpc_url: String,
    aic_addr: Option<BigUint>,
    um_addr: Option<BigUint>,
    decimals: u32,
    units_encoding: UnitsEncoding,
    reader: Arc<dyn LedgerReader>,
    credentials: Arc<CredentialStore>,
    submitter: TransactionSubmitter,
    faucet: FaucetLimiter,
    metrics: GatewayMetrics,
    clock: Arc<dyn Clock>,
}

impl GatewayService {
    pub fn new(
        config: &GatewayConfig,
        reader: Arc<dyn LedgerReader>,
        sender: Arc<dyn TransactionSender>,
        credentials: Arc<CredentialStore>,
        clock: Arc<dyn Clock>,
    ) -> GatewayResult<Self> {
        let aic_addr = parse_contract_addr("AIC_ADDR", config.aic_addr.as_deref())?;
        let um_addr = parse_contract_addr("UM_ADDR", config.um_addr.as_deref())?;
        let metrics = GatewayMetrics::new().map_err(|e| GatewayError::Internal(e.to_string()))?;

        let policy = FaucetPolicy::from_config(
            config.faucet_enabled,
            &config.faucet_amount,
            config.decimals,
            config.faucet_cooldown_seconds,
        );
        let submitter = TransactionSubmitter::new(
            reader.clone(),
            sender,
            credentials.clone(),
            config.tx_versions.clone(),
        );
        let units_encoding = match config.authorize_encoding {
            AuthorizeEncoding::U256 => UnitsEncoding::U256,
            AuthorizeEncoding::Felt | AuthorizeEncoding::Auto => UnitsEncoding::Felt,
        };

        Ok(Self {
            rpc_url: config.rpc_url.clone(),
            aic_addr,
            um_addr,
            decimals: config.decimals,
            units_encoding,
            reader,
            credentials,
            submitter,
            faucet: FaucetLimiter::new(policy),
            metrics,
            clock,
        })
    }

    /// Fixes the `authorize_usage` encoding for the lifetime of the service
    pub async fn negotiate_units_encoding(&mut self, mode: AuthorizeEncoding) {
        self.units_encoding = negotiate_units_encoding(self.reader.as_ref(), self.um_addr.as_ref(), mode).await;
    }

    pub fn units_encoding(&self) -> UnitsEncoding {
        self.units_encoding
    }

    pub fn metrics(&self) -> &GatewayMetrics {
        &self.metrics
    }

    fn aic(&self) -> GatewayResult<&BigUint> {
        self.aic_addr
            .as_ref()
            .ok_or_else(|| GatewayError::Configuration("AIC_ADDR not configured".to_string()))
    }

    fn um(&self) -> GatewayResult<&BigUint> {
        self.um_addr
            .as_ref()
            .ok_or_else(|| GatewayError::Configuration("UM_ADDR not configured".to_string()))
    }

    /// Reads `width` felts, padding a short result with zeros
    async fn read(&self, contract: &BigUint, function: &str, calldata: Vec<BigUint>, width: usize) -> GatewayResult<Vec<BigUint>> {
        let call = ContractCall::new(contract.clone(), function, calldata);
        let result = self.reader.call(&call).await;
        self.metrics.record_read(function, result.is_ok());

        let mut felts = result?;
        if felts.len() < width {
            debug!("{} returned {} felt(s), padding to {}", function, felts.len(), width);
        }
        felts.resize(width, BigUint::zero());
        Ok(felts)
    }

    async fn read_u256(&self, contract: &BigUint, function: &str, calldata: Vec<BigUint>) -> GatewayResult<BigUint> {
        let felts = self.read(contract, function, calldata, 2).await?;
        let value = U256::from_felts(&felts[0], &felts[1])
            .map_err(|e| GatewayError::DataIntegrity(format!("{}: {}", function, e)))?;
        Ok(value.to_biguint())
    }

    async fn read_counter(&self, contract: &BigUint, function: &str, calldata: Vec<BigUint>) -> GatewayResult<u64> {
        let felts = self.read(contract, function, calldata, 1).await?;
        counter_from_felt(function, &felts[0])
    }

    async fn read_felt(&self, contract: &BigUint, function: &str) -> GatewayResult<BigUint> {
        let mut felts = self.read(contract, function, vec![], 1).await?;
        Ok(felts.swap_remove(0))
    }

    async fn submit(&self, to: &BigUint, function: &str, calldata: Vec<BigUint>) -> GatewayResult<String> {
        let result = self.submitter.submit(to, function, calldata).await;
        self.metrics.record_submission(function, result.is_ok());
        result
    }

    fn to_wei(&self, amount: &TokenAmount, field: &str) -> GatewayResult<BigUint> {
        if !amount.is_positive() {
            return Err(GatewayError::InvalidInput(format!("{} must be greater than 0", field)));
        }
        Ok(amount.to_smallest_unit(self.decimals)?)
    }

    fn display(&self, wei: &BigUint) -> String {
        format_units(wei, self.decimals)
    }

    pub fn config_info(&self) -> ConfigInfo {
        let policy = self.faucet.policy();
        ConfigInfo {
            rpc_url: self.rpc_url.clone(),
            aic_addr: self.aic_addr.as_ref().map(felt_to_hex),
            um_addr: self.um_addr.as_ref().map(felt_to_hex),
            decimals: self.decimals,
            writes_enabled: self.credentials.writes_enabled(),
            account_address: self.credentials.address_hex(),
            tx_versions: self.submitter.strategies().to_vec(),
            authorize_encoding: self.units_encoding,
            faucet: FaucetSettings {
                enabled: policy.enabled,
                amount_aic: policy.amount.clone(),
                amount_wei: policy.amount_wei.to_string(),
                cooldown_seconds: policy.cooldown_seconds,
            },
        }
    }

    pub async fn balance(&self, user: &str) -> GatewayResult<BalanceResponse> {
        let aic = self.aic()?;
        let wei = self.read_u256(aic, "balance_of", vec![parse_felt(user)?]).await?;
        Ok(BalanceResponse {
            balance_aic: self.display(&wei),
            balance_wei: wei.to_string(),
        })
    }

    pub async fn allowance(&self, owner: &str, spender: &str) -> GatewayResult<AllowanceResponse> {
        let aic = self.aic()?;
        let calldata = vec![parse_felt(owner)?, parse_felt(spender)?];
        let wei = self.read_u256(aic, "allowance", calldata).await?;
        Ok(AllowanceResponse {
            allowance_aic: self.display(&wei),
            allowance_wei: wei.to_string(),
        })
    }

    pub async fn used(&self, user: &str) -> GatewayResult<UsedResponse> {
        let um = self.um()?;
        let used_units = self
            .read_counter(um, "used_in_current_epoch", vec![parse_felt(user)?])
            .await?;
        Ok(UsedResponse { used_units })
    }

    pub async fn epoch(&self) -> GatewayResult<EpochResponse> {
        let um = self.um()?;
        let epoch_id = self.read_counter(um, "get_epoch_id", vec![]).await?;
        Ok(EpochResponse { epoch_id })
    }

    pub async fn free_quota(&self, user: Option<&str>) -> GatewayResult<FreeQuotaResponse> {
        let um = self.um()?;
        let user = user.map(parse_felt).transpose()?;

        let free_quota = self.read_counter(um, "get_free_quota_per_epoch", vec![]).await?;
        let price = self.read_u256(um, "get_price_per_unit_wei", vec![]).await?;
        let used_units = match user {
            Some(user) => Some(self.read_counter(um, "used_in_current_epoch", vec![user]).await?),
            None => None,
        };

        Ok(FreeQuotaResponse {
            free_quota,
            price_per_unit_wei: price.to_string(),
            used_units,
            free_remaining: used_units.map(|used| free_remaining(free_quota, used)),
        })
    }

    async fn breakdown(&self, um: &BigUint, user: BigUint, units: u64) -> GatewayResult<UsageBreakdown> {
        let free_quota = self.read_counter(um, "get_free_quota_per_epoch", vec![]).await?;
        let used = self.read_counter(um, "used_in_current_epoch", vec![user]).await?;
        let price = self.read_u256(um, "get_price_per_unit_wei", vec![]).await?;
        Ok(UsageBreakdown::compute(free_quota, used, &price, units))
    }

    pub async fn usage_estimate(&self, user: &str, units: u64) -> GatewayResult<UsageEstimate> {
        let um = self.um()?;
        let breakdown = self.breakdown(um, parse_felt(user)?, units).await?;
        Ok(UsageEstimate {
            expected_cost_aic: self.display(&breakdown.expected_cost_wei),
            breakdown,
        })
    }

    pub async fn token_info(&self) -> GatewayResult<TokenInfo> {
        let aic = self.aic()?;
        let name = self.read_felt(aic, "name").await?;
        let symbol = self.read_felt(aic, "symbol").await?;
        let decimals = self.read_counter(aic, "decimals", vec![]).await?;
        let total_supply = self.read_u256(aic, "total_supply", vec![]).await?;

        Ok(TokenInfo {
            name: decode_short_string(&name),
            symbol: decode_short_string(&symbol),
            decimals,
            total_supply_aic: self.display(&total_supply),
            total_supply_wei: total_supply.to_string(),
        })
    }

    pub async fn approve(&self, request: &ApproveRequest) -> GatewayResult<TxResponse> {
        let aic = self.aic()?;
        let spender = match &request.spender {
            Some(spender) => parse_felt(spender)?,
            None => self.um()?.clone(),
        };
        let amount = U256::try_from(&self.to_wei(&request.amount, "amount")?)?;

        let mut calldata = vec![spender];
        calldata.extend(amount.to_calldata());
        let tx_hash = self.submit(aic, "approve", calldata).await?;
        Ok(TxResponse { tx_hash })
    }

    pub async fn authorize(&self, request: &AuthorizeRequest) -> GatewayResult<AuthorizeResponse> {
        if request.units == 0 {
            return Err(GatewayError::InvalidInput("units must be greater than 0".to_string()));
        }
        let um = self.um()?;

        let (expected, allowance_before) = match self.credentials.address() {
            Some(account) => (
                best_effort("Usage breakdown", self.breakdown(um, account.clone(), request.units)).await,
                best_effort("Allowance snapshot", self.um_allowance(um, account.clone())).await,
            ),
            None => (None, None),
        };

        let calldata = self.units_encoding.calldata(request.units);
        let tx_hash = self.submit(um, "authorize_usage", calldata).await?;
        Ok(AuthorizeResponse {
            tx_hash,
            units: request.units,
            encoding: self.units_encoding,
            expected,
            allowance_before_wei: allowance_before.map(|wei| wei.to_string()),
        })
    }

    /// Compares the allowance drop since an `authorize` snapshot with its expected cost
    pub async fn verify_authorization(&self, request: &VerifyAuthorizationRequest) -> GatewayResult<AllowanceCheck> {
        let um = self.um()?;
        let user = match &request.user {
            Some(user) => parse_felt(user)?,
            None => self.credentials.address().cloned().ok_or_else(|| {
                GatewayError::InvalidInput("user is required without a signing account".to_string())
            })?,
        };
        let before = parse_wei(&request.allowance_before_wei, "allowance_before_wei")?;
        let expected_cost = parse_wei(&request.expected_cost_wei, "expected_cost_wei")?;

        let after = self.um_allowance(um, user).await?;
        let check = reconcile(&expected_cost, &before, &after);
        if !check.consistent {
            warn!(
                "Allowance drop {:?} does not match expected cost {}",
                check.observed_drop_wei, check.expected_cost_wei
            );
        }
        Ok(check)
    }

    async fn um_allowance(&self, um: &BigUint, owner: BigUint) -> GatewayResult<BigUint> {
        let aic = self.aic()?;
        self.read_u256(aic, "allowance", vec![owner, um.clone()]).await
    }

    pub async fn mint(&self, request: &MintRequest) -> GatewayResult<TxResponse> {
        let aic = self.aic()?;
        let to = parse_felt(&request.to)?;
        let amount = U256::try_from(&self.to_wei(&request.amount, "amount")?)?;

        let mut calldata = vec![to];
        calldata.extend(amount.to_calldata());
        let tx_hash = self.submit(aic, "mint", calldata).await?;
        Ok(TxResponse { tx_hash })
    }

    pub async fn set_price(&self, request: &SetPriceRequest) -> GatewayResult<TxResponse> {
        let um = self.um()?;
        let price = U256::try_from(&self.to_wei(&request.price, "price")?)?;
        let tx_hash = self
            .submit(um, "set_price_per_unit_wei", price.to_calldata().to_vec())
            .await?;
        Ok(TxResponse { tx_hash })
    }

    pub async fn set_quota(&self, request: &SetQuotaRequest) -> GatewayResult<TxResponse> {
        let um = self.um()?;
        let tx_hash = self
            .submit(um, "set_free_quota_per_epoch", vec![BigUint::from(request.quota)])
            .await?;
        Ok(TxResponse { tx_hash })
    }

    pub fn faucet_info(&self, address: Option<&str>) -> GatewayResult<FaucetInfo> {
        let status = self.faucet.status(address, self.clock.now())?;
        let eligibility = status.eligibility;

        Ok(FaucetInfo {
            enabled: status.policy.enabled,
            writes_enabled: self.credentials.writes_enabled(),
            amount_aic: status.policy.amount,
            amount_wei: status.policy.amount_wei.to_string(),
            cooldown_seconds: status.policy.cooldown_seconds,
            address: status.address,
            eligible: eligibility.map(|e| e.eligible),
            seconds_remaining: eligibility.and_then(|e| e.seconds_remaining),
            last_claim_timestamp: eligibility.and_then(|e| e.last_claim),
        })
    }

    pub async fn faucet_claim(&self, request: &FaucetClaimRequest) -> GatewayResult<FaucetClaimResponse> {
        let result = self.claim(request).await;
        let outcome = match &result {
            Ok(_) => "ok",
            Err(GatewayError::CooldownActive { .. }) => "cooldown",
            Err(GatewayError::FaucetDisabled) => "disabled",
            Err(_) => "error",
        };
        self.metrics.record_faucet_claim(outcome);
        result
    }

    async fn claim(&self, request: &FaucetClaimRequest) -> GatewayResult<FaucetClaimResponse> {
        if !self.faucet.enabled() {
            return Err(GatewayError::FaucetDisabled);
        }
        if !self.credentials.writes_enabled() {
            return Err(GatewayError::WritesDisabled);
        }
        let aic = self.aic()?;
        let to = parse_felt(&request.to)?;
        let policy = self.faucet.policy();
        let amount = U256::try_from(&policy.amount_wei)?;

        let mut calldata = vec![to];
        calldata.extend(amount.to_calldata());

        let now = self.clock.now();
        let receipt = self
            .faucet
            .claim_with(&request.to, now, |_| self.submit(aic, "mint", calldata))
            .await?;

        Ok(FaucetClaimResponse {
            tx_hash: receipt.outcome,
            to: receipt.address,
            amount_aic: policy.amount.clone(),
            amount_wei: policy.amount_wei.to_string(),
            claimed_at: receipt.claimed_at,
            previous_claim_timestamp: receipt.previous_claim,
            next_claim_at: receipt.claimed_at.saturating_add(policy.cooldown_seconds),
        })
    }
}

/// Optional context reads around a submission never fail the submission itself
async fn best_effort<T>(what: &str, read: impl Future<Output = GatewayResult<T>>) -> Option<T> {
    match read.await {
        Ok(value) => Some(value),
        Err(e) => {
            debug!("{} unavailable: {}", what, e);
            None
        }
    }
}

fn parse_wei(value: &str, field: &str) -> GatewayResult<BigUint> {
    value
        .trim()
        .parse()
        .map_err(|_| GatewayError::InvalidInput(format!("{} must be a decimal integer", field)))
}

fn parse_contract_addr(name: &str, raw: Option<&str>) -> GatewayResult<Option<BigUint>> {
    raw.map(|addr| {
        parse_felt(addr).map_err(|e| GatewayError::Configuration(format!("{} is not a valid address: {}", name, e)))
    })
    .transpose()
}
