//! Router-level tests against in-memory ledger fakes

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use num_bigint::BigUint;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokenxllm_common::felt::field_prime;
use tokenxllm_common::utils::logging::init_test_logging;
use tokenxllm_gateway::{
    build_router, Clock, CredentialStore, GatewayConfig, GatewayService,
};
use tokenxllm_ledger::{
    AbiInput, ContractCall, InvokeRequest, LedgerReader, LedgerResult, SigningAccount,
    SubmitFailure, TransactionSender,
};
use tower::ServiceExt;

/// Returns canned felts per entry point, regardless of arguments
#[derive(Default)]
struct FakeLedger {
    reads: Mutex<HashMap<&'static str, Vec<BigUint>>>,
    nonce: AtomicU64,
}

impl FakeLedger {
    fn set(&self, function: &'static str, felts: Vec<BigUint>) {
        self.reads.lock().unwrap().insert(function, felts);
    }
}

#[async_trait]
impl LedgerReader for FakeLedger {
    async fn call(&self, call: &ContractCall) -> LedgerResult<Vec<BigUint>> {
        Ok(self
            .reads
            .lock()
            .unwrap()
            .get(call.function.as_str())
            .cloned()
            .unwrap_or_default())
    }

    async fn get_nonce(&self, _account: &BigUint) -> LedgerResult<BigUint> {
        Ok(BigUint::from(self.nonce.load(Ordering::SeqCst)))
    }

    async fn entry_point_inputs(&self, _c: &BigUint, _f: &str) -> LedgerResult<Option<Vec<AbiInput>>> {
        Ok(None)
    }
}

/// Records submitted calls; fails every submission while `failing` is set
#[derive(Default)]
struct FakeSigner {
    calls: Mutex<Vec<ContractCall>>,
    failing: Mutex<Option<SubmitFailure>>,
}

impl FakeSigner {
    fn submitted(&self) -> Vec<ContractCall> {
        self.calls.lock().unwrap().clone()
    }

    fn fail_with(&self, failure: Option<SubmitFailure>) {
        *self.failing.lock().unwrap() = failure;
    }
}

#[async_trait]
impl TransactionSender for FakeSigner {
    async fn send_invoke(&self, request: &InvokeRequest) -> Result<BigUint, SubmitFailure> {
        if let Some(failure) = self.failing.lock().unwrap().clone() {
            return Err(failure);
        }
        let mut calls = self.calls.lock().unwrap();
        calls.extend(request.calls.iter().cloned());
        Ok(BigUint::from(0xbeef00u32 + calls.len() as u32))
    }
}

struct ManualClock(AtomicU64);

impl ManualClock {
    fn set(&self, now: u64) {
        self.0.store(now, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }
}

struct Harness {
    app: Router,
    ledger: Arc<FakeLedger>,
    signer: Arc<FakeSigner>,
    clock: Arc<ManualClock>,
}

fn test_config() -> GatewayConfig {
    GatewayConfig {
        aic_addr: Some("0xa1c".to_string()),
        um_addr: Some("0xb0b".to_string()),
        faucet_cooldown_seconds: 120,
        ..Default::default()
    }
}

fn account() -> SigningAccount {
    SigningAccount {
        address: BigUint::from(0xacc0u32),
        private_key: BigUint::from(0x1u8),
    }
}

fn harness_with(config: GatewayConfig, account: Option<SigningAccount>) -> Harness {
    init_test_logging();
    let ledger = Arc::new(FakeLedger::default());
    let signer = Arc::new(FakeSigner::default());
    let clock = Arc::new(ManualClock(AtomicU64::new(1000)));

    let service = GatewayService::new(
        &config,
        ledger.clone(),
        signer.clone(),
        Arc::new(CredentialStore::fixed(account)),
        clock.clone(),
    )
    .unwrap();

    Harness {
        app: build_router(Arc::new(service)),
        ledger,
        signer,
        clock,
    }
}

fn harness() -> Harness {
    harness_with(test_config(), Some(account()))
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

fn felts(values: &[u64]) -> Vec<BigUint> {
    values.iter().map(|v| BigUint::from(*v)).collect()
}

#[tokio::test]
async fn test_health() {
    let h = harness();
    let (status, body) = send(&h.app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"ok": true}));
}

#[tokio::test]
async fn test_config_reports_writes_and_faucet() {
    let h = harness();
    let (status, body) = send(&h.app, "GET", "/config", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["aic_addr"], "0xa1c");
    assert_eq!(body["decimals"], 18);
    assert_eq!(body["writes_enabled"], true);
    assert_eq!(body["account_address"], "0xacc0");
    assert_eq!(body["faucet"]["enabled"], true);
    assert_eq!(body["faucet"]["amount_wei"], "50000000000000000000");
    assert_eq!(body["faucet"]["cooldown_seconds"], 120);

    let read_only = harness_with(test_config(), None);
    let (_, body) = send(&read_only.app, "GET", "/config", None).await;
    assert_eq!(body["writes_enabled"], false);
    assert_eq!(body["account_address"], Value::Null);
}

#[tokio::test]
async fn test_balance_joins_u256_limbs() {
    let h = harness();
    h.ledger.set("balance_of", felts(&[1_500_000_000_000_000_000, 0]));

    let (status, body) = send(&h.app, "GET", "/balance?user=0x123", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["balance_wei"], "1500000000000000000");
    assert_eq!(body["balance_AIC"], "1.5");

    h.ledger.set("balance_of", felts(&[5, 1]));
    let (_, body) = send(&h.app, "GET", "/balance?user=0x123", None).await;
    assert_eq!(body["balance_wei"], "340282366920938463463374607431768211461");
}

#[tokio::test]
async fn test_short_reads_are_zero_padded() {
    let h = harness();
    h.ledger.set("allowance", felts(&[7]));

    let (status, body) = send(&h.app, "GET", "/allowance?owner=0x1&spender=0x2", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["allowance_wei"], "7");

    let (_, body) = send(&h.app, "GET", "/epoch", None).await;
    assert_eq!(body["epoch_id"], 0);
}

#[tokio::test]
async fn test_missing_contract_is_named() {
    let config = GatewayConfig {
        aic_addr: None,
        ..test_config()
    };
    let h = harness_with(config, Some(account()));

    let (status, body) = send(&h.app, "GET", "/balance?user=0x1", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "CONFIGURATION_ERROR");
    assert_eq!(body["message"], "AIC_ADDR not configured");
}

#[tokio::test]
async fn test_free_quota_never_negative() {
    let h = harness();
    h.ledger.set("get_free_quota_per_epoch", felts(&[100]));
    h.ledger.set("get_price_per_unit_wei", felts(&[1000, 0]));
    h.ledger.set("used_in_current_epoch", felts(&[150]));

    let (status, body) = send(&h.app, "GET", "/free_quota?user=0xabc", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["free_quota"], 100);
    assert_eq!(body["used_units"], 150);
    assert_eq!(body["free_remaining"], 0);
    assert_eq!(body["price_per_unit_wei"], "1000");

    let (_, body) = send(&h.app, "GET", "/free_quota", None).await;
    assert!(body.get("free_remaining").is_none());
}

#[tokio::test]
async fn test_usage_estimate() {
    let h = harness();
    h.ledger.set("get_free_quota_per_epoch", felts(&[100]));
    h.ledger.set("used_in_current_epoch", felts(&[90]));
    h.ledger.set("get_price_per_unit_wei", felts(&[500_000_000_000_000_000, 0]));

    let (status, body) = send(&h.app, "GET", "/usage_estimate?user=0xabc&units=25", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["free_consumed"], 10);
    assert_eq!(body["paid_units"], 15);
    assert_eq!(body["expected_cost_wei"], "7500000000000000000");
    assert_eq!(body["expected_cost_AIC"], "7.5");
}

#[tokio::test]
async fn test_out_of_range_counter_is_integrity_fault() {
    let h = harness();
    h.ledger.set("used_in_current_epoch", vec![field_prime() - 1u8]);

    let (status, body) = send(&h.app, "GET", "/used?user=0x1", None).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"], "DATA_INTEGRITY_ERROR");
}

#[tokio::test]
async fn test_token_info() {
    let h = harness();
    h.ledger.set("name", vec![BigUint::from_bytes_be(b"AI Credits")]);
    h.ledger.set("symbol", vec![BigUint::from_bytes_be(b"AIC")]);
    h.ledger.set("decimals", felts(&[18]));
    h.ledger.set("total_supply", felts(&[2_000_000_000_000_000_000, 0]));

    let (status, body) = send(&h.app, "GET", "/token", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "AI Credits");
    assert_eq!(body["symbol"], "AIC");
    assert_eq!(body["total_supply_AIC"], "2");
}

#[tokio::test]
async fn test_mint_encodes_u256_amount() {
    let h = harness();
    let (status, body) = send(&h.app, "POST", "/mint", Some(json!({"to": "0xDEAD", "amount": "1.5"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["tx_hash"], "0xbeef01");

    let calls = h.signer.submitted();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].function, "mint");
    assert_eq!(calls[0].to, BigUint::from(0xa1cu32));
    assert_eq!(
        calls[0].calldata,
        felts(&[0xdead, 1_500_000_000_000_000_000, 0])
    );
}

#[tokio::test]
async fn test_approve_defaults_spender_to_usage_manager() {
    let h = harness();
    let (status, _) = send(&h.app, "POST", "/approve", Some(json!({"amount": 2}))).await;
    assert_eq!(status, StatusCode::OK);

    let calls = h.signer.submitted();
    assert_eq!(calls[0].function, "approve");
    assert_eq!(calls[0].calldata[0], BigUint::from(0xb0bu32));
}

#[tokio::test]
async fn test_amount_validation() {
    let h = harness();

    let (status, body) = send(&h.app, "POST", "/approve", Some(json!({"amount": "0.0000000000000000001"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "PRECISION_ERROR");

    let (status, body) = send(&h.app, "POST", "/mint", Some(json!({"to": "0x1", "amount": "0"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "INVALID_INPUT");

    let (status, _) = send(&h.app, "POST", "/authorize", Some(json!({"units": 0}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    assert!(h.signer.submitted().is_empty());
}

#[tokio::test]
async fn test_writes_disabled_without_credentials() {
    let h = harness_with(test_config(), None);
    let (status, body) = send(&h.app, "POST", "/approve", Some(json!({"amount": "1"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "WRITES_DISABLED");
}

#[tokio::test]
async fn test_authorize_reports_expected_breakdown() {
    let h = harness();
    h.ledger.set("get_free_quota_per_epoch", felts(&[10]));
    h.ledger.set("used_in_current_epoch", felts(&[8]));
    h.ledger.set("get_price_per_unit_wei", felts(&[3, 0]));

    let (status, body) = send(&h.app, "POST", "/authorize", Some(json!({"units": 5}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["encoding"], "felt");
    assert_eq!(body["expected"]["free_consumed"], 2);
    assert_eq!(body["expected"]["paid_units"], 3);
    assert_eq!(body["expected"]["expected_cost_wei"], "9");

    let calls = h.signer.submitted();
    assert_eq!(calls[0].function, "authorize_usage");
    assert_eq!(calls[0].calldata, felts(&[5]));
}

#[tokio::test]
async fn test_authorization_allowance_drop_is_verified() {
    let h = harness();
    h.ledger.set("get_free_quota_per_epoch", felts(&[10]));
    h.ledger.set("used_in_current_epoch", felts(&[8]));
    h.ledger.set("get_price_per_unit_wei", felts(&[3, 0]));
    h.ledger.set("allowance", felts(&[100, 0]));

    let (status, body) = send(&h.app, "POST", "/authorize", Some(json!({"units": 5}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["allowance_before_wei"], "100");
    assert_eq!(body["expected"]["expected_cost_wei"], "9");

    let uri = "/verify_authorization?allowance_before_wei=100&expected_cost_wei=9";

    h.ledger.set("allowance", felts(&[91, 0]));
    let (status, body) = send(&h.app, "GET", uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["consistent"], true);
    assert_eq!(body["observed_drop_wei"], "9");
    assert_eq!(body["allowance_after_wei"], "91");

    h.ledger.set("allowance", felts(&[95, 0]));
    let (_, body) = send(&h.app, "GET", uri, None).await;
    assert_eq!(body["consistent"], false);
    assert_eq!(body["observed_drop_wei"], "5");
}

#[tokio::test]
async fn test_verify_authorization_requires_user_when_read_only() {
    let h = harness_with(test_config(), None);
    let uri = "/verify_authorization?allowance_before_wei=100&expected_cost_wei=9";
    let (status, body) = send(&h.app, "GET", uri, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "INVALID_INPUT");

    h.ledger.set("allowance", felts(&[100, 0]));
    let uri = "/verify_authorization?user=0xabc&allowance_before_wei=100&expected_cost_wei=0";
    let (status, body) = send(&h.app, "GET", uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["consistent"], true);

    let uri = "/verify_authorization?user=0xabc&allowance_before_wei=ten&expected_cost_wei=0";
    let (status, _) = send(&h.app, "GET", uri, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_submission_failure_is_bad_gateway() {
    let h = harness();
    h.signer.fail_with(Some(SubmitFailure::Rejected("Caller is not the owner".into())));

    let (status, body) = send(&h.app, "POST", "/set_quota", Some(json!({"quota": 100}))).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"], "SUBMISSION_ERROR");
}

#[tokio::test]
async fn test_set_price_sends_u256() {
    let h = harness();
    let (status, _) = send(&h.app, "POST", "/set_price", Some(json!({"price": "0.01"}))).await;
    assert_eq!(status, StatusCode::OK);

    let calls = h.signer.submitted();
    assert_eq!(calls[0].function, "set_price_per_unit_wei");
    assert_eq!(calls[0].calldata, felts(&[10_000_000_000_000_000, 0]));
}

#[tokio::test]
async fn test_faucet_cooldown_timeline() {
    let h = harness();
    let claim = json!({"to": "0xABC"});

    let (status, body) = send(&h.app, "POST", "/faucet", Some(claim.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["claimed_at"], 1000);
    assert_eq!(body["next_claim_at"], 1120);

    h.clock.set(1119);
    let (status, body) = send(&h.app, "POST", "/faucet", Some(claim.clone())).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["seconds_remaining"], 1);

    let (_, info) = send(&h.app, "GET", "/faucet?address=0xabc", None).await;
    assert_eq!(info["last_claim_timestamp"], 1000);
    assert_eq!(info["eligible"], false);

    h.clock.set(1121);
    let (status, body) = send(&h.app, "POST", "/faucet", Some(claim)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["previous_claim_timestamp"], 1000);

    let (_, info) = send(&h.app, "GET", "/faucet?address=0xabc", None).await;
    assert_eq!(info["last_claim_timestamp"], 1121);
    assert_eq!(h.signer.submitted().len(), 2);
}

#[tokio::test]
async fn test_failed_faucet_mint_keeps_eligibility() {
    let h = harness();
    h.signer.fail_with(Some(SubmitFailure::Transport("signer down".into())));

    let (status, _) = send(&h.app, "POST", "/faucet", Some(json!({"to": "0xabc"}))).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);

    let (_, info) = send(&h.app, "GET", "/faucet?address=0xabc", None).await;
    assert_eq!(info["last_claim_timestamp"], Value::Null);
    assert_eq!(info["seconds_remaining"], Value::Null);
    assert_eq!(info["eligible"], true);

    h.signer.fail_with(None);
    let (status, _) = send(&h.app, "POST", "/faucet", Some(json!({"address": "0xabc"}))).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_faucet_disabled_and_read_only() {
    let config = GatewayConfig {
        faucet_enabled: false,
        ..test_config()
    };
    let h = harness_with(config, Some(account()));
    let (status, body) = send(&h.app, "POST", "/faucet", Some(json!({"to": "0x1"}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "FAUCET_DISABLED");

    let (status, info) = send(&h.app, "GET", "/faucet?address=0x1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(info["enabled"], false);

    let h = harness_with(test_config(), None);
    let (status, body) = send(&h.app, "POST", "/faucet", Some(json!({"to": "0x1"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "WRITES_DISABLED");

    // a refused claim must not start the cooldown
    let (_, info) = send(&h.app, "GET", "/faucet?address=0x1", None).await;
    assert_eq!(info["last_claim_timestamp"], Value::Null);
}

#[tokio::test]
async fn test_metrics_exposition() {
    let h = harness();
    send(&h.app, "GET", "/epoch", None).await;
    send(&h.app, "POST", "/faucet", Some(json!({"to": "0x1"}))).await;

    let request = Request::builder().uri("/metrics").body(Body::empty()).unwrap();
    let response = h.app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();

    assert!(text.contains("tokenxllm_ledger_reads_total{function=\"get_epoch_id\",outcome=\"ok\"} 1"));
    assert!(text.contains("tokenxllm_faucet_claims_total{outcome=\"ok\"} 1"));
    assert!(text.contains("tokenxllm_submissions_total{function=\"mint\",outcome=\"ok\"} 1"));
}
