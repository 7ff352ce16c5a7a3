//! HTTP API for the gateway

use crate::accounting::AllowanceCheck;
use crate::error::GatewayResult;
use crate::service::{
    AllowanceResponse, ApproveRequest, AuthorizeRequest, AuthorizeResponse, BalanceResponse,
    ConfigInfo, EpochResponse, FaucetClaimRequest, FaucetClaimResponse, FaucetInfo,
    FreeQuotaResponse, GatewayService, MintRequest, SetPriceRequest, SetQuotaRequest, TokenInfo,
    TxResponse, UsageEstimate, UsedResponse, VerifyAuthorizationRequest,
};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{error, info};

type AppState = Arc<GatewayService>;

#[derive(Debug, Deserialize)]
pub struct UserQuery {
    pub user: String,
}

#[derive(Debug, Deserialize)]
pub struct OptionalUserQuery {
    pub user: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AllowanceQuery {
    pub owner: String,
    pub spender: String,
}

#[derive(Debug, Deserialize)]
pub struct UsageEstimateQuery {
    pub user: String,
    pub units: u64,
}

#[derive(Debug, Deserialize)]
pub struct FaucetQuery {
    pub address: Option<String>,
}

/// All gateway routes, bound to one shared service
pub fn build_router(service: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/config", get(config_handler))
        .route("/token", get(token_handler))
        .route("/balance", get(balance_handler))
        .route("/allowance", get(allowance_handler))
        .route("/used", get(used_handler))
        .route("/epoch", get(epoch_handler))
        .route("/free_quota", get(free_quota_handler))
        .route("/usage_estimate", get(usage_estimate_handler))
        .route("/approve", axum::routing::post(approve_handler))
        .route("/authorize", axum::routing::post(authorize_handler))
        .route("/verify_authorization", get(verify_authorization_handler))
        .route("/mint", axum::routing::post(mint_handler))
        .route("/set_price", axum::routing::post(set_price_handler))
        .route("/set_quota", axum::routing::post(set_quota_handler))
        .route("/faucet", get(faucet_info_handler).post(faucet_claim_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(service)
}

pub async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({ "ok": true }))
}

pub async fn config_handler(State(service): State<AppState>) -> Json<ConfigInfo> {
    Json(service.config_info())
}

pub async fn token_handler(State(service): State<AppState>) -> GatewayResult<Json<TokenInfo>> {
    Ok(Json(service.token_info().await?))
}

pub async fn balance_handler(
    State(service): State<AppState>,
    Query(query): Query<UserQuery>,
) -> GatewayResult<Json<BalanceResponse>> {
    Ok(Json(service.balance(&query.user).await?))
}

pub async fn allowance_handler(
    State(service): State<AppState>,
    Query(query): Query<AllowanceQuery>,
) -> GatewayResult<Json<AllowanceResponse>> {
    Ok(Json(service.allowance(&query.owner, &query.spender).await?))
}

pub async fn used_handler(
    State(service): State<AppState>,
    Query(query): Query<UserQuery>,
) -> GatewayResult<Json<UsedResponse>> {
    Ok(Json(service.used(&query.user).await?))
}

pub async fn epoch_handler(State(service): State<AppState>) -> GatewayResult<Json<EpochResponse>> {
    Ok(Json(service.epoch().await?))
}

pub async fn free_quota_handler(
    State(service): State<AppState>,
    Query(query): Query<OptionalUserQuery>,
) -> GatewayResult<Json<FreeQuotaResponse>> {
    Ok(Json(service.free_quota(query.user.as_deref()).await?))
}

pub async fn usage_estimate_handler(
    State(service): State<AppState>,
    Query(query): Query<UsageEstimateQuery>,
) -> GatewayResult<Json<UsageEstimate>> {
    Ok(Json(service.usage_estimate(&query.user, query.units).await?))
}

pub async fn approve_handler(
    State(service): State<AppState>,
    Json(request): Json<ApproveRequest>,
) -> GatewayResult<Json<TxResponse>> {
    info!("Approve request: amount={}", request.amount);
    Ok(Json(service.approve(&request).await?))
}

pub async fn authorize_handler(
    State(service): State<AppState>,
    Json(request): Json<AuthorizeRequest>,
) -> GatewayResult<Json<AuthorizeResponse>> {
    info!("Authorize request: units={}", request.units);
    Ok(Json(service.authorize(&request).await?))
}

pub async fn verify_authorization_handler(
    State(service): State<AppState>,
    Query(query): Query<VerifyAuthorizationRequest>,
) -> GatewayResult<Json<AllowanceCheck>> {
    Ok(Json(service.verify_authorization(&query).await?))
}

pub async fn mint_handler(
    State(service): State<AppState>,
    Json(request): Json<MintRequest>,
) -> GatewayResult<Json<TxResponse>> {
    info!("Mint request: to={} amount={}", request.to, request.amount);
    Ok(Json(service.mint(&request).await?))
}

pub async fn set_price_handler(
    State(service): State<AppState>,
    Json(request): Json<SetPriceRequest>,
) -> GatewayResult<Json<TxResponse>> {
    info!("Set price request: price={}", request.price);
    Ok(Json(service.set_price(&request).await?))
}

pub async fn set_quota_handler(
    State(service): State<AppState>,
    Json(request): Json<SetQuotaRequest>,
) -> GatewayResult<Json<TxResponse>> {
    info!("Set quota request: quota={}", request.quota);
    Ok(Json(service.set_quota(&request).await?))
}

pub async fn faucet_info_handler(
    State(service): State<AppState>,
    Query(query): Query<FaucetQuery>,
) -> GatewayResult<Json<FaucetInfo>> {
    Ok(Json(service.faucet_info(query.address.as_deref())?))
}

pub async fn faucet_claim_handler(
    State(service): State<AppState>,
    Json(request): Json<FaucetClaimRequest>,
) -> GatewayResult<Json<FaucetClaimResponse>> {
    info!("Faucet request: to={}", request.to);
    Ok(Json(service.faucet_claim(&request).await?))
}

pub async fn metrics_handler(State(service): State<AppState>) -> Result<String, StatusCode> {
    match service.metrics().gather() {
        Ok(text) => Ok(text),
        Err(err) => {
            error!("Failed to gather metrics: {}", err);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}
