//! Error types for the gateway service

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tokenxllm_common::CodecError;
use tokenxllm_ledger::{LedgerError, SubmitFailure};

/// Gateway errors, each mapped to one HTTP status at the request boundary
#[derive(Error, Debug)]
pub enum GatewayError {
    /// A required setting (contract address, credential) is missing
    #[error("{0}")]
    Configuration(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error("Faucet cooldown active: try again in {seconds_remaining} seconds")]
    CooldownActive { seconds_remaining: u64 },

    #[error("Faucet is disabled")]
    FaucetDisabled,

    #[error("Writes are not configured on the backend")]
    WritesDisabled,

    #[error("Failed to submit transaction: {0}")]
    Submission(#[from] SubmitFailure),

    #[error("Ledger read failed: {0}")]
    Ledger(#[from] LedgerError),

    /// The ledger reported a value this service cannot interpret
    #[error("Ledger data integrity fault: {0}")]
    DataIntegrity(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::Configuration(_)
            | GatewayError::InvalidInput(_)
            | GatewayError::Codec(_)
            | GatewayError::WritesDisabled => StatusCode::BAD_REQUEST,
            GatewayError::CooldownActive { .. } => StatusCode::TOO_MANY_REQUESTS,
            GatewayError::FaucetDisabled => StatusCode::NOT_FOUND,
            GatewayError::Submission(_)
            | GatewayError::Ledger(_)
            | GatewayError::DataIntegrity(_) => StatusCode::BAD_GATEWAY,
            GatewayError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            GatewayError::Configuration(_) => "CONFIGURATION_ERROR",
            GatewayError::InvalidInput(_) => "INVALID_INPUT",
            GatewayError::Codec(CodecError::Precision { .. }) => "PRECISION_ERROR",
            GatewayError::Codec(CodecError::Range(_)) => "RANGE_ERROR",
            GatewayError::Codec(CodecError::NegativeAmount(_)) => "NEGATIVE_AMOUNT",
            GatewayError::Codec(CodecError::InvalidFelt(_)) => "INVALID_ADDRESS",
            GatewayError::Codec(_) => "INVALID_NUMBER",
            GatewayError::CooldownActive { .. } => "COOLDOWN_ACTIVE",
            GatewayError::FaucetDisabled => "FAUCET_DISABLED",
            GatewayError::WritesDisabled => "WRITES_DISABLED",
            GatewayError::Submission(_) => "SUBMISSION_ERROR",
            GatewayError::Ledger(_) => "LEDGER_ERROR",
            GatewayError::DataIntegrity(_) => "DATA_INTEGRITY_ERROR",
            GatewayError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let mut body = json!({
            "error": self.error_code(),
            "message": self.to_string(),
            "timestamp": chrono::Utc::now().to_rfc3339()
        });

        if let GatewayError::CooldownActive { seconds_remaining } = self {
            body["seconds_remaining"] = json!(seconds_remaining);
        }

        (status, Json(body)).into_response()
    }
}

pub type GatewayResult<T> = Result<T, GatewayError>;
