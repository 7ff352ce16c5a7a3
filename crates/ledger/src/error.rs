//! Error types for ledger reads and transaction submission

use thiserror::Error;

/// Starknet JSON-RPC error code for a stale or future account nonce
pub const INVALID_TRANSACTION_NONCE: i64 = 52;
/// Starknet JSON-RPC error code for a transaction version the node refuses
pub const UNSUPPORTED_TX_VERSION: i64 = 61;

/// Failures while reading from the ledger
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("RPC transport error: {0}")]
    Transport(String),

    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("Invalid RPC response: {0}")]
    InvalidResponse(String),
}

/// Typed reason a transaction submission was refused
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SubmitFailure {
    /// The account nonce moved underneath us
    #[error("Invalid transaction nonce: {0}")]
    NonceMismatch(String),

    /// The node does not accept this transaction version
    #[error("Unsupported transaction version: {0}")]
    UnsupportedVersion(String),

    /// The contract could not deserialize the calldata shape
    #[error("Calldata mismatch: {0}")]
    CalldataMismatch(String),

    /// Execution or validation rejected the transaction
    #[error("Transaction rejected: {0}")]
    Rejected(String),

    /// The signer or node could not be reached
    #[error("Signer transport error: {0}")]
    Transport(String),
}

impl SubmitFailure {
    /// Maps a JSON-RPC error (code plus free-form message) to a typed reason.
    ///
    /// This is the only place submission messages are inspected as text.
    pub fn classify(code: Option<i64>, message: &str) -> Self {
        let msg = message.to_lowercase();

        if code == Some(INVALID_TRANSACTION_NONCE)
            || msg.contains("invalid transaction nonce")
            || (msg.contains("nonce") && msg.contains("invalid"))
        {
            return SubmitFailure::NonceMismatch(message.to_string());
        }

        if code == Some(UNSUPPORTED_TX_VERSION)
            || msg.contains("unsupported_tx_version")
            || msg.contains("invalid transaction version")
        {
            return SubmitFailure::UnsupportedVersion(message.to_string());
        }

        if msg.contains("failed to deserialize param")
            || msg.contains("input too long")
            || msg.contains("input too short")
        {
            return SubmitFailure::CalldataMismatch(message.to_string());
        }

        SubmitFailure::Rejected(message.to_string())
    }

    pub fn is_nonce_mismatch(&self) -> bool {
        matches!(self, SubmitFailure::NonceMismatch(_))
    }

    pub fn is_unsupported_version(&self) -> bool {
        matches!(self, SubmitFailure::UnsupportedVersion(_))
    }
}

pub type LedgerResult<T> = Result<T, LedgerError>;
