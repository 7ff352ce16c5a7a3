//! Ledger collaborator for the tokenxllm gateway.
//!
//! Two capabilities are exposed to the rest of the workspace:
//! - [`LedgerReader`]: read felts from a contract entry point
//! - [`TransactionSender`]: submit a signed invoke and return its hash

pub mod client;
pub mod error;
pub mod rpc;
pub mod signer;
pub mod types;

pub use client::{LedgerReader, TransactionSender};
pub use error::{LedgerError, LedgerResult, SubmitFailure};
pub use rpc::StarknetRpcClient;
pub use signer::RelaySigner;
pub use types::{AbiInput, ContractCall, InvokeRequest, SigningAccount, TxVersion};
