use crate::error::{LedgerResult, SubmitFailure};
use crate::types::{AbiInput, ContractCall, InvokeRequest};
use async_trait::async_trait;
use num_bigint::BigUint;

/// Side-effect-free queries against the ledger
#[async_trait]
pub trait LedgerReader: Send + Sync {
    /// Calls a view entry point and returns the raw felts
    async fn call(&self, call: &ContractCall) -> LedgerResult<Vec<BigUint>>;

    /// Current nonce of an account contract
    async fn get_nonce(&self, account: &BigUint) -> LedgerResult<BigUint>;

    /// Declared inputs of `function` in the contract's ABI, if the ABI lists it
    async fn entry_point_inputs(
        &self,
        contract: &BigUint,
        function: &str,
    ) -> LedgerResult<Option<Vec<AbiInput>>>;
}

/// Signs and broadcasts invoke transactions
#[async_trait]
pub trait TransactionSender: Send + Sync {
    /// Returns the transaction hash reported by the signer
    async fn send_invoke(&self, request: &InvokeRequest) -> Result<BigUint, SubmitFailure>;
}
