//! Serialized transaction submission for the signing account.
//!
//! One writer lock covers the whole nonce-fetch / submit / retry sequence so
//! concurrent requests never race on the account nonce.

use crate::credentials::CredentialStore;
use crate::error::{GatewayError, GatewayResult};
use num_bigint::BigUint;
use std::sync::Arc;
use tokenxllm_common::felt::felt_to_hex;
use tokenxllm_ledger::{
    ContractCall, InvokeRequest, LedgerReader, SubmitFailure, TransactionSender, TxVersion,
};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

pub struct TransactionSubmitter {
    reader: Arc<dyn LedgerReader>,
    sender: Arc<dyn TransactionSender>,
    credentials: Arc<CredentialStore>,
    strategies: Vec<TxVersion>,
    writer: Mutex<()>,
}

impl TransactionSubmitter {
    pub fn new(
        reader: Arc<dyn LedgerReader>,
        sender: Arc<dyn TransactionSender>,
        credentials: Arc<CredentialStore>,
        strategies: Vec<TxVersion>,
    ) -> Self {
        let strategies = if strategies.is_empty() {
            vec![TxVersion::V3, TxVersion::V1]
        } else {
            strategies
        };
        Self {
            reader,
            sender,
            credentials,
            strategies,
            writer: Mutex::new(()),
        }
    }

    pub fn strategies(&self) -> &[TxVersion] {
        &self.strategies
    }

    /// Submits one call and returns the canonical transaction hash
    pub async fn submit(&self, to: &BigUint, function: &str, calldata: Vec<BigUint>) -> GatewayResult<String> {
        let _writer = self.writer.lock().await;

        let account = self
            .credentials
            .account()
            .cloned()
            .ok_or(GatewayError::WritesDisabled)?;
        let call = ContractCall::new(to.clone(), function, calldata);

        let mut nonce = self.reader.get_nonce(&account.address).await?;
        let mut nonce_retried = false;
        let mut strategies = self.strategies.iter().copied().peekable();
        let mut last_failure = None;

        while let Some(&version) = strategies.peek() {
            let request = InvokeRequest {
                account: account.clone(),
                calls: vec![call.clone()],
                nonce: nonce.clone(),
                version,
            };
            debug!("Submitting {} ({}) with nonce {}", function, version, nonce);

            match self.sender.send_invoke(&request).await {
                Ok(hash) => {
                    let hash = felt_to_hex(&hash);
                    info!("Submitted {} as {} ({})", function, hash, version);
                    return Ok(hash);
                }
                Err(failure) if failure.is_unsupported_version() => {
                    warn!("{} rejected for {}: {}", version, function, failure);
                    last_failure = Some(failure);
                    strategies.next();
                }
                Err(failure) if failure.is_nonce_mismatch() && !nonce_retried => {
                    warn!("Nonce {} rejected for {}; refetching", nonce, function);
                    debug!("Nonce failure detail: {}", failure);
                    nonce_retried = true;
                    nonce = self.reader.get_nonce(&account.address).await?;
                }
                Err(failure) => {
                    warn!("Submission of {} failed: {}", function, failure);
                    return Err(GatewayError::Submission(failure));
                }
            }
        }

        Err(GatewayError::Submission(last_failure.unwrap_or_else(|| {
            SubmitFailure::UnsupportedVersion("no transaction version accepted".to_string())
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU64, Ordering};
    use tokenxllm_ledger::{AbiInput, LedgerResult, SigningAccount};

    struct NonceCounter(AtomicU64);

    #[async_trait]
    impl LedgerReader for NonceCounter {
        async fn call(&self, _call: &ContractCall) -> LedgerResult<Vec<BigUint>> {
            Ok(vec![])
        }

        async fn get_nonce(&self, _account: &BigUint) -> LedgerResult<BigUint> {
            Ok(BigUint::from(self.0.fetch_add(1, Ordering::SeqCst)))
        }

        async fn entry_point_inputs(&self, _c: &BigUint, _f: &str) -> LedgerResult<Option<Vec<AbiInput>>> {
            Ok(None)
        }
    }

    /// Replays scripted outcomes and records every request it saw
    struct ScriptedSender {
        script: std::sync::Mutex<VecDeque<Result<BigUint, SubmitFailure>>>,
        seen: std::sync::Mutex<Vec<(TxVersion, BigUint)>>,
    }

    impl ScriptedSender {
        fn new(script: Vec<Result<BigUint, SubmitFailure>>) -> Arc<Self> {
            Arc::new(Self {
                script: std::sync::Mutex::new(script.into()),
                seen: std::sync::Mutex::new(vec![]),
            })
        }

        fn seen(&self) -> Vec<(TxVersion, BigUint)> {
            self.seen.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl TransactionSender for ScriptedSender {
        async fn send_invoke(&self, request: &InvokeRequest) -> Result<BigUint, SubmitFailure> {
            self.seen.lock().unwrap().push((request.version, request.nonce.clone()));
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(BigUint::from(0xfeedu32)))
        }
    }

    fn submitter(sender: Arc<ScriptedSender>, writes: bool) -> TransactionSubmitter {
        let account = writes.then(|| SigningAccount {
            address: BigUint::from(0xa11ceu32),
            private_key: BigUint::from(1u8),
        });
        TransactionSubmitter::new(
            Arc::new(NonceCounter(AtomicU64::new(5))),
            sender,
            Arc::new(CredentialStore::fixed(account)),
            vec![TxVersion::V3, TxVersion::V1],
        )
    }

    fn nonce_error() -> SubmitFailure {
        SubmitFailure::NonceMismatch("Invalid transaction nonce".into())
    }

    #[tokio::test]
    async fn test_first_strategy_succeeds() {
        let sender = ScriptedSender::new(vec![Ok(BigUint::from(0xabcu32))]);
        let hash = submitter(sender.clone(), true)
            .submit(&BigUint::from(1u8), "mint", vec![])
            .await
            .unwrap();
        assert_eq!(hash, "0xabc");
        assert_eq!(sender.seen(), vec![(TxVersion::V3, BigUint::from(5u8))]);
    }

    #[tokio::test]
    async fn test_unsupported_version_falls_back() {
        let sender = ScriptedSender::new(vec![
            Err(SubmitFailure::UnsupportedVersion("v3".into())),
            Ok(BigUint::from(0x1u8)),
        ]);
        let hash = submitter(sender.clone(), true)
            .submit(&BigUint::from(1u8), "mint", vec![])
            .await
            .unwrap();
        assert_eq!(hash, "0x1");
        let versions: Vec<_> = sender.seen().into_iter().map(|(v, _)| v).collect();
        assert_eq!(versions, vec![TxVersion::V3, TxVersion::V1]);
    }

    #[tokio::test]
    async fn test_nonce_mismatch_refetches_once() {
        let sender = ScriptedSender::new(vec![Err(nonce_error()), Ok(BigUint::from(0x2u8))]);
        submitter(sender.clone(), true)
            .submit(&BigUint::from(1u8), "approve", vec![])
            .await
            .unwrap();
        assert_eq!(
            sender.seen(),
            vec![
                (TxVersion::V3, BigUint::from(5u8)),
                (TxVersion::V3, BigUint::from(6u8)),
            ]
        );
    }

    #[tokio::test]
    async fn test_second_nonce_mismatch_is_final() {
        let sender = ScriptedSender::new(vec![Err(nonce_error()), Err(nonce_error())]);
        let err = submitter(sender.clone(), true)
            .submit(&BigUint::from(1u8), "approve", vec![])
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Submission(SubmitFailure::NonceMismatch(_))));
        assert_eq!(sender.seen().len(), 2);
    }

    #[tokio::test]
    async fn test_rejection_is_final() {
        let sender = ScriptedSender::new(vec![Err(SubmitFailure::Rejected("not owner".into()))]);
        let err = submitter(sender.clone(), true)
            .submit(&BigUint::from(1u8), "mint", vec![])
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Submission(SubmitFailure::Rejected(_))));
        assert_eq!(sender.seen().len(), 1);
    }

    #[tokio::test]
    async fn test_all_versions_unsupported() {
        let sender = ScriptedSender::new(vec![
            Err(SubmitFailure::UnsupportedVersion("v3".into())),
            Err(SubmitFailure::UnsupportedVersion("v1".into())),
        ]);
        let err = submitter(sender, true)
            .submit(&BigUint::from(1u8), "mint", vec![])
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Submission(SubmitFailure::UnsupportedVersion(_))));
    }

    #[tokio::test]
    async fn test_without_credentials() {
        let sender = ScriptedSender::new(vec![]);
        let err = submitter(sender.clone(), false)
            .submit(&BigUint::from(1u8), "mint", vec![])
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::WritesDisabled));
        assert!(sender.seen().is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_submissions_get_distinct_nonces() {
        let sender = ScriptedSender::new(vec![]);
        let submitter = Arc::new(submitter(sender.clone(), true));

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let submitter = submitter.clone();
                tokio::spawn(async move { submitter.submit(&BigUint::from(1u8), "mint", vec![]).await })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        let mut nonces: Vec<_> = sender.seen().into_iter().map(|(_, n)| n).collect();
        nonces.sort();
        nonces.dedup();
        assert_eq!(nonces.len(), 8);
    }
}
