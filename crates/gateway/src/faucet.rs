//! Cooldown-gated faucet.
//!
//! Each normalized recipient address maps to the unix time of its last
//! claim. A claim is recorded before the mint is submitted and rolled back
//! if the mint fails, so a failed transaction never spends the cooldown.

use crate::error::{GatewayError, GatewayResult};
use num_bigint::BigUint;
use num_traits::Zero;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokenxllm_common::{normalize_address, TokenAmount};
use tracing::{info, warn};

/// Static faucet settings after validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FaucetPolicy {
    pub enabled: bool,
    pub amount: String,
    pub amount_wei: BigUint,
    pub cooldown_seconds: u64,
}

impl FaucetPolicy {
    /// Disabled when the flag is off or the amount is not a positive,
    /// exactly representable value at `decimals`
    pub fn from_config(enabled: bool, amount: &str, decimals: u32, cooldown_seconds: u64) -> Self {
        let amount_wei = match amount.parse::<TokenAmount>() {
            Ok(parsed) => match parsed.to_smallest_unit(decimals) {
                Ok(wei) => Some((parsed, wei)),
                Err(e) => {
                    warn!("Faucet amount '{}' rejected: {}", amount, e);
                    None
                }
            },
            Err(e) => {
                warn!("Faucet amount '{}' rejected: {}", amount, e);
                None
            }
        };

        match amount_wei {
            Some((parsed, wei)) if !wei.is_zero() => Self {
                enabled,
                amount: parsed.to_string(),
                amount_wei: wei,
                cooldown_seconds,
            },
            other => {
                if enabled && other.is_some() {
                    warn!("Faucet amount '{}' is not positive; faucet disabled", amount);
                }
                Self {
                    enabled: false,
                    amount: amount.trim().to_string(),
                    amount_wei: BigUint::zero(),
                    cooldown_seconds,
                }
            }
        }
    }
}

/// Result of a cooldown check for one recipient
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Eligibility {
    pub eligible: bool,
    /// `None` when the recipient never claimed
    pub seconds_remaining: Option<u64>,
    pub last_claim: Option<u64>,
}

pub fn eligibility(last_claim: Option<u64>, now: u64, cooldown_seconds: u64) -> Eligibility {
    match last_claim {
        None => Eligibility {
            eligible: true,
            seconds_remaining: None,
            last_claim: None,
        },
        Some(last) => {
            let elapsed = now.saturating_sub(last);
            let remaining = cooldown_seconds.saturating_sub(elapsed);
            Eligibility {
                eligible: remaining == 0,
                seconds_remaining: Some(remaining),
                last_claim: Some(last),
            }
        }
    }
}

/// Last-claim timestamps keyed by normalized address
#[derive(Debug, Default)]
pub struct ClaimTable {
    claims: Mutex<HashMap<String, u64>>,
}

impl ClaimTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, u64>> {
        // the map stays consistent across a panic, so a poisoned lock is still usable
        self.claims.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn last_claim(&self, key: &str) -> Option<u64> {
        self.lock().get(key).copied()
    }

    pub fn check(&self, key: &str, now: u64, cooldown_seconds: u64) -> Eligibility {
        eligibility(self.last_claim(key), now, cooldown_seconds)
    }

    /// Re-checks and records `now` in one critical section
    pub fn claim(&self, key: &str, now: u64, cooldown_seconds: u64) -> GatewayResult<ClaimGuard<'_>> {
        let mut claims = self.lock();
        let previous = claims.get(key).copied();
        let status = eligibility(previous, now, cooldown_seconds);
        if !status.eligible {
            return Err(GatewayError::CooldownActive {
                seconds_remaining: status.seconds_remaining.unwrap_or(cooldown_seconds),
            });
        }
        claims.insert(key.to_string(), now);

        Ok(ClaimGuard {
            table: self,
            key: key.to_string(),
            claimed_at: now,
            previous,
            committed: false,
        })
    }

    fn rollback(&self, key: &str, claimed_at: u64, previous: Option<u64>) {
        let mut claims = self.lock();
        // a newer claim may have replaced ours once the cooldown was short enough
        if claims.get(key) != Some(&claimed_at) {
            return;
        }
        match previous {
            Some(last) => {
                claims.insert(key.to_string(), last);
            }
            None => {
                claims.remove(key);
            }
        }
    }
}

/// A recorded claim; rolled back on drop unless committed
#[derive(Debug)]
pub struct ClaimGuard<'a> {
    table: &'a ClaimTable,
    key: String,
    claimed_at: u64,
    previous: Option<u64>,
    committed: bool,
}

impl ClaimGuard<'_> {
    pub fn previous(&self) -> Option<u64> {
        self.previous
    }

    pub fn commit(mut self) {
        self.committed = true;
    }
}

impl Drop for ClaimGuard<'_> {
    fn drop(&mut self) {
        if !self.committed {
            warn!("Rolling back faucet claim for {}", self.key);
            self.table.rollback(&self.key, self.claimed_at, self.previous);
        }
    }
}

/// Snapshot of the faucet state for one (optional) recipient
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FaucetStatus {
    pub policy: FaucetPolicy,
    pub address: Option<String>,
    pub eligibility: Option<Eligibility>,
}

/// A successful claim
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimReceipt<T> {
    pub address: String,
    pub claimed_at: u64,
    pub previous_claim: Option<u64>,
    pub outcome: T,
}

pub struct FaucetLimiter {
    policy: FaucetPolicy,
    table: ClaimTable,
}

impl FaucetLimiter {
    pub fn new(policy: FaucetPolicy) -> Self {
        Self {
            policy,
            table: ClaimTable::new(),
        }
    }

    pub fn policy(&self) -> &FaucetPolicy {
        &self.policy
    }

    pub fn enabled(&self) -> bool {
        self.policy.enabled
    }

    /// Pure status query; never mutates the table
    pub fn status(&self, address: Option<&str>, now: u64) -> GatewayResult<FaucetStatus> {
        let address = address.map(normalize_address).transpose()?;
        let eligibility = match (&address, self.policy.enabled) {
            (Some(key), true) => Some(self.table.check(key, now, self.policy.cooldown_seconds)),
            _ => None,
        };

        Ok(FaucetStatus {
            policy: self.policy.clone(),
            address,
            eligibility,
        })
    }

    /// Claims for `address` at `now`, runs `mint`, and rolls the claim back if it fails
    pub async fn claim_with<F, Fut, T>(&self, address: &str, now: u64, mint: F) -> GatewayResult<ClaimReceipt<T>>
    where
        F: FnOnce(String) -> Fut,
        Fut: Future<Output = GatewayResult<T>>,
    {
        if !self.policy.enabled {
            return Err(GatewayError::FaucetDisabled);
        }
        let key = normalize_address(address)?;

        let guard = match self.table.claim(&key, now, self.policy.cooldown_seconds) {
            Ok(guard) => guard,
            Err(e) => {
                warn!("Faucet claim for {} refused: {}", key, e);
                return Err(e);
            }
        };
        let previous_claim = guard.previous();

        let outcome = mint(key.clone()).await?;
        guard.commit();

        info!("Faucet claim recorded for {} at {}", key, now);
        Ok(ClaimReceipt {
            address: key,
            claimed_at: now,
            previous_claim,
            outcome,
        })
    }

    #[cfg(test)]
    fn recorded(&self, address: &str) -> Option<u64> {
        let key = normalize_address(address).ok()?;
        self.table.last_claim(&key)
    }
}
