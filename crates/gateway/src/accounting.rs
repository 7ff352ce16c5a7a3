//! Per-epoch quota accounting.
//!
//! Usage is first charged against the free quota of the current epoch; any
//! remainder is paid from the caller's allowance at `price_per_unit_wei`.

use crate::error::{GatewayError, GatewayResult};
use num_bigint::BigUint;
use num_traits::ToPrimitive;
use serde::Serialize;

/// How a request for `units` splits between free quota and paid usage
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UsageBreakdown {
    pub units: u64,
    pub free_quota: u64,
    pub used_units: u64,
    pub free_remaining: u64,
    pub free_consumed: u64,
    pub paid_units: u64,
    #[serde(serialize_with = "serialize_decimal")]
    pub price_per_unit_wei: BigUint,
    #[serde(serialize_with = "serialize_decimal")]
    pub expected_cost_wei: BigUint,
}

impl UsageBreakdown {
    pub fn compute(free_quota: u64, used_units: u64, price_per_unit_wei: &BigUint, units: u64) -> Self {
        let free_remaining = free_remaining(free_quota, used_units);
        let free_consumed = units.min(free_remaining);
        let paid_units = units - free_consumed;

        Self {
            units,
            free_quota,
            used_units,
            free_remaining,
            free_consumed,
            paid_units,
            price_per_unit_wei: price_per_unit_wei.clone(),
            expected_cost_wei: price_per_unit_wei * BigUint::from(paid_units),
        }
    }
}

/// Outcome of comparing an observed allowance drop with the expected cost
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AllowanceCheck {
    #[serde(serialize_with = "serialize_decimal")]
    pub expected_cost_wei: BigUint,
    #[serde(serialize_with = "serialize_decimal")]
    pub allowance_before_wei: BigUint,
    #[serde(serialize_with = "serialize_decimal")]
    pub allowance_after_wei: BigUint,
    /// `None` when the allowance grew in between
    #[serde(serialize_with = "serialize_optional_decimal")]
    pub observed_drop_wei: Option<BigUint>,
    pub consistent: bool,
}

/// Checks that the allowance dropped by exactly the expected cost across an authorization
pub fn reconcile(expected_cost_wei: &BigUint, allowance_before: &BigUint, allowance_after: &BigUint) -> AllowanceCheck {
    let observed_drop_wei = if allowance_after > allowance_before {
        None
    } else {
        Some(allowance_before - allowance_after)
    };

    AllowanceCheck {
        consistent: observed_drop_wei.as_ref() == Some(expected_cost_wei),
        expected_cost_wei: expected_cost_wei.clone(),
        allowance_before_wei: allowance_before.clone(),
        allowance_after_wei: allowance_after.clone(),
        observed_drop_wei,
    }
}

pub fn free_remaining(free_quota: u64, used_units: u64) -> u64 {
    free_quota.saturating_sub(used_units)
}

/// Reads a usage counter felt; values outside u64 are never clamped
pub fn counter_from_felt(name: &str, felt: &BigUint) -> GatewayResult<u64> {
    felt.to_u64().ok_or_else(|| {
        GatewayError::DataIntegrity(format!("{} value {} does not fit a u64 counter", name, felt))
    })
}

fn serialize_decimal<S: serde::Serializer>(value: &BigUint, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&value.to_string())
}

fn serialize_optional_decimal<S: serde::Serializer>(value: &Option<BigUint>, serializer: S) -> Result<S::Ok, S::Error> {
    match value {
        Some(value) => serializer.serialize_str(&value.to_string()),
        None => serializer.serialize_none(),
    }
}
