use crate::error::{CodecError, CodecResult};
use num_bigint::{BigInt, BigUint};
use num_traits::{Signed, ToPrimitive};
use serde::{Deserialize, Serialize};
use std::fmt;

/// 256-bit unsigned integer as carried in contract calldata: two 128-bit limbs
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct U256 {
    pub low: u128,
    pub high: u128,
}

impl U256 {
    pub const ZERO: U256 = U256 { low: 0, high: 0 };

    pub fn from_limbs(low: u128, high: u128) -> Self {
        Self { low, high }
    }

    /// Joins two felts read from a contract. Each limb must fit 128 bits.
    pub fn from_felts(low: &BigUint, high: &BigUint) -> CodecResult<Self> {
        let limb = |v: &BigUint, name: &str| {
            v.to_u128()
                .ok_or_else(|| CodecError::Range(format!("{} limb {} exceeds 128 bits", name, v)))
        };
        Ok(Self {
            low: limb(low, "low")?,
            high: limb(high, "high")?,
        })
    }

    /// `high * 2^128 + low`
    pub fn to_biguint(&self) -> BigUint {
        (BigUint::from(self.high) << 128u32) + BigUint::from(self.low)
    }

    pub fn is_zero(&self) -> bool {
        self.low == 0 && self.high == 0
    }

    /// Calldata order used by Cairo `u256` arguments: low limb first
    pub fn to_calldata(&self) -> [BigUint; 2] {
        [BigUint::from(self.low), BigUint::from(self.high)]
    }
}

impl TryFrom<&BigUint> for U256 {
    type Error = CodecError;

    fn try_from(value: &BigUint) -> CodecResult<Self> {
        if value.bits() > 256 {
            return Err(CodecError::Range(format!("{} does not fit in 256 bits", value)));
        }
        let mask = (BigUint::from(1u8) << 128u32) - 1u8;
        let low = (value & &mask).to_u128().unwrap_or_default();
        let high = (value >> 128u32).to_u128().unwrap_or_default();
        Ok(Self { low, high })
    }
}

impl TryFrom<&BigInt> for U256 {
    type Error = CodecError;

    fn try_from(value: &BigInt) -> CodecResult<Self> {
        if value.is_negative() {
            return Err(CodecError::Range(format!("{} is negative", value)));
        }
        U256::try_from(value.magnitude())
    }
}

impl From<U256> for BigUint {
    fn from(value: U256) -> Self {
        value.to_biguint()
    }
}

impl fmt::Debug for U256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "U256(low={:#x}, high={:#x})", self.low, self.high)
    }
}

impl fmt::Display for U256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_biguint())
    }
}
