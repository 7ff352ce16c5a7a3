//! Fixed-point conversion between display token amounts and smallest units.
//!
//! Amounts are kept as `mantissa * 10^exponent` with the mantissa stripped of
//! trailing zeros, so exactness checks reduce to the sign of the exponent.

use crate::error::{CodecError, CodecResult};
use num_bigint::{BigInt, BigUint, Sign};
use num_traits::{Signed, Zero};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Default number of fractional digits of the token
pub const DEFAULT_DECIMALS: u32 = 18;

/// Largest decimal exponent accepted from user input
const MAX_EXPONENT: i64 = 1024;

/// Largest number of significant digits accepted from user input
const MAX_DIGITS: usize = 1024;

/// Arbitrary-precision decimal amount denominated in display tokens
#[derive(Clone, PartialEq, Eq)]
pub struct TokenAmount {
    mantissa: BigInt,
    exponent: i64,
}

impl TokenAmount {
    /// Strips trailing zeros from a machine integer
    fn from_integer(value: impl Into<BigInt>) -> CodecResult<Self> {
        let mut mantissa: BigInt = value.into();
        if mantissa.is_zero() {
            return Ok(Self { mantissa, exponent: 0 });
        }

        let ten = BigInt::from(10u8);
        let mut exponent: i64 = 0;
        while (&mantissa % &ten).is_zero() {
            mantissa /= &ten;
            exponent = exponent.checked_add(1).ok_or_else(exponent_overflow)?;
        }
        Ok(Self { mantissa, exponent })
    }

    pub fn is_positive(&self) -> bool {
        self.mantissa.is_positive()
    }

    pub fn is_negative(&self) -> bool {
        self.mantissa.is_negative()
    }

    /// Computes `amount * 10^decimals`, rejecting anything that is not an exact integer.
    pub fn to_smallest_unit(&self, decimals: u32) -> CodecResult<BigUint> {
        if self.is_negative() {
            return Err(CodecError::NegativeAmount(self.to_string()));
        }
        if self.mantissa.is_zero() {
            return Ok(BigUint::zero());
        }

        let shift = self.exponent + decimals as i64;
        if shift < 0 {
            // the mantissa carries no trailing zeros, so it can never absorb the division
            return Err(CodecError::Precision { decimals });
        }
        if shift > u32::MAX as i64 {
            return Err(CodecError::Range(format!("10^{} overflows", shift)));
        }

        Ok(self.mantissa.magnitude() * pow10(shift as u32))
    }
}

/// `10^exp` as a big integer
pub fn pow10(exp: u32) -> BigUint {
    num_traits::pow(BigUint::from(10u8), exp as usize)
}

fn exponent_overflow() -> CodecError {
    CodecError::Range("exponent overflows".to_string())
}

/// Exact decimal rendering of `value / 10^decimals`.
///
/// Trailing fractional zeros are trimmed and integral results carry no
/// fraction, so `1500000000000000000` at 18 decimals renders as `1.5`.
pub fn format_units(value: &BigUint, decimals: u32) -> String {
    let digits = value.to_str_radix(10);
    if decimals == 0 {
        return digits;
    }

    let scale = decimals as usize;
    let (int_part, frac_part) = if digits.len() > scale {
        let (i, f) = digits.split_at(digits.len() - scale);
        (i.to_string(), f.to_string())
    } else {
        ("0".to_string(), format!("{}{}", "0".repeat(scale - digits.len()), digits))
    };

    let frac = frac_part.trim_end_matches('0');
    if frac.is_empty() {
        int_part
    } else {
        format!("{}.{}", int_part, frac)
    }
}

impl FromStr for TokenAmount {
    type Err = CodecError;

    fn from_str(s: &str) -> CodecResult<Self> {
        let text = s.trim();
        let invalid = || CodecError::InvalidNumber(s.to_string());

        let (body, exp_text) = match text.find(|c: char| c == 'e' || c == 'E') {
            Some(idx) => (&text[..idx], Some(&text[idx + 1..])),
            None => (text, None),
        };

        let exponent: i64 = match exp_text {
            Some(e) => e.parse().map_err(|_| invalid())?,
            None => 0,
        };
        if exponent.unsigned_abs() > MAX_EXPONENT as u64 {
            return Err(CodecError::Range(format!("exponent {} too large", exponent)));
        }

        let (negative, unsigned) = match body.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, body.strip_prefix('+').unwrap_or(body)),
        };

        let (int_part, frac_part) = unsigned.split_once('.').unwrap_or((unsigned, ""));
        if int_part.is_empty() && frac_part.is_empty() {
            return Err(invalid());
        }
        if !int_part.bytes().chain(frac_part.bytes()).all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }

        // Bounds are checked on the digit string, before any big-integer work
        let int_digits = int_part.trim_start_matches('0');
        let significant = if int_digits.is_empty() {
            frac_part.trim_start_matches('0')
        } else {
            frac_part
        };
        if int_digits.len() + significant.len() > MAX_DIGITS {
            return Err(CodecError::Range(format!("more than {} significant digits", MAX_DIGITS)));
        }

        let digits = format!("{}{}", int_digits, significant);
        let mantissa_digits = digits.trim_end_matches('0');
        if mantissa_digits.is_empty() {
            return Ok(Self { mantissa: BigInt::zero(), exponent: 0 });
        }

        let trailing_zeros = (digits.len() - mantissa_digits.len()) as i64;
        let frac_len = i64::try_from(frac_part.len()).map_err(|_| exponent_overflow())?;
        let exponent = exponent
            .checked_sub(frac_len)
            .and_then(|e| e.checked_add(trailing_zeros))
            .ok_or_else(exponent_overflow)?;
        if exponent.unsigned_abs() > MAX_EXPONENT as u64 {
            return Err(CodecError::Range(format!("exponent {} too large", exponent)));
        }

        let magnitude = BigUint::parse_bytes(mantissa_digits.as_bytes(), 10).ok_or_else(invalid)?;
        let sign = if negative { Sign::Minus } else { Sign::Plus };
        Ok(Self {
            mantissa: BigInt::from_biguint(sign, magnitude),
            exponent,
        })
    }
}

impl fmt::Display for TokenAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_negative() {
            f.write_str("-")?;
        }
        let magnitude = self.mantissa.magnitude();
        if self.exponent >= 0 {
            let scaled = magnitude * pow10(self.exponent as u32);
            f.write_str(&scaled.to_str_radix(10))
        } else {
            f.write_str(&format_units(magnitude, (-self.exponent) as u32))
        }
    }
}

impl fmt::Debug for TokenAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TokenAmount({})", self)
    }
}

impl Serialize for TokenAmount {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for TokenAmount {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct AmountVisitor;

        impl<'de> de::Visitor<'de> for AmountVisitor {
            type Value = TokenAmount;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a decimal amount as a string or number")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<TokenAmount, E> {
                v.parse().map_err(E::custom)
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<TokenAmount, E> {
                TokenAmount::from_integer(v).map_err(E::custom)
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<TokenAmount, E> {
                TokenAmount::from_integer(v).map_err(E::custom)
            }

            fn visit_f64<E: de::Error>(self, v: f64) -> Result<TokenAmount, E> {
                if !v.is_finite() {
                    return Err(E::custom("amount must be finite"));
                }
                // shortest round-trip representation, e.g. 0.1 -> "0.1"
                v.to_string().parse().map_err(E::custom)
            }
        }

        deserializer.deserialize_any(AmountVisitor)
    }
}
