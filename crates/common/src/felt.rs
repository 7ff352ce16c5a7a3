//! Felt helpers: parsing, canonical hex, selectors and short strings.

use crate::error::{CodecError, CodecResult};
use num_bigint::BigUint;
use num_traits::{Num, One, Zero};

/// STARK field prime `2^251 + 17 * 2^192 + 1`
pub fn field_prime() -> BigUint {
    (BigUint::one() << 251u32) + (BigUint::from(17u8) << 192u32) + 1u8
}

/// Parses a felt from `0x`-prefixed hex or plain decimal text.
pub fn parse_felt(text: &str) -> CodecResult<BigUint> {
    let s = text.trim();
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex_digits) if !hex_digits.is_empty() => BigUint::from_str_radix(hex_digits, 16),
        Some(_) => return Err(CodecError::InvalidFelt(text.to_string())),
        None if !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) => {
            BigUint::from_str_radix(s, 10)
        }
        None => return Err(CodecError::InvalidFelt(text.to_string())),
    };

    let value = parsed.map_err(|_| CodecError::InvalidFelt(text.to_string()))?;
    if value >= field_prime() {
        return Err(CodecError::Range(format!("{} is not a field element", text)));
    }
    Ok(value)
}

/// Canonical `0x` + lower-case hex, no leading zeros (`0x0` for zero)
pub fn felt_to_hex(value: &BigUint) -> String {
    format!("{:#x}", value)
}

/// Address key used for case- and padding-insensitive lookups: `0x` + 64 hex digits
pub fn normalize_address(text: &str) -> CodecResult<String> {
    let value = parse_felt(text)?;
    Ok(format!("0x{:0>64}", value.to_str_radix(16)))
}

/// Starknet entry point selector: keccak256(name) truncated to 250 bits
pub fn selector_from_name(name: &str) -> BigUint {
    let digest = keccak_hash::keccak(name.as_bytes());
    let mask = (BigUint::one() << 250u32) - 1u8;
    BigUint::from_bytes_be(&digest.0) & mask
}

/// Decodes a Cairo short string (up to 31 ASCII bytes packed big-endian in a felt).
pub fn decode_short_string(value: &BigUint) -> String {
    if value.is_zero() {
        return String::new();
    }
    let bytes = value.to_bytes_be();
    match std::str::from_utf8(&bytes) {
        Ok(s) => s.trim_end_matches('\0').to_string(),
        Err(_) => felt_to_hex(value),
    }
}
