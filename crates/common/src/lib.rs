//! Shared codecs for the tokenxllm gateway: fixed-point token amounts,
//! `u256` limb encoding and felt helpers, plus logging/config utilities.

pub mod amount;
pub mod error;
pub mod felt;
pub mod u256;
pub mod utils;

pub use amount::{format_units, TokenAmount, DEFAULT_DECIMALS};
pub use error::{CodecError, CodecResult};
pub use felt::{felt_to_hex, normalize_address, parse_felt, selector_from_name};
pub use u256::U256;
