use thiserror::Error;

/// Errors raised while converting token amounts and felts
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// The amount has more fractional digits than the token supports
    #[error("Amount has more precision than supported ({decimals} decimals)")]
    Precision { decimals: u32 },

    /// Value does not fit the target integer width
    #[error("Value out of range: {0}")]
    Range(String),

    /// Negative amounts cannot be expressed in smallest units
    #[error("Amount must not be negative: {0}")]
    NegativeAmount(String),

    /// Unparseable decimal or integer text
    #[error("Invalid number: {0}")]
    InvalidNumber(String),

    /// Unparseable felt / address text
    #[error("Invalid felt: {0}")]
    InvalidFelt(String),
}

/// Result type alias for codec operations
pub type CodecResult<T> = std::result::Result<T, CodecError>;
