//! Codec error types

use thiserror::Error;

/// Result type for codec operations
pub type Result<T> = std::result::Result<T, CodecError>;

/// Errors produced while decoding or encoding register data
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Fewer registers supplied than the conversion requires
    #[error("insufficient registers: need {needed}, got {got}")]
    InsufficientRegisters { needed: usize, got: usize },

    /// The conversion kind has no register representation for writes
    #[error("conversion {0} is read-only and cannot be encoded")]
    NotEncodable(&'static str),

    /// The value cannot be coerced into the target kind
    #[error("value cannot be encoded as {kind}: {reason}")]
    ValueOutOfRange { kind: &'static str, reason: String },
}
