use bincode::error::{DecodeError, EncodeError};
use std::fmt;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, FilterError>;

/// The kinds of filter that can take part in a union.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterKind {
    Static,
    Rotating,
    Empty,
}

impl fmt::Display for FilterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterKind::Static => f.write_str("static"),
            FilterKind::Rotating => f.write_str("rotating"),
            FilterKind::Empty => f.write_str("empty"),
        }
    }
}

/// Shape or config disagreement between two union operands.
///
/// The receiver's value always comes first.
#[derive(Debug, Clone, PartialEq)]
pub enum Mismatch {
    BitSize { ours: usize, theirs: usize },
    NumHashes { ours: usize, theirs: usize },
    Capacity { ours: usize, theirs: usize },
    FalsePositiveRate { ours: f64, theirs: f64 },
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mismatch::BitSize { ours, theirs } => {
                write!(f, "m1({ours}) != m2({theirs})")
            }
            Mismatch::NumHashes { ours, theirs } => {
                write!(f, "k1({ours}) != k2({theirs})")
            }
            Mismatch::Capacity { ours, theirs } => {
                write!(f, "different n values {ours} vs. {theirs}")
            }
            Mismatch::FalsePositiveRate { ours, theirs } => {
                write!(f, "different p values {ours} vs. {theirs}")
            }
        }
    }
}

#[derive(Error, Debug)]
pub enum FilterError {
    #[error("unable to union: expected a {expected} filter, got {found}")]
    IncompatibleType {
        expected: FilterKind,
        found: FilterKind,
    },

    #[error("error: {0}")]
    ConfigMismatch(Mismatch),

    #[error("error: different hashers")]
    HashIncompatible,

    #[error("Decode error: {0}")]
    DecodeError(String),

    #[error("Encode error: {0}")]
    EncodeError(String),

    #[error("Bloom filter not initialized")]
    NotInitialized,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Lock error: {0}")]
    LockError(String),

    #[error("Runtime error: {0}")]
    RuntimeError(String),

    #[error("Gateway configuration error: {0}")]
    GatewayConfig(String),

    #[error("Failed to parse environment variable {var_name}: value '{value}' - {error}")]
    EnvParseError {
        var_name: String,
        value: String,
        error: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<EncodeError> for FilterError {
    fn from(err: EncodeError) -> Self {
        FilterError::EncodeError(err.to_string())
    }
}

impl From<DecodeError> for FilterError {
    fn from(err: DecodeError) -> Self {
        FilterError::DecodeError(err.to_string())
    }
}
