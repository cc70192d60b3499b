//! Error types for the adaptive Bloom filter

use thiserror::Error;

use crate::domain::DigestFamily;

/// Configuration errors raised while constructing a filter or hasher.
///
/// Runtime operations on a well-formed filter never fail, so this is the
/// only error the core domain produces.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FilterError {
    #[error("{name} must be a power of two, got {value}")]
    NotPowerOfTwo { name: &'static str, value: usize },

    #[error("{name} must be positive")]
    ZeroParameter { name: &'static str },

    #[error(
        "digest budget exceeded for {family:?}: {required} bits required > {available} available"
    )]
    DigestBudgetExceeded {
        family: DigestFamily,
        required: usize,
        available: usize,
    },

    #[error("initial group {group} out of range (groups = {groups})")]
    InvalidInitialGroup { group: usize, groups: usize },

    #[error("Invalid filter parameters: {0}")]
    InvalidParameters(String),
}

/// Errors from the collaborators around the filter (key sources, sinks)
#[derive(Debug, Error)]
pub enum DataError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Key source exhausted after {produced} of {requested} keys")]
    SourceExhausted { produced: usize, requested: usize },

    #[error("Positive and negative key sets overlap")]
    OverlappingSets,

    #[error("Invalid key generator: {0}")]
    InvalidGenerator(String),

    #[error("Parse error: {0}")]
    ParseError(String),
}

/// Errors surfaced by the experiment runner
#[derive(Debug, Error)]
pub enum ExperimentError {
    #[error("Filter configuration error: {0}")]
    Filter(#[from] FilterError),

    #[error("Data error: {0}")]
    Data(#[from] DataError),

    #[error("Invalid experiment parameters: {0}")]
    InvalidParameters(String),
}
