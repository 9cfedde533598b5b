//! Error type shared by every fallible operation in the crate.

use thiserror::Error;

/// Errors returned by irreps parsing, operator construction and execution.
#[derive(Debug, Error)]
pub enum Error {
    /// Irreps or irrep text could not be parsed.
    #[error("cannot parse irreps `{input}`: {reason}")]
    Parse { input: String, reason: String },

    /// Irreps are well-formed but unsuitable for the requested operation.
    #[error("invalid irreps: {0}")]
    Irreps(String),

    /// Coupling `l1 ⊗ l2 → l3` violates the triangle rule.
    #[error("no coupling for ({l1}, {l2}, {l3}): triangle rule violated")]
    Selection { l1: u32, l2: u32, l3: u32 },

    /// Tensor shape does not match what the operation expects.
    #[error("{what}: expected shape {expected:?}, got {actual:?}")]
    Shape {
        what: &'static str,
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    /// Element index outside `0..num_elements`.
    #[error("element index {index} at row {row} is out of range for {num_elements} elements")]
    ElementIndex {
        row: usize,
        index: i64,
        num_elements: usize,
    },

    /// Inconsistent operator configuration.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Requested device is not compiled in or cannot be opened.
    #[error("device `{0}` is not available")]
    DeviceUnavailable(String),

    /// Embedded reference data is malformed.
    #[error("reference data: {0}")]
    Reference(String),

    #[error(transparent)]
    Base64(#[from] base64::DecodeError),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[cfg(feature = "cuda")]
    #[error(transparent)]
    Cuda(#[from] crate::backend::CudaError),
}

/// Result alias with [`Error`] as the default error type.
pub type Result<T, E = Error> = std::result::Result<T, E>;
