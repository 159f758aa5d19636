//! Error types for the precompute pipeline.

use thiserror::Error;
use crate::labels::StateLabel;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// A label outside the enumerated space was required to exist.
    #[error("label not found: {0}")]
    LabelNotFound(StateLabel),

    /// A field-dependent array does not match the field-independent topology.
    #[error("shape mismatch for `{name}`: expected {expected:?}, got {got:?}")]
    Shape {
        name: &'static str,
        expected: Vec<usize>,
        got: Vec<usize>,
    },

    #[error("invalid field grid: {0}")]
    FieldGrid(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("missing array `{0}` in input archive")]
    MissingArray(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("npz read error: {0}")]
    NpzRead(#[from] ndarray_npy::ReadNpzError),

    #[error("npz write error: {0}")]
    NpzWrite(#[from] ndarray_npy::WriteNpzError),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl Error {
    pub(crate) fn shape(name: &'static str, expected: &[usize], got: &[usize])
        -> Self
    {
        Self::Shape { name, expected: expected.to_vec(), got: got.to_vec() }
    }
}

/// Failure of a single field sample; recorded instead of aborting the batch.
#[derive(Clone, Debug, PartialEq, Error)]
#[error("field sample {field_index} failed: {reason}")]
pub struct SampleFailure {
    pub field_index: usize,
    pub reason: String,
}
