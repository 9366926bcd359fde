//! Error types for loading, validation, aggregation and export.
//!
//! Per-source failures (`DecodeError`) are reported item by item; every other
//! error aborts only the current attempt and leaves session state intact.

use thiserror::Error;

/// Result alias for session-level operations.
pub type Result<T> = std::result::Result<T, SessionError>;

/// A source could not be decoded into a single-band grid.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("failed to decode {id}: {reason}")]
pub struct DecodeError {
    /// Identifier of the failing source (its file name).
    pub id: String,
    pub reason: String,
}

impl DecodeError {
    pub fn new(id: impl Into<String>, reason: impl ToString) -> Self {
        Self {
            id: id.into(),
            reason: reason.to_string(),
        }
    }
}

/// A weight assignment violated one of its constraints.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum WeightError {
    #[error("weights do not match loaded layers (missing: {missing:?}, unexpected: {unexpected:?})")]
    Incomplete {
        missing: Vec<String>,
        unexpected: Vec<String>,
    },

    #[error("weight for {id} is {weight}, outside [0, 1]")]
    OutOfRange { id: String, weight: f64 },

    #[error("weights sum to {sum}, expected 1")]
    NotNormalized { sum: f64 },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AggregateError {
    #[error("no layers to aggregate")]
    NoLayers,

    #[error("layer {id} has shape {found:?}, expected {expected:?}")]
    ShapeMismatch {
        id: String,
        expected: (usize, usize),
        found: (usize, usize),
    },

    #[error("no weight assigned to layer {id}")]
    MissingWeight { id: String },
}

/// No reference layer metadata to georeference the output from.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("no reference layer metadata available for export")]
pub struct MetadataUnavailable;

#[derive(Error, Debug)]
pub enum EncodeError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TIFF encoding error: {0}")]
    Tiff(#[from] tiff::TiffError),

    #[error("invalid raster: {0}")]
    InvalidData(String),
}

/// Umbrella error for [`Session`](crate::session::Session) operations.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    Weights(#[from] WeightError),

    #[error(transparent)]
    Aggregate(#[from] AggregateError),

    #[error(transparent)]
    Metadata(#[from] MetadataUnavailable),

    #[error("no combined grid; run the calculation first")]
    NotCalculated,

    #[error(transparent)]
    Encode(#[from] EncodeError),
}
