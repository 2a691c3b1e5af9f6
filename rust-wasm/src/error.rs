//! Error types for the sheetness pipeline
//!
//! Configuration problems are rejected before any voxel work starts.
//! Per-voxel numeric trouble (flat regions, eigen-solver non-convergence)
//! never surfaces here; it is recovered locally with a score of 0.

use thiserror::Error;

/// Main error type for sheetness operations
#[derive(Error, Debug)]
pub enum SheetnessError {
    #[error("Scale list is empty")]
    EmptyScaleList,

    #[error("Scale must be positive and finite, got {0}")]
    InvalidScale(f64),

    #[error("Gaussian variance must be non-negative, got {0}")]
    NegativeVariance(f64),

    #[error("Scale factor must lie in (0, 1], got {0}")]
    InvalidScaleFactor(f64),

    #[error("Parameter {name} must be positive and finite, got {value}")]
    InvalidParameter { name: &'static str, value: f64 },

    #[error("Voxel size must be positive and finite, got {0}")]
    InvalidVoxelSize(f64),

    #[error("Label {0} is not present in the label field")]
    LabelNotFound(u32),

    #[error("Geometry mismatch: {0}")]
    GeometryMismatch(String),

    #[error("Data length {actual} does not match dimensions {nx}x{ny}x{nz}")]
    DimensionMismatch {
        nx: usize,
        ny: usize,
        nz: usize,
        actual: usize,
    },

    #[error("NIfTI error: {0}")]
    Nifti(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<nifti::NiftiError> for SheetnessError {
    fn from(e: nifti::NiftiError) -> Self {
        SheetnessError::Nifti(e.to_string())
    }
}

/// Result type alias for sheetness operations
pub type Result<T> = std::result::Result<T, SheetnessError>;
