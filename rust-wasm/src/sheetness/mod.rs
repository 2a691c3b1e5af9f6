//! Sheetness measures
//!
//! A measure turns the sorted eigenvalues of one Hessian sample into a
//! plate-likeness score in [-1, 1]. Scoring needs a [`Normalization`], and
//! each measure says which full-volume reduction produces it, so a score can
//! never be computed before its statistic exists.
//!
//! - [`KrcahSheetness`]: Krcah et al. (2011), normalized by the mean
//!   Hessian trace of the current scale
//! - [`ModifiedSheetness`]: Descoteaux-style measure, normalized by a
//!   fraction of the maximum Hessian Frobenius norm

pub mod krcah;
pub mod modified;

pub use krcah::KrcahSheetness;
pub use modified::ModifiedSheetness;

use crate::eigen::EigenTriple;
use crate::error::{Result, SheetnessError};
use crate::estimation::{LabelSelection, Normalization};
use crate::hessian::HessianField;

/// Which plates a measure responds to
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Polarity {
    /// Plates brighter than their surroundings (e.g. cortical bone in CT)
    #[default]
    Bright,
    /// Plates darker than their surroundings
    Dark,
}

impl Polarity {
    /// Sign applied to the raw score
    ///
    /// A bright plate has a large negative eigenvalue across the plate, so
    /// bright polarity flips the sign to make it score positive.
    pub fn multiplier(self) -> f64 {
        match self {
            Polarity::Bright => -1.0,
            Polarity::Dark => 1.0,
        }
    }

    pub fn from_dark(dark: bool) -> Self {
        if dark { Polarity::Dark } else { Polarity::Bright }
    }
}

/// Fail unless a shape parameter is positive and finite
pub(crate) fn check_positive(name: &'static str, value: f64) -> Result<()> {
    if value > 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(SheetnessError::InvalidParameter { name, value })
    }
}

/// Scoring capability used by the scale runner
pub trait SheetnessMeasure: Sync {
    /// Short name used in log messages
    fn name(&self) -> &'static str;

    /// Reject parameters the measure cannot score with
    fn validate(&self) -> Result<()>;

    /// Reduce the Hessian field of one scale to this measure's
    /// normalization constant
    fn estimate(
        &self,
        hessian: &HessianField,
        labels: Option<&LabelSelection<'_>>,
    ) -> Result<Normalization>;

    /// Score one eigenvalue triple (any order)
    fn score(&self, eigenvalues: &EigenTriple, normalization: &Normalization) -> f64;
}
