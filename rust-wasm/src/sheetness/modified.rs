//! Modified sheetness measure
//!
//! For eigenvalues sorted so that |a1| <= |a2| <= |a3| with magnitudes
//! l1 <= l2 <= l3:
//!
//! ```text
//! Rt    = l1 / (l2 + l3)
//! Rn    = sqrt(l1^2 + l2^2 + l3^2)
//! score = p * (a3 / l3) * exp(-Rt^2 / (2 alpha^2)) * (1 - exp(-Rn^2 / (2 C^2)))
//! ```
//!
//! C is a fraction of the maximum Hessian Frobenius norm.

use super::{check_positive, Polarity, SheetnessMeasure};
use crate::eigen::EigenTriple;
use crate::error::{Result, SheetnessError};
use crate::estimation::{estimate_noise_normalization, LabelSelection, Normalization};
use crate::hessian::HessianField;

/// Parameters of the modified sheetness measure
#[derive(Clone, Debug, PartialEq)]
pub struct ModifiedSheetness {
    /// Plate-shape sensitivity, default 0.5
    pub alpha: f64,
    /// Fraction of the maximum Frobenius norm used as C, default 0.1
    pub scale_factor: f64,
    pub polarity: Polarity,
}

impl Default for ModifiedSheetness {
    fn default() -> Self {
        Self {
            alpha: 0.5,
            scale_factor: 0.1,
            polarity: Polarity::Bright,
        }
    }
}

impl ModifiedSheetness {
    /// Score one eigenvalue triple with an explicit C
    pub fn evaluate(&self, eigenvalues: &EigenTriple, c: f64) -> f64 {
        let sorted = eigenvalues.sort_by_magnitude();
        let [l1, l2, l3] = sorted.magnitude;
        let a3 = sorted.signed[2];

        if l3 < f64::EPSILON {
            return 0.0;
        }

        let rt = l1 / (l2 + l3);
        let rn2 = l1 * l1 + l2 * l2 + l3 * l3;

        let plate = (-(rt * rt) / (2.0 * self.alpha * self.alpha)).exp();
        let contrast = 1.0 - (-rn2 / (2.0 * c * c)).exp();

        self.polarity.multiplier() * (a3 / l3) * plate * contrast
    }
}

impl SheetnessMeasure for ModifiedSheetness {
    fn name(&self) -> &'static str {
        "modified"
    }

    fn validate(&self) -> Result<()> {
        check_positive("alpha", self.alpha)?;
        if !(self.scale_factor > 0.0 && self.scale_factor <= 1.0) {
            return Err(SheetnessError::InvalidScaleFactor(self.scale_factor));
        }
        Ok(())
    }

    fn estimate(
        &self,
        hessian: &HessianField,
        labels: Option<&LabelSelection<'_>>,
    ) -> Result<Normalization> {
        estimate_noise_normalization(&hessian.frobenius_norm(), self.scale_factor, labels)
    }

    fn score(&self, eigenvalues: &EigenTriple, normalization: &Normalization) -> f64 {
        self.evaluate(eigenvalues, normalization.value())
    }
}
