//! Krcah sheetness measure
//!
//! Krcah, Szekely, Blanc: "Fully automatic and fast segmentation of the
//! femur bone from 3D-CT images with no shape prior", ISBI 2011.
//!
//! With |a1| <= |a2| <= |a3|, magnitudes l1 <= l2 <= l3 and T the mean
//! Hessian trace of the current scale:
//!
//! ```text
//! Rsheet = l2 / l3
//! Rtube  = l1 / (l2 * l3)
//! Rnoise = (l1 + l2 + l3) / |T|
//! score  = p * sign(a3) * exp(-Rsheet^2 / alpha^2) * exp(-Rtube^2 / beta^2)
//!                       * (1 - exp(-Rnoise^2 / gamma^2))
//! ```

use super::{check_positive, Polarity, SheetnessMeasure};
use crate::eigen::EigenTriple;
use crate::error::Result;
use crate::estimation::{estimate_mean_trace, LabelSelection, Normalization};
use crate::hessian::HessianField;

/// Parameters of the Krcah sheetness measure
#[derive(Clone, Debug, PartialEq)]
pub struct KrcahSheetness {
    /// Sheet versus tube/blob, default 0.5
    pub alpha: f64,
    /// Tube versus blob, default 0.5
    pub beta: f64,
    /// Noise suppression relative to the mean trace, default 0.25
    pub gamma: f64,
    pub polarity: Polarity,
}

impl Default for KrcahSheetness {
    fn default() -> Self {
        Self {
            alpha: 0.5,
            beta: 0.5,
            gamma: 0.25,
            polarity: Polarity::Bright,
        }
    }
}

impl KrcahSheetness {
    /// Score one eigenvalue triple against the mean trace of its scale
    pub fn evaluate(&self, eigenvalues: &EigenTriple, mean_trace: f64) -> f64 {
        let sorted = eigenvalues.sort_by_magnitude();
        let [l1, l2, l3] = sorted.magnitude;
        let a3 = sorted.signed[2];

        if l3 < f64::EPSILON {
            return 0.0;
        }

        let r_sheet = l2 / l3;

        let l23 = l2 * l3;
        let r_tube = if l23 < f64::EPSILON { 0.0 } else { l1 / l23 };

        let trace = mean_trace.abs();
        let noise = if trace < f64::EPSILON {
            1.0
        } else {
            let r_noise = (l1 + l2 + l3) / trace;
            1.0 - (-(r_noise * r_noise) / (self.gamma * self.gamma)).exp()
        };

        let sheet = (-(r_sheet * r_sheet) / (self.alpha * self.alpha)).exp();
        let tube = (-(r_tube * r_tube) / (self.beta * self.beta)).exp();

        self.polarity.multiplier() * a3.signum() * sheet * tube * noise
    }
}

impl SheetnessMeasure for KrcahSheetness {
    fn name(&self) -> &'static str {
        "krcah"
    }

    fn validate(&self) -> Result<()> {
        check_positive("alpha", self.alpha)?;
        check_positive("beta", self.beta)?;
        check_positive("gamma", self.gamma)
    }

    fn estimate(
        &self,
        hessian: &HessianField,
        labels: Option<&LabelSelection<'_>>,
    ) -> Result<Normalization> {
        estimate_mean_trace(hessian, labels)
    }

    fn score(&self, eigenvalues: &EigenTriple, normalization: &Normalization) -> f64 {
        self.evaluate(eigenvalues, normalization.value())
    }
}
