//! Unsharp-mask pre-enhancement
//!
//! E = I + k * (I - G_s * I), with G_s a discrete Gaussian of variance s
//! given in physical units (mm^2).

use crate::error::Result;
use crate::kernels::gaussian::gaussian_blur;
use crate::utils::simd_ops::unsharp_combine;
use crate::volume::Volume;

/// Unsharp-mask parameters
#[derive(Clone, Debug, PartialEq)]
pub struct UnsharpMask {
    /// Gaussian variance in mm^2, default 1.0
    pub variance: f64,
    /// Weight of the high-pass term, default 10.0
    pub scaling_constant: f64,
}

impl Default for UnsharpMask {
    fn default() -> Self {
        Self {
            variance: 1.0,
            scaling_constant: 10.0,
        }
    }
}

impl UnsharpMask {
    pub fn apply(&self, volume: &Volume<f64>) -> Result<Volume<f64>> {
        unsharp_mask(volume, self.variance, self.scaling_constant)
    }
}

/// Sharpen `volume` by adding back `k` times its high-pass component
///
/// Fails for a negative variance. Variance 0 or k = 0 return the input
/// values unchanged.
pub fn unsharp_mask(volume: &Volume<f64>, variance: f64, k: f64) -> Result<Volume<f64>> {
    let blurred = gaussian_blur(volume, variance)?;
    let enhanced = unsharp_combine(volume.data(), blurred.data(), k);
    Ok(Volume::from_parts(enhanced, volume.geometry().clone()))
}
