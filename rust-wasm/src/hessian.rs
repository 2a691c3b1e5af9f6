//! Hessian field at a given scale
//!
//! The volume is smoothed with a Gaussian of standard deviation `sigma`
//! (physical units), then differentiated twice with central differences
//! divided by the voxel spacing.

use crate::eigen::SymmetricMatrix3;
use crate::error::{Result, SheetnessError};
use crate::kernels::gaussian::{derivative_axis, gaussian_smooth_3d, sigma_in_voxels, Axis};
use crate::parallel;
use crate::volume::{Geometry, Volume};

/// Per-voxel symmetric Hessian, six independent components
#[derive(Clone, Debug)]
pub struct HessianField {
    pub xx: Vec<f64>,
    pub yy: Vec<f64>,
    pub zz: Vec<f64>,
    pub xy: Vec<f64>,
    pub xz: Vec<f64>,
    pub yz: Vec<f64>,
    geometry: Geometry,
    sigma: f64,
}

impl HessianField {
    /// Compute the Hessian of `volume` at scale `sigma`
    ///
    /// With `normalize_across_scale` every component is multiplied by
    /// sigma^2 so responses at different scales are comparable.
    pub fn compute(volume: &Volume<f64>, sigma: f64, normalize_across_scale: bool) -> Result<Self> {
        if !(sigma > 0.0) || !sigma.is_finite() {
            return Err(SheetnessError::InvalidScale(sigma));
        }

        let dims = volume.dims();
        let vs = volume.voxel_size();

        let smoothed = gaussian_smooth_3d(volume.data(), dims, sigma_in_voxels(sigma, vs));

        let dx = derivative_axis(&smoothed, dims, vs, Axis::X);
        let dy = derivative_axis(&smoothed, dims, vs, Axis::Y);
        let dz = derivative_axis(&smoothed, dims, vs, Axis::Z);
        drop(smoothed);

        let mut xx = derivative_axis(&dx, dims, vs, Axis::X);
        let mut xy = derivative_axis(&dx, dims, vs, Axis::Y);
        let mut xz = derivative_axis(&dx, dims, vs, Axis::Z);
        drop(dx);

        let mut yy = derivative_axis(&dy, dims, vs, Axis::Y);
        let mut yz = derivative_axis(&dy, dims, vs, Axis::Z);
        drop(dy);

        let mut zz = derivative_axis(&dz, dims, vs, Axis::Z);

        if normalize_across_scale {
            let scale_factor = sigma * sigma;
            for component in [&mut xx, &mut yy, &mut zz, &mut xy, &mut xz, &mut yz] {
                for v in component.iter_mut() {
                    *v *= scale_factor;
                }
            }
        }

        Ok(Self {
            xx,
            yy,
            zz,
            xy,
            xz,
            yz,
            geometry: volume.geometry().clone(),
            sigma,
        })
    }

    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    pub fn sigma(&self) -> f64 {
        self.sigma
    }

    pub fn len(&self) -> usize {
        self.xx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.xx.is_empty()
    }

    /// Hessian matrix at linear index `i`
    #[inline]
    pub fn matrix(&self, i: usize) -> SymmetricMatrix3 {
        SymmetricMatrix3 {
            xx: self.xx[i],
            yy: self.yy[i],
            zz: self.zz[i],
            xy: self.xy[i],
            xz: self.xz[i],
            yz: self.yz[i],
        }
    }

    /// Per-voxel trace (sum of eigenvalues)
    pub fn trace(&self) -> Volume<f64> {
        let data = parallel::map_index(self.len(), |i| self.matrix(i).trace());
        Volume::from_parts(data, self.geometry.clone())
    }

    /// Per-voxel Frobenius norm
    pub fn frobenius_norm(&self) -> Volume<f64> {
        let data = parallel::map_index(self.len(), |i| self.matrix(i).frobenius_norm());
        Volume::from_parts(data, self.geometry.clone())
    }
}
