//! Separable Gaussian smoothing and finite-difference derivatives
//!
//! The kernel is a sampled Gaussian truncated at ceil(3 sigma) and
//! normalized to unit sum. Near the volume border only the in-bounds taps
//! are used and renormalized, so a constant image stays constant.

use crate::error::{Result, SheetnessError};
use crate::parallel;
use crate::volume::Volume;

/// Voxel axis
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    /// Linear index step between neighbours along this axis
    #[inline]
    fn stride(self, nx: usize, ny: usize) -> usize {
        match self {
            Axis::X => 1,
            Axis::Y => nx,
            Axis::Z => nx * ny,
        }
    }

    #[inline]
    fn extent(self, dims: (usize, usize, usize)) -> usize {
        match self {
            Axis::X => dims.0,
            Axis::Y => dims.1,
            Axis::Z => dims.2,
        }
    }

    /// Coordinate along this axis of linear index `idx`
    #[inline]
    fn position(self, idx: usize, nx: usize, ny: usize) -> usize {
        match self {
            Axis::X => idx % nx,
            Axis::Y => (idx / nx) % ny,
            Axis::Z => idx / (nx * ny),
        }
    }

    fn spacing(self, voxel_size: (f64, f64, f64)) -> f64 {
        match self {
            Axis::X => voxel_size.0,
            Axis::Y => voxel_size.1,
            Axis::Z => voxel_size.2,
        }
    }
}

/// Sampled, normalized 1D Gaussian kernel (sigma in voxels)
///
/// The radius is ceil(3 sigma), capped at `max_radius`. Returns the single
/// tap `[1.0]` for sigma <= 0.
pub fn gaussian_kernel_1d(sigma: f64, max_radius: usize) -> Vec<f64> {
    if !(sigma > 0.0) {
        return vec![1.0];
    }

    // float-to-int casts saturate, so huge sigmas land on the cap
    let kernel_radius = ((3.0 * sigma).ceil() as usize).min(max_radius);
    let kernel_size = 2 * kernel_radius + 1;

    let mut kernel: Vec<f64> = (0..kernel_size)
        .map(|i| {
            let x = i as f64 - kernel_radius as f64;
            (-x * x / (2.0 * sigma * sigma)).exp()
        })
        .collect();

    let sum: f64 = kernel.iter().sum();
    for k in kernel.iter_mut() {
        *k /= sum;
    }

    kernel
}

/// Apply 1D convolution along one axis
pub fn convolve_axis(
    data: &[f64],
    dims: (usize, usize, usize),
    kernel: &[f64],
    axis: Axis,
) -> Vec<f64> {
    let (nx, ny, _) = dims;
    let n_total = data.len();
    let kernel_radius = (kernel.len() - 1) / 2;
    let stride = axis.stride(nx, ny) as isize;
    let extent = axis.extent(dims) as isize;

    if kernel.len() == 1 {
        return data.to_vec();
    }

    parallel::map_index(n_total, |idx| {
        let pos = axis.position(idx, nx, ny) as isize;
        let mut sum = 0.0;
        let mut weight_sum = 0.0;

        for (ki, &w) in kernel.iter().enumerate() {
            let offset = ki as isize - kernel_radius as isize;
            let p = pos + offset;
            if p >= 0 && p < extent {
                let n = (idx as isize + offset * stride) as usize;
                sum += data[n] * w;
                weight_sum += w;
            }
        }

        if weight_sum > 0.0 { sum / weight_sum } else { 0.0 }
    })
}

/// 3D Gaussian smoothing using separable 1D convolutions
///
/// `sigma` is given per axis in voxels. Kernels never reach further than
/// the extent of their axis; taps past the border would be dropped by the
/// renormalization anyway.
pub fn gaussian_smooth_3d(
    data: &[f64],
    dims: (usize, usize, usize),
    sigma: (f64, f64, f64),
) -> Vec<f64> {
    let kernel = |s: f64, axis: Axis| gaussian_kernel_1d(s, axis.extent(dims).saturating_sub(1));
    let smoothed_x = convolve_axis(data, dims, &kernel(sigma.0, Axis::X), Axis::X);
    let smoothed_xy = convolve_axis(&smoothed_x, dims, &kernel(sigma.1, Axis::Y), Axis::Y);
    convolve_axis(&smoothed_xy, dims, &kernel(sigma.2, Axis::Z), Axis::Z)
}

/// Convert a physical standard deviation (mm) to per-axis voxel units
pub fn sigma_in_voxels(sigma: f64, voxel_size: (f64, f64, f64)) -> (f64, f64, f64) {
    (sigma / voxel_size.0, sigma / voxel_size.1, sigma / voxel_size.2)
}

/// Discrete Gaussian blur with the given variance in physical units (mm^2)
///
/// Variance 0 returns a copy of the input.
pub fn gaussian_blur(volume: &Volume<f64>, variance: f64) -> Result<Volume<f64>> {
    if !(variance >= 0.0) {
        return Err(SheetnessError::NegativeVariance(variance));
    }

    let sigma = sigma_in_voxels(variance.sqrt(), volume.voxel_size());
    let blurred = gaussian_smooth_3d(volume.data(), volume.dims(), sigma);
    Ok(Volume::from_parts(blurred, volume.geometry().clone()))
}

/// First derivative along one axis in physical units
///
/// Central differences in the interior, one-sided at the borders,
/// zero along axes with a single sample.
pub fn derivative_axis(
    data: &[f64],
    dims: (usize, usize, usize),
    voxel_size: (f64, f64, f64),
    axis: Axis,
) -> Vec<f64> {
    let (nx, ny, _) = dims;
    let stride = axis.stride(nx, ny);
    let extent = axis.extent(dims);
    let h = axis.spacing(voxel_size);

    if extent < 2 {
        return vec![0.0; data.len()];
    }

    parallel::map_index(data.len(), |idx| {
        let pos = axis.position(idx, nx, ny);
        if pos == 0 {
            (data[idx + stride] - data[idx]) / h
        } else if pos == extent - 1 {
            (data[idx] - data[idx - stride]) / h
        } else {
            (data[idx + stride] - data[idx - stride]) / (2.0 * h)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::volume::Geometry;
    use approx::assert_relative_eq;

    #[test]
    fn test_kernel_normalized_and_symmetric() {
        let kernel = gaussian_kernel_1d(1.5, 64);
        assert_eq!(kernel.len(), 2 * 5 + 1);
        assert_relative_eq!(kernel.iter().sum::<f64>(), 1.0, epsilon = 1e-12);
        for i in 0..kernel.len() / 2 {
            assert_eq!(kernel[i], kernel[kernel.len() - 1 - i]);
        }
    }

    #[test]
    fn test_kernel_radius_is_capped() {
        assert_eq!(gaussian_kernel_1d(1e17, 4).len(), 9);
        assert_eq!(gaussian_kernel_1d(f64::INFINITY, 2).len(), 5);
        assert_eq!(gaussian_kernel_1d(1.0, 0), vec![1.0]);
        assert_eq!(gaussian_kernel_1d(f64::NAN, 4), vec![1.0]);

        let kernel = gaussian_kernel_1d(1e17, 4);
        assert_relative_eq!(kernel.iter().sum::<f64>(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_huge_sigma_smooths_to_the_mean() {
        let data: Vec<f64> = (0..24).map(|v| v as f64).collect();
        let smoothed = gaussian_smooth_3d(&data, (4, 3, 2), (1e17, 1e17, 1e17));
        for &v in &smoothed {
            assert_relative_eq!(v, 11.5, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_zero_sigma_is_identity() {
        let data: Vec<f64> = (0..27).map(|v| v as f64).collect();
        let smoothed = gaussian_smooth_3d(&data, (3, 3, 3), (0.0, 0.0, 0.0));
        assert_eq!(smoothed, data);
    }

    #[test]
    fn test_smoothing_constant_field() {
        let data = vec![5.0; 6 * 5 * 4];
        let smoothed = gaussian_smooth_3d(&data, (6, 5, 4), (1.0, 1.0, 1.0));
        for &v in &smoothed {
            assert!((v - 5.0).abs() < 1e-10);
        }
    }

    #[test]
    fn test_smoothing_preserves_mass_away_from_border() {
        let dims = (15, 1, 1);
        let mut data = vec![0.0; 15];
        data[7] = 1.0;

        let smoothed = convolve_axis(&data, dims, &gaussian_kernel_1d(1.0, 64), Axis::X);
        assert_relative_eq!(smoothed.iter().sum::<f64>(), 1.0, epsilon = 1e-12);
        assert!(smoothed[7] > smoothed[6]);
        assert_eq!(smoothed[6], smoothed[8]);
    }

    #[test]
    fn test_convolve_along_z_only_touches_z() {
        let dims = (2, 2, 5);
        let mut data = vec![0.0; 20];
        // voxel (1, 1, 2)
        data[1 + 2 + 2 * 4] = 1.0;

        let out = convolve_axis(&data, dims, &gaussian_kernel_1d(1.0, 64), Axis::Z);
        for k in 0..5 {
            assert_eq!(out[k * 4], 0.0);
            assert!(out[3 + k * 4] > 0.0);
        }
    }

    #[test]
    fn test_derivative_linear_ramp() {
        let dims = (5, 3, 3);
        let mut data = vec![0.0; 45];
        for k in 0..3 {
            for j in 0..3 {
                for i in 0..5 {
                    data[i + j * 5 + k * 15] = 3.0 * i as f64;
                }
            }
        }

        let dx = derivative_axis(&data, dims, (0.5, 1.0, 1.0), Axis::X);
        for &v in &dx {
            assert_relative_eq!(v, 6.0, epsilon = 1e-12);
        }

        let dy = derivative_axis(&data, dims, (0.5, 1.0, 1.0), Axis::Y);
        assert!(dy.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_derivative_single_sample_axis() {
        let data = vec![1.0, 2.0, 3.0];
        let dz = derivative_axis(&data, (3, 1, 1), (1.0, 1.0, 1.0), Axis::Z);
        assert_eq!(dz, vec![0.0; 3]);
    }

    #[test]
    fn test_blur_rejects_negative_variance() {
        let vol = Volume::filled(Geometry::new((3, 3, 3), (1.0, 1.0, 1.0)), 0.0).unwrap();
        assert!(matches!(
            gaussian_blur(&vol, -1.0),
            Err(SheetnessError::NegativeVariance(_))
        ));
    }

    #[test]
    fn test_blur_uses_physical_spacing() {
        let geom = Geometry::new((9, 1, 1), (2.0, 1.0, 1.0));
        let mut data = vec![0.0; 9];
        data[4] = 1.0;
        let vol = Volume::new(data, geom).unwrap();

        // variance 4 mm^2 at 2 mm spacing is sigma = 1 voxel
        let blurred = gaussian_blur(&vol, 4.0).unwrap();
        let reference = convolve_axis(vol.data(), (9, 1, 1), &gaussian_kernel_1d(1.0, 64), Axis::X);
        for (&b, &r) in blurred.data().iter().zip(reference.iter()) {
            assert_relative_eq!(b, r, epsilon = 1e-14);
        }
    }
}
