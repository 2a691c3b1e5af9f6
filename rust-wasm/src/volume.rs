//! 3D volume container with physical geometry
//!
//! Every stage of the pipeline produces a new `Volume` that carries a clone of
//! its input's `Geometry`, so spacing, origin and direction survive unchanged
//! from the reader to the writer.
//!
//! Data is stored in Fortran order (x varies fastest), matching NIfTI:
//! index = i + j*nx + k*nx*ny

use crate::error::{Result, SheetnessError};
use crate::parallel;

/// Convert 3D index to flat index (Fortran order)
#[inline(always)]
pub fn idx3d(i: usize, j: usize, k: usize, nx: usize, ny: usize) -> usize {
    i + j * nx + k * nx * ny
}

/// Physical geometry of a volume
#[derive(Clone, Debug, PartialEq)]
pub struct Geometry {
    /// Dimensions (nx, ny, nz)
    pub dims: (usize, usize, usize),
    /// Voxel sizes in mm
    pub voxel_size: (f64, f64, f64),
    /// Affine transformation matrix (4x4, row-major), voxel index to world
    pub affine: [f64; 16],
}

impl Geometry {
    /// Geometry with an axis-aligned affine scaled by the voxel size
    pub fn new(dims: (usize, usize, usize), voxel_size: (f64, f64, f64)) -> Self {
        let (vsx, vsy, vsz) = voxel_size;
        Self {
            dims,
            voxel_size,
            affine: [
                vsx, 0.0, 0.0, 0.0,
                0.0, vsy, 0.0, 0.0,
                0.0, 0.0, vsz, 0.0,
                0.0, 0.0, 0.0, 1.0,
            ],
        }
    }

    pub fn with_affine(
        dims: (usize, usize, usize),
        voxel_size: (f64, f64, f64),
        affine: [f64; 16],
    ) -> Self {
        Self { dims, voxel_size, affine }
    }

    /// Total number of voxels
    pub fn len(&self) -> usize {
        self.dims.0 * self.dims.1 * self.dims.2
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// World position of voxel (0, 0, 0)
    pub fn origin(&self) -> (f64, f64, f64) {
        (self.affine[3], self.affine[7], self.affine[11])
    }

    /// Direction cosines, one column per voxel axis
    pub fn direction(&self) -> [[f64; 3]; 3] {
        let a = &self.affine;
        let mut dir = [[0.0f64; 3]; 3];
        for col in 0..3 {
            let (x, y, z) = (a[col], a[4 + col], a[8 + col]);
            let norm = (x * x + y * y + z * z).sqrt();
            if norm > 0.0 {
                dir[0][col] = x / norm;
                dir[1][col] = y / norm;
                dir[2][col] = z / norm;
            }
        }
        dir
    }

    /// Fail unless every voxel size is positive and finite
    pub fn check_spacing(&self) -> Result<()> {
        let (vsx, vsy, vsz) = self.voxel_size;
        for v in [vsx, vsy, vsz] {
            if !(v > 0.0) || !v.is_finite() {
                return Err(SheetnessError::InvalidVoxelSize(v));
            }
        }
        Ok(())
    }

    /// Fail unless `other` describes exactly the same sampling grid
    pub fn ensure_matches(&self, other: &Geometry, what: &str) -> Result<()> {
        if self != other {
            return Err(SheetnessError::GeometryMismatch(format!(
                "{}: {:?} vs {:?}",
                what, self.dims, other.dims
            )));
        }
        Ok(())
    }
}

/// 3D scalar volume with geometry
#[derive(Clone, Debug, PartialEq)]
pub struct Volume<T = f64> {
    data: Vec<T>,
    geometry: Geometry,
}

impl<T> Volume<T> {
    /// Wrap a data buffer; its length must equal nx * ny * nz and be non-zero
    ///
    /// Voxel sizes must be positive and finite.
    pub fn new(data: Vec<T>, geometry: Geometry) -> Result<Self> {
        geometry.check_spacing()?;
        let (nx, ny, nz) = geometry.dims;
        if geometry.is_empty() || data.len() != geometry.len() {
            return Err(SheetnessError::DimensionMismatch {
                nx,
                ny,
                nz,
                actual: data.len(),
            });
        }
        Ok(Self { data, geometry })
    }

    /// Used by stages whose output length is known to match by construction
    pub(crate) fn from_parts(data: Vec<T>, geometry: Geometry) -> Self {
        debug_assert_eq!(data.len(), geometry.len());
        Self { data, geometry }
    }

    pub fn data(&self) -> &[T] {
        &self.data
    }

    pub fn into_data(self) -> Vec<T> {
        self.data
    }

    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    pub fn dims(&self) -> (usize, usize, usize) {
        self.geometry.dims
    }

    pub fn voxel_size(&self) -> (f64, f64, f64) {
        self.geometry.voxel_size
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn get(&self, i: usize, j: usize, k: usize) -> &T {
        let (nx, ny, _) = self.geometry.dims;
        &self.data[idx3d(i, j, k, nx, ny)]
    }
}

impl<T: Copy + Send + Sync> Volume<T> {
    pub fn filled(geometry: Geometry, value: T) -> Result<Self> {
        let data = vec![value; geometry.len()];
        Self::new(data, geometry)
    }

    /// Apply `f` to every voxel, keeping the geometry
    pub fn map<U, F>(&self, f: F) -> Volume<U>
    where
        U: Send,
        F: Fn(T) -> U + Sync + Send,
    {
        let data = parallel::map(&self.data, |&v| f(v));
        Volume::from_parts(data, self.geometry.clone())
    }

    /// Combine two volumes on the same grid voxel by voxel
    pub fn zip_map<U, V, F>(&self, other: &Volume<U>, f: F) -> Result<Volume<V>>
    where
        U: Copy + Send + Sync,
        V: Send,
        F: Fn(T, U) -> V + Sync + Send,
    {
        self.geometry.ensure_matches(&other.geometry, "zip_map")?;
        let data = parallel::zip_map(&self.data, &other.data, |&a, &b| f(a, b));
        Ok(Volume::from_parts(data, self.geometry.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_volume_rejects_wrong_length() {
        let geom = Geometry::new((2, 2, 2), (1.0, 1.0, 1.0));
        let err = Volume::new(vec![0.0f64; 7], geom).unwrap_err();
        assert!(matches!(err, SheetnessError::DimensionMismatch { actual: 7, .. }));
    }

    #[test]
    fn test_volume_rejects_empty_grid() {
        let geom = Geometry::new((0, 4, 4), (1.0, 1.0, 1.0));
        assert!(Volume::<f64>::new(Vec::new(), geom).is_err());
    }

    #[test]
    fn test_volume_rejects_degenerate_spacing() {
        for vs in [(0.0, 1.0, 1.0), (1.0, -0.5, 1.0), (1.0, 1.0, f64::NAN), (f64::INFINITY, 1.0, 1.0)] {
            let geom = Geometry::new((2, 2, 2), vs);
            assert!(matches!(
                Volume::new(vec![0.0f64; 8], geom),
                Err(SheetnessError::InvalidVoxelSize(_))
            ));
        }
    }

    #[test]
    fn test_fortran_indexing() {
        let geom = Geometry::new((2, 3, 4), (1.0, 1.0, 1.0));
        let data: Vec<f64> = (0..24).map(|v| v as f64).collect();
        let vol = Volume::new(data, geom).unwrap();

        assert_eq!(*vol.get(1, 0, 0), 1.0);
        assert_eq!(*vol.get(0, 1, 0), 2.0);
        assert_eq!(*vol.get(0, 0, 1), 6.0);
        assert_eq!(*vol.get(1, 2, 3), 23.0);
    }

    #[test]
    fn test_map_keeps_geometry() {
        let mut affine = Geometry::new((2, 2, 2), (0.5, 0.7, 1.2)).affine;
        affine[3] = -12.5;
        let geom = Geometry::with_affine((2, 2, 2), (0.5, 0.7, 1.2), affine);
        let vol = Volume::filled(geom.clone(), 2.0f64).unwrap();

        let doubled = vol.map(|v| v * 2.0);
        assert_eq!(doubled.geometry(), &geom);
        assert!(doubled.data().iter().all(|&v| v == 4.0));
    }

    #[test]
    fn test_zip_map_checks_geometry() {
        let a = Volume::filled(Geometry::new((2, 2, 2), (1.0, 1.0, 1.0)), 1.0f64).unwrap();
        let b = Volume::filled(Geometry::new((2, 2, 2), (2.0, 1.0, 1.0)), 1.0f64).unwrap();
        assert!(matches!(
            a.zip_map(&b, |x, y| x + y),
            Err(SheetnessError::GeometryMismatch(_))
        ));
    }

    #[test]
    fn test_origin_and_direction() {
        let affine = [
            0.0, -2.0, 0.0, 10.0,
            1.0, 0.0, 0.0, 20.0,
            0.0, 0.0, 3.0, 30.0,
            0.0, 0.0, 0.0, 1.0,
        ];
        let geom = Geometry::with_affine((4, 4, 4), (1.0, 2.0, 3.0), affine);
        assert_eq!(geom.origin(), (10.0, 20.0, 30.0));

        let dir = geom.direction();
        assert_eq!(dir[1][0], 1.0);
        assert_eq!(dir[0][1], -1.0);
        assert_eq!(dir[2][2], 1.0);
    }
}
