//! Multi-scale aggregation
//!
//! Each voxel keeps whichever response has the larger absolute value. Ties
//! go to the first operand, so the fold is deterministic.

use crate::error::{Result, SheetnessError};
use crate::utils::simd_ops::max_abs_select;
use crate::volume::Volume;

/// Larger-magnitude of two values; `a` on ties
#[inline]
pub fn max_abs(a: f64, b: f64) -> f64 {
    if a.abs() >= b.abs() { a } else { b }
}

/// Voxel-wise maximum absolute value of two fields on the same grid
pub fn maximum_absolute_value(a: &Volume<f64>, b: &Volume<f64>) -> Result<Volume<f64>> {
    a.geometry().ensure_matches(b.geometry(), "aggregation")?;
    let data = max_abs_select(a.data(), b.data());
    Ok(Volume::from_parts(data, a.geometry().clone()))
}

/// Running maximum-absolute-value fold
///
/// Holds at most one accumulated field, so a run over N scales never keeps
/// more than two fields alive at once.
#[derive(Debug, Default)]
pub struct ScaleFold {
    acc: Option<Volume<f64>>,
    folded: usize,
}

impl ScaleFold {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one more field into the running result
    pub fn push(&mut self, field: Volume<f64>) -> Result<()> {
        self.acc = Some(match self.acc.take() {
            None => field,
            Some(acc) => maximum_absolute_value(&acc, &field)?,
        });
        self.folded += 1;
        Ok(())
    }

    /// Number of fields folded so far
    pub fn len(&self) -> usize {
        self.folded
    }

    pub fn is_empty(&self) -> bool {
        self.folded == 0
    }

    pub fn finish(self) -> Result<Volume<f64>> {
        self.acc.ok_or(SheetnessError::EmptyScaleList)
    }
}

/// Fold per-scale fields left to right
pub fn aggregate_scales<I>(fields: I) -> Result<Volume<f64>>
where
    I: IntoIterator<Item = Volume<f64>>,
{
    let mut fold = ScaleFold::new();
    for field in fields {
        fold.push(field)?;
    }
    fold.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::volume::Geometry;

    fn field(values: Vec<f64>) -> Volume<f64> {
        let n = values.len();
        Volume::new(values, Geometry::new((n, 1, 1), (1.0, 1.0, 1.0))).unwrap()
    }

    #[test]
    fn test_max_abs_scalar() {
        assert_eq!(max_abs(1.0, -2.0), -2.0);
        assert_eq!(max_abs(-3.0, 2.0), -3.0);
        assert_eq!(max_abs(2.0, -2.0), 2.0);
        assert_eq!(max_abs(-2.0, 2.0), -2.0);
    }

    #[test]
    fn test_aggregate_is_idempotent() {
        let s = field(vec![0.3, -0.9, 0.0, 0.5, -0.1]);
        assert_eq!(maximum_absolute_value(&s, &s).unwrap(), s);
    }

    #[test]
    fn test_aggregate_picks_larger_magnitude() {
        let a = field(vec![0.3, -0.9, 0.0, 0.5, -0.1]);
        let b = field(vec![-0.4, 0.2, 0.0, -0.5, 0.05]);
        let out = maximum_absolute_value(&a, &b).unwrap();
        assert_eq!(out.data(), &[-0.4, -0.9, 0.0, 0.5, -0.1]);
    }

    #[test]
    fn test_aggregate_geometry_mismatch() {
        let a = field(vec![0.0; 4]);
        let b = Volume::new(vec![0.0; 4], Geometry::new((2, 2, 1), (1.0, 1.0, 1.0))).unwrap();
        assert!(matches!(
            maximum_absolute_value(&a, &b),
            Err(SheetnessError::GeometryMismatch(_))
        ));
    }

    #[test]
    fn test_fold_order_does_not_matter_without_ties() {
        let a = field(vec![0.1, -0.7, 0.3]);
        let b = field(vec![-0.5, 0.2, 0.25]);
        let c = field(vec![0.2, 0.6, -0.9]);

        let abc = aggregate_scales(vec![a.clone(), b.clone(), c.clone()]).unwrap();
        let cba = aggregate_scales(vec![c, b, a]).unwrap();
        assert_eq!(abc, cba);
        assert_eq!(abc.data(), &[-0.5, -0.7, -0.9]);
    }

    #[test]
    fn test_scale_fold_counts_fields() {
        let mut fold = ScaleFold::new();
        assert!(fold.is_empty());
        fold.push(field(vec![0.1, -0.2])).unwrap();
        fold.push(field(vec![-0.3, 0.1])).unwrap();
        assert_eq!(fold.len(), 2);
        assert_eq!(fold.finish().unwrap().data(), &[-0.3, -0.2]);
    }

    #[test]
    fn test_fold_of_nothing_is_an_error() {
        assert!(matches!(
            aggregate_scales(Vec::new()),
            Err(SheetnessError::EmptyScaleList)
        ));
    }
}
