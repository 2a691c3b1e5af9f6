//! Normalization parameter estimation
//!
//! Every estimate is a complete read-only pass over a derived field. The
//! result is wrapped in a [`Normalization`], which can only be built here,
//! so scoring code cannot run ahead of its statistic.

use tracing::debug;

use crate::error::{Result, SheetnessError};
use crate::hessian::HessianField;
use crate::parallel;
use crate::volume::{Geometry, Volume};

/// Summary statistics of a scalar field
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Statistics {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub count: usize,
}

/// Partial sums of one reduction chunk
#[derive(Clone, Copy)]
struct Partial {
    min: f64,
    max: f64,
    sum: f64,
    count: usize,
}

impl Partial {
    const EMPTY: Partial = Partial {
        min: f64::INFINITY,
        max: f64::NEG_INFINITY,
        sum: 0.0,
        count: 0,
    };

    /// Non-finite samples are skipped
    #[inline]
    fn push(&mut self, v: f64) {
        if !v.is_finite() {
            return;
        }
        self.min = self.min.min(v);
        self.max = self.max.max(v);
        self.sum += v;
        self.count += 1;
    }

    fn merge(self, other: Partial) -> Partial {
        Partial {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
            sum: self.sum + other.sum,
            count: self.count + other.count,
        }
    }

    fn finish(self) -> Option<Statistics> {
        if self.count == 0 {
            return None;
        }
        Some(Statistics {
            min: self.min,
            max: self.max,
            mean: self.sum / self.count as f64,
            count: self.count,
        })
    }
}

/// Chunked reduction over the voxels accepted by `keep`
fn reduce<F>(data: &[f64], keep: F) -> Partial
where
    F: Fn(usize) -> bool + Sync + Send,
{
    parallel::map_chunks(data.len(), |range| {
        let mut partial = Partial::EMPTY;
        for i in range {
            if keep(i) {
                partial.push(data[i]);
            }
        }
        partial
    })
    .into_iter()
    .fold(Partial::EMPTY, Partial::merge)
}

/// Global min, max, mean and count of the finite samples
pub fn statistics(field: &Volume<f64>) -> Statistics {
    reduce(field.data(), |_| true).finish().unwrap_or(Statistics {
        min: 0.0,
        max: 0.0,
        mean: 0.0,
        count: 0,
    })
}

/// Statistics over the voxels carrying one label
///
/// Fails when the label field is on a different grid or the label does
/// not occur at all.
pub fn label_statistics(field: &Volume<f64>, selection: &LabelSelection<'_>) -> Result<Statistics> {
    selection.labels.geometry().ensure_matches(field.geometry(), "label field")?;

    let labels = selection.labels.data();
    let label = selection.label;
    reduce(field.data(), |i| labels[i] == label)
        .finish()
        .ok_or(SheetnessError::LabelNotFound(label))
}

/// A label field together with the label of interest
#[derive(Clone, Copy, Debug)]
pub struct LabelSelection<'a> {
    pub labels: &'a Volume<u32>,
    pub label: u32,
}

impl<'a> LabelSelection<'a> {
    pub fn new(labels: &'a Volume<u32>, label: u32) -> Self {
        Self { labels, label }
    }

    /// Check that the selection can be used on `geometry`
    pub fn validate(&self, geometry: &Geometry) -> Result<()> {
        self.labels.geometry().ensure_matches(geometry, "label field")?;
        if !self.labels.data().iter().any(|&l| l == self.label) {
            return Err(SheetnessError::LabelNotFound(self.label));
        }
        Ok(())
    }
}

/// Which reduction produced a normalization constant
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NormalizationSource {
    /// Scale factor times the maximum Hessian Frobenius norm
    FrobeniusMaximum,
    /// Mean Hessian trace
    MeanTrace,
}

/// Normalization constant produced by a completed reduction pass
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Normalization {
    value: f64,
    source: NormalizationSource,
}

impl Normalization {
    pub(crate) fn new(value: f64, source: NormalizationSource) -> Self {
        Self { value, source }
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn source(&self) -> NormalizationSource {
        self.source
    }
}

/// Noise normalization C = scale_factor * max(derived)
///
/// `derived` is usually the per-voxel Hessian Frobenius norm. With a label
/// selection the maximum is taken over that label only.
pub fn estimate_noise_normalization(
    derived: &Volume<f64>,
    scale_factor: f64,
    labels: Option<&LabelSelection<'_>>,
) -> Result<Normalization> {
    if !(scale_factor > 0.0 && scale_factor <= 1.0) {
        return Err(SheetnessError::InvalidScaleFactor(scale_factor));
    }

    let stats = match labels {
        Some(selection) => label_statistics(derived, selection)?,
        None => statistics(derived),
    };

    let c = scale_factor * stats.max;
    debug!(max = stats.max, voxels = stats.count, c, "noise normalization");
    Ok(Normalization::new(c, NormalizationSource::FrobeniusMaximum))
}

/// Mean Hessian trace, optionally restricted to a label
pub fn estimate_mean_trace(
    hessian: &HessianField,
    labels: Option<&LabelSelection<'_>>,
) -> Result<Normalization> {
    let trace = hessian.trace();
    let stats = match labels {
        Some(selection) => label_statistics(&trace, selection)?,
        None => statistics(&trace),
    };

    debug!(sigma = hessian.sigma(), mean_trace = stats.mean, "mean trace");
    Ok(Normalization::new(stats.mean, NormalizationSource::MeanTrace))
}
