//! Multi-scale sheetness feature generator
//!
//! Stages run in a fixed order:
//!
//! 1. Enhancing: unsharp mask of the raw input, once per run
//! 2. Scoring: for every scale in list order, Hessian, normalization
//!    estimate, then eigenvalue scoring of every voxel
//! 3. Aggregating: maximum-absolute-value fold of the last response into
//!    the running result
//!
//! Responses of earlier scales are folded as soon as they are scored, so at
//! most two response fields are alive at once. All configuration, including
//! the measure's parameters, is validated before the first stage starts.

use tracing::{debug, info, warn};

use crate::aggregate::ScaleFold;
use crate::enhance::UnsharpMask;
use crate::error::{Result, SheetnessError};
use crate::estimation::{LabelSelection, Normalization};
use crate::hessian::HessianField;
use crate::parallel;
use crate::sheetness::{KrcahSheetness, SheetnessMeasure};
use crate::volume::Volume;

/// Ordered, non-empty list of positive scales (Gaussian sigma in mm)
#[derive(Clone, Debug, PartialEq)]
pub struct ScaleList(Vec<f64>);

impl ScaleList {
    pub fn new(scales: Vec<f64>) -> Result<Self> {
        if scales.is_empty() {
            return Err(SheetnessError::EmptyScaleList);
        }
        if let Some(&bad) = scales.iter().find(|&&s| !(s > 0.0) || !s.is_finite()) {
            return Err(SheetnessError::InvalidScale(bad));
        }
        Ok(Self(scales))
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Default for ScaleList {
    fn default() -> Self {
        Self(vec![0.75, 1.0])
    }
}

/// Pipeline parameters
#[derive(Clone, Debug)]
pub struct SheetnessParams {
    /// Gaussian scales in mm, default [0.75, 1.0]
    pub scales: Vec<f64>,
    /// Pre-enhancement, default variance 1.0 and constant 10.0
    pub enhancement: UnsharpMask,
    /// Multiply the Hessian by sigma^2 at every scale, default off
    pub normalize_across_scale: bool,
}

impl Default for SheetnessParams {
    fn default() -> Self {
        Self {
            scales: ScaleList::default().0,
            enhancement: UnsharpMask::default(),
            normalize_across_scale: false,
        }
    }
}

/// Stage reported to progress callbacks
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PipelineStage {
    Enhancing,
    Scoring {
        scale_index: usize,
        scale_count: usize,
        sigma: f64,
    },
    Aggregating,
    Done,
}

/// Output of one scale run
#[derive(Clone, Debug)]
pub struct ScaleResponse {
    pub sheetness: Volume<f64>,
    /// Normalization the scores were computed with
    pub normalization: Normalization,
    /// Voxels whose eigen-decomposition did not converge (scored 0)
    pub eigen_failures: usize,
}

/// Score every voxel of `enhanced` at one scale
///
/// The measure's normalization is reduced over the whole Hessian field
/// before the first voxel is scored.
pub fn sheetness_at_scale<M: SheetnessMeasure + ?Sized>(
    enhanced: &Volume<f64>,
    sigma: f64,
    measure: &M,
    labels: Option<&LabelSelection<'_>>,
    normalize_across_scale: bool,
) -> Result<ScaleResponse> {
    measure.validate()?;
    let hessian = HessianField::compute(enhanced, sigma, normalize_across_scale)?;
    let normalization = measure.estimate(&hessian, labels)?;
    debug!(
        sigma,
        measure = measure.name(),
        normalization = normalization.value(),
        "scale normalization"
    );

    let scores: Vec<Option<f64>> = parallel::map_index(hessian.len(), |i| {
        hessian
            .matrix(i)
            .eigenvalues()
            .map(|eig| measure.score(&eig, &normalization))
    });

    let eigen_failures = scores.iter().filter(|s| s.is_none()).count();
    if eigen_failures > 0 {
        warn!(sigma, eigen_failures, "eigen-decomposition failed, voxels scored 0");
    }

    let data = scores.into_iter().map(|s| s.unwrap_or(0.0)).collect();
    Ok(ScaleResponse {
        sheetness: Volume::from_parts(data, enhanced.geometry().clone()),
        normalization,
        eigen_failures,
    })
}

/// Multi-scale sheetness generator
pub struct SheetnessFeatureGenerator<M: SheetnessMeasure = KrcahSheetness> {
    params: SheetnessParams,
    measure: M,
    estimation_labels: Option<(Volume<u32>, u32)>,
}

impl SheetnessFeatureGenerator<KrcahSheetness> {
    /// Krcah measure with the given pipeline parameters
    pub fn krcah(params: SheetnessParams) -> Self {
        Self::new(params, KrcahSheetness::default())
    }
}

impl Default for SheetnessFeatureGenerator<KrcahSheetness> {
    fn default() -> Self {
        Self::krcah(SheetnessParams::default())
    }
}

impl<M: SheetnessMeasure> SheetnessFeatureGenerator<M> {
    pub fn new(params: SheetnessParams, measure: M) -> Self {
        Self {
            params,
            measure,
            estimation_labels: None,
        }
    }

    /// Restrict normalization estimates to voxels carrying `label`
    pub fn with_estimation_labels(mut self, labels: Volume<u32>, label: u32) -> Self {
        self.estimation_labels = Some((labels, label));
        self
    }

    pub fn params(&self) -> &SheetnessParams {
        &self.params
    }

    pub fn measure(&self) -> &M {
        &self.measure
    }

    pub fn generate(&self, input: &Volume<f64>) -> Result<Volume<f64>> {
        self.generate_with_progress(input, |_| {})
    }

    /// Run the pipeline, reporting every stage transition to `progress`
    pub fn generate_with_progress<F>(&self, input: &Volume<f64>, mut progress: F) -> Result<Volume<f64>>
    where
        F: FnMut(PipelineStage),
    {
        let scales = ScaleList::new(self.params.scales.clone())?;
        let enhancement = &self.params.enhancement;
        if !(enhancement.variance >= 0.0) {
            return Err(SheetnessError::NegativeVariance(enhancement.variance));
        }
        self.measure.validate()?;

        let selection = self
            .estimation_labels
            .as_ref()
            .map(|(labels, label)| LabelSelection::new(labels, *label));
        if let Some(selection) = &selection {
            selection.validate(input.geometry())?;
        }

        let (nx, ny, nz) = input.dims();
        info!(
            nx, ny, nz,
            measure = self.measure.name(),
            scales = ?scales.as_slice(),
            "sheetness pipeline"
        );

        progress(PipelineStage::Enhancing);
        info!(
            variance = enhancement.variance,
            scaling_constant = enhancement.scaling_constant,
            "unsharp mask"
        );
        let enhanced = enhancement.apply(input)?;

        let scale_count = scales.len();
        let mut fold = ScaleFold::new();

        for (scale_index, &sigma) in scales.as_slice().iter().enumerate() {
            progress(PipelineStage::Scoring { scale_index, scale_count, sigma });
            info!(sigma, "scale {}/{}", scale_index + 1, scale_count);

            let response = sheetness_at_scale(
                &enhanced,
                sigma,
                &self.measure,
                selection.as_ref(),
                self.params.normalize_across_scale,
            )?;

            if scale_count > 1 && scale_index + 1 == scale_count {
                progress(PipelineStage::Aggregating);
                info!("aggregating {} scales", scale_count);
            }
            fold.push(response.sheetness)?;
        }

        let result = fold.finish()?;
        progress(PipelineStage::Done);
        info!("sheetness pipeline done");
        Ok(result)
    }
}
