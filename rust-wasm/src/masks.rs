//! Exclusion masks produced next to the sheetness map
//!
//! Both masks are 1.0 where the voxel belongs to the described region and
//! 0.0 elsewhere, on the input's grid.

use tracing::debug;

use crate::error::Result;
use crate::utils::components::largest_component;
use crate::volume::Volume;

/// Mask thresholds in input intensity units (HU for CT)
#[derive(Clone, Debug, PartialEq)]
pub struct MaskParams {
    /// Voxels at or below this value are candidate soft tissue/air, default -50
    pub not_bone_threshold: f64,
    /// Voxels at or above this value with positive sheetness are kept, default 400
    pub not_background_threshold: f64,
}

impl Default for MaskParams {
    fn default() -> Self {
        Self {
            not_bone_threshold: -50.0,
            not_background_threshold: 400.0,
        }
    }
}

/// Largest 6-connected region with `input <= threshold`
pub fn not_bone_mask(input: &Volume<f64>, params: &MaskParams) -> Volume<f64> {
    let (nx, ny, nz) = input.dims();
    let threshold = params.not_bone_threshold;

    let foreground: Vec<bool> = input.data().iter().map(|&v| v <= threshold).collect();
    let largest = largest_component(&foreground, nx, ny, nz);

    let voxels = largest.iter().filter(|&&v| v).count();
    debug!(threshold, voxels, "not-bone component");

    Volume::from_parts(
        largest.into_iter().map(|v| if v { 1.0 } else { 0.0 }).collect(),
        input.geometry().clone(),
    )
}

/// Voxels with `input >= threshold` and positive sheetness
pub fn not_background_mask(
    input: &Volume<f64>,
    sheetness: &Volume<f64>,
    params: &MaskParams,
) -> Result<Volume<f64>> {
    let threshold = params.not_background_threshold;
    input.zip_map(sheetness, |v, s| if v >= threshold && s > 0.0 { 1.0 } else { 0.0 })
}
