//! Sheetness-WASM: multi-scale Hessian sheetness features for 3D volumes
//!
//! Computes a per-voxel plate-likeness response (Krcah et al. 2011) used as a
//! feature map for bone segmentation in CT, plus the two exclusion masks that
//! accompany it. Runs natively (CLI, rayon) and in the browser (WebAssembly).
//!
//! # Modules
//! - `volume`: volume container with physical geometry
//! - `kernels`: Gaussian smoothing and finite differences
//! - `hessian`: per-scale Hessian field
//! - `eigen`: 3x3 symmetric eigenvalues
//! - `enhance`: unsharp-mask pre-enhancement
//! - `estimation`: normalization statistics
//! - `sheetness`: Krcah and modified sheetness measures
//! - `aggregate`: multi-scale maximum-absolute-value fold
//! - `pipeline`: the feature generator
//! - `masks`: not-bone and not-background masks
//! - `nifti_io`: NIfTI-1 reading and writing

// Core modules
pub mod error;
pub mod volume;
mod parallel;

// Algorithm modules
pub mod kernels;
pub mod eigen;
pub mod hessian;
pub mod enhance;
pub mod estimation;
pub mod sheetness;
pub mod aggregate;
pub mod pipeline;
pub mod masks;
pub mod utils;

// I/O modules
pub mod nifti_io;

pub use error::SheetnessError;
pub use masks::MaskParams;
pub use pipeline::{PipelineStage, ScaleList, SheetnessFeatureGenerator, SheetnessParams};
pub use sheetness::{KrcahSheetness, ModifiedSheetness, Polarity, SheetnessMeasure};
pub use volume::{Geometry, Volume};

use wasm_bindgen::prelude::*;

#[wasm_bindgen]
extern "C" {
    #[wasm_bindgen(js_namespace = console)]
    fn log(s: &str);
}

#[allow(unused_macros)]
macro_rules! console_log {
    ($($t:tt)*) => (log(&format_args!($($t)*).to_string()))
}

/// Initialize panic hook for better error messages in browser console
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

fn to_js(e: SheetnessError) -> JsValue {
    JsValue::from_str(&e.to_string())
}

/// Wrap a flat Fortran-order buffer from JS with an axis-aligned geometry
fn js_volume(
    data: &[f64],
    nx: usize, ny: usize, nz: usize,
    vsx: f64, vsy: f64, vsz: f64,
) -> std::result::Result<Volume<f64>, JsValue> {
    Volume::new(data.to_vec(), Geometry::new((nx, ny, nz), (vsx, vsy, vsz))).map_err(to_js)
}

fn stage_progress(stage: PipelineStage, scale_count: usize) -> (usize, usize) {
    let total = scale_count + 2;
    let current = match stage {
        PipelineStage::Enhancing => 0,
        PipelineStage::Scoring { scale_index, .. } => 1 + scale_index,
        PipelineStage::Aggregating => 1 + scale_count,
        PipelineStage::Done => total,
    };
    (current, total)
}

fn krcah_generator(
    scales: &[f64],
    variance: f64,
    scaling_constant: f64,
    alpha: f64,
    beta: f64,
    gamma: f64,
    dark: bool,
) -> SheetnessFeatureGenerator<KrcahSheetness> {
    let params = SheetnessParams {
        scales: scales.to_vec(),
        enhancement: enhance::UnsharpMask { variance, scaling_constant },
        normalize_across_scale: false,
    };
    let measure = KrcahSheetness { alpha, beta, gamma, polarity: Polarity::from_dark(dark) };
    SheetnessFeatureGenerator::new(params, measure)
}

// ============================================================================
// WASM Exports: Sheetness
// ============================================================================

/// Krcah multi-scale sheetness
///
/// # Arguments
/// * `data` - Input volume (nx * ny * nz), e.g. CT in HU
/// * `nx`, `ny`, `nz` - Array dimensions
/// * `vsx`, `vsy`, `vsz` - Voxel sizes in mm
/// * `scales` - Gaussian sigmas in mm (typically [0.75, 1.0])
/// * `variance` - Unsharp-mask variance in mm^2 (typically 1.0)
/// * `scaling_constant` - Unsharp-mask weight (typically 10.0)
/// * `alpha`, `beta`, `gamma` - Sheet, tube and noise sensitivities (0.5, 0.5, 0.25)
/// * `dark` - Detect dark plates instead of bright ones
///
/// # Returns
/// Sheetness in [-1, 1]
#[allow(clippy::too_many_arguments)]
#[wasm_bindgen]
pub fn krcah_sheetness_wasm(
    data: &[f64],
    nx: usize, ny: usize, nz: usize,
    vsx: f64, vsy: f64, vsz: f64,
    scales: &[f64],
    variance: f64,
    scaling_constant: f64,
    alpha: f64,
    beta: f64,
    gamma: f64,
    dark: bool,
) -> Result<Vec<f64>, JsValue> {
    console_log!("WASM Krcah sheetness: {}x{}x{}, scales={:?}", nx, ny, nz, scales);

    let input = js_volume(data, nx, ny, nz, vsx, vsy, vsz)?;
    let generator = krcah_generator(scales, variance, scaling_constant, alpha, beta, gamma, dark);
    let sheetness = generator.generate(&input).map_err(to_js)?;

    console_log!("WASM Krcah sheetness complete");
    Ok(sheetness.into_data())
}

/// Krcah sheetness with progress callback
///
/// The callback receives (current_step, total_steps); steps are the
/// enhancement, one per scale, then aggregation.
#[allow(clippy::too_many_arguments)]
#[wasm_bindgen]
pub fn krcah_sheetness_wasm_with_progress(
    data: &[f64],
    nx: usize, ny: usize, nz: usize,
    vsx: f64, vsy: f64, vsz: f64,
    scales: &[f64],
    variance: f64,
    scaling_constant: f64,
    alpha: f64,
    beta: f64,
    gamma: f64,
    dark: bool,
    progress_callback: &js_sys::Function,
) -> Result<Vec<f64>, JsValue> {
    console_log!("WASM Krcah sheetness with progress: {}x{}x{}, scales={:?}", nx, ny, nz, scales);

    let input = js_volume(data, nx, ny, nz, vsx, vsy, vsz)?;
    let generator = krcah_generator(scales, variance, scaling_constant, alpha, beta, gamma, dark);

    let callback = progress_callback.clone();
    let scale_count = scales.len();
    let sheetness = generator
        .generate_with_progress(&input, |stage| {
            let (current, total) = stage_progress(stage, scale_count);
            let this = JsValue::null();
            let _ = callback.call2(&this,
                &JsValue::from(current as u32),
                &JsValue::from(total as u32));
        })
        .map_err(to_js)?;

    console_log!("WASM Krcah sheetness complete");
    Ok(sheetness.into_data())
}

/// Modified sheetness with Frobenius-norm noise normalization
///
/// # Arguments
/// * `alpha` - Plate-shape sensitivity (typically 0.5)
/// * `scale_factor` - C as a fraction of the maximum Frobenius norm (typically 0.1)
/// * `labels` - Optional label volume (nx * ny * nz); empty for a global estimate
/// * `label` - Label the estimate is restricted to
#[allow(clippy::too_many_arguments)]
#[wasm_bindgen]
pub fn modified_sheetness_wasm(
    data: &[f64],
    nx: usize, ny: usize, nz: usize,
    vsx: f64, vsy: f64, vsz: f64,
    scales: &[f64],
    variance: f64,
    scaling_constant: f64,
    alpha: f64,
    scale_factor: f64,
    dark: bool,
    labels: &[u32],
    label: u32,
) -> Result<Vec<f64>, JsValue> {
    console_log!("WASM modified sheetness: {}x{}x{}, alpha={:.2}, f={:.3}",
                 nx, ny, nz, alpha, scale_factor);

    let input = js_volume(data, nx, ny, nz, vsx, vsy, vsz)?;
    let params = SheetnessParams {
        scales: scales.to_vec(),
        enhancement: enhance::UnsharpMask { variance, scaling_constant },
        normalize_across_scale: false,
    };
    let measure = ModifiedSheetness { alpha, scale_factor, polarity: Polarity::from_dark(dark) };
    let mut generator = SheetnessFeatureGenerator::new(params, measure);

    if !labels.is_empty() {
        let label_volume = Volume::new(labels.to_vec(), input.geometry().clone()).map_err(to_js)?;
        generator = generator.with_estimation_labels(label_volume, label);
    }

    let sheetness = generator.generate(&input).map_err(to_js)?;

    console_log!("WASM modified sheetness complete");
    Ok(sheetness.into_data())
}

// ============================================================================
// WASM Exports: Masks
// ============================================================================

/// Largest connected region at or below `threshold` (1.0 inside, 0.0 outside)
#[wasm_bindgen]
pub fn not_bone_mask_wasm(
    data: &[f64],
    nx: usize, ny: usize, nz: usize,
    threshold: f64,
) -> Result<Vec<f64>, JsValue> {
    let input = js_volume(data, nx, ny, nz, 1.0, 1.0, 1.0)?;
    let params = MaskParams { not_bone_threshold: threshold, ..Default::default() };
    let mask = masks::not_bone_mask(&input, &params);

    let count = mask.data().iter().filter(|&&v| v > 0.0).count();
    console_log!("WASM not-bone mask: {} voxels", count);
    Ok(mask.into_data())
}

/// Voxels with intensity at or above `threshold` and positive sheetness
#[wasm_bindgen]
pub fn not_background_mask_wasm(
    data: &[f64],
    sheetness: &[f64],
    nx: usize, ny: usize, nz: usize,
    threshold: f64,
) -> Result<Vec<f64>, JsValue> {
    let input = js_volume(data, nx, ny, nz, 1.0, 1.0, 1.0)?;
    let sheetness = js_volume(sheetness, nx, ny, nz, 1.0, 1.0, 1.0)?;
    let params = MaskParams { not_background_threshold: threshold, ..Default::default() };
    let mask = masks::not_background_mask(&input, &sheetness, &params).map_err(to_js)?;

    let count = mask.data().iter().filter(|&&v| v > 0.0).count();
    console_log!("WASM not-background mask: {} voxels", count);
    Ok(mask.into_data())
}

// ============================================================================
// WASM Exports: NIfTI I/O
// ============================================================================

/// Load a 3D NIfTI file from bytes
///
/// Returns a JS object with: data (Float64Array), dims (array), voxelSize (array), affine (array)
#[wasm_bindgen]
pub fn load_nifti_wasm(bytes: &[u8]) -> Result<js_sys::Object, JsValue> {
    let volume = nifti_io::load_volume(bytes).map_err(to_js)?;
    let (nx, ny, nz) = volume.dims();
    let (vsx, vsy, vsz) = volume.voxel_size();

    let result = js_sys::Object::new();

    let data = js_sys::Float64Array::from(volume.data());
    js_sys::Reflect::set(&result, &"data".into(), &data)?;

    let dims = js_sys::Array::new();
    for d in [nx, ny, nz] {
        dims.push(&JsValue::from(d as u32));
    }
    js_sys::Reflect::set(&result, &"dims".into(), &dims)?;

    let voxel_size = js_sys::Array::new();
    for v in [vsx, vsy, vsz] {
        voxel_size.push(&JsValue::from(v));
    }
    js_sys::Reflect::set(&result, &"voxelSize".into(), &voxel_size)?;

    let affine = js_sys::Float64Array::from(&volume.geometry().affine[..]);
    js_sys::Reflect::set(&result, &"affine".into(), &affine)?;

    console_log!("WASM load_nifti: {}x{}x{}, voxel=({:.2},{:.2},{:.2})",
                 nx, ny, nz, vsx, vsy, vsz);

    Ok(result)
}

#[allow(clippy::too_many_arguments)]
fn js_volume_with_affine(
    data: &[f64],
    nx: usize, ny: usize, nz: usize,
    vsx: f64, vsy: f64, vsz: f64,
    affine: &[f64],
) -> std::result::Result<Volume<f64>, JsValue> {
    let affine: [f64; 16] = affine
        .try_into()
        .map_err(|_| JsValue::from_str("Affine matrix must have 16 elements"))?;
    let geometry = Geometry::with_affine((nx, ny, nz), (vsx, vsy, vsz), affine);
    Volume::new(data.to_vec(), geometry).map_err(to_js)
}

/// Save data as NIfTI bytes (.nii)
#[allow(clippy::too_many_arguments)]
#[wasm_bindgen]
pub fn save_nifti_wasm(
    data: &[f64],
    nx: usize, ny: usize, nz: usize,
    vsx: f64, vsy: f64, vsz: f64,
    affine: &[f64],
) -> Result<Vec<u8>, JsValue> {
    let volume = js_volume_with_affine(data, nx, ny, nz, vsx, vsy, vsz, affine)?;
    let bytes = nifti_io::save_volume(&volume).map_err(to_js)?;

    console_log!("WASM save_nifti: {}x{}x{}, {} bytes", nx, ny, nz, bytes.len());
    Ok(bytes)
}

/// Save data as gzipped NIfTI bytes (.nii.gz)
#[allow(clippy::too_many_arguments)]
#[wasm_bindgen]
pub fn save_nifti_gz_wasm(
    data: &[f64],
    nx: usize, ny: usize, nz: usize,
    vsx: f64, vsy: f64, vsz: f64,
    affine: &[f64],
) -> Result<Vec<u8>, JsValue> {
    let volume = js_volume_with_affine(data, nx, ny, nz, vsx, vsy, vsz, affine)?;
    let bytes = nifti_io::save_volume_gz(&volume).map_err(to_js)?;

    console_log!("WASM save_nifti_gz: {}x{}x{}, {} bytes (compressed)", nx, ny, nz, bytes.len());
    Ok(bytes)
}

// ============================================================================
// WASM Exports: Utilities
// ============================================================================

/// Check if WASM module is loaded and working
#[wasm_bindgen]
pub fn wasm_health_check() -> bool {
    console_log!("Sheetness-WASM module loaded successfully!");
    true
}

/// Get version string
#[wasm_bindgen]
pub fn get_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_progress() {
        let enhancing = stage_progress(PipelineStage::Enhancing, 2);
        let second = stage_progress(
            PipelineStage::Scoring { scale_index: 1, scale_count: 2, sigma: 1.0 },
            2,
        );
        assert_eq!(enhancing, (0, 4));
        assert_eq!(second, (2, 4));
        assert_eq!(stage_progress(PipelineStage::Aggregating, 2), (3, 4));
        assert_eq!(stage_progress(PipelineStage::Done, 2), (4, 4));
    }

    #[test]
    fn test_version() {
        assert_eq!(get_version(), env!("CARGO_PKG_VERSION"));
    }
}
