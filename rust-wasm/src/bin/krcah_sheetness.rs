//! Command-line driver: sheetness map plus not-bone and not-background masks

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, ValueHint};
use tracing::info;
use tracing_subscriber::EnvFilter;

use sheetness_wasm::enhance::UnsharpMask;
use sheetness_wasm::masks::{not_background_mask, not_bone_mask};
use sheetness_wasm::nifti_io::{read_volume, write_volume};
use sheetness_wasm::{KrcahSheetness, MaskParams, Polarity, SheetnessFeatureGenerator, SheetnessParams};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Krcah multi-scale sheetness with not-bone and not-background masks"
)]
struct Cli {
    /// Input volume (.nii or .nii.gz)
    #[arg(value_hint = ValueHint::FilePath)]
    input: PathBuf,

    /// Output sheetness volume
    #[arg(value_hint = ValueHint::FilePath)]
    sheetness_out: PathBuf,

    /// Output not-bone mask
    #[arg(value_hint = ValueHint::FilePath)]
    not_bone_out: PathBuf,

    /// Output not-background mask
    #[arg(value_hint = ValueHint::FilePath)]
    not_background_out: PathBuf,

    /// Gaussian scales in mm
    #[arg(long, value_delimiter = ',', default_values_t = [0.75, 1.0])]
    scales: Vec<f64>,

    /// Unsharp-mask variance in mm^2
    #[arg(long, default_value_t = 1.0)]
    variance: f64,

    /// Unsharp-mask scaling constant
    #[arg(long, default_value_t = 10.0, allow_negative_numbers = true)]
    scaling_constant: f64,

    /// Sheet sensitivity
    #[arg(long, default_value_t = 0.5)]
    alpha: f64,

    /// Tube sensitivity
    #[arg(long, default_value_t = 0.5)]
    beta: f64,

    /// Noise sensitivity
    #[arg(long, default_value_t = 0.25)]
    gamma: f64,

    /// Detect dark plates instead of bright ones
    #[arg(long)]
    dark: bool,

    /// Multiply each scale's Hessian by sigma^2
    #[arg(long)]
    normalize_across_scale: bool,

    /// Intensity at or below which voxels may be not-bone
    #[arg(long, default_value_t = -50.0, allow_negative_numbers = true)]
    not_bone_threshold: f64,

    /// Intensity at or above which voxels with positive sheetness are kept
    #[arg(long, default_value_t = 400.0, allow_negative_numbers = true)]
    not_background_threshold: f64,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let input = read_volume(&cli.input)
        .with_context(|| format!("failed to read {}", cli.input.display()))?;
    let (nx, ny, nz) = input.dims();
    info!(path = %cli.input.display(), nx, ny, nz, "loaded input");

    let params = SheetnessParams {
        scales: cli.scales.clone(),
        enhancement: UnsharpMask {
            variance: cli.variance,
            scaling_constant: cli.scaling_constant,
        },
        normalize_across_scale: cli.normalize_across_scale,
    };
    let measure = KrcahSheetness {
        alpha: cli.alpha,
        beta: cli.beta,
        gamma: cli.gamma,
        polarity: Polarity::from_dark(cli.dark),
    };

    let sheetness = SheetnessFeatureGenerator::new(params, measure)
        .generate(&input)
        .context("sheetness computation failed")?;
    write_volume(&cli.sheetness_out, &sheetness)
        .with_context(|| format!("failed to write {}", cli.sheetness_out.display()))?;

    let mask_params = MaskParams {
        not_bone_threshold: cli.not_bone_threshold,
        not_background_threshold: cli.not_background_threshold,
    };

    info!("computing not-bone mask");
    let not_bone = not_bone_mask(&input, &mask_params);
    write_volume(&cli.not_bone_out, &not_bone)
        .with_context(|| format!("failed to write {}", cli.not_bone_out.display()))?;

    info!("computing not-background mask");
    let not_background = not_background_mask(&input, &sheetness, &mask_params)?;
    write_volume(&cli.not_background_out, &not_background)
        .with_context(|| format!("failed to write {}", cli.not_background_out.display()))?;

    info!("done");
    Ok(())
}
