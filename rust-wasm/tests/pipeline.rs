//! End-to-end checks of the sheetness pipeline on synthetic phantoms

use approx::assert_relative_eq;

use sheetness_wasm::aggregate::maximum_absolute_value;
use sheetness_wasm::enhance::UnsharpMask;
use sheetness_wasm::masks::{not_background_mask, not_bone_mask};
use sheetness_wasm::nifti_io::{load_volume, read_volume, save_volume_gz, write_volume};
use sheetness_wasm::pipeline::sheetness_at_scale;
use sheetness_wasm::{
    Geometry, KrcahSheetness, MaskParams, ModifiedSheetness, Polarity, SheetnessError,
    SheetnessFeatureGenerator, SheetnessParams, Volume,
};

const N: usize = 20;

/// Bright plane of value 1000 at z = 10 in an otherwise empty 20^3 volume
fn slab_phantom() -> Volume<f64> {
    let mut data = vec![0.0; N * N * N];
    for j in 0..N {
        for i in 0..N {
            data[i + j * N + 10 * N * N] = 1000.0;
        }
    }
    let mut affine = Geometry::new((N, N, N), (1.0, 1.0, 1.0)).affine;
    affine[3] = -5.0;
    affine[7] = 12.0;
    affine[11] = 40.0;
    Volume::new(data, Geometry::with_affine((N, N, N), (1.0, 1.0, 1.0), affine)).unwrap()
}

fn params_with_scales(scales: Vec<f64>) -> SheetnessParams {
    SheetnessParams { scales, ..Default::default() }
}

#[test]
fn bright_slab_responds_on_the_plate_only() {
    let input = slab_phantom();
    let sheetness = SheetnessFeatureGenerator::default().generate(&input).unwrap();

    assert!(*sheetness.get(10, 10, 10) > 0.5);
    assert_eq!(*sheetness.get(10, 10, 0), 0.0);
    assert!(sheetness.data().iter().all(|v| v.abs() <= 1.0));
}

#[test]
fn dark_polarity_flips_the_plate_response() {
    let input = slab_phantom();
    let dark = KrcahSheetness { polarity: Polarity::Dark, ..Default::default() };
    let sheetness = SheetnessFeatureGenerator::new(SheetnessParams::default(), dark)
        .generate(&input)
        .unwrap();

    assert!(*sheetness.get(10, 10, 10) < -0.5);
}

#[test]
fn modified_measure_responds_on_the_plate() {
    let input = slab_phantom();
    let sheetness = SheetnessFeatureGenerator::new(SheetnessParams::default(), ModifiedSheetness::default())
        .generate(&input)
        .unwrap();

    assert!(*sheetness.get(10, 10, 10) > 0.9);
    assert_eq!(*sheetness.get(10, 10, 0), 0.0);
}

#[test]
fn output_keeps_input_geometry() {
    let input = slab_phantom();
    let sheetness = SheetnessFeatureGenerator::default().generate(&input).unwrap();

    assert_eq!(sheetness.geometry(), input.geometry());
    assert_eq!(sheetness.geometry().origin(), (-5.0, 12.0, 40.0));
}

#[test]
fn single_scale_equals_one_scale_run() {
    let input = slab_phantom();
    let generated = SheetnessFeatureGenerator::krcah(params_with_scales(vec![1.0]))
        .generate(&input)
        .unwrap();

    let enhanced = UnsharpMask::default().apply(&input).unwrap();
    let direct = sheetness_at_scale(&enhanced, 1.0, &KrcahSheetness::default(), None, false).unwrap();

    assert_eq!(generated, direct.sheetness);
}

#[test]
fn multi_scale_is_max_abs_of_single_scales() {
    let input = slab_phantom();
    let both = SheetnessFeatureGenerator::krcah(params_with_scales(vec![0.75, 1.5]))
        .generate(&input)
        .unwrap();
    let small = SheetnessFeatureGenerator::krcah(params_with_scales(vec![0.75]))
        .generate(&input)
        .unwrap();
    let large = SheetnessFeatureGenerator::krcah(params_with_scales(vec![1.5]))
        .generate(&input)
        .unwrap();

    assert_eq!(both, maximum_absolute_value(&small, &large).unwrap());
}

#[test]
fn empty_scale_list_is_rejected() {
    let input = slab_phantom();
    let result = SheetnessFeatureGenerator::krcah(params_with_scales(vec![])).generate(&input);
    assert!(matches!(result, Err(SheetnessError::EmptyScaleList)));
}

#[test]
fn missing_estimation_label_is_rejected() {
    let input = slab_phantom();
    let labels = input.map(|v| if v > 0.0 { 2u32 } else { 0 });
    let result = SheetnessFeatureGenerator::new(SheetnessParams::default(), ModifiedSheetness::default())
        .with_estimation_labels(labels, 1)
        .generate(&input);
    assert!(matches!(result, Err(SheetnessError::LabelNotFound(1))));
}

#[test]
fn masks_on_ct_like_phantom() {
    // air at -1000 everywhere, a bone plate at 1000
    let input = slab_phantom().map(|v| if v > 0.0 { 1000.0 } else { -1000.0 });
    let sheetness = SheetnessFeatureGenerator::default().generate(&input).unwrap();
    let params = MaskParams::default();

    let not_bone = not_bone_mask(&input, &params);
    // the plate splits the air into two slabs of 10 and 9 slices
    assert_eq!(*not_bone.get(3, 3, 2), 1.0);
    assert_eq!(*not_bone.get(3, 3, 15), 0.0);
    assert_eq!(*not_bone.get(3, 3, 10), 0.0);

    let not_background = not_background_mask(&input, &sheetness, &params).unwrap();
    assert_eq!(*not_background.get(10, 10, 10), 1.0);
    assert_eq!(*not_background.get(10, 10, 2), 0.0);
}

#[test]
fn nifti_round_trip_through_files() {
    let input = slab_phantom();
    let sheetness = SheetnessFeatureGenerator::default().generate(&input).unwrap();

    let dir = std::env::temp_dir().join(format!("sheetness-wasm-test-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();

    let plain = dir.join("sheetness.nii");
    let gz = dir.join("sheetness.nii.gz");
    write_volume(&plain, &sheetness).unwrap();
    write_volume(&gz, &sheetness).unwrap();

    let gz_bytes = std::fs::read(&gz).unwrap();
    assert_eq!(&gz_bytes[..2], &[0x1f, 0x8b]);

    for path in [&plain, &gz] {
        let loaded = read_volume(path).unwrap();
        assert_eq!(loaded.geometry(), sheetness.geometry());
        for (&a, &b) in loaded.data().iter().zip(sheetness.data()) {
            assert_relative_eq!(a, b, epsilon = 1e-6);
        }
    }

    let reloaded = load_volume(&save_volume_gz(&input).unwrap()).unwrap();
    assert_eq!(reloaded, input);

    std::fs::remove_dir_all(&dir).ok();
}
