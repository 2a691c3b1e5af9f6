//! NIfTI-1 volume I/O
//!
//! Volumes are read from and written to byte buffers so the same code
//! serves the browser (no filesystem) and the command line. Gzip input is
//! detected from the magic bytes; output is float32 with the geometry of
//! the volume being written.

use std::io::{Cursor, Read, Write};
use std::path::Path;

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use ndarray::Array;
use nifti::volume::ndarray::IntoNdArray;
use nifti::{InMemNiftiObject, NiftiHeader, NiftiObject};

use crate::error::{Result, SheetnessError};
use crate::volume::{Geometry, Volume};

const HEADER_SIZE: usize = 348;
const VOX_OFFSET: usize = 352;

/// Check if bytes are gzip compressed
fn is_gzip(bytes: &[u8]) -> bool {
    bytes.len() >= 2 && bytes[0] == 0x1f && bytes[1] == 0x8b
}

/// Short header summary for error messages
fn get_header_info(bytes: &[u8]) -> String {
    if bytes.len() < HEADER_SIZE {
        return format!("file too small ({} bytes, need at least {})", bytes.len(), HEADER_SIZE);
    }

    let sizeof_hdr = i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
    let magic = String::from_utf8_lossy(&bytes[344..348]).to_string();
    let datatype = i16::from_le_bytes([bytes[70], bytes[71]]);

    format!("sizeof_hdr={}, magic='{}', datatype={}", sizeof_hdr, magic, datatype)
}

/// Decode a NIfTI object, adding header diagnostics on failure
fn read_object(bytes: &[u8]) -> Result<InMemNiftiObject> {
    if is_gzip(bytes) {
        InMemNiftiObject::from_reader(GzDecoder::new(Cursor::new(bytes))).map_err(|e| {
            let mut decompressed = Vec::new();
            let info = match GzDecoder::new(Cursor::new(bytes)).read_to_end(&mut decompressed) {
                Ok(_) => get_header_info(&decompressed),
                Err(_) => "could not decompress".to_string(),
            };
            SheetnessError::Nifti(format!("failed to read gzipped NIfTI: {} ({})", e, info))
        })
    } else {
        InMemNiftiObject::from_reader(Cursor::new(bytes)).map_err(|e| {
            SheetnessError::Nifti(format!("failed to read NIfTI: {} ({})", e, get_header_info(bytes)))
        })
    }
}

/// Voxel spacing from pixdim; unset spacings read as 1 mm
fn voxel_size(header: &NiftiHeader) -> (f64, f64, f64) {
    let spacing = |p: f32| {
        let p = (p as f64).abs();
        if p > 0.0 && p.is_finite() { p } else { 1.0 }
    };
    (
        spacing(header.pixdim[1]),
        spacing(header.pixdim[2]),
        spacing(header.pixdim[3]),
    )
}

/// Affine from the quaternion (qform) fields
///
/// The rotation is built from (b, c, d) with a = sqrt(1 - b^2 - c^2 - d^2),
/// columns are scaled by the voxel size, and pixdim[0] < 0 flips the
/// third axis.
fn qform_affine(header: &NiftiHeader) -> [f64; 16] {
    let (b, c, d) = (
        header.quatern_b as f64,
        header.quatern_c as f64,
        header.quatern_d as f64,
    );
    let aa = 1.0 - (b * b + c * c + d * d);
    let (a, b, c, d) = if aa > 1e-7 {
        (aa.sqrt(), b, c, d)
    } else {
        // 180 degree rotation: renormalize (b, c, d)
        let n = (b * b + c * c + d * d).sqrt();
        if n > 0.0 { (0.0, b / n, c / n, d / n) } else { (1.0, 0.0, 0.0, 0.0) }
    };

    let r = [
        [a * a + b * b - c * c - d * d, 2.0 * (b * c - a * d), 2.0 * (b * d + a * c)],
        [2.0 * (b * c + a * d), a * a + c * c - b * b - d * d, 2.0 * (c * d - a * b)],
        [2.0 * (b * d - a * c), 2.0 * (c * d + a * b), a * a + d * d - b * b - c * c],
    ];

    let (vsx, vsy, vsz) = voxel_size(header);
    let qfac = if header.pixdim[0] < 0.0 { -1.0 } else { 1.0 };
    let scale = [vsx, vsy, vsz * qfac];
    let offset = [
        header.quatern_x as f64,
        header.quatern_y as f64,
        header.quatern_z as f64,
    ];

    let mut affine = [0.0f64; 16];
    for row in 0..3 {
        for col in 0..3 {
            affine[row * 4 + col] = r[row][col] * scale[col];
        }
        affine[row * 4 + 3] = offset[row];
    }
    affine[15] = 1.0;
    affine
}

/// Get affine transformation matrix from header
///
/// Prefers the sform, then the qform, then an axis-aligned scaling.
fn get_affine(header: &NiftiHeader) -> [f64; 16] {
    if header.sform_code > 0 {
        let s = &header.srow_x;
        let t = &header.srow_y;
        let u = &header.srow_z;
        [
            s[0] as f64, s[1] as f64, s[2] as f64, s[3] as f64,
            t[0] as f64, t[1] as f64, t[2] as f64, t[3] as f64,
            u[0] as f64, u[1] as f64, u[2] as f64, u[3] as f64,
            0.0, 0.0, 0.0, 1.0,
        ]
    } else if header.qform_code > 0 {
        qform_affine(header)
    } else {
        let (vsx, vsy, vsz) = voxel_size(header);
        Geometry::new((1, 1, 1), (vsx, vsy, vsz)).affine
    }
}

/// Load a 3D volume from NIfTI bytes (.nii or .nii.gz)
///
/// Intensity scaling from the header is applied. For 4D files only the
/// first volume is read.
pub fn load_volume(bytes: &[u8]) -> Result<Volume<f64>> {
    let obj = read_object(bytes)?;
    let header = obj.header();

    let ndim = header.dim[0] as usize;
    if ndim < 3 {
        return Err(SheetnessError::Nifti(format!("expected at least a 3D volume, got {}D", ndim)));
    }

    let voxel_size = voxel_size(header);
    let affine = get_affine(header);

    let array: Array<f64, _> = obj
        .into_volume()
        .into_ndarray()
        .map_err(|e| SheetnessError::Nifti(format!("failed to convert to ndarray: {}", e)))?;

    let shape = array.shape();
    if shape.len() < 3 {
        return Err(SheetnessError::Nifti(format!("expected at least a 3D array, got {}D", shape.len())));
    }
    let (nx, ny, nz) = (shape[0], shape[1], shape[2]);

    // Fortran order: x varies fastest
    let mut data = Vec::with_capacity(nx * ny * nz);
    for k in 0..nz {
        for j in 0..ny {
            for i in 0..nx {
                let v = if shape.len() == 3 { array[[i, j, k]] } else { array[[i, j, k, 0]] };
                data.push(v);
            }
        }
    }

    Volume::new(data, Geometry::with_affine((nx, ny, nz), voxel_size, affine))
}

/// Encode a volume as uncompressed float32 NIfTI-1 bytes
pub fn save_volume(volume: &Volume<f64>) -> Result<Vec<u8>> {
    let (nx, ny, nz) = volume.dims();
    let (vsx, vsy, vsz) = volume.voxel_size();
    let affine = &volume.geometry().affine;

    let dim_i16 = |d: usize| {
        i16::try_from(d).map_err(|_| {
            SheetnessError::Nifti(format!("dimension {} does not fit a NIfTI-1 header", d))
        })
    };
    let dim: [i16; 8] = [3, dim_i16(nx)?, dim_i16(ny)?, dim_i16(nz)?, 1, 1, 1, 1];

    let mut header = [0u8; HEADER_SIZE];
    header[0..4].copy_from_slice(&(HEADER_SIZE as i32).to_le_bytes());

    for (i, &d) in dim.iter().enumerate() {
        let offset = 40 + i * 2;
        header[offset..offset + 2].copy_from_slice(&d.to_le_bytes());
    }

    // datatype FLOAT32, bitpix 32
    header[70..72].copy_from_slice(&16i16.to_le_bytes());
    header[72..74].copy_from_slice(&32i16.to_le_bytes());

    let pixdim: [f32; 8] = [1.0, vsx as f32, vsy as f32, vsz as f32, 1.0, 1.0, 1.0, 1.0];
    for (i, &p) in pixdim.iter().enumerate() {
        let offset = 76 + i * 4;
        header[offset..offset + 4].copy_from_slice(&p.to_le_bytes());
    }

    header[108..112].copy_from_slice(&(VOX_OFFSET as f32).to_le_bytes());
    header[112..116].copy_from_slice(&1.0f32.to_le_bytes());
    header[116..120].copy_from_slice(&0.0f32.to_le_bytes());

    // sform_code = 1 (scanner anat)
    header[254..256].copy_from_slice(&1i16.to_le_bytes());

    for row in 0..3 {
        for col in 0..4 {
            let offset = 280 + row * 16 + col * 4;
            header[offset..offset + 4].copy_from_slice(&(affine[row * 4 + col] as f32).to_le_bytes());
        }
    }

    header[344..348].copy_from_slice(b"n+1\0");

    let mut buffer = Vec::with_capacity(VOX_OFFSET + volume.len() * 4);
    buffer.write_all(&header)?;
    // empty extension block
    buffer.write_all(&[0u8; 4])?;
    for &val in volume.data() {
        buffer.write_all(&(val as f32).to_le_bytes())?;
    }

    Ok(buffer)
}

/// Encode a volume as gzipped NIfTI-1 bytes (.nii.gz)
pub fn save_volume_gz(volume: &Volume<f64>) -> Result<Vec<u8>> {
    let uncompressed = save_volume(volume)?;
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&uncompressed)?;
    Ok(encoder.finish()?)
}

/// Read a volume from a `.nii` or `.nii.gz` file
pub fn read_volume<P: AsRef<Path>>(path: P) -> Result<Volume<f64>> {
    let bytes = std::fs::read(path)?;
    load_volume(&bytes)
}

/// Write a volume, gzipped when the file name ends in `.gz`
pub fn write_volume<P: AsRef<Path>>(path: P, volume: &Volume<f64>) -> Result<()> {
    let path = path.as_ref();
    let gz = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("gz"))
        .unwrap_or(false);
    let bytes = if gz { save_volume_gz(volume)? } else { save_volume(volume)? };
    std::fs::write(path, bytes)?;
    Ok(())
}
