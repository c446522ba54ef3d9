//! NIfTI volume I/O.
//!
//! Volumes are held as `ndarray` arrays indexed `[x, y, z]` (or
//! `[x, y, z, subject]`) next to the voxel-to-world affine of the file they
//! came from. Reading goes through the `nifti` crate; writing emits a plain
//! NIfTI-1 single-file image so output headers are fully determined by the
//! geometry we carry.

use crate::error::{MfxError, Result};
use flate2::write::GzEncoder;
use flate2::Compression;
use nalgebra::{Matrix4, Vector3, Vector4};
use ndarray::{Array, Array3, Array4, ArrayD, Axis, Dimension, Ix3, Ix4};
use nifti::{IntoNdArray, NiftiHeader, NiftiObject, ReaderOptions};
use std::io::Write;
use std::path::Path;

const HEADER_SIZE: usize = 348;
const VOX_OFFSET: usize = 352;
const AFFINE_TOLERANCE: f64 = 1e-4;

/// Spatial placement of a voxel grid
#[derive(Debug, Clone, PartialEq)]
pub struct VolumeGeometry {
    /// Voxel index to world (mm) transform
    pub affine: Matrix4<f64>,
    /// Voxel sizes in mm
    pub pixdim: [f32; 3],
    pub sform_code: i16,
}

impl Default for VolumeGeometry {
    fn default() -> Self {
        Self {
            affine: Matrix4::identity(),
            pixdim: [1.0, 1.0, 1.0],
            sform_code: 1,
        }
    }
}

impl VolumeGeometry {
    /// Map voxel indices to world coordinates
    pub fn vox_to_world(&self, voxel: [f64; 3]) -> [f64; 3] {
        let p = self.affine * Vector4::new(voxel[0], voxel[1], voxel[2], 1.0);
        [p[0], p[1], p[2]]
    }

    fn from_header(header: &NiftiHeader) -> Self {
        let pixdim = [
            header.pixdim[1].abs(),
            header.pixdim[2].abs(),
            header.pixdim[3].abs(),
        ];
        let affine = if header.sform_code > 0 {
            sform_affine(header)
        } else if header.qform_code > 0 {
            qform_affine(header)
        } else {
            Matrix4::new_nonuniform_scaling(&Vector3::new(
                pixdim[0] as f64,
                pixdim[1] as f64,
                pixdim[2] as f64,
            ))
        };
        let sform_code = if header.sform_code > 0 {
            header.sform_code
        } else {
            header.qform_code.max(1)
        };
        Self {
            affine,
            pixdim,
            sform_code,
        }
    }
}

#[rustfmt::skip]
fn sform_affine(header: &NiftiHeader) -> Matrix4<f64> {
    let (x, y, z) = (&header.srow_x, &header.srow_y, &header.srow_z);
    Matrix4::new(
        x[0] as f64, x[1] as f64, x[2] as f64, x[3] as f64,
        y[0] as f64, y[1] as f64, y[2] as f64, y[3] as f64,
        z[0] as f64, z[1] as f64, z[2] as f64, z[3] as f64,
        0.0, 0.0, 0.0, 1.0,
    )
}

fn qform_affine(header: &NiftiHeader) -> Matrix4<f64> {
    let b = header.quatern_b as f64;
    let c = header.quatern_c as f64;
    let d = header.quatern_d as f64;
    let a = (1.0 - (b * b + c * c + d * d)).max(0.0).sqrt();
    let qfac = if header.pixdim[0] < 0.0 { -1.0 } else { 1.0 };
    let (i, j, k) = (
        header.pixdim[1] as f64,
        header.pixdim[2] as f64,
        qfac * header.pixdim[3] as f64,
    );

    Matrix4::new(
        (a * a + b * b - c * c - d * d) * i,
        2.0 * (b * c - a * d) * j,
        2.0 * (b * d + a * c) * k,
        header.quatern_x as f64,
        2.0 * (b * c + a * d) * i,
        (a * a + c * c - b * b - d * d) * j,
        2.0 * (c * d - a * b) * k,
        header.quatern_y as f64,
        2.0 * (b * d - a * c) * i,
        2.0 * (c * d + a * b) * j,
        (a * a + d * d - b * b - c * c) * k,
        header.quatern_z as f64,
        0.0,
        0.0,
        0.0,
        1.0,
    )
}

/// Quaternion form of `affine`: `(qfac, [b, c, d], [qx, qy, qz])`.
///
/// The rotation part is assumed orthogonal once column scales are removed.
fn affine_to_quaternion(affine: &Matrix4<f64>) -> (f32, [f32; 3], [f32; 3]) {
    let mut r = affine.fixed_view::<3, 3>(0, 0).into_owned();
    for mut col in r.column_iter_mut() {
        let norm = col.norm();
        if norm > 0.0 {
            col /= norm;
        }
    }
    let qfac = if r.determinant() < 0.0 {
        r.column_mut(2).neg_mut();
        -1.0
    } else {
        1.0
    };

    let (r11, r12, r13) = (r[(0, 0)], r[(0, 1)], r[(0, 2)]);
    let (r21, r22, r23) = (r[(1, 0)], r[(1, 1)], r[(1, 2)]);
    let (r31, r32, r33) = (r[(2, 0)], r[(2, 1)], r[(2, 2)]);

    let trace = r11 + r22 + r33 + 1.0;
    let (a, b, c, d) = if trace > 0.5 {
        let a = 0.5 * trace.sqrt();
        (a, 0.25 * (r32 - r23) / a, 0.25 * (r13 - r31) / a, 0.25 * (r21 - r12) / a)
    } else {
        let xd = 1.0 + r11 - (r22 + r33);
        let yd = 1.0 + r22 - (r11 + r33);
        let zd = 1.0 + r33 - (r11 + r22);
        if xd > 1.0 {
            let b = 0.5 * xd.sqrt();
            (0.25 * (r32 - r23) / b, b, 0.25 * (r12 + r21) / b, 0.25 * (r13 + r31) / b)
        } else if yd > 1.0 {
            let c = 0.5 * yd.sqrt();
            (0.25 * (r13 - r31) / c, 0.25 * (r12 + r21) / c, c, 0.25 * (r23 + r32) / c)
        } else {
            let d = 0.5 * zd.sqrt();
            (0.25 * (r21 - r12) / d, 0.25 * (r13 + r31) / d, 0.25 * (r23 + r32) / d, d)
        }
    };
    // a is implied by b, c, d only when non-negative
    let sign = if a < 0.0 { -1.0 } else { 1.0 };

    (
        qfac as f32,
        [(sign * b) as f32, (sign * c) as f32, (sign * d) as f32],
        [
            affine[(0, 3)] as f32,
            affine[(1, 3)] as f32,
            affine[(2, 3)] as f32,
        ],
    )
}

/// A voxel array paired with its spatial transform
#[derive(Debug, Clone)]
pub struct Volume<D: Dimension> {
    pub data: Array<f64, D>,
    pub geometry: VolumeGeometry,
}

pub type Volume3 = Volume<Ix3>;
pub type Volume4 = Volume<Ix4>;

impl<D: Dimension> Volume<D> {
    pub fn new(data: Array<f64, D>, geometry: VolumeGeometry) -> Self {
        Self { data, geometry }
    }

    /// Spatial grid size (first three axes)
    pub fn grid(&self) -> [usize; 3] {
        let shape = self.data.shape();
        [shape[0], shape[1], shape[2]]
    }
}

fn read_raw(path: &Path) -> Result<(ArrayD<f64>, VolumeGeometry)> {
    if !path.exists() {
        return Err(MfxError::FileNotFound(path.display().to_string()));
    }

    let nifti_err = |e: nifti::NiftiError| MfxError::Nifti {
        path: path.display().to_string(),
        message: e.to_string(),
    };

    let obj = ReaderOptions::new().read_file(path).map_err(nifti_err)?;
    let geometry = VolumeGeometry::from_header(obj.header());
    let data = obj.into_volume().into_ndarray::<f64>().map_err(nifti_err)?;

    log::debug!("Read {} with shape {:?}", path.display(), data.shape());
    Ok((data, geometry))
}

/// Read a 3-D volume. Trailing singleton axes are dropped.
pub fn read_volume3(path: &Path) -> Result<Volume3> {
    let (mut data, geometry) = read_raw(path)?;
    while data.ndim() > 3 && data.shape()[data.ndim() - 1] == 1 {
        let last = Axis(data.ndim() - 1);
        data = data.index_axis_move(last, 0);
    }
    let found = data.shape().to_vec();
    let data = data
        .into_dimensionality::<Ix3>()
        .map_err(|_| MfxError::shape(path.display().to_string(), "3-D volume", found))?;
    Ok(Volume::new(data, geometry))
}

/// Read a 4-D subject stack. A 3-D file is a single-subject stack.
pub fn read_volume4(path: &Path) -> Result<Volume4> {
    let (mut data, geometry) = read_raw(path)?;
    if data.ndim() == 3 {
        data = data.insert_axis(Axis(3));
    }
    let found = data.shape().to_vec();
    let data = data
        .into_dimensionality::<Ix4>()
        .map_err(|_| MfxError::shape(path.display().to_string(), "4-D volume", found))?;
    if data.shape()[3] == 0 {
        return Err(MfxError::shape(
            path.display().to_string(),
            "at least one subject",
            data.shape().to_vec(),
        ));
    }
    Ok(Volume::new(data, geometry))
}

/// On-disk voxel type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoxelType {
    Int16,
    Float32,
}

impl VoxelType {
    fn datatype(&self) -> i16 {
        match self {
            VoxelType::Int16 => 4,
            VoxelType::Float32 => 16,
        }
    }

    fn bitpix(&self) -> i16 {
        match self {
            VoxelType::Int16 => 16,
            VoxelType::Float32 => 32,
        }
    }
}

fn build_header(
    shape: &[usize],
    geometry: &VolumeGeometry,
    voxel_type: VoxelType,
) -> Result<[u8; HEADER_SIZE]> {
    if shape.is_empty() || shape.len() > 7 {
        return Err(MfxError::InvalidParameter(format!(
            "Cannot write a {}-D volume",
            shape.len()
        )));
    }
    let mut header = [0u8; HEADER_SIZE];
    header[0..4].copy_from_slice(&(HEADER_SIZE as i32).to_le_bytes());

    let mut dim = [1i16; 8];
    dim[0] = shape.len() as i16;
    for (i, &d) in shape.iter().enumerate() {
        dim[i + 1] = i16::try_from(d).map_err(|_| {
            MfxError::InvalidParameter(format!("Axis {} too large for NIfTI-1: {}", i, d))
        })?;
    }
    for (i, d) in dim.iter().enumerate() {
        let offset = 40 + i * 2;
        header[offset..offset + 2].copy_from_slice(&d.to_le_bytes());
    }

    header[70..72].copy_from_slice(&voxel_type.datatype().to_le_bytes());
    header[72..74].copy_from_slice(&voxel_type.bitpix().to_le_bytes());

    let (qfac, quatern, qoffset) = affine_to_quaternion(&geometry.affine);
    let p = geometry.pixdim;
    let pixdim: [f32; 8] = [qfac, p[0], p[1], p[2], 1.0, 1.0, 1.0, 1.0];
    for (i, v) in pixdim.iter().enumerate() {
        let offset = 76 + i * 4;
        header[offset..offset + 4].copy_from_slice(&v.to_le_bytes());
    }

    header[108..112].copy_from_slice(&(VOX_OFFSET as f32).to_le_bytes());
    header[112..116].copy_from_slice(&1.0f32.to_le_bytes());
    // mm + sec
    header[123] = 2 | 8;

    header[252..254].copy_from_slice(&geometry.sform_code.to_le_bytes());
    header[254..256].copy_from_slice(&geometry.sform_code.to_le_bytes());
    for (i, v) in quatern.iter().chain(&qoffset).enumerate() {
        let offset = 256 + i * 4;
        header[offset..offset + 4].copy_from_slice(&v.to_le_bytes());
    }
    for row in 0..3 {
        for col in 0..4 {
            let offset = 280 + row * 16 + col * 4;
            let v = geometry.affine[(row, col)] as f32;
            header[offset..offset + 4].copy_from_slice(&v.to_le_bytes());
        }
    }

    header[344..348].copy_from_slice(b"n+1\0");
    Ok(header)
}

fn encode<D: Dimension>(
    data: &Array<f64, D>,
    geometry: &VolumeGeometry,
    voxel_type: VoxelType,
) -> Result<Vec<u8>> {
    let header = build_header(data.shape(), geometry, voxel_type)?;
    let bytes_per_voxel = (voxel_type.bitpix() / 8) as usize;
    let mut buffer = Vec::with_capacity(VOX_OFFSET + data.len() * bytes_per_voxel);
    buffer.extend_from_slice(&header);
    buffer.extend_from_slice(&[0u8; VOX_OFFSET - HEADER_SIZE]);

    // Reversing the axes makes row-major iteration walk x fastest
    for &v in data.t().iter() {
        match voxel_type {
            VoxelType::Int16 => buffer.extend_from_slice(&(v.round() as i16).to_le_bytes()),
            VoxelType::Float32 => buffer.extend_from_slice(&(v as f32).to_le_bytes()),
        }
    }
    Ok(buffer)
}

/// Write a volume as NIfTI-1, gzip compressed when the name ends in `.gz`
pub fn write_volume<D: Dimension>(
    path: &Path,
    data: &Array<f64, D>,
    geometry: &VolumeGeometry,
    voxel_type: VoxelType,
) -> Result<()> {
    let bytes = encode(data, geometry, voxel_type)?;
    let compressed = path
        .file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.ends_with(".gz"))
        .unwrap_or(false);

    if compressed {
        let file = std::fs::File::create(path)?;
        let mut encoder = GzEncoder::new(file, Compression::default());
        encoder.write_all(&bytes)?;
        encoder.finish()?;
    } else {
        std::fs::write(path, &bytes)?;
    }

    log::debug!("Wrote {} ({:?}, {:?})", path.display(), data.shape(), voxel_type);
    Ok(())
}

/// Write an integer label or mask volume
pub fn write_volume_i16(path: &Path, data: &Array3<f64>, geometry: &VolumeGeometry) -> Result<()> {
    write_volume(path, data, geometry, VoxelType::Int16)
}

/// Check that two volumes share a voxel grid and affine
pub fn ensure_same_grid(
    name_a: &str,
    a: ([usize; 3], &VolumeGeometry),
    name_b: &str,
    b: ([usize; 3], &VolumeGeometry),
) -> Result<()> {
    if a.0 != b.0 {
        return Err(MfxError::shape(
            format!("{} vs {}", name_b, name_a),
            a.0,
            b.0,
        ));
    }
    let max_diff = (a.1.affine - b.1.affine).abs().max();
    if max_diff > AFFINE_TOLERANCE {
        return Err(MfxError::Shape {
            what: format!("{} vs {}", name_b, name_a),
            expected: "matching affine".to_string(),
            found: format!("affine differing by {:.6}", max_diff),
        });
    }
    Ok(())
}

/// Boolean view of a volume: nonzero voxels are true
pub fn to_mask(data: &Array3<f64>) -> Array3<bool> {
    data.mapv(|v| v != 0.0)
}

/// Subject-axis length of a stack
pub fn subject_count(stack: &Array4<f64>) -> usize {
    stack.shape()[3]
}
