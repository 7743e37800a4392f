use std::{fmt, ops::Range};

use serde::{Deserialize, Serialize};

use crate::TransferError;

/// Voxel unit used when none is given.
pub const DEFAULT_VOXEL_UNIT: &str = "nanometers";

/// Width of the samples in a volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleType {
    Uint8,
    Uint16,
}

impl SampleType {
    /// Data type name as used by Zarr, NumPy and BossDB.
    pub fn name(&self) -> &'static str {
        match self {
            SampleType::Uint8 => "uint8",
            SampleType::Uint16 => "uint16",
        }
    }

    pub fn from_name(name: &str) -> crate::Result<Self> {
        match name {
            "uint8" => Ok(SampleType::Uint8),
            "uint16" => Ok(SampleType::Uint16),
            s => Err(crate::Error::UnsupportedSampleType(s.to_owned())),
        }
    }

    /// Size of one sample in bytes.
    pub fn size(&self) -> usize {
        match self {
            SampleType::Uint8 => 1,
            SampleType::Uint16 => 2,
        }
    }
}

impl fmt::Display for SampleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A box of voxels given as half-open ranges in Z, Y, X order.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Region {
    pub z: Range<u64>,
    pub y: Range<u64>,
    pub x: Range<u64>,
}

impl Region {
    pub fn new(z: Range<u64>, y: Range<u64>, x: Range<u64>) -> Self {
        Self { z, y, x }
    }

    /// The whole of an array with the given shape.
    pub fn full(shape: [u64; 3]) -> Self {
        Self::new(0..shape[0], 0..shape[1], 0..shape[2])
    }

    /// Slices `z` of an array with the given shape, full extent in Y and X.
    pub fn slab(z: Range<u64>, shape: [u64; 3]) -> Self {
        Self::new(z, 0..shape[1], 0..shape[2])
    }

    pub fn shape(&self) -> [u64; 3] {
        [
            self.z.end.saturating_sub(self.z.start),
            self.y.end.saturating_sub(self.y.start),
            self.x.end.saturating_sub(self.x.start),
        ]
    }

    pub fn num_samples(&self) -> u64 {
        self.shape().iter().product()
    }

    pub fn ranges(&self) -> [Range<u64>; 3] {
        [self.z.clone(), self.y.clone(), self.x.clone()]
    }

    /// Whether every range is well-formed and ends within `shape`.
    pub fn fits_within(&self, shape: [u64; 3]) -> bool {
        self.ranges()
            .iter()
            .zip(shape)
            .all(|(r, len)| r.start <= r.end && r.end <= len)
    }
}

/// Samples of a volume or region, C order (X fastest).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VolumeData {
    Uint8(Vec<u8>),
    Uint16(Vec<u16>),
}

impl From<Vec<u8>> for VolumeData {
    fn from(value: Vec<u8>) -> Self {
        Self::Uint8(value)
    }
}

impl From<Vec<u16>> for VolumeData {
    fn from(value: Vec<u16>) -> Self {
        Self::Uint16(value)
    }
}

impl VolumeData {
    /// Zero-filled data of the given type and length.
    pub fn zeros(sample_type: SampleType, len: usize) -> Self {
        match sample_type {
            SampleType::Uint8 => Self::Uint8(vec![0; len]),
            SampleType::Uint16 => Self::Uint16(vec![0; len]),
        }
    }

    pub fn sample_type(&self) -> SampleType {
        match self {
            VolumeData::Uint8(_) => SampleType::Uint8,
            VolumeData::Uint16(_) => SampleType::Uint16,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            VolumeData::Uint8(v) => v.len(),
            VolumeData::Uint16(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy `region` out of data laid out with `shape`.
    ///
    /// The region must fit within `shape`.
    pub(crate) fn extract(&self, shape: [u64; 3], region: &Region) -> Self {
        match self {
            VolumeData::Uint8(v) => Self::Uint8(copy_out(v, shape, region)),
            VolumeData::Uint16(v) => Self::Uint16(copy_out(v, shape, region)),
        }
    }

    /// Overwrite `region` of data laid out with `shape` with `data`.
    pub(crate) fn insert(
        &mut self,
        shape: [u64; 3],
        region: &Region,
        data: &VolumeData,
    ) -> Result<(), TransferError> {
        if !region.fits_within(shape) {
            return Err(TransferError::fatal(format!(
                "region {region:?} outside shape {shape:?}"
            )));
        }
        if data.len() as u64 != region.num_samples() {
            return Err(TransferError::fatal(format!(
                "region {region:?} needs {} samples, got {}",
                region.num_samples(),
                data.len()
            )));
        }
        match (self, data) {
            (VolumeData::Uint8(dst), VolumeData::Uint8(src)) => copy_in(dst, shape, region, src),
            (VolumeData::Uint16(dst), VolumeData::Uint16(src)) => copy_in(dst, shape, region, src),
            (dst, src) => {
                return Err(TransferError::fatal(format!(
                    "cannot write {} samples into {} data",
                    src.sample_type(),
                    dst.sample_type()
                )));
            }
        }
        Ok(())
    }
}

/// Offsets of the first sample of each X row of `region`, with the row length.
fn rows(shape: [u64; 3], region: &Region) -> impl Iterator<Item = (usize, usize)> + '_ {
    let [_, ny, nx] = shape;
    let row_len = (region.x.end - region.x.start) as usize;
    region.z.clone().flat_map(move |z| {
        region
            .y
            .clone()
            .map(move |y| (((z * ny + y) * nx + region.x.start) as usize, row_len))
    })
}

fn copy_out<T: Copy>(src: &[T], shape: [u64; 3], region: &Region) -> Vec<T> {
    let mut out = Vec::with_capacity(region.num_samples() as usize);
    for (offset, len) in rows(shape, region) {
        out.extend_from_slice(&src[offset..offset + len]);
    }
    out
}

fn copy_in<T: Copy>(dst: &mut [T], shape: [u64; 3], region: &Region, src: &[T]) {
    let mut read = 0;
    for (offset, len) in rows(shape, region) {
        dst[offset..offset + len].copy_from_slice(&src[read..read + len]);
        read += len;
    }
}

fn validate_voxel_size(voxel_size: [f64; 3]) -> crate::Result<()> {
    if voxel_size.iter().all(|v| v.is_finite() && *v > 0.0) {
        Ok(())
    } else {
        Err(crate::Error::general(format!(
            "voxel size must be finite and positive, got {voxel_size:?}"
        )))
    }
}

/// Declared shape, sample type and physical scale of a stored volume.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Extent {
    /// Z, Y, X.
    pub shape: [u64; 3],
    pub sample_type: SampleType,
    /// Z, Y, X.
    pub voxel_size: [f64; 3],
    pub voxel_unit: String,
}

impl Extent {
    pub fn new(
        shape: [u64; 3],
        sample_type: SampleType,
        voxel_size: [f64; 3],
        voxel_unit: impl Into<String>,
    ) -> crate::Result<Self> {
        validate_voxel_size(voxel_size)?;
        Ok(Self {
            shape,
            sample_type,
            voxel_size,
            voxel_unit: voxel_unit.into(),
        })
    }

    pub fn num_samples(&self) -> u64 {
        self.shape.iter().product()
    }
}

/// A dense Z, Y, X image stack held in memory.
#[derive(Debug, Clone, PartialEq)]
pub struct Volume {
    shape: [u64; 3],
    data: VolumeData,
    voxel_size: [f64; 3],
    voxel_unit: String,
}

impl Volume {
    pub fn new(
        shape: [u64; 3],
        data: impl Into<VolumeData>,
        voxel_size: [f64; 3],
        voxel_unit: impl Into<String>,
    ) -> crate::Result<Self> {
        let data = data.into();
        let expected: u64 = shape.iter().product();
        if data.len() as u64 != expected {
            return Err(crate::Error::general(format!(
                "shape {shape:?} needs {expected} samples, got {}",
                data.len()
            )));
        }
        validate_voxel_size(voxel_size)?;
        Ok(Self {
            shape,
            data,
            voxel_size,
            voxel_unit: voxel_unit.into(),
        })
    }

    /// Unit voxels in [DEFAULT_VOXEL_UNIT].
    pub fn with_default_voxels(
        shape: [u64; 3],
        data: impl Into<VolumeData>,
    ) -> crate::Result<Self> {
        Self::new(shape, data, [1.0; 3], DEFAULT_VOXEL_UNIT)
    }

    /// The same samples with a different physical scale.
    pub fn with_voxels(
        self,
        voxel_size: [f64; 3],
        voxel_unit: impl Into<String>,
    ) -> crate::Result<Self> {
        Self::new(self.shape, self.data, voxel_size, voxel_unit)
    }

    pub fn shape(&self) -> [u64; 3] {
        self.shape
    }

    pub fn data(&self) -> &VolumeData {
        &self.data
    }

    pub fn into_data(self) -> VolumeData {
        self.data
    }

    pub fn sample_type(&self) -> SampleType {
        self.data.sample_type()
    }

    pub fn voxel_size(&self) -> [f64; 3] {
        self.voxel_size
    }

    pub fn voxel_unit(&self) -> &str {
        &self.voxel_unit
    }

    /// The extent a store must declare to hold this volume.
    pub fn extent(&self) -> crate::Extent {
        Extent {
            shape: self.shape,
            sample_type: self.sample_type(),
            voxel_size: self.voxel_size,
            voxel_unit: self.voxel_unit.clone(),
        }
    }

    /// Copy of the samples within `region`.
    pub fn region(&self, region: &Region) -> crate::Result<VolumeData> {
        if !region.fits_within(self.shape) {
            return Err(crate::Error::OutOfExtent {
                region: region.clone(),
                shape: self.shape,
            });
        }
        Ok(self.data.extract(self.shape, region))
    }

    /// Mean sample value of each Z slice.
    ///
    /// Slices with no samples have a mean of 0.
    pub fn depth_mean_brightness(&self) -> Vec<f64> {
        let slice_len = (self.shape[1] * self.shape[2]) as usize;
        if slice_len == 0 {
            return vec![0.0; self.shape[0] as usize];
        }
        fn means<T: Copy + Into<f64>>(v: &[T], slice_len: usize) -> Vec<f64> {
            v.chunks(slice_len)
                .map(|s| s.iter().map(|&x| x.into()).sum::<f64>() / slice_len as f64)
                .collect()
        }
        match &self.data {
            VolumeData::Uint8(v) => means(v, slice_len),
            VolumeData::Uint16(v) => means(v, slice_len),
        }
    }
}
