use std::{
    fs::File,
    io::{BufReader, Cursor, Read, Seek},
    path::Path,
};

use npyz::{DType, NpyFile, Order};
use tiff::{
    ColorType,
    decoder::{Decoder, DecodingResult, Limits},
};

use crate::{Volume, VolumeData};

/// How the axes of an input array map onto Z, Y, X.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AxisOrder {
    /// Axes are already Z, Y, X.
    #[default]
    Zyx,
    /// Axes are X, Y, Z; the first and last are swapped on load.
    Xyz,
}

/// Reorder samples stored in `order` with file axes `shape` into C-order Z, Y, X.
fn to_zyx<T: Copy>(
    data: Vec<T>,
    shape: [u64; 3],
    order: Order,
    axis_order: AxisOrder,
) -> (Vec<T>, [u64; 3]) {
    let fortran = matches!(order, Order::Fortran);
    let [a0, a1, a2] = shape;
    match (fortran, axis_order) {
        (false, AxisOrder::Zyx) => return (data, shape),
        (true, AxisOrder::Xyz) => return (data, [a2, a1, a0]),
        _ => {}
    }

    let offset = |i0: u64, i1: u64, i2: u64| -> usize {
        if fortran {
            (i0 + a0 * (i1 + a1 * i2)) as usize
        } else {
            ((i0 * a1 + i1) * a2 + i2) as usize
        }
    };
    let out_shape = match axis_order {
        AxisOrder::Zyx => shape,
        AxisOrder::Xyz => [a2, a1, a0],
    };
    let mut out = Vec::with_capacity(data.len());
    for z in 0..out_shape[0] {
        for y in 0..out_shape[1] {
            for x in 0..out_shape[2] {
                let idx = match axis_order {
                    AxisOrder::Zyx => offset(z, y, x),
                    AxisOrder::Xyz => offset(x, y, z),
                };
                out.push(data[idx]);
            }
        }
    }
    (out, out_shape)
}

fn reorder(
    data: VolumeData,
    shape: [u64; 3],
    order: Order,
    axis_order: AxisOrder,
) -> (VolumeData, [u64; 3]) {
    match data {
        VolumeData::Uint8(v) => {
            let (v, shape) = to_zyx(v, shape, order, axis_order);
            (VolumeData::Uint8(v), shape)
        }
        VolumeData::Uint16(v) => {
            let (v, shape) = to_zyx(v, shape, order, axis_order);
            (VolumeData::Uint16(v), shape)
        }
    }
}

/// Load a 3D `uint8` or `uint16` NumPy array.
///
/// The volume gets unit voxels in the default unit;
/// use [Volume::with_voxels] to set the physical scale.
pub fn read_npy(bytes: &[u8], axis_order: AxisOrder) -> crate::Result<Volume> {
    let npy = NpyFile::new(bytes)?;
    let shape: [u64; 3] = npy.shape().try_into().map_err(|_| {
        crate::Error::general(format!("expected a 3D array, got shape {:?}", npy.shape()))
    })?;
    let order = npy.order();
    let type_str = match npy.dtype() {
        DType::Plain(ts) => ts.to_string(),
        d => {
            return Err(crate::Error::UnsupportedSampleType(format!("{d:?}")));
        }
    };
    // Strip the byte order character; npyz handles swapping.
    let data = match type_str.trim_start_matches(['<', '>', '|', '=']) {
        "u1" => VolumeData::Uint8(npy.into_vec()?),
        "u2" => VolumeData::Uint16(npy.into_vec()?),
        _ => return Err(crate::Error::UnsupportedSampleType(type_str.clone())),
    };
    let (data, shape) = reorder(data, shape, order, axis_order);
    Volume::with_default_voxels(shape, data)
}

pub fn read_npy_file(path: impl AsRef<Path>, axis_order: AxisOrder) -> crate::Result<Volume> {
    let bytes = std::fs::read(path.as_ref())?;
    log::debug!("read {} bytes from {}", bytes.len(), path.as_ref().display());
    read_npy(&bytes, axis_order)
}

fn decode_tiff<R: Read + Seek>(reader: R, axis_order: AxisOrder) -> crate::Result<Volume> {
    let mut decoder = Decoder::new(reader)?.with_limits(Limits::unlimited());
    let (width, height) = decoder.dimensions()?;
    let color_type = decoder.colortype()?;
    let mut data = match color_type {
        ColorType::Gray(8) => VolumeData::Uint8(Vec::new()),
        ColorType::Gray(16) => VolumeData::Uint16(Vec::new()),
        c => return Err(crate::Error::UnsupportedSampleType(format!("{c:?}"))),
    };

    let mut pages = 0;
    loop {
        if decoder.dimensions()? != (width, height) || decoder.colortype()? != color_type {
            return Err(crate::Error::general(format!(
                "page {pages} differs from the first page ({width}x{height} {color_type:?})"
            )));
        }
        match (&mut data, decoder.read_image()?) {
            (VolumeData::Uint8(v), DecodingResult::U8(page)) => v.extend(page),
            (VolumeData::Uint16(v), DecodingResult::U16(page)) => v.extend(page),
            _ => {
                return Err(crate::Error::UnsupportedSampleType(format!(
                    "{color_type:?} page {pages}"
                )));
            }
        }
        pages += 1;
        if !decoder.more_images() {
            break;
        }
        decoder.next_image()?;
    }

    // Pages are stacked along the first axis; rows are C order.
    let shape = [pages, height as u64, width as u64];
    let (data, shape) = reorder(data, shape, Order::C, axis_order);
    Volume::with_default_voxels(shape, data)
}

/// Load a multi-page greyscale TIFF of 8 or 16 bits per sample, one page per slice.
///
/// With [AxisOrder::Zyx] pages become Z slices;
/// with [AxisOrder::Xyz] the page axis and the column axis are swapped.
pub fn read_tiff(bytes: &[u8], axis_order: AxisOrder) -> crate::Result<Volume> {
    decode_tiff(Cursor::new(bytes), axis_order)
}

pub fn read_tiff_file(path: impl AsRef<Path>, axis_order: AxisOrder) -> crate::Result<Volume> {
    let file = File::open(path.as_ref())?;
    let volume = decode_tiff(BufReader::new(file), axis_order)?;
    log::debug!(
        "read {:?} volume from {}",
        volume.shape(),
        path.as_ref().display()
    );
    Ok(volume)
}
