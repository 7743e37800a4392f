use std::{borrow::Cow, num::NonZeroU64};

use serde::{Deserialize, Serialize};
use zarrs::{
    array::{
        ArrayMetadataV3, FillValueMetadata,
        chunk_grid::{RegularBoundedChunkGrid, RegularBoundedChunkGridConfiguration},
        data_type,
    },
    metadata::v3::MetadataV3,
    plugin::{ExtensionAliasesV3, ExtensionName},
};

use crate::{Extent, SampleType, volume::DEFAULT_VOXEL_UNIT};

/// Array attribute holding the Z, Y, X voxel size.
pub const VOXEL_SIZE_ATTRIBUTE: &str = "voxel_size";
/// Array attribute holding the voxel unit.
pub const VOXEL_UNIT_ATTRIBUTE: &str = "voxel_unit";

/// Storage block shape (Z, Y, X) used by BossDB cuboids.
pub const DEFAULT_BLOCK_SHAPE: [u64; 3] = [16, 512, 512];

/// Compression applied to each stored chunk.
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Copy)]
#[serde(rename_all = "camelCase", tag = "type")]
pub enum Compression {
    /// Uncompressed.
    #[default]
    Raw,
    Gzip {
        /// Default 5. Must be in the range 0..=9.
        #[serde(default = "default_gzip_level")]
        level: u32,
    },
    Zstd {
        /// Default 3.
        #[serde(default = "default_zstd_level")]
        level: i32,
    },
}

fn default_gzip_level() -> u32 {
    5
}

fn default_zstd_level() -> i32 {
    3
}

impl Compression {
    /// Convert to bytes-to-bytes codec metadata, if compressed.
    fn to_codec_metadata(self) -> crate::Result<Option<MetadataV3>> {
        let meta = match self {
            Compression::Raw => return Ok(None),
            Compression::Gzip { level } if level > 9 => {
                return Err(crate::Error::general(format!(
                    "invalid gzip compression level {level}"
                )));
            }
            Compression::Gzip { level } => MetadataV3::new_with_serializable_configuration(
                "gzip".to_string(),
                &serde_json::json!({ "level": level }),
            )?,
            Compression::Zstd { level } => MetadataV3::new_with_serializable_configuration(
                "zstd".to_string(),
                &serde_json::json!({ "level": level, "checksum": false }),
            )?,
        };
        Ok(Some(meta))
    }
}

/// Clips the block shape to the array and creates a regular chunk grid.
fn convert_chunk_grid(shape: [u64; 3], block_shape: [u64; 3]) -> crate::Result<MetadataV3> {
    let chunk_shape: Vec<_> = shape
        .iter()
        .zip(block_shape)
        .map(|(&len, block)| {
            NonZeroU64::new(block.min(len).max(1))
                .ok_or_else(|| crate::Error::general("zero block size"))
        })
        .collect::<crate::Result<Vec<_>>>()?;
    let out = MetadataV3::new_with_serializable_configuration(
        RegularBoundedChunkGrid::aliases_v3()
            .default_name
            .clone()
            .to_string(),
        &RegularBoundedChunkGridConfiguration { chunk_shape },
    )?;

    Ok(out)
}

fn convert_data_type(sample_type: SampleType) -> MetadataV3 {
    let data_type = match sample_type {
        SampleType::Uint8 => data_type::uint8(),
        SampleType::Uint16 => data_type::uint16(),
    };
    let data_type_name = data_type
        .name_v3()
        .map_or_else(String::new, Cow::into_owned);
    let data_type_configuration = data_type.configuration_v3();
    if data_type_configuration.is_empty() {
        MetadataV3::new(data_type_name)
    } else {
        MetadataV3::new_with_configuration(data_type_name, data_type_configuration)
    }
}

fn bytes_codec() -> crate::Result<MetadataV3> {
    Ok(MetadataV3::new_with_serializable_configuration(
        "bytes".to_string(),
        &serde_json::json!({ "endian": "little" }),
    )?)
}

/// Zarr V3 array metadata for storing a volume with the given extent.
///
/// Voxel size and unit are kept as array attributes.
pub fn extent_to_metadata(
    extent: &Extent,
    block_shape: [u64; 3],
    compression: Compression,
) -> crate::Result<ArrayMetadataV3> {
    let chunk_grid = convert_chunk_grid(extent.shape, block_shape)?;
    let data_type = convert_data_type(extent.sample_type);
    let codecs = std::iter::once(bytes_codec())
        .chain(compression.to_codec_metadata().transpose())
        .collect::<crate::Result<Vec<_>>>()?;

    let mut attributes = serde_json::Map::new();
    attributes.insert(
        VOXEL_SIZE_ATTRIBUTE.to_string(),
        serde_json::to_value(extent.voxel_size)?,
    );
    attributes.insert(
        VOXEL_UNIT_ATTRIBUTE.to_string(),
        serde_json::Value::String(extent.voxel_unit.clone()),
    );

    let out = ArrayMetadataV3::new(
        extent.shape.to_vec(),
        chunk_grid,
        data_type,
        FillValueMetadata::Number(serde_json::Number::from(0)),
        codecs,
    )
    .with_attributes(attributes);
    Ok(out)
}

/// Recover the extent of a volume stored with [extent_to_metadata].
///
/// Arrays without voxel attributes get unit voxels in the default unit.
pub fn metadata_to_extent(metadata: &ArrayMetadataV3) -> crate::Result<Extent> {
    let shape: [u64; 3] = metadata.shape.as_slice().try_into().map_err(|_| {
        crate::Error::general(format!(
            "expected a 3D array, got shape {:?}",
            metadata.shape
        ))
    })?;
    let sample_type = SampleType::from_name(metadata.data_type.name())?;
    let voxel_size = match metadata.attributes.get(VOXEL_SIZE_ATTRIBUTE) {
        Some(v) => serde_json::from_value(v.clone())?,
        None => [1.0; 3],
    };
    let voxel_unit = match metadata.attributes.get(VOXEL_UNIT_ATTRIBUTE) {
        Some(serde_json::Value::String(s)) => s.clone(),
        Some(v) => {
            return Err(crate::Error::general(format!(
                "voxel unit should be a string, got {v}"
            )));
        }
        None => DEFAULT_VOXEL_UNIT.to_string(),
    };
    Extent::new(shape, sample_type, voxel_size, voxel_unit)
}
