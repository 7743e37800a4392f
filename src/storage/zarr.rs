use std::sync::{Arc, RwLock};

use zarrs::{
    array::{Array, ArrayBytes, ArrayMetadata, ArrayMetadataV3, ArraySubset},
    storage::{ReadableWritableStorageTraits, StoreKey, StorePrefix},
};

use super::{Declaration, RegionSink, RegionSource, VolumeStore, resolve_declaration};
use crate::{
    Extent, Region, SampleType, TransferError, VolumeData,
    metadata::{self, Compression, DEFAULT_BLOCK_SHAPE},
};

struct OpenArray<S: ?Sized> {
    array: Array<S>,
    extent: Extent,
    /// `zarr.json` as it was when the array was opened.
    metadata: Vec<u8>,
}

/// A [VolumeStore] holding the volume as a Zarr V3 array at `path` in any `zarrs` storage.
///
/// The array metadata is re-read before every region access,
/// so a redeclaration through another handle on the same storage is picked up by the next chunk.
pub struct ZarrVolumeStore<S: ?Sized> {
    storage: Arc<S>,
    path: String,
    block_shape: [u64; 3],
    compression: Compression,
    open: RwLock<Option<OpenArray<S>>>,
}

impl<S: ReadableWritableStorageTraits + ?Sized + 'static> ZarrVolumeStore<S> {
    /// `path` is an absolute node path such as `/` or `/volume`.
    pub fn new(storage: Arc<S>, path: impl Into<String>) -> Self {
        Self {
            storage,
            path: path.into(),
            block_shape: DEFAULT_BLOCK_SHAPE,
            compression: Compression::default(),
            open: RwLock::new(None),
        }
    }

    /// Chunk shape used by subsequent declarations, clipped to the array shape.
    pub fn with_block_shape(mut self, block_shape: [u64; 3]) -> Self {
        self.block_shape = block_shape;
        self
    }

    /// Compression used by subsequent declarations.
    pub fn with_compression(mut self, compression: Compression) -> Self {
        self.compression = compression;
        self
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    fn node_prefix(&self) -> &str {
        self.path.trim_start_matches('/').trim_end_matches('/')
    }

    /// Key of the array's `zarr.json`.
    fn metadata_key(&self) -> crate::Result<StoreKey> {
        let prefix = self.node_prefix();
        let key = if prefix.is_empty() {
            "zarr.json".to_string()
        } else {
            format!("{prefix}/zarr.json")
        };
        StoreKey::new(key).map_err(crate::Error::wrap)
    }

    fn store_prefix(&self) -> crate::Result<StorePrefix> {
        let prefix = self.node_prefix();
        if prefix.is_empty() {
            Ok(StorePrefix::root())
        } else {
            StorePrefix::new(format!("{prefix}/")).map_err(crate::Error::wrap)
        }
    }

    /// Run `f` against the array, reopening it if its metadata changed since it was opened.
    fn with_array<T>(
        &self,
        f: impl FnOnce(&OpenArray<S>) -> Result<T, TransferError>,
    ) -> Result<T, TransferError> {
        let key = self.metadata_key().map_err(TransferError::fatal)?;
        let Some(raw) = self.storage.get(&key)? else {
            return Err(TransferError::fatal("extent not declared"));
        };
        {
            let guard = self
                .open
                .read()
                .map_err(|_| TransferError::fatal("zarr store lock poisoned"))?;
            if let Some(open) = guard.as_ref().filter(|o| o.metadata[..] == raw[..]) {
                return f(open);
            }
        }

        log::debug!("opening array at {}", self.path);
        let metadata: ArrayMetadataV3 =
            serde_json::from_slice(&raw).map_err(TransferError::fatal)?;
        let extent = metadata::metadata_to_extent(&metadata).map_err(TransferError::fatal)?;
        let array = Array::new_with_metadata(
            self.storage.clone(),
            &self.path,
            ArrayMetadata::V3(metadata),
        )
        .map_err(TransferError::fatal)?;
        let mut guard = self
            .open
            .write()
            .map_err(|_| TransferError::fatal("zarr store lock poisoned"))?;
        f(guard.insert(OpenArray {
            array,
            extent,
            metadata: raw.to_vec(),
        }))
    }
}

fn check_region(region: &Region, extent: &Extent) -> Result<(), TransferError> {
    if region.fits_within(extent.shape) {
        Ok(())
    } else {
        Err(TransferError::fatal(format!(
            "region {region:?} outside shape {:?}",
            extent.shape
        )))
    }
}

impl<S: ReadableWritableStorageTraits + ?Sized + 'static> RegionSource for ZarrVolumeStore<S> {
    fn read_region(&self, region: &Region) -> Result<VolumeData, TransferError> {
        self.with_array(|open| {
            check_region(region, &open.extent)?;
            let subset = ArraySubset::new_with_ranges(&region.ranges());
            let data = match open.extent.sample_type {
                SampleType::Uint8 => {
                    let samples: Vec<u8> = open.array.retrieve_array_subset(&subset)?;
                    VolumeData::Uint8(samples)
                }
                SampleType::Uint16 => {
                    let samples: Vec<u16> = open.array.retrieve_array_subset(&subset)?;
                    VolumeData::Uint16(samples)
                }
            };
            Ok(data)
        })
    }
}

impl<S: ReadableWritableStorageTraits + ?Sized + 'static> RegionSink for ZarrVolumeStore<S> {
    fn write_region(&self, region: &Region, data: &VolumeData) -> Result<(), TransferError> {
        self.with_array(|open| {
            check_region(region, &open.extent)?;
            if data.sample_type() != open.extent.sample_type {
                return Err(TransferError::fatal(format!(
                    "cannot write {} samples into a {} array",
                    data.sample_type(),
                    open.extent.sample_type
                )));
            }
            if data.len() as u64 != region.num_samples() {
                return Err(TransferError::fatal(format!(
                    "region {region:?} needs {} samples, got {}",
                    region.num_samples(),
                    data.len()
                )));
            }
            let bytes: Vec<u8> = match data {
                VolumeData::Uint8(v) => v.clone(),
                VolumeData::Uint16(v) => v.iter().flat_map(|s| s.to_ne_bytes()).collect(),
            };
            let subset = ArraySubset::new_with_ranges(&region.ranges());
            open.array
                .store_array_subset(&subset, ArrayBytes::new_flen(bytes))?;
            Ok(())
        })
    }
}

impl<S: ReadableWritableStorageTraits + ?Sized + 'static> VolumeStore for ZarrVolumeStore<S> {
    fn extent(&self) -> crate::Result<Option<Extent>> {
        let Some(bytes) = self.storage.get(&self.metadata_key()?)? else {
            return Ok(None);
        };
        let metadata: ArrayMetadataV3 = serde_json::from_slice(&bytes)?;
        metadata::metadata_to_extent(&metadata).map(Some)
    }

    fn declare_extent(&self, extent: &Extent, overwrite: bool) -> crate::Result<Declaration> {
        let existing = self.extent()?;
        let declaration = resolve_declaration(existing.as_ref(), extent, overwrite)?;
        match declaration {
            Declaration::Existing => return Ok(declaration),
            Declaration::Replaced => {
                log::debug!("erasing existing array at {}", self.path);
                self.storage.erase_prefix(&self.store_prefix()?)?;
            }
            Declaration::Created => {}
        }

        let metadata = metadata::extent_to_metadata(extent, self.block_shape, self.compression)?;
        let array = Array::new_with_metadata(
            self.storage.clone(),
            &self.path,
            ArrayMetadata::V3(metadata),
        )?;
        array.store_metadata()?;

        let mut guard = self
            .open
            .write()
            .map_err(|_| crate::Error::general("zarr store lock poisoned"))?;
        *guard = None;
        Ok(declaration)
    }
}
