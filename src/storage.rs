use std::collections::HashSet;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::{Extent, Region, TransferError, Volume, VolumeData};

pub mod zarr;

/// Something chunks can be read from.
pub trait RegionSource: Send + Sync {
    /// Read the samples within `region`, C order.
    fn read_region(&self, region: &Region) -> Result<VolumeData, TransferError>;
}

/// Something chunks can be written into.
pub trait RegionSink: Send + Sync {
    /// Write `data` into `region` in a single operation.
    fn write_region(&self, region: &Region, data: &VolumeData) -> Result<(), TransferError>;

    /// Whether `region` has already been written.
    ///
    /// `None` means the sink cannot tell, in which case a resumed transfer rewrites it.
    fn contains_region(&self, _region: &Region) -> Result<Option<bool>, TransferError> {
        Ok(None)
    }
}

/// What [VolumeStore::declare_extent] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Declaration {
    /// Nothing was declared before.
    Created,
    /// An identical extent was already declared and left alone.
    Existing,
    /// An earlier declaration and its data were discarded.
    Replaced,
}

/// A store holding a single volume whose extent is declared before chunks are written.
pub trait VolumeStore: RegionSource + RegionSink {
    /// The declared extent, if any.
    fn extent(&self) -> crate::Result<Option<Extent>>;

    /// Declare the extent chunks will be written into.
    ///
    /// Without `overwrite`, an existing identical extent is kept
    /// and an existing different one is an error.
    fn declare_extent(&self, extent: &Extent, overwrite: bool) -> crate::Result<Declaration>;
}

/// Decide how a declaration of `requested` affects a store currently holding `existing`.
pub(crate) fn resolve_declaration(
    existing: Option<&Extent>,
    requested: &Extent,
    overwrite: bool,
) -> crate::Result<Declaration> {
    match existing {
        None => Ok(Declaration::Created),
        Some(_) if overwrite => Ok(Declaration::Replaced),
        Some(e) if e == requested => Ok(Declaration::Existing),
        Some(e) => Err(crate::Error::ExtentMismatch {
            declared: Box::new(e.clone()),
            requested: Box::new(requested.clone()),
        }),
    }
}

impl RegionSource for Volume {
    fn read_region(&self, region: &Region) -> Result<VolumeData, TransferError> {
        self.region(region).map_err(TransferError::fatal)
    }
}

struct MemoryVolume {
    extent: Extent,
    data: VolumeData,
    written: HashSet<Region>,
}

/// An in-memory [VolumeStore].
///
/// Used as the local target of downloads, and as a stand-in remote store.
#[derive(Default)]
pub struct MemoryVolumeStore {
    inner: RwLock<Option<MemoryVolume>>,
}

impl MemoryVolumeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store with `extent` already declared and zero-filled.
    pub fn with_extent(extent: Extent) -> Self {
        Self {
            inner: RwLock::new(Some(MemoryVolume::new(extent))),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Option<MemoryVolume>>, TransferError> {
        self.inner
            .read()
            .map_err(|_| TransferError::fatal("memory store lock poisoned"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Option<MemoryVolume>>, TransferError> {
        self.inner
            .write()
            .map_err(|_| TransferError::fatal("memory store lock poisoned"))
    }

    /// Number of distinct regions written since the extent was declared.
    pub fn written_regions(&self) -> usize {
        self.read()
            .ok()
            .and_then(|g| g.as_ref().map(|v| v.written.len()))
            .unwrap_or_default()
    }

    /// The stored volume; unwritten samples are 0.
    pub fn into_volume(self) -> crate::Result<Volume> {
        let inner = self
            .inner
            .into_inner()
            .map_err(|_| crate::Error::general("memory store lock poisoned"))?;
        let Some(v) = inner else {
            return Err(crate::Error::UndeclaredExtent);
        };
        Volume::new(
            v.extent.shape,
            v.data,
            v.extent.voxel_size,
            v.extent.voxel_unit,
        )
    }
}

impl MemoryVolume {
    fn new(extent: Extent) -> Self {
        let data = VolumeData::zeros(extent.sample_type, extent.num_samples() as usize);
        Self {
            extent,
            data,
            written: HashSet::new(),
        }
    }
}

impl RegionSource for MemoryVolumeStore {
    fn read_region(&self, region: &Region) -> Result<VolumeData, TransferError> {
        let guard = self.read()?;
        let v = guard
            .as_ref()
            .ok_or_else(|| TransferError::fatal("extent not declared"))?;
        if !region.fits_within(v.extent.shape) {
            return Err(TransferError::fatal(format!(
                "region {region:?} outside shape {:?}",
                v.extent.shape
            )));
        }
        Ok(v.data.extract(v.extent.shape, region))
    }
}

impl RegionSink for MemoryVolumeStore {
    fn write_region(&self, region: &Region, data: &VolumeData) -> Result<(), TransferError> {
        let mut guard = self.write()?;
        let v = guard
            .as_mut()
            .ok_or_else(|| TransferError::fatal("extent not declared"))?;
        v.data.insert(v.extent.shape, region, data)?;
        v.written.insert(region.clone());
        Ok(())
    }

    /// Only exact matches of previously written regions count.
    fn contains_region(&self, region: &Region) -> Result<Option<bool>, TransferError> {
        let guard = self.read()?;
        Ok(Some(
            guard
                .as_ref()
                .is_some_and(|v| v.written.contains(region)),
        ))
    }
}

impl VolumeStore for MemoryVolumeStore {
    fn extent(&self) -> crate::Result<Option<Extent>> {
        Ok(self.read()?.as_ref().map(|v| v.extent.clone()))
    }

    fn declare_extent(&self, extent: &Extent, overwrite: bool) -> crate::Result<Declaration> {
        let mut guard = self.write()?;
        let declaration =
            resolve_declaration(guard.as_ref().map(|v| &v.extent), extent, overwrite)?;
        if declaration != Declaration::Existing {
            *guard = Some(MemoryVolume::new(extent.clone()));
        }
        Ok(declaration)
    }
}
