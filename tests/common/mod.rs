#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Mutex;

use zstack_transfer::{
    Extent, Region, TransferError, Volume, VolumeData,
    bossdb::{Resource, ResourceRegistry},
    storage::{Declaration, MemoryVolumeStore, RegionSink, RegionSource, VolumeStore},
};

pub fn init_logging() {
    env_logger::try_init().ok();
}

/// A `uint16` volume whose samples count up from 0 in C order.
pub fn ramp_volume(shape: [u64; 3]) -> Volume {
    let n: u64 = shape.iter().product();
    let data: Vec<u16> = (0..n).map(|i| (i % u16::MAX as u64) as u16).collect();
    Volume::with_default_voxels(shape, data).expect("valid volume")
}

#[derive(Debug, Clone, Copy)]
pub enum Failure {
    /// Fail this many times with a transient error, then succeed.
    Transient(u32),
    /// Always fail with a transient error.
    Always,
    /// Always fail with a fatal error.
    Fatal,
}

/// Injected failures and attempt counts, keyed by the first Z slice of the region.
#[derive(Default)]
struct Faults {
    failures: Mutex<HashMap<u64, Failure>>,
    attempts: Mutex<HashMap<u64, u32>>,
}

impl Faults {
    fn attempt(&self, z: u64) -> Result<(), TransferError> {
        *self.attempts.lock().unwrap().entry(z).or_default() += 1;
        match self.failures.lock().unwrap().get_mut(&z) {
            Some(Failure::Always) => Err(TransferError::transient("connection reset")),
            Some(Failure::Fatal) => Err(TransferError::fatal("403 forbidden")),
            Some(Failure::Transient(n)) if *n > 0 => {
                *n -= 1;
                Err(TransferError::transient("504 gateway timeout"))
            }
            _ => Ok(()),
        }
    }

    fn attempts(&self, z: u64) -> u32 {
        self.attempts
            .lock()
            .unwrap()
            .get(&z)
            .copied()
            .unwrap_or_default()
    }
}

/// A [MemoryVolumeStore] whose reads and writes fail on demand.
#[derive(Default)]
pub struct FlakyStore {
    inner: MemoryVolumeStore,
    reads: Faults,
    writes: Faults,
}

impl FlakyStore {
    pub fn with_extent(extent: Extent) -> Self {
        Self {
            inner: MemoryVolumeStore::with_extent(extent),
            ..Default::default()
        }
    }

    /// Fail writes of the region starting at `z_start`.
    pub fn fail_at(self, z_start: u64, failure: Failure) -> Self {
        self.writes
            .failures
            .lock()
            .unwrap()
            .insert(z_start, failure);
        self
    }

    /// Fail reads of the region starting at `z_start`.
    pub fn fail_reads_at(self, z_start: u64, failure: Failure) -> Self {
        self.reads
            .failures
            .lock()
            .unwrap()
            .insert(z_start, failure);
        self
    }

    /// Number of writes attempted for the region starting at `z_start`.
    pub fn attempts(&self, z_start: u64) -> u32 {
        self.writes.attempts(z_start)
    }

    /// Number of reads attempted for the region starting at `z_start`.
    pub fn read_attempts(&self, z_start: u64) -> u32 {
        self.reads.attempts(z_start)
    }

    pub fn into_inner(self) -> MemoryVolumeStore {
        self.inner
    }
}

impl RegionSource for FlakyStore {
    fn read_region(&self, region: &Region) -> Result<VolumeData, TransferError> {
        self.reads.attempt(region.z.start)?;
        self.inner.read_region(region)
    }
}

impl RegionSink for FlakyStore {
    fn write_region(&self, region: &Region, data: &VolumeData) -> Result<(), TransferError> {
        self.writes.attempt(region.z.start)?;
        self.inner.write_region(region, data)
    }

    fn contains_region(&self, region: &Region) -> Result<Option<bool>, TransferError> {
        self.inner.contains_region(region)
    }
}

impl VolumeStore for FlakyStore {
    fn extent(&self) -> zstack_transfer::Result<Option<Extent>> {
        self.inner.extent()
    }

    fn declare_extent(
        &self,
        extent: &Extent,
        overwrite: bool,
    ) -> zstack_transfer::Result<Declaration> {
        self.inner.declare_extent(extent, overwrite)
    }
}

/// An in-memory [ResourceRegistry] recording creation order.
#[derive(Default)]
pub struct FakeRegistry {
    pub resources: Mutex<Vec<Resource>>,
    pub created: Mutex<Vec<String>>,
}

impl FakeRegistry {
    pub fn with(resources: Vec<Resource>) -> Self {
        Self {
            resources: Mutex::new(resources),
            ..Default::default()
        }
    }
}

fn same_resource(a: &Resource, b: &Resource) -> bool {
    std::mem::discriminant(a) == std::mem::discriminant(b) && a.name() == b.name()
}

impl ResourceRegistry for FakeRegistry {
    fn get(&self, resource: &Resource) -> zstack_transfer::Result<Option<Resource>> {
        Ok(self
            .resources
            .lock()
            .unwrap()
            .iter()
            .find(|r| same_resource(r, resource))
            .cloned())
    }

    fn create(&self, resource: &Resource) -> zstack_transfer::Result<Resource> {
        self.resources.lock().unwrap().push(resource.clone());
        self.created
            .lock()
            .unwrap()
            .push(resource.name().to_string());
        Ok(resource.clone())
    }
}
