use std::time::Duration;

use crate::{
    ChunkRange, Direction, Extent, Region, TransferConfig, TransferPlan, TransferReport, Volume,
    report::ChunkResult,
    retry::RetryPolicy,
    storage::{MemoryVolumeStore, RegionSink, RegionSource, VolumeStore},
};

/// Moves a volume between a source and a sink in slabs of `chunk_size` Z slices,
/// retrying each slab independently.
///
/// Failed chunks do not stop the transfer; they are listed in the returned [TransferReport].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkedTransfer {
    chunk_size: u64,
    retry: RetryPolicy,
    resume: bool,
}

impl ChunkedTransfer {
    pub fn new(chunk_size: u64, max_retries: u32) -> crate::Result<Self> {
        if chunk_size == 0 {
            return Err(crate::Error::InvalidChunkSize);
        }
        Ok(Self {
            chunk_size,
            retry: RetryPolicy::new(max_retries),
            resume: false,
        })
    }

    pub fn from_config(config: &TransferConfig) -> crate::Result<Self> {
        config.validate()?;
        Ok(Self::new(config.chunk_size, config.max_retries)?
            .with_retry_policy(config.retry_policy())
            .with_resume(config.resume))
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.retry = self.retry.with_backoff(backoff);
        self
    }

    /// Skip chunks the sink reports as already written.
    pub fn with_resume(mut self, resume: bool) -> Self {
        self.resume = resume;
        self
    }

    pub fn chunk_size(&self) -> u64 {
        self.chunk_size
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    pub fn plan(&self, axis_length: u64) -> crate::Result<TransferPlan> {
        TransferPlan::new(axis_length, self.chunk_size)
    }

    /// Transfer every chunk of an array with the given shape from `source` to `sink`.
    ///
    /// Nothing is checked about the sink's extent;
    /// see [ChunkedTransfer::upload] and [ChunkedTransfer::download].
    pub fn run<Src, Dst>(
        &self,
        direction: Direction,
        source: &Src,
        sink: &Dst,
        shape: [u64; 3],
    ) -> crate::Result<TransferReport>
    where
        Src: RegionSource + ?Sized,
        Dst: RegionSink + ?Sized,
    {
        let plan = self.plan(shape[0])?;
        log::info!(
            "Starting {direction} of {} slices in {} chunks",
            plan.axis_length(),
            plan.num_chunks()
        );

        let mut report = TransferReport::new(direction);
        for chunk in plan.chunks() {
            report.record(self.transfer_chunk(&chunk, source, sink, shape));
        }

        if report.is_success() {
            log::info!("Finished {report}");
        } else {
            log::warn!("Finished {report}");
        }
        Ok(report)
    }

    fn transfer_chunk<Src, Dst>(
        &self,
        chunk: &ChunkRange,
        source: &Src,
        sink: &Dst,
        shape: [u64; 3],
    ) -> ChunkResult
    where
        Src: RegionSource + ?Sized,
        Dst: RegionSink + ?Sized,
    {
        let region = Region::slab(chunk.range(), shape);

        if self.resume {
            match sink.contains_region(&region) {
                Ok(Some(true)) => {
                    log::debug!(
                        "Chunk {} [{}, {}) already present, skipping",
                        chunk.index,
                        chunk.start,
                        chunk.stop
                    );
                    return ChunkResult {
                        index: chunk.index,
                        range: chunk.range(),
                        attempts: 0,
                        error: None,
                        skipped: true,
                    };
                }
                Ok(_) => {}
                Err(e) => log::warn!(
                    "Could not check chunk {} [{}, {}), rewriting it: {e}",
                    chunk.index,
                    chunk.start,
                    chunk.stop
                ),
            }
        }

        let attempted = self.retry.run(
            |_| {
                let data = source.read_region(&region)?;
                sink.write_region(&region, &data)
            },
            |attempt, e| {
                log::warn!(
                    "Error transferring chunk {} [{}, {}) on attempt {attempt}: {e}; retrying",
                    chunk.index,
                    chunk.start,
                    chunk.stop
                )
            },
        );

        match &attempted.result {
            Ok(()) => log::debug!(
                "Transferred chunk {} [{}, {}) in {} attempt(s)",
                chunk.index,
                chunk.start,
                chunk.stop,
                attempted.attempts
            ),
            Err(e) => log::error!(
                "Chunk {} [{}, {}) failed after {} attempt(s): {e}",
                chunk.index,
                chunk.start,
                chunk.stop,
                attempted.attempts
            ),
        }

        ChunkResult {
            index: chunk.index,
            range: chunk.range(),
            attempts: attempted.attempts,
            error: attempted.result.err(),
            skipped: false,
        }
    }

    /// Upload an in-memory volume into a store whose extent is already declared.
    pub fn upload<S: VolumeStore + ?Sized>(
        &self,
        volume: &Volume,
        store: &S,
    ) -> crate::Result<TransferReport> {
        self.upload_from(volume, &volume.extent(), store)
    }

    /// Upload from a lazy source holding a volume described by `extent`.
    ///
    /// Fails without writing anything if the store's extent is undeclared,
    /// has a different sample type, or is smaller than `extent`.
    pub fn upload_from<Src, S>(
        &self,
        source: &Src,
        extent: &Extent,
        store: &S,
    ) -> crate::Result<TransferReport>
    where
        Src: RegionSource + ?Sized,
        S: VolumeStore + ?Sized,
    {
        let declared = store.extent()?.ok_or(crate::Error::UndeclaredExtent)?;
        if declared.sample_type != extent.sample_type {
            return Err(crate::Error::SampleType {
                expected: declared.sample_type,
                actual: extent.sample_type,
            });
        }
        let region = Region::full(extent.shape);
        if !region.fits_within(declared.shape) {
            return Err(crate::Error::OutOfExtent {
                region,
                shape: declared.shape,
            });
        }
        if declared.voxel_size != extent.voxel_size || declared.voxel_unit != extent.voxel_unit {
            log::warn!(
                "Uploading voxels of {:?} {} into an extent declared with {:?} {}",
                extent.voxel_size,
                extent.voxel_unit,
                declared.voxel_size,
                declared.voxel_unit
            );
        }
        self.run(Direction::Upload, source, store, extent.shape)
    }

    /// Download a store's whole volume into memory.
    ///
    /// Chunks which failed are left as zeros; check the report.
    pub fn download<S: VolumeStore + ?Sized>(
        &self,
        store: &S,
    ) -> crate::Result<(Volume, TransferReport)> {
        let extent = store.extent()?.ok_or(crate::Error::UndeclaredExtent)?;
        let local = MemoryVolumeStore::with_extent(extent.clone());
        let report = self.run(Direction::Download, store, &local, extent.shape)?;
        Ok((local.into_volume()?, report))
    }
}
