use std::ops::Range;

/// Slices per chunk when none is configured.
///
/// A multiple of BossDB's 16-slice cuboid depth.
pub const DEFAULT_CHUNK_SIZE: u64 = 16;

/// One contiguous run of slices along the chunking axis.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChunkRange {
    pub index: usize,
    pub start: u64,
    pub stop: u64,
}

impl ChunkRange {
    pub fn len(&self) -> u64 {
        self.stop - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.stop == self.start
    }

    pub fn range(&self) -> Range<u64> {
        self.start..self.stop
    }
}

/// Division of an axis into chunks of `chunk_size` slices.
///
/// Chunks are contiguous and cover `[0, axis_length)` exactly once;
/// only the last may be shorter than `chunk_size`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferPlan {
    axis_length: u64,
    chunk_size: u64,
}

impl TransferPlan {
    pub fn new(axis_length: u64, chunk_size: u64) -> crate::Result<Self> {
        if chunk_size == 0 {
            return Err(crate::Error::InvalidChunkSize);
        }
        Ok(Self {
            axis_length,
            chunk_size,
        })
    }

    pub fn axis_length(&self) -> u64 {
        self.axis_length
    }

    pub fn chunk_size(&self) -> u64 {
        self.chunk_size
    }

    pub fn num_chunks(&self) -> usize {
        self.axis_length.div_ceil(self.chunk_size) as usize
    }

    /// The chunk at `index`, if the axis has one.
    pub fn chunk(&self, index: usize) -> Option<ChunkRange> {
        (index < self.num_chunks()).then(|| self.chunk_unchecked(index))
    }

    fn chunk_unchecked(&self, index: usize) -> ChunkRange {
        let start = index as u64 * self.chunk_size;
        let stop = (start + self.chunk_size).min(self.axis_length);
        ChunkRange { index, start, stop }
    }

    pub fn chunks(&self) -> impl ExactSizeIterator<Item = ChunkRange> + '_ {
        (0..self.num_chunks()).map(|i| self.chunk_unchecked(i))
    }
}
