use std::collections::BTreeMap;
use std::fmt;
use std::ops::Range;

use crate::TransferError;

/// Which way data moves relative to the remote store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Upload,
    Download,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Direction::Upload => "upload",
            Direction::Download => "download",
        })
    }
}

/// Outcome of transferring one chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkResult {
    pub index: usize,
    pub range: Range<u64>,
    /// Zero if the chunk was skipped.
    pub attempts: u32,
    /// Error from the last attempt, if it failed.
    pub error: Option<TransferError>,
    /// The destination already held this chunk.
    pub skipped: bool,
}

impl ChunkResult {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Per-chunk outcomes of one transfer, keyed by chunk index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferReport {
    direction: Direction,
    chunks: BTreeMap<usize, ChunkResult>,
}

impl TransferReport {
    pub fn new(direction: Direction) -> Self {
        Self {
            direction,
            chunks: BTreeMap::new(),
        }
    }

    /// Add a chunk's outcome, replacing any earlier one for the same index.
    pub fn record(&mut self, result: ChunkResult) {
        self.chunks.insert(result.index, result);
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn total_chunks(&self) -> usize {
        self.chunks.len()
    }

    /// Chunks which were transferred or already present.
    pub fn succeeded(&self) -> usize {
        self.chunks.values().filter(|c| c.succeeded()).count()
    }

    pub fn failed(&self) -> Vec<usize> {
        self.chunks
            .values()
            .filter(|c| !c.succeeded())
            .map(|c| c.index)
            .collect()
    }

    pub fn skipped(&self) -> Vec<usize> {
        self.chunks
            .values()
            .filter(|c| c.skipped)
            .map(|c| c.index)
            .collect()
    }

    pub fn is_success(&self) -> bool {
        self.chunks.values().all(|c| c.succeeded())
    }

    pub fn chunk(&self, index: usize) -> Option<&ChunkResult> {
        self.chunks.get(&index)
    }

    /// Results in ascending chunk order.
    pub fn chunks(&self) -> impl Iterator<Item = &ChunkResult> {
        self.chunks.values()
    }
}

impl fmt::Display for TransferReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {}/{} chunks succeeded",
            self.direction,
            self.succeeded(),
            self.total_chunks()
        )?;
        let skipped = self.skipped().len();
        if skipped > 0 {
            write!(f, " ({skipped} already present)")?;
        }
        let failed = self.failed();
        if !failed.is_empty() {
            write!(f, ", failed: {failed:?}")?;
        }
        Ok(())
    }
}
