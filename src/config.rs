use std::{path::Path, time::Duration};

use serde::{Deserialize, Serialize};

use crate::{
    chunk::DEFAULT_CHUNK_SIZE, metadata::Compression, retry::DEFAULT_MAX_RETRIES,
    retry::RetryPolicy,
};

/// Settings for a chunked transfer, typically loaded from JSON.
///
/// Every field is optional:
///
/// ```json
/// {"chunk_size": 32, "max_retries": 5, "compression": {"type": "gzip", "level": 5}}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TransferConfig {
    /// Slices along Z per chunk.
    pub chunk_size: u64,
    /// Retries per chunk after the first attempt.
    pub max_retries: u32,
    /// Pause between attempts at the same chunk, in milliseconds.
    pub retry_backoff_ms: u64,
    /// Replace an existing destination instead of leaving it alone.
    pub overwrite: bool,
    /// Write into an existing destination, skipping chunks it already holds.
    pub resume: bool,
    /// Compression for stores which create their own chunk encoding.
    pub compression: Compression,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_backoff_ms: 0,
            overwrite: false,
            resume: false,
            compression: Compression::default(),
        }
    }
}

impl TransferConfig {
    pub fn from_json_str(s: &str) -> crate::Result<Self> {
        let out: Self = serde_json::from_str(s)?;
        out.validate()?;
        Ok(out)
    }

    pub fn from_path(path: impl AsRef<Path>) -> crate::Result<Self> {
        let s = std::fs::read_to_string(path)?;
        Self::from_json_str(&s)
    }

    pub fn validate(&self) -> crate::Result<()> {
        if self.chunk_size == 0 {
            return Err(crate::Error::InvalidChunkSize);
        }
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_retries)
            .with_backoff(Duration::from_millis(self.retry_backoff_ms))
    }
}
