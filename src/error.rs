use crate::volume::SampleType;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors which abort an operation before or instead of transferring data.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{0}")]
    General(String),
    #[error("chunk size must be positive")]
    InvalidChunkSize,
    #[error("invalid BossDB URL {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("destination extent has not been declared")]
    UndeclaredExtent,
    #[error("declared extent {declared:?} does not match {requested:?}")]
    ExtentMismatch {
        declared: Box<crate::Extent>,
        requested: Box<crate::Extent>,
    },
    #[error("region {region:?} lies outside the declared shape {shape:?}")]
    OutOfExtent {
        region: crate::Region,
        shape: [u64; 3],
    },
    #[error("expected {expected} samples, got {actual}")]
    SampleType {
        expected: SampleType,
        actual: SampleType,
    },
    #[error("unsupported sample type: {0}")]
    UnsupportedSampleType(String),
    #[error(transparent)]
    SerdeJson(#[from] serde_json::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Tiff(#[from] tiff::TiffError),
    #[error(transparent)]
    Storage(#[from] zarrs::storage::StorageError),
    #[error(transparent)]
    ArrayCreate(#[from] zarrs::array::ArrayCreateError),
    #[error(transparent)]
    Transfer(#[from] TransferError),
    #[error(transparent)]
    Wrapped(Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
    pub fn general(message: impl Into<String>) -> Self {
        Self::General(message.into())
    }

    pub fn wrap(error: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Wrapped(Box::new(error))
    }

    pub(crate) fn invalid_url(url: &str, reason: impl Into<String>) -> Self {
        Self::InvalidUrl {
            url: url.to_owned(),
            reason: reason.into(),
        }
    }
}

/// Failure of a single read or write against a store.
///
/// Only [TransferError::Transient] failures are retried.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransferError {
    #[error("transient: {0}")]
    Transient(String),
    #[error("fatal: {0}")]
    Fatal(String),
}

impl TransferError {
    pub fn transient(error: impl std::fmt::Display) -> Self {
        Self::Transient(error.to_string())
    }

    pub fn fatal(error: impl std::fmt::Display) -> Self {
        Self::Fatal(error.to_string())
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

impl From<zarrs::storage::StorageError> for TransferError {
    fn from(value: zarrs::storage::StorageError) -> Self {
        Self::transient(value)
    }
}

impl From<zarrs::array::ArrayError> for TransferError {
    fn from(value: zarrs::array::ArrayError) -> Self {
        match value {
            zarrs::array::ArrayError::StorageError(e) => e.into(),
            e => Self::fatal(e),
        }
    }
}
