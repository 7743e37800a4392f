pub mod bossdb;
pub mod chunk;
pub mod config;
mod error;
pub mod metadata;
pub mod readers;
pub mod report;
pub mod retry;
pub mod storage;
pub mod transfer;
pub mod upload;
mod volume;

pub use zarrs;

pub use bossdb::{BossDbUrl, ChannelKind, UploadPayload};
pub use chunk::{ChunkRange, TransferPlan};
pub use config::TransferConfig;
pub use error::{Error, Result, TransferError};
pub use report::{ChunkResult, Direction, TransferReport};
pub use transfer::ChunkedTransfer;
pub use volume::{DEFAULT_VOXEL_UNIT, Extent, Region, SampleType, Volume, VolumeData};
