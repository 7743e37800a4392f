use crate::{
    BossDbUrl, ChunkedTransfer, TransferConfig, TransferReport,
    bossdb::{BossResources, ResourceRegistry, UploadPayload},
    storage::{Declaration, VolumeStore},
};

/// An image or annotation volume to be uploaded to a BossDB channel.
#[derive(Debug, Clone, PartialEq)]
pub struct VolumeUploadTask {
    pub url: BossDbUrl,
    pub payload: UploadPayload,
}

/// What happened to a [VolumeUploadTask].
#[derive(Debug, Clone, PartialEq)]
pub enum UploadOutcome {
    /// The destination already existed and neither overwriting nor resuming was requested.
    Skipped { url: BossDbUrl },
    /// Chunks were transferred; the report says whether all of them made it.
    Transferred {
        report: TransferReport,
        /// Viewer link, for image channels only.
        neuroglancer_url: Option<String>,
    },
}

impl UploadOutcome {
    /// Whether the destination now holds the whole volume as a result of this upload.
    pub fn is_complete(&self) -> bool {
        match self {
            UploadOutcome::Skipped { .. } => false,
            UploadOutcome::Transferred { report, .. } => report.is_success(),
        }
    }
}

impl VolumeUploadTask {
    pub fn new(url: BossDbUrl, payload: UploadPayload) -> Self {
        Self { url, payload }
    }

    /// Declare the channel's extent in `store` and upload the volume into it.
    ///
    /// `store` must address the channel named by [VolumeUploadTask::url].
    /// When the channel is newly declared or replaced, its collection, coordinate frame,
    /// experiment and channel are fetched from or created in `registry` first.
    pub fn execute<S, R>(
        &self,
        store: &S,
        registry: &R,
        config: &TransferConfig,
    ) -> crate::Result<UploadOutcome>
    where
        S: VolumeStore + ?Sized,
        R: ResourceRegistry,
    {
        let transfer = ChunkedTransfer::from_config(config)?;
        let volume = self.payload.volume();
        let extent = volume.extent();

        let declaration = store.declare_extent(&extent, config.overwrite)?;
        match declaration {
            Declaration::Existing if !config.resume => {
                log::warn!(
                    "Dataset already exists at {}. To overwrite, set `overwrite` to true",
                    self.url
                );
                return Ok(UploadOutcome::Skipped {
                    url: self.url.clone(),
                });
            }
            Declaration::Existing => {
                log::info!("Resuming {} upload to {}", self.payload.kind(), self.url)
            }
            Declaration::Created | Declaration::Replaced => {
                log::info!("{declaration:?} {} channel {}", self.payload.kind(), self.url);
                BossResources::new(&self.url, &extent, self.payload.kind())
                    .get_or_create_all(registry)?;
            }
        }

        let report = transfer.upload(volume, store)?;
        let neuroglancer_url = match &self.payload {
            UploadPayload::Image(_) => Some(self.url.neuroglancer_url()),
            UploadPayload::Annotation(_) => None,
        };
        Ok(UploadOutcome::Transferred {
            report,
            neuroglancer_url,
        })
    }
}
