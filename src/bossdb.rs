//! Naming and resource bookkeeping for volumes hosted on BossDB.
//!
//! Nothing here talks to the network; a [ResourceRegistry] is supplied by the caller.
use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{Extent, SampleType, Volume};

pub const BOSSDB_SCHEME: &str = "bossdb://";
pub const BOSSDB_API_URL: &str = "https://api.bossdb.io";
pub const NEUROGLANCER_URL: &str = "https://neuroglancer.bossdb.io";

/// Description given to resources created by this crate.
pub const DEFAULT_DESCRIPTION: &str = "Uploaded via zstack_transfer";

/// Address of a BossDB channel: `bossdb://collection/experiment/channel`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BossDbUrl {
    collection: String,
    experiment: String,
    channel: String,
}

fn check_component(url: &str, what: &str, value: &str) -> crate::Result<()> {
    if value.is_empty() {
        Err(crate::Error::invalid_url(url, format!("empty {what}")))
    } else if value.contains('/') || value.chars().any(char::is_whitespace) {
        Err(crate::Error::invalid_url(
            url,
            format!("{what} {value:?} contains '/' or whitespace"),
        ))
    } else {
        Ok(())
    }
}

impl BossDbUrl {
    pub fn new(
        collection: impl Into<String>,
        experiment: impl Into<String>,
        channel: impl Into<String>,
    ) -> crate::Result<Self> {
        let out = Self {
            collection: collection.into(),
            experiment: experiment.into(),
            channel: channel.into(),
        };
        let url = out.to_string();
        check_component(&url, "collection", &out.collection)?;
        check_component(&url, "experiment", &out.experiment)?;
        check_component(&url, "channel", &out.channel)?;
        Ok(out)
    }

    pub fn parse(url: &str) -> crate::Result<Self> {
        let Some(rest) = url.strip_prefix(BOSSDB_SCHEME) else {
            return Err(crate::Error::invalid_url(
                url,
                format!("expected scheme {BOSSDB_SCHEME}"),
            ));
        };
        let parts: Vec<_> = rest.trim_end_matches('/').split('/').collect();
        let [collection, experiment, channel] = parts.as_slice() else {
            return Err(crate::Error::invalid_url(
                url,
                format!(
                    "expected collection/experiment/channel, got {} components",
                    parts.len()
                ),
            ));
        };
        Self::new(*collection, *experiment, *channel)
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn experiment(&self) -> &str {
        &self.experiment
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Name of the coordinate frame shared by an experiment's channels.
    pub fn coord_frame_name(&self) -> String {
        format!("CF_{}_{}", self.collection, self.experiment)
    }

    /// Neuroglancer data source address of the channel.
    pub fn boss_source_url(&self) -> String {
        format!(
            "boss://{BOSSDB_API_URL}/{}/{}/{}",
            self.collection, self.experiment, self.channel
        )
    }

    /// Link opening the channel as a single Neuroglancer layer named after the channel.
    pub fn neuroglancer_url(&self) -> String {
        format!(
            "{NEUROGLANCER_URL}/#!{{'layers':{{'{}':{{'source':'{}','name':'{}'}}}}}}",
            self.experiment,
            self.boss_source_url(),
            self.channel
        )
    }
}

impl fmt::Display for BossDbUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{BOSSDB_SCHEME}{}/{}/{}",
            self.collection, self.experiment, self.channel
        )
    }
}

impl FromStr for BossDbUrl {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for BossDbUrl {
    type Error = crate::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<BossDbUrl> for String {
    fn from(value: BossDbUrl) -> Self {
        value.to_string()
    }
}

/// What a channel holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelKind {
    /// Raw intensities.
    Image,
    /// Segmentation labels.
    Annotation,
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ChannelKind::Image => "image",
            ChannelKind::Annotation => "annotation",
        })
    }
}

/// A volume tagged with the kind of channel it is uploaded to.
#[derive(Debug, Clone, PartialEq)]
pub enum UploadPayload {
    Image(Volume),
    Annotation(Volume),
}

impl UploadPayload {
    pub fn kind(&self) -> ChannelKind {
        match self {
            UploadPayload::Image(_) => ChannelKind::Image,
            UploadPayload::Annotation(_) => ChannelKind::Annotation,
        }
    }

    pub fn volume(&self) -> &Volume {
        match self {
            UploadPayload::Image(v) | UploadPayload::Annotation(v) => v,
        }
    }

    pub fn into_volume(self) -> Volume {
        match self {
            UploadPayload::Image(v) | UploadPayload::Annotation(v) => v,
        }
    }
}

/// A BossDB project resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "resource", rename_all = "snake_case")]
pub enum Resource {
    Collection {
        name: String,
        description: String,
    },
    CoordinateFrame {
        name: String,
        description: String,
        /// Exclusive upper bounds; lower bounds are 0.
        x_stop: u64,
        y_stop: u64,
        z_stop: u64,
        x_voxel_size: f64,
        y_voxel_size: f64,
        z_voxel_size: f64,
        voxel_unit: String,
    },
    Experiment {
        name: String,
        collection_name: String,
        coord_frame: String,
        description: String,
    },
    Channel {
        name: String,
        collection_name: String,
        experiment_name: String,
        #[serde(rename = "type")]
        kind: ChannelKind,
        datatype: SampleType,
        description: String,
    },
}

impl Resource {
    pub fn name(&self) -> &str {
        match self {
            Resource::Collection { name, .. }
            | Resource::CoordinateFrame { name, .. }
            | Resource::Experiment { name, .. }
            | Resource::Channel { name, .. } => name,
        }
    }
}

/// Lookup and creation of project resources, e.g. against the BossDB management API.
pub trait ResourceRegistry {
    /// The stored resource with the same kind and name, if it exists.
    fn get(&self, resource: &Resource) -> crate::Result<Option<Resource>>;

    /// Create the resource, returning it as stored.
    fn create(&self, resource: &Resource) -> crate::Result<Resource>;
}

fn get_or_create(registry: &impl ResourceRegistry, resource: &Resource) -> crate::Result<Resource> {
    match registry.get(resource)? {
        Some(r) => Ok(r),
        None => {
            log::info!("Creating {}", resource.name());
            registry.create(resource)
        }
    }
}

/// The resources a channel needs before data can be written to it.
#[derive(Debug, Clone, PartialEq)]
pub struct BossResources {
    pub collection: Resource,
    pub coord_frame: Resource,
    pub experiment: Resource,
    pub channel: Resource,
}

impl BossResources {
    pub fn new(url: &BossDbUrl, extent: &Extent, kind: ChannelKind) -> Self {
        let description = DEFAULT_DESCRIPTION.to_string();
        let coord_frame = url.coord_frame_name();
        let [z_stop, y_stop, x_stop] = extent.shape;
        let [z_voxel_size, y_voxel_size, x_voxel_size] = extent.voxel_size;
        Self {
            collection: Resource::Collection {
                name: url.collection().to_string(),
                description: description.clone(),
            },
            coord_frame: Resource::CoordinateFrame {
                name: coord_frame.clone(),
                description: description.clone(),
                x_stop,
                y_stop,
                z_stop,
                x_voxel_size,
                y_voxel_size,
                z_voxel_size,
                voxel_unit: extent.voxel_unit.clone(),
            },
            experiment: Resource::Experiment {
                name: url.experiment().to_string(),
                collection_name: url.collection().to_string(),
                coord_frame,
                description: description.clone(),
            },
            channel: Resource::Channel {
                name: url.channel().to_string(),
                collection_name: url.collection().to_string(),
                experiment_name: url.experiment().to_string(),
                kind,
                datatype: extent.sample_type,
                description,
            },
        }
    }

    /// Fetch or create each resource in dependency order.
    ///
    /// The experiment is bound to the coordinate frame as it exists in the registry,
    /// which may differ from the one requested.
    pub fn get_or_create_all(
        &self,
        registry: &impl ResourceRegistry,
    ) -> crate::Result<BossResources> {
        let collection = get_or_create(registry, &self.collection)?;
        let coord_frame = get_or_create(registry, &self.coord_frame)?;

        let mut experiment = self.experiment.clone();
        if let Resource::Experiment {
            coord_frame: frame, ..
        } = &mut experiment
        {
            *frame = coord_frame.name().to_string();
        }
        let experiment = get_or_create(registry, &experiment)?;
        let channel = get_or_create(registry, &self.channel)?;

        Ok(BossResources {
            collection,
            coord_frame,
            experiment,
            channel,
        })
    }
}
