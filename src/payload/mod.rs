//! OTA payload decoding and partition reconstruction.
//!
//! A [`Payload`] is opened once per source: the container is located, the
//! header and manifest are decoded, and the result is reused for every
//! partition extracted from it. Operation lists are derived one partition
//! at a time.

mod header;
mod operation;

pub use header::{
    MAX_MANIFEST_ENTRIES, MAX_NAME_LEN, ManifestEntry, PAYLOAD_HEADER_SIZE, PAYLOAD_MAGIC,
    PAYLOAD_VERSION, PartitionManifest, PayloadHeader, parse_header, read_header,
};
pub use operation::{Operation, OperationExecutor, OperationKind, PayloadBody};

use bytes::Bytes;

use crate::config::ExtractConfig;
use crate::error::{Error, Result};
use crate::io::RangeFetcher;
use crate::zip::{ContainerLocation, ContainerLocator};

/// A reconstructed partition image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionImage {
    pub name: String,
    pub data: Bytes,
}

pub struct Payload {
    fetcher: RangeFetcher,
    location: ContainerLocation,
    header: PayloadHeader,
    manifest: PartitionManifest,
}

impl std::fmt::Debug for Payload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Payload")
            .field("location", &self.location)
            .field("header", &self.header)
            .field("manifest", &self.manifest)
            .finish_non_exhaustive()
    }
}

impl Payload {
    /// Locate the payload in `fetcher`'s source and decode its manifest.
    pub async fn open(fetcher: RangeFetcher, config: &ExtractConfig) -> Result<Self> {
        let location = ContainerLocator::new(&fetcher, config).locate().await?;
        let (header, manifest) = read_header(&fetcher, location, config).await?;

        Ok(Self {
            fetcher,
            location,
            header,
            manifest,
        })
    }

    pub fn location(&self) -> ContainerLocation {
        self.location
    }

    pub fn header(&self) -> &PayloadHeader {
        &self.header
    }

    pub fn manifest(&self) -> &PartitionManifest {
        &self.manifest
    }

    pub fn fetcher(&self) -> &RangeFetcher {
        &self.fetcher
    }

    /// Rebuild one partition by name.
    pub async fn extract(&self, name: &str) -> Result<PartitionImage> {
        let entry = self
            .manifest
            .get(name)
            .ok_or_else(|| Error::PartitionNotFound(name.to_string()))?;

        let operations = entry.operations(self.location.payload_offset);
        let body = PayloadBody::new(
            &self.fetcher,
            self.location.payload_offset,
            self.location.payload_len,
        );
        let data = OperationExecutor::new(body)
            .execute(&entry.name, Some(entry.size), &operations)
            .await?;

        Ok(PartitionImage {
            name: entry.name.clone(),
            data,
        })
    }
}
