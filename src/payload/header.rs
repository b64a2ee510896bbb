use tracing::debug;

use super::Operation;
use crate::config::ExtractConfig;
use crate::cursor::ByteCursor;
use crate::error::{Error, Result};
use crate::io::RangeFetcher;
use crate::zip::{ContainerFormat, ContainerLocation};

/// Little-endian value of the first four payload bytes.
pub const PAYLOAD_MAGIC: u32 = 0xED26FF3A;
pub const PAYLOAD_VERSION: u32 = 2;

/// magic + version + manifest size + metadata signature size
pub const PAYLOAD_HEADER_SIZE: u64 = 4 + 4 + 8 + 4;
pub const MAX_MANIFEST_ENTRIES: u32 = 100;
pub const MAX_NAME_LEN: u32 = 256;

const ENTRY_RESERVED_SIZE: u64 = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PayloadHeader {
    pub version: u32,
    pub manifest_size: u64,
    pub metadata_signature_size: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    pub name: String,
    pub size: u64,
    /// Absolute offset of the partition data within the source.
    pub offset: u64,
}

impl ManifestEntry {
    /// Operation list that rebuilds this partition.
    ///
    /// The fixed-layout manifest describes full images only, so this is a
    /// single `Replace` of the entry's bytes, relative to the payload body.
    pub fn operations(&self, payload_offset: u64) -> Vec<Operation> {
        vec![Operation::replace(
            self.offset.saturating_sub(payload_offset),
            self.size,
        )]
    }
}

/// Partitions in manifest order. Names are unique.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartitionManifest {
    entries: Vec<ManifestEntry>,
}

impl PartitionManifest {
    pub fn get(&self, name: &str) -> Option<&ManifestEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ManifestEntry> {
        self.entries.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn insert(&mut self, entry: ManifestEntry) -> Result<()> {
        if self.get(&entry.name).is_some() {
            return Err(Error::DuplicatePartition(entry.name));
        }
        self.entries.push(entry);
        Ok(())
    }
}

/// Fetch the header window at the payload body and decode it.
pub async fn read_header(
    fetcher: &RangeFetcher,
    location: ContainerLocation,
    config: &ExtractConfig,
) -> Result<(PayloadHeader, PartitionManifest)> {
    let window = config.header_window.min(location.payload_len);
    let data = fetcher.fetch_len(location.payload_offset, window).await?;

    parse_header(&data, location)
}

/// Decode the payload header and partition manifest from `data`, which
/// starts at the payload body.
///
/// Every entry must lie within the payload body described by `location`.
/// Offsets are then translated to absolute source offsets.
pub fn parse_header(
    data: &[u8],
    location: ContainerLocation,
) -> Result<(PayloadHeader, PartitionManifest)> {
    if (data.len() as u64) < PAYLOAD_HEADER_SIZE + 4 {
        return Err(Error::HeaderTooSmall(data.len() as u64));
    }

    let mut cursor = ByteCursor::new(data);

    let magic = cursor.read_u32()?;
    if magic != PAYLOAD_MAGIC {
        return Err(Error::MagicMismatch(magic));
    }

    let version = cursor.read_u32()?;
    if version != PAYLOAD_VERSION {
        return Err(Error::UnsupportedVersion(version));
    }

    let header = PayloadHeader {
        version,
        manifest_size: cursor.read_u64()?,
        metadata_signature_size: cursor.read_u32()?,
    };

    let count = cursor.read_u32()?;
    if !(1..=MAX_MANIFEST_ENTRIES).contains(&count) {
        return Err(Error::ManifestCountOutOfRange(count));
    }

    let base = match location.format {
        ContainerFormat::Zip => location.payload_offset,
        ContainerFormat::Raw => 0,
    };

    let mut manifest = PartitionManifest::default();
    for _ in 0..count {
        let entry = parse_entry(&mut cursor, base, location.payload_len)?;
        debug!(
            "Manifest entry {}: {} bytes at {}",
            entry.name, entry.size, entry.offset
        );
        manifest.insert(entry)?;
    }

    Ok((header, manifest))
}

fn parse_entry(cursor: &mut ByteCursor<'_>, base: u64, body_len: u64) -> Result<ManifestEntry> {
    let name_len = cursor.read_u32()?;
    if !(1..=MAX_NAME_LEN).contains(&name_len) {
        return Err(Error::NameLengthOutOfRange(name_len));
    }

    let name = String::from_utf8_lossy(cursor.read_slice(name_len.into())?).into_owned();
    let size = cursor.read_u64()?;
    let relative = cursor.read_u64()?;
    cursor.skip(ENTRY_RESERVED_SIZE)?;

    if size == 0 {
        return Err(Error::EmptyPartition(name));
    }

    let overrun = || Error::BufferOverrun {
        offset: relative,
        wanted: size,
        available: body_len,
    };
    match relative.checked_add(size) {
        Some(end) if end <= body_len => {}
        _ => return Err(overrun()),
    }
    let offset = base.checked_add(relative).ok_or_else(overrun)?;

    Ok(ManifestEntry { name, size, offset })
}
