//! Container detection and payload lookup.
//!
//! A source is either a bare payload (it starts with the payload magic) or a
//! ZIP archive whose central directory names a stored `payload.bin`. ZIP
//! archives are read from the end, so only the directory, one local header
//! and four bytes of the candidate body are fetched before the payload
//! offset is known.

use tracing::{debug, warn};

use super::structures::*;
use crate::config::ExtractConfig;
use crate::cursor::ByteCursor;
use crate::error::{Error, Result};
use crate::io::RangeFetcher;
use crate::payload::PAYLOAD_MAGIC;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerFormat {
    /// The source is the payload itself.
    Raw,
    /// The payload is a stored entry inside a ZIP archive.
    Zip,
}

/// Where the payload body sits within the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContainerLocation {
    pub format: ContainerFormat,
    pub payload_offset: u64,
    /// Length of the payload body. For ZIP sources this is the stored entry
    /// size, so nothing past the entry is ever read as payload data.
    pub payload_len: u64,
}

/// Resolved central directory bounds, after any ZIP64 indirection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct CentralDirectory {
    offset: u64,
    size: u64,
    total_entries: u64,
}

pub struct ContainerLocator<'a> {
    fetcher: &'a RangeFetcher,
    config: &'a ExtractConfig,
}

impl<'a> ContainerLocator<'a> {
    pub fn new(fetcher: &'a RangeFetcher, config: &'a ExtractConfig) -> Self {
        Self { fetcher, config }
    }

    /// Detect the container format and find the payload body offset.
    pub async fn locate(&self) -> Result<ContainerLocation> {
        let len = self.fetcher.len();
        if len < 4 {
            let mut leading = [0u8; 4];
            let head = self.fetcher.fetch_len(0, len).await?;
            leading[..head.len()].copy_from_slice(&head);
            return Err(Error::UnknownFormat(leading));
        }

        let head = self.fetcher.fetch(0, 3).await?;
        let leading = ByteCursor::new(&head).read_array::<4>()?;

        match u32::from_le_bytes(leading) {
            PAYLOAD_MAGIC => {
                debug!("Source is a raw payload");
                Ok(ContainerLocation {
                    format: ContainerFormat::Raw,
                    payload_offset: 0,
                    payload_len: len,
                })
            }
            LFH_SIGNATURE => {
                let (payload_offset, payload_len) = self.find_payload().await?;
                debug!("Payload found inside ZIP at offset {payload_offset}, {payload_len} bytes");
                Ok(ContainerLocation {
                    format: ContainerFormat::Zip,
                    payload_offset,
                    payload_len,
                })
            }
            _ => Err(Error::UnknownFormat(leading)),
        }
    }

    /// Find and parse the End of Central Directory record.
    ///
    /// Searches the trailing window backwards for the signature, so archives
    /// with a comment are handled too.
    async fn find_eocd(&self) -> Result<(EndOfCentralDirectory, u64)> {
        let len = self.fetcher.len();
        let window = self.config.eocd_window.min(len);
        if window < EndOfCentralDirectory::SIZE as u64 {
            return Err(Error::ContainerNotFound(
                "archive too small for End of Central Directory".to_string(),
            ));
        }

        let window_start = len - window;
        let buf = self.fetcher.fetch(window_start, len - 1).await?;
        if buf.len() < EndOfCentralDirectory::SIZE {
            return Err(Error::ContainerNotFound(
                "truncated End of Central Directory window".to_string(),
            ));
        }
        let signature = EndOfCentralDirectory::SIGNATURE.to_le_bytes();

        for i in (0..=buf.len().saturating_sub(EndOfCentralDirectory::SIZE)).rev() {
            if buf[i..i + 4] != signature {
                continue;
            }

            let record = &buf[i..i + EndOfCentralDirectory::SIZE];
            let eocd = EndOfCentralDirectory::from_bytes(record)?;

            // A signature inside compressed data would claim a comment longer than the window
            if i + EndOfCentralDirectory::SIZE + usize::from(eocd.comment_len) <= buf.len() {
                return Ok((eocd, window_start + i as u64));
            }
        }

        Err(Error::ContainerNotFound(
            "End of Central Directory not found".to_string(),
        ))
    }

    /// Follow the ZIP64 locator that sits immediately before the EOCD.
    async fn read_zip64_eocd(&self, eocd_offset: u64) -> Result<Zip64EOCD> {
        let locator_offset = eocd_offset
            .checked_sub(Zip64EOCDLocator::SIZE as u64)
            .ok_or_else(|| Error::ContainerNotFound("missing ZIP64 locator".to_string()))?;

        let locator_buf = self
            .fetcher
            .fetch_len(locator_offset, Zip64EOCDLocator::SIZE as u64)
            .await?;
        let locator = Zip64EOCDLocator::from_bytes(&locator_buf)?;

        self.ensure_within(locator.eocd64_offset, Zip64EOCD::MIN_SIZE as u64)?;
        let eocd64_buf = self
            .fetcher
            .fetch_len(locator.eocd64_offset, Zip64EOCD::MIN_SIZE as u64)
            .await?;

        Zip64EOCD::from_bytes(&eocd64_buf)
    }

    async fn central_directory(&self) -> Result<CentralDirectory> {
        let (eocd, eocd_offset) = self.find_eocd().await?;

        let cd = if eocd.is_zip64() {
            let eocd64 = self.read_zip64_eocd(eocd_offset).await?;
            CentralDirectory {
                offset: eocd64.cd_offset,
                size: eocd64.cd_size,
                total_entries: eocd64.total_entries,
            }
        } else {
            CentralDirectory {
                offset: eocd.cd_offset.into(),
                size: eocd.cd_size.into(),
                total_entries: eocd.total_entries.into(),
            }
        };

        self.ensure_within(cd.offset, cd.size)?;
        Ok(cd)
    }

    fn ensure_within(&self, offset: u64, len: u64) -> Result<()> {
        let available = self.fetcher.len();
        match offset.checked_add(len) {
            Some(end) if end <= available => Ok(()),
            _ => Err(Error::BufferOverrun {
                offset,
                wanted: len,
                available,
            }),
        }
    }

    fn is_candidate(&self, file_name: &str) -> bool {
        let file_name = file_name.to_ascii_lowercase();
        self.config
            .payload_names
            .iter()
            .any(|name| file_name.ends_with(&name.to_ascii_lowercase()))
    }

    /// Returns the data offset and stored size of the first valid candidate.
    async fn find_payload(&self) -> Result<(u64, u64)> {
        let cd = self.central_directory().await?;
        if cd.size == 0 || cd.total_entries == 0 {
            return Err(Error::ContainerNotFound("archive is empty".to_string()));
        }

        // Read the entire Central Directory in one request
        let cd_data = self.fetcher.fetch_len(cd.offset, cd.size).await?;
        let mut cursor = ByteCursor::new(&cd_data);

        for _ in 0..cd.total_entries {
            if cursor.remaining() < CDFH_MIN_SIZE as u64 {
                warn!("Central directory ends before all {} entries", cd.total_entries);
                break;
            }

            let entry = ZipFileEntry::parse(&mut cursor)?;
            if !self.is_candidate(&entry.file_name) {
                continue;
            }

            if let Some(body) = self.resolve_candidate(&entry).await? {
                return Ok(body);
            }
        }

        Err(Error::ContainerNotFound(format!(
            "no stored entry matching {:?}",
            self.config.payload_names
        )))
    }

    /// Compute and validate the body offset and length of one candidate entry.
    ///
    /// Returns `None` when the entry turns out not to hold a payload.
    async fn resolve_candidate(&self, entry: &ZipFileEntry) -> Result<Option<(u64, u64)>> {
        if entry.compression_method != CompressionMethod::Stored {
            warn!(
                "Skipping {}: compression method {} is not supported",
                entry.file_name,
                entry.compression_method.as_u16()
            );
            return Ok(None);
        }

        if self.ensure_within(entry.lfh_offset, LFH_SIZE as u64).is_err() {
            warn!("Skipping {}: local header is outside the archive", entry.file_name);
            return Ok(None);
        }

        let lfh_buf = self
            .fetcher
            .fetch_len(entry.lfh_offset, LFH_SIZE as u64)
            .await?;
        let lfh = match LocalFileHeader::from_bytes(&lfh_buf) {
            Ok(lfh) => lfh,
            Err(e) => {
                warn!("Skipping {}: {e}", entry.file_name);
                return Ok(None);
            }
        };

        // Stored entries have identical compressed and uncompressed sizes
        let data_len = entry.compressed_size;
        if data_len < 4 {
            warn!("Skipping {}: entry is too small for a payload", entry.file_name);
            return Ok(None);
        }

        let data_offset = lfh.data_offset(entry.lfh_offset);
        if self.ensure_within(data_offset, data_len).is_err() {
            warn!("Skipping {}: data is outside the archive", entry.file_name);
            return Ok(None);
        }

        let magic = self.fetcher.fetch_len(data_offset, 4).await?;
        let magic = u32::from_le_bytes(ByteCursor::new(&magic).read_array::<4>()?);
        if magic != PAYLOAD_MAGIC {
            warn!(
                "Skipping {}: no payload magic at offset {data_offset}",
                entry.file_name
            );
            return Ok(None);
        }

        Ok(Some((data_offset, data_len)))
    }
}
