use crate::cursor::ByteCursor;
use crate::error::{Error, Result};

/// ZIP compression methods
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionMethod {
    Stored,
    Deflate,
    Unknown(u16),
}

impl CompressionMethod {
    pub fn from_u16(value: u16) -> Self {
        match value {
            0 => CompressionMethod::Stored,
            8 => CompressionMethod::Deflate,
            _ => CompressionMethod::Unknown(value),
        }
    }

    pub fn as_u16(&self) -> u16 {
        match self {
            CompressionMethod::Stored => 0,
            CompressionMethod::Deflate => 8,
            CompressionMethod::Unknown(v) => *v,
        }
    }
}

/// Sentinel stored in 16-bit fields whose real value lives in ZIP64 records.
pub const ZIP64_SENTINEL_U16: u16 = 0xFFFF;
/// Sentinel stored in 32-bit fields whose real value lives in ZIP64 records.
pub const ZIP64_SENTINEL_U32: u32 = 0xFFFFFFFF;
/// Extra field tag of the ZIP64 extended information block.
pub const ZIP64_EXTRA_TAG: u16 = 0x0001;

fn expect_signature(cursor: &mut ByteCursor<'_>, signature: u32, what: &str) -> Result<()> {
    if cursor.read_u32()? != signature {
        return Err(Error::ContainerNotFound(format!("invalid {what}")));
    }
    Ok(())
}

/// End of Central Directory (EOCD) - 22 bytes minimum
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndOfCentralDirectory {
    pub disk_number: u16,
    pub disk_with_cd: u16,
    pub disk_entries: u16,
    pub total_entries: u16,
    pub cd_size: u32,
    pub cd_offset: u32,
    pub comment_len: u16,
}

impl EndOfCentralDirectory {
    pub const SIGNATURE: u32 = 0x06054B50;
    pub const SIZE: usize = 22;

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let mut cursor = ByteCursor::new(data);
        expect_signature(&mut cursor, Self::SIGNATURE, "End of Central Directory")?;

        Ok(Self {
            disk_number: cursor.read_u16()?,
            disk_with_cd: cursor.read_u16()?,
            disk_entries: cursor.read_u16()?,
            total_entries: cursor.read_u16()?,
            cd_size: cursor.read_u32()?,
            cd_offset: cursor.read_u32()?,
            comment_len: cursor.read_u16()?,
        })
    }

    pub fn is_zip64(&self) -> bool {
        self.disk_entries == ZIP64_SENTINEL_U16
            || self.total_entries == ZIP64_SENTINEL_U16
            || self.cd_size == ZIP64_SENTINEL_U32
            || self.cd_offset == ZIP64_SENTINEL_U32
    }
}

/// ZIP64 End of Central Directory Locator - 20 bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Zip64EOCDLocator {
    pub disk_with_eocd64: u32,
    pub eocd64_offset: u64,
    pub total_disks: u32,
}

impl Zip64EOCDLocator {
    pub const SIGNATURE: u32 = 0x07064B50;
    pub const SIZE: usize = 20;

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let mut cursor = ByteCursor::new(data);
        expect_signature(&mut cursor, Self::SIGNATURE, "ZIP64 locator")?;

        Ok(Self {
            disk_with_eocd64: cursor.read_u32()?,
            eocd64_offset: cursor.read_u64()?,
            total_disks: cursor.read_u32()?,
        })
    }
}

/// ZIP64 End of Central Directory - 56 bytes minimum
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Zip64EOCD {
    pub eocd64_size: u64,
    pub version_made_by: u16,
    pub version_needed: u16,
    pub disk_number: u32,
    pub disk_with_cd: u32,
    pub disk_entries: u64,
    pub total_entries: u64,
    pub cd_size: u64,
    pub cd_offset: u64,
}

impl Zip64EOCD {
    pub const SIGNATURE: u32 = 0x06064B50;
    pub const MIN_SIZE: usize = 56;

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let mut cursor = ByteCursor::new(data);
        expect_signature(&mut cursor, Self::SIGNATURE, "ZIP64 End of Central Directory")?;

        Ok(Self {
            eocd64_size: cursor.read_u64()?,
            version_made_by: cursor.read_u16()?,
            version_needed: cursor.read_u16()?,
            disk_number: cursor.read_u32()?,
            disk_with_cd: cursor.read_u32()?,
            disk_entries: cursor.read_u64()?,
            total_entries: cursor.read_u64()?,
            cd_size: cursor.read_u64()?,
            cd_offset: cursor.read_u64()?,
        })
    }
}

/// Central Directory File Header (CDFH) - 46 bytes minimum
pub const CDFH_SIGNATURE: u32 = 0x02014B50;
pub const CDFH_MIN_SIZE: usize = 46;

/// Local File Header (LFH) - 30 bytes
pub const LFH_SIGNATURE: u32 = 0x04034B50;
pub const LFH_SIZE: usize = 30;

/// Central directory record, reduced to what payload lookup needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZipFileEntry {
    pub file_name: String,
    pub compression_method: CompressionMethod,
    pub compressed_size: u64,
    pub uncompressed_size: u64,
    pub lfh_offset: u64,
}

impl ZipFileEntry {
    /// Parse one Central Directory File Header at the cursor position.
    ///
    /// The cursor is left at the start of the next record.
    pub fn parse(cursor: &mut ByteCursor<'_>) -> Result<Self> {
        expect_signature(cursor, CDFH_SIGNATURE, "Central Directory File Header")?;

        let _version_made_by = cursor.read_u16()?;
        let _version_needed = cursor.read_u16()?;
        let _flags = cursor.read_u16()?;
        let compression_method = cursor.read_u16()?;
        let _last_mod_time = cursor.read_u16()?;
        let _last_mod_date = cursor.read_u16()?;
        let _crc32 = cursor.read_u32()?;
        let mut compressed_size = u64::from(cursor.read_u32()?);
        let mut uncompressed_size = u64::from(cursor.read_u32()?);
        let file_name_length = cursor.read_u16()?;
        let extra_field_length = cursor.read_u16()?;
        let file_comment_length = cursor.read_u16()?;
        let _disk_number_start = cursor.read_u16()?;
        let _internal_attrs = cursor.read_u16()?;
        let _external_attrs = cursor.read_u32()?;
        let mut lfh_offset = u64::from(cursor.read_u32()?);

        // Use lossy conversion to handle non-UTF8 filenames gracefully
        let file_name =
            String::from_utf8_lossy(cursor.read_slice(file_name_length.into())?).into_owned();

        let extra = cursor.read_slice(extra_field_length.into())?;
        let mut extra = ByteCursor::new(extra);

        while extra.remaining() >= 4 {
            let header_id = extra.read_u16()?;
            let field_size = u64::from(extra.read_u16()?);
            let field_end = (extra.position() + field_size).min(extra.len());

            if header_id == ZIP64_EXTRA_TAG {
                // Fields are present only if the corresponding header field is the sentinel
                if uncompressed_size == u64::from(ZIP64_SENTINEL_U32)
                    && extra.position() + 8 <= field_end
                {
                    uncompressed_size = extra.read_u64()?;
                }
                if compressed_size == u64::from(ZIP64_SENTINEL_U32)
                    && extra.position() + 8 <= field_end
                {
                    compressed_size = extra.read_u64()?;
                }
                if lfh_offset == u64::from(ZIP64_SENTINEL_U32) && extra.position() + 8 <= field_end
                {
                    lfh_offset = extra.read_u64()?;
                }
            }

            extra.seek(field_end)?;
        }

        cursor.skip(file_comment_length.into())?;

        Ok(ZipFileEntry {
            file_name,
            compression_method: CompressionMethod::from_u16(compression_method),
            compressed_size,
            uncompressed_size,
            lfh_offset,
        })
    }
}

/// Variable field lengths read from a Local File Header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalFileHeader {
    pub file_name_length: u16,
    pub extra_field_length: u16,
}

impl LocalFileHeader {
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let mut cursor = ByteCursor::new(data);
        expect_signature(&mut cursor, LFH_SIGNATURE, "Local File Header")?;

        // Offset to filename length field
        cursor.seek(26)?;

        Ok(Self {
            file_name_length: cursor.read_u16()?,
            extra_field_length: cursor.read_u16()?,
        })
    }

    /// Data starts after: LFH (30 bytes) + filename + extra field
    pub fn data_offset(&self, lfh_offset: u64) -> u64 {
        lfh_offset
            + LFH_SIZE as u64
            + u64::from(self.file_name_length)
            + u64::from(self.extra_field_length)
    }
}
