//! Error types shared by every stage of the extraction pipeline.

use std::io;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Failure of a single range request against a remote or local source.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Unexpected HTTP status: {0}")]
    Status(reqwest::StatusCode),
    #[error("Malformed Content-Range header: {0:?}")]
    ContentRange(String),
    #[error("Server returned range starting at {actual}, expected {expected}")]
    RangeStart { expected: u64, actual: u64 },
    #[error("Remote server did not report a resource length")]
    UnknownLength,
    #[error("Requested range {start}-{end} is outside the resource")]
    OutOfRange { start: u64, end: u64 },
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("Unknown container format (leading bytes {0:02x?})")]
    UnknownFormat([u8; 4]),
    #[error("No payload found in ZIP container: {0}")]
    ContainerNotFound(String),
    #[error("Payload magic mismatch: found {0:#010x}")]
    MagicMismatch(u32),
    #[error("Unsupported payload version: {0}")]
    UnsupportedVersion(u32),
    #[error("Payload header too small: {0} bytes")]
    HeaderTooSmall(u64),
    #[error("Manifest entry count {0} is outside 1..=100")]
    ManifestCountOutOfRange(u32),
    #[error("Partition name length {0} is outside 1..=256")]
    NameLengthOutOfRange(u32),
    #[error("Read of {wanted} bytes at offset {offset} overruns buffer of {available} bytes")]
    BufferOverrun {
        offset: u64,
        wanted: u64,
        available: u64,
    },
    #[error("Partition not found in manifest: {0}")]
    PartitionNotFound(String),
    #[error("Unsupported operation {kind:?} in partition {partition}")]
    UnsupportedOperation {
        kind: crate::payload::OperationKind,
        partition: String,
    },
    #[error("Download of bytes {start}-{end} failed after {attempts} attempts")]
    DownloadFailed {
        start: u64,
        end: u64,
        attempts: u32,
        #[source]
        source: TransportError,
    },
    #[error("Size of {name} is {actual} bytes, expected {expected}")]
    SizeMismatch {
        name: String,
        expected: u64,
        actual: u64,
    },
    #[error("An extraction session is already running")]
    Busy,
    #[error("Duplicate partition in manifest: {0}")]
    DuplicatePartition(String),
    #[error("Partition {0} has zero size")]
    EmptyPartition(String),
    #[error("Invalid byte range {start}-{end} for resource of {len} bytes")]
    InvalidRange { start: u64, end: u64, len: u64 },
    #[error("Transport error")]
    Transport(#[from] TransportError),
    #[error("I/O error")]
    Io(#[from] io::Error),
}

/// Flat classification of [`Error`] for callers that only branch on kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    UnknownFormat,
    ContainerNotFound,
    MagicMismatch,
    UnsupportedVersion,
    HeaderTooSmall,
    ManifestCountOutOfRange,
    NameLengthOutOfRange,
    BufferOverrun,
    PartitionNotFound,
    UnsupportedOperation,
    DownloadFailed,
    SizeMismatch,
    Busy,
    DuplicatePartition,
    EmptyPartition,
    InvalidRange,
    Transport,
    Io,
}

impl ErrorKind {
    /// Recoverable kinds are logged and skipped instead of ending a session.
    pub fn is_recoverable(self) -> bool {
        matches!(self, ErrorKind::PartitionNotFound | ErrorKind::SizeMismatch)
    }
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::UnknownFormat(_) => ErrorKind::UnknownFormat,
            Error::ContainerNotFound(_) => ErrorKind::ContainerNotFound,
            Error::MagicMismatch(_) => ErrorKind::MagicMismatch,
            Error::UnsupportedVersion(_) => ErrorKind::UnsupportedVersion,
            Error::HeaderTooSmall(_) => ErrorKind::HeaderTooSmall,
            Error::ManifestCountOutOfRange(_) => ErrorKind::ManifestCountOutOfRange,
            Error::NameLengthOutOfRange(_) => ErrorKind::NameLengthOutOfRange,
            Error::BufferOverrun { .. } => ErrorKind::BufferOverrun,
            Error::PartitionNotFound(_) => ErrorKind::PartitionNotFound,
            Error::UnsupportedOperation { .. } => ErrorKind::UnsupportedOperation,
            Error::DownloadFailed { .. } => ErrorKind::DownloadFailed,
            Error::SizeMismatch { .. } => ErrorKind::SizeMismatch,
            Error::Busy => ErrorKind::Busy,
            Error::DuplicatePartition(_) => ErrorKind::DuplicatePartition,
            Error::EmptyPartition(_) => ErrorKind::EmptyPartition,
            Error::InvalidRange { .. } => ErrorKind::InvalidRange,
            Error::Transport(_) => ErrorKind::Transport,
            Error::Io(_) => ErrorKind::Io,
        }
    }
}
