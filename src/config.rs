//! Tunables for one extraction session.

use std::time::Duration;

use crate::io::RetryPolicy;

/// Largest single range request sent to a remote source.
pub const DEFAULT_CHUNK_SIZE: u64 = 5 * 1024 * 1024;

/// Trailing window searched for the End of Central Directory record.
pub const DEFAULT_EOCD_WINDOW: u64 = 64 * 1024;

/// Bytes read from the start of the payload body for header parsing.
pub const DEFAULT_HEADER_WINDOW: u64 = 8 * 1024;

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct ExtractConfig {
    pub chunk_size: u64,
    pub retry: RetryPolicy,
    pub eocd_window: u64,
    pub header_window: u64,
    /// File names accepted as the embedded payload (case-insensitive suffix match).
    pub payload_names: Vec<String>,
    pub request_timeout: Duration,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            retry: RetryPolicy::default(),
            eocd_window: DEFAULT_EOCD_WINDOW,
            header_window: DEFAULT_HEADER_WINDOW,
            payload_names: vec!["payload.bin".to_string()],
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}
