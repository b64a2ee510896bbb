mod fetcher;
mod http;
mod local;
mod retry;

pub use fetcher::{ByteSource, RangeFetcher};
pub use http::HttpTransport;
pub use local::read_local_file;
pub use retry::RetryPolicy;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::TransportError;

/// A remote resource that can serve inclusive byte ranges, one request at a time.
#[async_trait]
pub trait RangeTransport: Send + Sync {
    /// Fetch bytes `start..=end`. The response may be shorter than requested.
    async fn get_range(&self, start: u64, end: u64) -> Result<Bytes, TransportError>;

    /// Get the total size of the resource
    fn len(&self) -> u64;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
