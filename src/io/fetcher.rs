use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::{Bytes, BytesMut};
use tracing::{debug, warn};

use super::{RangeTransport, RetryPolicy};
use crate::config::DEFAULT_CHUNK_SIZE;
use crate::error::{Error, Result};

/// Where the bytes of a payload or OTA package live.
#[derive(Clone)]
pub enum ByteSource {
    /// Fully resident buffer, read directly without suspension.
    Local(Bytes),
    /// Remote resource reached through range requests.
    Remote(Arc<dyn RangeTransport>),
}

/// Bounded, retrying byte-range reads against a [`ByteSource`].
///
/// Remote ranges larger than the chunk size are split into sequential
/// sub-requests and concatenated in request order.
pub struct RangeFetcher {
    source: ByteSource,
    len: u64,
    chunk_size: u64,
    retry: RetryPolicy,
    transferred_bytes: AtomicU64,
}

impl RangeFetcher {
    pub fn new(source: ByteSource) -> Self {
        let len = match &source {
            ByteSource::Local(data) => data.len() as u64,
            ByteSource::Remote(transport) => transport.len(),
        };

        Self {
            source,
            len,
            chunk_size: DEFAULT_CHUNK_SIZE,
            retry: RetryPolicy::default(),
            transferred_bytes: AtomicU64::new(0),
        }
    }

    pub fn local(data: impl Into<Bytes>) -> Self {
        Self::new(ByteSource::Local(data.into()))
    }

    pub fn remote(transport: Arc<dyn RangeTransport>) -> Self {
        Self::new(ByteSource::Remote(transport))
    }

    pub fn with_chunk_size(mut self, chunk_size: u64) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Total length of the underlying resource.
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Get total bytes transferred from network
    pub fn transferred_bytes(&self) -> u64 {
        self.transferred_bytes.load(Ordering::Relaxed)
    }

    /// Fetch the inclusive range `start..=end`.
    pub async fn fetch(&self, start: u64, end: u64) -> Result<Bytes> {
        if start > end || end >= self.len {
            return Err(Error::InvalidRange {
                start,
                end,
                len: self.len,
            });
        }

        match &self.source {
            ByteSource::Local(data) => Ok(data.slice(start as usize..=end as usize)),
            ByteSource::Remote(transport) => self.fetch_remote(transport.as_ref(), start, end).await,
        }
    }

    /// Fetch `len` bytes starting at `offset`. An empty read never touches the source.
    pub async fn fetch_len(&self, offset: u64, len: u64) -> Result<Bytes> {
        if len == 0 {
            return Ok(Bytes::new());
        }
        let end = offset
            .checked_add(len - 1)
            .ok_or(Error::InvalidRange {
                start: offset,
                end: u64::MAX,
                len: self.len,
            })?;
        self.fetch(offset, end).await
    }

    async fn fetch_remote(&self, transport: &dyn RangeTransport, start: u64, end: u64) -> Result<Bytes> {
        let total = end - start + 1;
        let mut out = BytesMut::with_capacity(total as usize);
        let mut chunk_start = start;

        while chunk_start <= end {
            let chunk_end = end.min(chunk_start.saturating_add(self.chunk_size - 1));
            let chunk = self.fetch_chunk(transport, chunk_start, chunk_end).await?;
            out.extend_from_slice(&chunk);

            if chunk_end == end {
                break;
            }
            chunk_start = chunk_end + 1;
        }

        Ok(out.freeze())
    }

    async fn fetch_chunk(&self, transport: &dyn RangeTransport, start: u64, end: u64) -> Result<Bytes> {
        debug!("Fetching bytes {start}-{end}");

        let chunk = self
            .retry
            .run(|_| transport.get_range(start, end))
            .await
            .map_err(|(source, attempts)| Error::DownloadFailed {
                start,
                end,
                attempts,
                source,
            })?;

        let expected = end - start + 1;
        if chunk.len() as u64 != expected {
            warn!(
                "Range {start}-{end} returned {} bytes, expected {expected}",
                chunk.len()
            );
        }

        self.transferred_bytes
            .fetch_add(chunk.len() as u64, Ordering::Relaxed);

        Ok(chunk)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use assert_matches::assert_matches;
    use async_trait::async_trait;

    use super::*;
    use crate::error::TransportError;

    /// In-memory transport that records each request and can fail on demand.
    struct MockTransport {
        data: Bytes,
        requests: Mutex<Vec<(u64, u64)>>,
        failures_left: Mutex<u32>,
        truncate_to: Option<usize>,
    }

    impl MockTransport {
        fn new(data: impl Into<Bytes>) -> Self {
            Self {
                data: data.into(),
                requests: Mutex::new(Vec::new()),
                failures_left: Mutex::new(0),
                truncate_to: None,
            }
        }

        fn failing(mut self, failures: u32) -> Self {
            self.failures_left = Mutex::new(failures);
            self
        }

        fn truncating(mut self, len: usize) -> Self {
            self.truncate_to = Some(len);
            self
        }

        fn requests(&self) -> Vec<(u64, u64)> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl RangeTransport for MockTransport {
        async fn get_range(&self, start: u64, end: u64) -> std::result::Result<Bytes, TransportError> {
            self.requests.lock().unwrap().push((start, end));

            {
                let mut failures = self.failures_left.lock().unwrap();
                if *failures > 0 {
                    *failures -= 1;
                    return Err(TransportError::Status(reqwest::StatusCode::SERVICE_UNAVAILABLE));
                }
            }

            let mut chunk = self.data.slice(start as usize..=end as usize);
            if let Some(len) = self.truncate_to {
                chunk.truncate(len);
            }
            Ok(chunk)
        }

        fn len(&self) -> u64 {
            self.data.len() as u64
        }
    }

    fn sample(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8).collect()
    }

    fn fetcher(transport: &Arc<MockTransport>, chunk_size: u64) -> RangeFetcher {
        RangeFetcher::remote(transport.clone())
            .with_chunk_size(chunk_size)
            .with_retry(RetryPolicy::new(3, Duration::ZERO))
    }

    #[tokio::test]
    async fn range_within_cap_is_one_request() {
        let data = sample(64);
        let transport = Arc::new(MockTransport::new(data.clone()));
        let fetcher = fetcher(&transport, 16);

        let bytes = fetcher.fetch(10, 25).await.unwrap();

        assert_eq!(transport.requests(), vec![(10, 25)]);
        assert_eq!(&bytes[..], &data[10..=25]);
        assert_eq!(fetcher.transferred_bytes(), 16);
    }

    #[tokio::test]
    async fn range_of_cap_plus_one_is_two_requests() {
        let data = sample(64);
        let transport = Arc::new(MockTransport::new(data.clone()));
        let fetcher = fetcher(&transport, 16);

        let bytes = fetcher.fetch(3, 19).await.unwrap();

        assert_eq!(transport.requests(), vec![(3, 18), (19, 19)]);
        assert_eq!(&bytes[..], &data[3..=19]);
    }

    #[tokio::test]
    async fn retries_then_succeeds() {
        let data = sample(32);
        let transport = Arc::new(MockTransport::new(data.clone()).failing(2));
        let fetcher = fetcher(&transport, 1024);

        let bytes = fetcher.fetch(0, 31).await.unwrap();

        assert_eq!(transport.requests().len(), 3);
        assert_eq!(&bytes[..], &data[..]);
    }

    #[tokio::test]
    async fn exhausted_budget_is_download_failed() {
        let transport = Arc::new(MockTransport::new(sample(32)).failing(10));
        let fetcher = fetcher(&transport, 1024);

        assert_matches!(
            fetcher.fetch(0, 7).await,
            Err(Error::DownloadFailed {
                start: 0,
                end: 7,
                attempts: 3,
                source: TransportError::Status(_),
            })
        );
        assert_eq!(transport.requests().len(), 3);
    }

    #[tokio::test]
    async fn short_response_is_accepted() {
        let transport = Arc::new(MockTransport::new(sample(32)).truncating(4));
        let fetcher = fetcher(&transport, 1024);

        let bytes = fetcher.fetch(0, 9).await.unwrap();
        assert_eq!(bytes.len(), 4);
    }

    #[tokio::test]
    async fn rejects_ranges_outside_resource() {
        let fetcher = RangeFetcher::local(sample(8));

        assert_matches!(fetcher.fetch(4, 8).await, Err(Error::InvalidRange { .. }));
        assert_matches!(fetcher.fetch(5, 4).await, Err(Error::InvalidRange { .. }));
        assert_eq!(fetcher.fetch_len(3, 0).await.unwrap().len(), 0);
        assert_eq!(&fetcher.fetch_len(6, 2).await.unwrap()[..], &[6, 7]);
    }
}
