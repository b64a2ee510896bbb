use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{CONTENT_LENGTH, CONTENT_RANGE, RANGE};
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::debug;

use super::RangeTransport;
use crate::error::TransportError;

/// HTTP Range transport for remote OTA packages
pub struct HttpTransport {
    client: Client,
    url: String,
    size: u64,
}

impl HttpTransport {
    /// Create a new HTTP Range transport
    ///
    /// The resource length comes from a HEAD request's Content-Length. Range
    /// gateways that do not answer HEAD are probed with `bytes=0-0` and the
    /// total is taken from Content-Range instead.
    pub async fn new(url: String, timeout: Duration) -> Result<Self, TransportError> {
        let client = Client::builder().timeout(timeout).build()?;

        let size = match Self::head_length(&client, &url).await? {
            Some(size) => size,
            None => Self::probe_length(&client, &url).await?,
        };
        debug!("Remote resource {url} is {size} bytes");

        Ok(Self { client, url, size })
    }

    async fn head_length(client: &Client, url: &str) -> Result<Option<u64>, TransportError> {
        let resp = client.head(url).send().await?;
        if !resp.status().is_success() {
            debug!("HEAD {url} returned {}", resp.status());
            return Ok(None);
        }

        Ok(resp
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse().ok())
            .filter(|&len: &u64| len > 0))
    }

    async fn probe_length(client: &Client, url: &str) -> Result<u64, TransportError> {
        let resp = client.get(url).header(RANGE, "bytes=0-0").send().await?;

        match resp.status() {
            StatusCode::PARTIAL_CONTENT => {
                let header = content_range(&resp)?;
                parse_content_range(&header)
                    .and_then(|r| r.total)
                    .ok_or(TransportError::ContentRange(header))
            }
            StatusCode::OK => resp.content_length().ok_or(TransportError::UnknownLength),
            status => Err(TransportError::Status(status)),
        }
    }
}

fn content_range(resp: &reqwest::Response) -> Result<String, TransportError> {
    resp.headers()
        .get(CONTENT_RANGE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned)
        .ok_or_else(|| TransportError::ContentRange(String::new()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ContentRange {
    start: u64,
    end: u64,
    total: Option<u64>,
}

/// Parse `bytes <start>-<end>/<total|*>`.
fn parse_content_range(value: &str) -> Option<ContentRange> {
    let rest = value.trim().strip_prefix("bytes")?.trim_start();
    let (range, total) = rest.split_once('/')?;
    let (start, end) = range.split_once('-')?;

    let total = match total.trim() {
        "*" => None,
        t => Some(t.parse().ok()?),
    };

    Some(ContentRange {
        start: start.trim().parse().ok()?,
        end: end.trim().parse().ok()?,
        total,
    })
}

#[async_trait]
impl RangeTransport for HttpTransport {
    async fn get_range(&self, start: u64, end: u64) -> Result<Bytes, TransportError> {
        if start > end || end >= self.size {
            return Err(TransportError::OutOfRange { start, end });
        }

        let resp = self
            .client
            .get(&self.url)
            .header(RANGE, format!("bytes={start}-{end}"))
            .send()
            .await?;

        match resp.status() {
            StatusCode::PARTIAL_CONTENT => {
                let header = content_range(&resp)?;
                let range = parse_content_range(&header)
                    .filter(|r| r.end >= r.start)
                    .ok_or_else(|| TransportError::ContentRange(header.clone()))?;
                if range.start != start {
                    return Err(TransportError::RangeStart {
                        expected: start,
                        actual: range.start,
                    });
                }
                // Oversize bodies are cut to the request; short ones are left to the caller
                let body = resp.bytes().await?;
                Ok(clamp_to_request(body, start, end))
            }
            StatusCode::OK => {
                // Range ignored by the origin: slice the window out of the full body
                let body = resp.bytes().await?;
                let len = body.len() as u64;
                if start >= len {
                    return Ok(Bytes::new());
                }
                Ok(body.slice(start as usize..=end.min(len - 1) as usize))
            }
            status => Err(TransportError::Status(status)),
        }
    }

    fn len(&self) -> u64 {
        self.size
    }
}

fn clamp_to_request(mut body: Bytes, start: u64, end: u64) -> Bytes {
    let wanted = end - start + 1;
    if body.len() as u64 > wanted {
        body.truncate(wanted as usize);
    }
    body
}
