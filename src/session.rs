//! Extraction sessions.
//!
//! An [`ExtractionSession`] runs one request at a time on a background Tokio
//! task and reports back through a channel: zero or more
//! [`ExtractEvent::Progress`] events followed by exactly one terminal
//! [`ExtractEvent::Success`] or [`ExtractEvent::Error`].

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::ExtractConfig;
use crate::error::{Error, ErrorKind, Result};
use crate::io::{HttpTransport, RangeFetcher, read_local_file};
use crate::payload::{PartitionImage, Payload};

const EVENT_BUFFER: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    File,
    Url,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractRequest {
    pub source_kind: SourceKind,
    pub source_ref: String,
    /// Partitions to extract, in output order.
    pub partitions: Vec<String>,
}

impl ExtractRequest {
    /// Build a request, treating `http://` and `https://` references as URLs.
    pub fn new(source_ref: impl Into<String>, partitions: Vec<String>) -> Self {
        let source_ref = source_ref.into();
        let source_kind = if source_ref.starts_with("http://") || source_ref.starts_with("https://")
        {
            SourceKind::Url
        } else {
            SourceKind::File
        };

        Self {
            source_kind,
            source_ref,
            partitions,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractEvent {
    Progress(PartitionImage),
    Success,
    Error { kind: ErrorKind, message: String },
}

impl ExtractEvent {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ExtractEvent::Progress(_))
    }
}

/// Open the byte source named by a request.
pub async fn open_source(request: &ExtractRequest, config: &ExtractConfig) -> Result<RangeFetcher> {
    let fetcher = match request.source_kind {
        SourceKind::File => RangeFetcher::local(read_local_file(Path::new(&request.source_ref)).await?),
        SourceKind::Url => {
            let transport =
                HttpTransport::new(request.source_ref.clone(), config.request_timeout).await?;
            RangeFetcher::remote(Arc::new(transport))
        }
    };

    Ok(fetcher
        .with_chunk_size(config.chunk_size)
        .with_retry(config.retry))
}

/// Sequences container lookup, manifest decoding and per-partition
/// reconstruction for one source.
pub struct ExtractionOrchestrator<'a> {
    config: &'a ExtractConfig,
}

impl<'a> ExtractionOrchestrator<'a> {
    pub fn new(config: &'a ExtractConfig) -> Self {
        Self { config }
    }

    /// Extract `partitions` in order, sending one `Progress` per image.
    ///
    /// Missing partitions are skipped with a warning. Any other failure
    /// stops processing and is returned; images already sent stay valid.
    pub async fn extract(
        &self,
        fetcher: RangeFetcher,
        partitions: &[String],
        events: &mpsc::Sender<ExtractEvent>,
    ) -> Result<()> {
        let payload = Payload::open(fetcher, self.config).await?;
        debug!(
            "Payload at offset {} lists {} partitions",
            payload.location().payload_offset,
            payload.manifest().len()
        );

        self.extract_from(&payload, partitions, events).await
    }

    /// Extract from a payload whose manifest is already decoded.
    pub async fn extract_from(
        &self,
        payload: &Payload,
        partitions: &[String],
        events: &mpsc::Sender<ExtractEvent>,
    ) -> Result<()> {
        for name in partitions {
            let image = match payload.extract(name).await {
                Ok(image) => image,
                Err(e) if e.kind().is_recoverable() => {
                    warn!("Skipping {name}: {e}");
                    continue;
                }
                Err(e) => return Err(e),
            };

            info!("Extracted {} ({} bytes)", image.name, image.data.len());
            // A consumer that stopped listening does not stop the session
            let _ = events.send(ExtractEvent::Progress(image)).await;
        }

        Ok(())
    }
}

/// Clears the session's busy flag when the background task ends.
struct BusyGuard(Arc<AtomicBool>);

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Owned handle that runs extraction requests one at a time.
pub struct ExtractionSession {
    config: Arc<ExtractConfig>,
    busy: Arc<AtomicBool>,
}

impl ExtractionSession {
    pub fn new(config: ExtractConfig) -> Self {
        Self {
            config: Arc::new(config),
            busy: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn config(&self) -> &ExtractConfig {
        &self.config
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Start a request on a background task.
    ///
    /// Must be called from within a Tokio runtime. Fails with
    /// [`Error::Busy`] while a previous request is still running.
    pub fn start(&self, request: ExtractRequest) -> Result<mpsc::Receiver<ExtractEvent>> {
        let guard = self.acquire()?;
        let config = self.config.clone();
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);

        tokio::spawn(async move {
            let result = run_request(&config, &request, &tx).await;
            finish(guard, result, &tx).await;
        });

        Ok(rx)
    }

    /// Like [`start`](Self::start), for a source that is already open.
    pub fn start_with(
        &self,
        fetcher: RangeFetcher,
        partitions: Vec<String>,
    ) -> Result<mpsc::Receiver<ExtractEvent>> {
        let guard = self.acquire()?;
        let config = self.config.clone();
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);

        tokio::spawn(async move {
            let result = ExtractionOrchestrator::new(&config)
                .extract(fetcher, &partitions, &tx)
                .await;
            finish(guard, result, &tx).await;
        });

        Ok(rx)
    }

    /// Like [`start`](Self::start), reusing a payload opened by the caller.
    pub fn start_with_payload(
        &self,
        payload: Arc<Payload>,
        partitions: Vec<String>,
    ) -> Result<mpsc::Receiver<ExtractEvent>> {
        let guard = self.acquire()?;
        let config = self.config.clone();
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);

        tokio::spawn(async move {
            let result = ExtractionOrchestrator::new(&config)
                .extract_from(&payload, &partitions, &tx)
                .await;
            finish(guard, result, &tx).await;
        });

        Ok(rx)
    }

    fn acquire(&self) -> Result<BusyGuard> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| Error::Busy)?;
        Ok(BusyGuard(self.busy.clone()))
    }
}

async fn run_request(
    config: &ExtractConfig,
    request: &ExtractRequest,
    events: &mpsc::Sender<ExtractEvent>,
) -> Result<()> {
    let fetcher = open_source(request, config).await?;
    ExtractionOrchestrator::new(config)
        .extract(fetcher, &request.partitions, events)
        .await
}

/// Release the session and send the terminal event.
async fn finish(guard: BusyGuard, result: Result<()>, tx: &mpsc::Sender<ExtractEvent>) {
    drop(guard);

    let event = match result {
        Ok(()) => ExtractEvent::Success,
        Err(e) => {
            warn!("Extraction failed: {e}");
            ExtractEvent::Error {
                kind: e.kind(),
                message: error_chain(&e),
            }
        }
    };
    let _ = tx.send(event).await;
}

/// Render an error with its sources, `outer: inner: ...`.
fn error_chain(err: &Error) -> String {
    let mut message = err.to_string();
    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
