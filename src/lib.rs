//! # otazip
//!
//! Extract partition images from Android OTA payloads.
//!
//! The payload may be a bare `payload.bin` or a stored entry inside an OTA
//! ZIP package, and the source may be a local file or an HTTP URL. Remote
//! sources are read with HTTP Range requests, so only the ZIP directory,
//! the payload header and the requested partitions are downloaded.
//!
//! ## Features
//!
//! - Raw payload and ZIP container detection
//! - ZIP64 archives (packages larger than 4GB)
//! - Chunked range downloads with bounded retry
//! - Sequential, event-driven extraction sessions
//!
//! ## Example
//!
//! ```no_run
//! use otazip::{ExtractConfig, ExtractEvent, ExtractRequest, ExtractionSession};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let session = ExtractionSession::new(ExtractConfig::default());
//!     let request = ExtractRequest::new(
//!         "https://example.com/ota.zip",
//!         vec!["boot".to_string(), "vbmeta".to_string()],
//!     );
//!
//!     let mut events = session.start(request)?;
//!     while let Some(event) = events.recv().await {
//!         match event {
//!             ExtractEvent::Progress(image) => {
//!                 println!("{}: {} bytes", image.name, image.data.len())
//!             }
//!             ExtractEvent::Success => println!("done"),
//!             ExtractEvent::Error { message, .. } => eprintln!("failed: {message}"),
//!         }
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod config;
pub mod cursor;
pub mod error;
pub mod io;
pub mod logging;
pub mod payload;
pub mod session;
pub mod zip;

pub use cli::Cli;
pub use config::ExtractConfig;
pub use error::{Error, ErrorKind, Result, TransportError};
pub use io::{ByteSource, HttpTransport, RangeFetcher, RangeTransport, RetryPolicy};
pub use payload::{
    ManifestEntry, Operation, OperationExecutor, OperationKind, PartitionImage,
    PartitionManifest, Payload, PayloadBody, PayloadHeader,
};
pub use session::{
    ExtractEvent, ExtractRequest, ExtractionOrchestrator, ExtractionSession, SourceKind,
};
pub use zip::{ContainerFormat, ContainerLocation, ContainerLocator};
