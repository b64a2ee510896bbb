use std::path::Path;

use bytes::Bytes;
use tracing::debug;

use crate::error::Result;

/// Read a local OTA package or payload fully into memory.
///
/// This is the only suspension point for local sources; every later read is
/// a slice of the returned buffer.
pub async fn read_local_file(path: &Path) -> Result<Bytes> {
    let data = tokio::fs::read(path).await?;
    debug!("Read {} bytes from {}", data.len(), path.display());
    Ok(Bytes::from(data))
}
