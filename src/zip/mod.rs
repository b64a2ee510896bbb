//! ZIP container handling.
//!
//! OTA packages ship the payload as a stored (uncompressed) `payload.bin`
//! entry, so locating it is enough: the payload is then read in place from
//! the archive without any decompression.
//!
//! ## Architecture
//!
//! - [`structures`]: fixed ZIP records (EOCD, ZIP64 locator and EOCD,
//!   central directory and local file headers)
//! - [`locator`]: format detection and payload body lookup
//!
//! ## Supported Features
//!
//! - Standard ZIP format (PKZIP APPNOTE 6.3.x compatible)
//! - ZIP64 end of central directory and ZIP64 extra fields
//! - Archive comments up to the configured trailing window
//!
//! ## Limitations
//!
//! - Only STORED entries can hold the payload
//! - No multi-disk archive support

mod locator;
mod structures;

pub use locator::{ContainerFormat, ContainerLocation, ContainerLocator};
pub use structures::*;
