//! Synthetic payload and ZIP builders shared by the integration tests.

#![allow(dead_code)]

use std::sync::Mutex;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::Semaphore;

use otazip::payload::{PAYLOAD_MAGIC, PAYLOAD_VERSION};
use otazip::{RangeTransport, TransportError};

/// Build a raw payload holding `partitions` back to back after the manifest.
pub fn build_payload(partitions: &[(&str, &[u8])]) -> Vec<u8> {
    let table_len: usize = partitions
        .iter()
        .map(|(name, _)| 4 + name.len() + 8 + 8 + 8)
        .sum();
    let header_len = 4 + 4 + 8 + 4 + 4 + table_len;

    let mut buf = Vec::new();
    buf.extend_from_slice(&PAYLOAD_MAGIC.to_le_bytes());
    buf.extend_from_slice(&PAYLOAD_VERSION.to_le_bytes());
    buf.extend_from_slice(&((4 + table_len) as u64).to_le_bytes());
    buf.extend_from_slice(&0u32.to_le_bytes());
    buf.extend_from_slice(&(partitions.len() as u32).to_le_bytes());

    let mut offset = header_len as u64;
    for (name, data) in partitions {
        buf.extend_from_slice(&(name.len() as u32).to_le_bytes());
        buf.extend_from_slice(name.as_bytes());
        buf.extend_from_slice(&(data.len() as u64).to_le_bytes());
        buf.extend_from_slice(&offset.to_le_bytes());
        buf.extend_from_slice(&[0u8; 8]);
        offset += data.len() as u64;
    }

    for (_, data) in partitions {
        buf.extend_from_slice(data);
    }

    buf
}

pub struct ZipEntry<'a> {
    pub name: &'a str,
    pub data: &'a [u8],
    pub method: u16,
}

impl<'a> ZipEntry<'a> {
    pub fn stored(name: &'a str, data: &'a [u8]) -> Self {
        Self {
            name,
            data,
            method: 0,
        }
    }

    pub fn deflated(name: &'a str, data: &'a [u8]) -> Self {
        Self {
            name,
            data,
            method: 8,
        }
    }
}

pub struct ZipFixture {
    pub bytes: Vec<u8>,
    /// Data offset of each entry, in input order.
    pub data_offsets: Vec<u64>,
}

/// Build a ZIP archive. With `zip64`, the EOCD fields and every local
/// header offset are replaced by their sentinels and the real values are
/// written to ZIP64 records.
pub fn build_zip(entries: &[ZipEntry<'_>], zip64: bool, comment: &[u8]) -> ZipFixture {
    // Local extra field so the data offset is not just header + name
    let local_extra = [0xfe, 0xca, 0x04, 0x00, 0, 0, 0, 0];

    let mut bytes = Vec::new();
    let mut lfh_offsets = Vec::new();
    let mut data_offsets = Vec::new();

    for entry in entries {
        lfh_offsets.push(bytes.len() as u64);
        bytes.extend_from_slice(&0x04034B50u32.to_le_bytes());
        bytes.extend_from_slice(&20u16.to_le_bytes());
        bytes.extend_from_slice(&0u16.to_le_bytes());
        bytes.extend_from_slice(&entry.method.to_le_bytes());
        bytes.extend_from_slice(&[0u8; 8]);
        bytes.extend_from_slice(&(entry.data.len() as u32).to_le_bytes());
        bytes.extend_from_slice(&(entry.data.len() as u32).to_le_bytes());
        bytes.extend_from_slice(&(entry.name.len() as u16).to_le_bytes());
        bytes.extend_from_slice(&(local_extra.len() as u16).to_le_bytes());
        bytes.extend_from_slice(entry.name.as_bytes());
        bytes.extend_from_slice(&local_extra);
        data_offsets.push(bytes.len() as u64);
        bytes.extend_from_slice(entry.data);
    }

    let cd_offset = bytes.len() as u64;
    for (entry, lfh_offset) in entries.iter().zip(&lfh_offsets) {
        let extra = if zip64 {
            let mut extra = 0x0001u16.to_le_bytes().to_vec();
            extra.extend_from_slice(&8u16.to_le_bytes());
            extra.extend_from_slice(&lfh_offset.to_le_bytes());
            extra
        } else {
            Vec::new()
        };

        bytes.extend_from_slice(&0x02014B50u32.to_le_bytes());
        bytes.extend_from_slice(&20u16.to_le_bytes());
        bytes.extend_from_slice(&20u16.to_le_bytes());
        bytes.extend_from_slice(&0u16.to_le_bytes());
        bytes.extend_from_slice(&entry.method.to_le_bytes());
        bytes.extend_from_slice(&[0u8; 8]);
        bytes.extend_from_slice(&(entry.data.len() as u32).to_le_bytes());
        bytes.extend_from_slice(&(entry.data.len() as u32).to_le_bytes());
        bytes.extend_from_slice(&(entry.name.len() as u16).to_le_bytes());
        bytes.extend_from_slice(&(extra.len() as u16).to_le_bytes());
        bytes.extend_from_slice(&0u16.to_le_bytes());
        bytes.extend_from_slice(&[0u8; 8]);
        let offset_field = if zip64 { u32::MAX } else { *lfh_offset as u32 };
        bytes.extend_from_slice(&offset_field.to_le_bytes());
        bytes.extend_from_slice(entry.name.as_bytes());
        bytes.extend_from_slice(&extra);
    }
    let cd_size = bytes.len() as u64 - cd_offset;
    let count = entries.len() as u64;

    if zip64 {
        let eocd64_offset = bytes.len() as u64;
        bytes.extend_from_slice(&0x06064B50u32.to_le_bytes());
        bytes.extend_from_slice(&44u64.to_le_bytes());
        bytes.extend_from_slice(&45u16.to_le_bytes());
        bytes.extend_from_slice(&45u16.to_le_bytes());
        bytes.extend_from_slice(&0u32.to_le_bytes());
        bytes.extend_from_slice(&0u32.to_le_bytes());
        bytes.extend_from_slice(&count.to_le_bytes());
        bytes.extend_from_slice(&count.to_le_bytes());
        bytes.extend_from_slice(&cd_size.to_le_bytes());
        bytes.extend_from_slice(&cd_offset.to_le_bytes());

        bytes.extend_from_slice(&0x07064B50u32.to_le_bytes());
        bytes.extend_from_slice(&0u32.to_le_bytes());
        bytes.extend_from_slice(&eocd64_offset.to_le_bytes());
        bytes.extend_from_slice(&1u32.to_le_bytes());
    }

    bytes.extend_from_slice(&0x06054B50u32.to_le_bytes());
    bytes.extend_from_slice(&0u16.to_le_bytes());
    bytes.extend_from_slice(&0u16.to_le_bytes());
    if zip64 {
        bytes.extend_from_slice(&u16::MAX.to_le_bytes());
        bytes.extend_from_slice(&u16::MAX.to_le_bytes());
        bytes.extend_from_slice(&u32::MAX.to_le_bytes());
        bytes.extend_from_slice(&u32::MAX.to_le_bytes());
    } else {
        bytes.extend_from_slice(&(count as u16).to_le_bytes());
        bytes.extend_from_slice(&(count as u16).to_le_bytes());
        bytes.extend_from_slice(&(cd_size as u32).to_le_bytes());
        bytes.extend_from_slice(&(cd_offset as u32).to_le_bytes());
    }
    bytes.extend_from_slice(&(comment.len() as u16).to_le_bytes());
    bytes.extend_from_slice(comment);

    ZipFixture {
        bytes,
        data_offsets,
    }
}

/// In-memory remote resource. Records every requested range and, when
/// gated, holds each request until a permit is released.
pub struct MemoryTransport {
    data: Bytes,
    requests: Mutex<Vec<(u64, u64)>>,
    gate: Option<Semaphore>,
    broken: bool,
    fail_from: Option<u64>,
}

impl MemoryTransport {
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self {
            data: data.into(),
            requests: Mutex::new(Vec::new()),
            gate: None,
            broken: false,
            fail_from: None,
        }
    }

    /// Reports the length of `data` but fails every range request.
    pub fn broken(data: impl Into<Bytes>) -> Self {
        Self {
            broken: true,
            ..Self::new(data)
        }
    }

    /// Fails every request whose range reaches `offset` or beyond.
    pub fn failing_from(data: impl Into<Bytes>, offset: u64) -> Self {
        Self {
            fail_from: Some(offset),
            ..Self::new(data)
        }
    }

    pub fn gated(data: impl Into<Bytes>) -> Self {
        Self {
            gate: Some(Semaphore::new(0)),
            ..Self::new(data)
        }
    }

    pub fn open_gate(&self) {
        if let Some(gate) = &self.gate {
            gate.add_permits(Semaphore::MAX_PERMITS / 2);
        }
    }

    pub fn requests(&self) -> Vec<(u64, u64)> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl RangeTransport for MemoryTransport {
    async fn get_range(&self, start: u64, end: u64) -> Result<Bytes, TransportError> {
        if let Some(gate) = &self.gate {
            let _permit = gate.acquire().await.unwrap();
        }

        self.requests.lock().unwrap().push((start, end));
        if self.broken || self.fail_from.is_some_and(|offset| end >= offset) {
            return Err(TransportError::Status(reqwest::StatusCode::SERVICE_UNAVAILABLE));
        }
        if start > end || end >= self.data.len() as u64 {
            return Err(TransportError::OutOfRange { start, end });
        }
        Ok(self.data.slice(start as usize..=end as usize))
    }

    fn len(&self) -> u64 {
        self.data.len() as u64
    }
}
