use bytes::{Bytes, BytesMut};
use tracing::warn;

use crate::error::{Error, Result};
use crate::io::RangeFetcher;

/// Install operation types, numbered as in update_engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Replace,
    Bsdiff,
    Copy,
    Zero,
    Unknown(u32),
}

impl OperationKind {
    pub fn from_u32(value: u32) -> Self {
        match value {
            0 => OperationKind::Replace,
            3 => OperationKind::Bsdiff,
            4 => OperationKind::Copy,
            6 => OperationKind::Zero,
            _ => OperationKind::Unknown(value),
        }
    }

    pub fn as_u32(&self) -> u32 {
        match self {
            OperationKind::Replace => 0,
            OperationKind::Bsdiff => 3,
            OperationKind::Copy => 4,
            OperationKind::Zero => 6,
            OperationKind::Unknown(v) => *v,
        }
    }
}

/// One step of a partition's reconstruction. Offsets are relative to the
/// payload body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Operation {
    pub kind: OperationKind,
    pub data_offset: u64,
    pub data_length: u64,
}

impl Operation {
    pub fn replace(data_offset: u64, data_length: u64) -> Self {
        Self {
            kind: OperationKind::Replace,
            data_offset,
            data_length,
        }
    }

    pub fn zero(data_length: u64) -> Self {
        Self {
            kind: OperationKind::Zero,
            data_offset: 0,
            data_length,
        }
    }
}

/// Read access to the payload body: `len` bytes of the source starting at
/// the payload magic.
#[derive(Clone, Copy)]
pub struct PayloadBody<'a> {
    fetcher: &'a RangeFetcher,
    offset: u64,
    len: u64,
}

impl<'a> PayloadBody<'a> {
    /// The body is clamped to the end of the source.
    pub fn new(fetcher: &'a RangeFetcher, offset: u64, len: u64) -> Self {
        let len = len.min(fetcher.len().saturating_sub(offset));
        Self {
            fetcher,
            offset,
            len,
        }
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub async fn read(&self, offset: u64, len: u64) -> Result<Bytes> {
        self.fetcher.fetch_len(self.offset + offset, len).await
    }
}

/// Replays an operation list against the payload body.
pub struct OperationExecutor<'a> {
    body: PayloadBody<'a>,
}

impl<'a> OperationExecutor<'a> {
    pub fn new(body: PayloadBody<'a>) -> Self {
        Self { body }
    }

    /// Rebuild `partition` from `operations`, concatenating outputs in order.
    ///
    /// The whole list is checked before any payload data is read, so an
    /// unsupported or out-of-bounds operation produces no partial image.
    pub async fn execute(
        &self,
        partition: &str,
        expected_size: Option<u64>,
        operations: &[Operation],
    ) -> Result<Bytes> {
        let mut total = 0u64;
        for op in operations {
            self.validate(partition, op)?;
            total = total.saturating_add(op.data_length);
        }

        let mut out = BytesMut::with_capacity(usize::try_from(total).unwrap_or(0));

        for op in operations {
            match op.kind {
                OperationKind::Replace => {
                    let data = self.body.read(op.data_offset, op.data_length).await?;
                    out.extend_from_slice(&data);
                }
                OperationKind::Zero => {
                    out.resize(out.len() + op.data_length as usize, 0);
                }
                kind => {
                    return Err(Error::UnsupportedOperation {
                        kind,
                        partition: partition.to_string(),
                    });
                }
            }
        }

        if let Some(expected) = expected_size
            && out.len() as u64 != expected
        {
            let mismatch = Error::SizeMismatch {
                name: partition.to_string(),
                expected,
                actual: out.len() as u64,
            };
            warn!("{mismatch}");
        }

        Ok(out.freeze())
    }

    fn validate(&self, partition: &str, op: &Operation) -> Result<()> {
        match op.kind {
            OperationKind::Replace => {
                let available = self.body.len();
                match op.data_offset.checked_add(op.data_length) {
                    Some(end) if end <= available => Ok(()),
                    _ => Err(Error::BufferOverrun {
                        offset: op.data_offset,
                        wanted: op.data_length,
                        available,
                    }),
                }
            }
            OperationKind::Zero => Ok(()),
            kind => Err(Error::UnsupportedOperation {
                kind,
                partition: partition.to_string(),
            }),
        }
    }
}
