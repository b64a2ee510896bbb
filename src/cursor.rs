//! Bounds-checked little-endian reader over an in-memory buffer.
//!
//! Every read either succeeds in full or fails with
//! [`Error::BufferOverrun`] naming the offset that was attempted, so binary
//! parsers never have to re-derive length checks at each call site.

use byteorder::{LittleEndian, ReadBytesExt};
use std::io::{Cursor, Read};

use crate::error::{Error, Result};

pub struct ByteCursor<'a> {
    inner: Cursor<&'a [u8]>,
}

impl<'a> ByteCursor<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            inner: Cursor::new(data),
        }
    }

    pub fn position(&self) -> u64 {
        self.inner.position()
    }

    pub fn len(&self) -> u64 {
        self.inner.get_ref().len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.inner.get_ref().is_empty()
    }

    pub fn remaining(&self) -> u64 {
        self.len().saturating_sub(self.position())
    }

    fn ensure(&self, wanted: u64) -> Result<()> {
        if wanted > self.remaining() {
            return Err(Error::BufferOverrun {
                offset: self.position(),
                wanted,
                available: self.len(),
            });
        }
        Ok(())
    }

    /// Move to an absolute position. Seeking to exactly the end is allowed.
    pub fn seek(&mut self, position: u64) -> Result<()> {
        if position > self.len() {
            return Err(Error::BufferOverrun {
                offset: position,
                wanted: 0,
                available: self.len(),
            });
        }
        self.inner.set_position(position);
        Ok(())
    }

    pub fn skip(&mut self, n: u64) -> Result<()> {
        self.ensure(n)?;
        self.inner.set_position(self.position() + n);
        Ok(())
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        self.ensure(2)?;
        Ok(self.inner.read_u16::<LittleEndian>()?)
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        self.ensure(4)?;
        Ok(self.inner.read_u32::<LittleEndian>()?)
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        self.ensure(8)?;
        Ok(self.inner.read_u64::<LittleEndian>()?)
    }

    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        self.ensure(N as u64)?;
        let mut buf = [0u8; N];
        self.inner.read_exact(&mut buf)?;
        Ok(buf)
    }

    /// Borrow the next `n` bytes without copying.
    pub fn read_slice(&mut self, n: u64) -> Result<&'a [u8]> {
        self.ensure(n)?;
        let start = self.position() as usize;
        let end = start + n as usize;
        self.inner.set_position(end as u64);
        let data: &'a [u8] = *self.inner.get_ref();
        Ok(&data[start..end])
    }
}
