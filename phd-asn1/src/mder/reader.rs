//! MDER reader

use super::float::{decode_float, decode_sfloat};
use phd_core::{PhdError, PhdResult};

/// Cursor-based MDER reader over a borrowed buffer
///
/// Every read checks the remaining length first and fails with
/// [`PhdError::InsufficientData`] without moving the cursor.
#[derive(Debug, Clone)]
pub struct MderReader<'a> {
    buffer: &'a [u8],
    position: usize,
}

impl<'a> MderReader<'a> {
    /// Create a new reader
    pub fn new(buffer: &'a [u8]) -> Self {
        Self {
            buffer,
            position: 0,
        }
    }

    /// Read `len` bytes and advance the cursor
    pub fn read_bytes(&mut self, len: usize) -> PhdResult<&'a [u8]> {
        let available = self.remaining();
        if len > available {
            return Err(PhdError::InsufficientData {
                needed: len,
                available,
            });
        }
        let bytes = &self.buffer[self.position..self.position + len];
        self.position += len;
        Ok(bytes)
    }

    /// Read a fixed-size array
    pub fn read_array<const N: usize>(&mut self) -> PhdResult<[u8; N]> {
        let mut array = [0u8; N];
        array.copy_from_slice(self.read_bytes(N)?);
        Ok(array)
    }

    /// Read an unsigned 8-bit integer
    pub fn read_u8(&mut self) -> PhdResult<u8> {
        Ok(self.read_array::<1>()?[0])
    }

    /// Read an unsigned 16-bit integer (big-endian)
    pub fn read_u16(&mut self) -> PhdResult<u16> {
        Ok(u16::from_be_bytes(self.read_array()?))
    }

    /// Read an unsigned 32-bit integer (big-endian)
    pub fn read_u32(&mut self) -> PhdResult<u32> {
        Ok(u32::from_be_bytes(self.read_array()?))
    }

    /// Read a FLOAT
    pub fn read_float(&mut self) -> PhdResult<f64> {
        Ok(decode_float(self.read_u32()?))
    }

    /// Read an SFLOAT
    pub fn read_sfloat(&mut self) -> PhdResult<f64> {
        Ok(decode_sfloat(self.read_u16()?))
    }

    /// Read a 16-bit length-prefixed octet string
    pub fn read_octet_string(&mut self) -> PhdResult<Vec<u8>> {
        let length = self.read_u16()? as usize;
        let bytes = self.read_bytes(length)?;
        let mut out = Vec::new();
        out.try_reserve_exact(length)
            .map_err(|e| PhdError::OutOfMemory(format!("octet string: {e}")))?;
        out.extend_from_slice(bytes);
        Ok(out)
    }

    /// Look at the next 16-bit value without consuming it
    pub fn peek_u16(&self) -> PhdResult<u16> {
        let mut ahead = self.clone();
        ahead.read_u16()
    }

    /// Split off a sub-reader over the next `len` bytes
    pub fn take(&mut self, len: usize) -> PhdResult<MderReader<'a>> {
        Ok(MderReader::new(self.read_bytes(len)?))
    }

    /// Split off a sub-reader whose size is given by a 16-bit length field
    pub fn take_length_prefixed(&mut self) -> PhdResult<MderReader<'a>> {
        let length = self.read_u16()? as usize;
        self.take(length)
    }

    /// Read a counted, length-prefixed list
    ///
    /// The declared length must be exactly consumed by `count` elements.
    pub fn read_list<T, F>(&mut self, context: &str, mut decode: F) -> PhdResult<Vec<T>>
    where
        F: FnMut(&mut MderReader<'a>) -> PhdResult<T>,
    {
        let count = self.read_u16()? as usize;
        let mut body = self.take_length_prefixed()?;
        let mut items = Vec::new();
        items
            .try_reserve(count)
            .map_err(|e| PhdError::OutOfMemory(format!("{context}: {e}")))?;
        for _ in 0..count {
            items.push(decode(&mut body)?);
        }
        body.expect_end(context)?;
        Ok(items)
    }

    /// Fail unless every byte has been consumed
    pub fn expect_end(&self, context: &str) -> PhdResult<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(PhdError::InvalidData(format!(
                "{context}: {} trailing bytes",
                self.remaining()
            )))
        }
    }

    /// Get current position
    pub fn position(&self) -> usize {
        self.position
    }

    /// Get remaining bytes
    pub fn remaining(&self) -> usize {
        self.buffer.len() - self.position
    }

    /// Check if the whole buffer has been consumed
    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }
}
