//! MDER writer

use super::float::{encode_float, encode_sfloat};
use phd_core::{PhdError, PhdResult};

/// Cursor-based MDER writer
///
/// A writer built with [`MderWriter::with_capacity`] refuses to grow past
/// the given number of bytes and reports [`PhdError::BufferOverflow`]
/// instead. Length fields are written as placeholders with
/// [`reserve_length`](MderWriter::reserve_length) and filled in with
/// [`patch_length`](MderWriter::patch_length) once the children are emitted.
#[derive(Debug, Clone)]
pub struct MderWriter {
    buffer: Vec<u8>,
    capacity: Option<usize>,
}

impl MderWriter {
    /// Create an unbounded writer
    pub fn new() -> Self {
        Self {
            buffer: Vec::new(),
            capacity: None,
        }
    }

    /// Create a writer that holds at most `capacity` bytes
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(capacity),
            capacity: Some(capacity),
        }
    }

    fn ensure(&self, additional: usize) -> PhdResult<()> {
        if let Some(capacity) = self.capacity {
            let needed = self.buffer.len() + additional;
            if needed > capacity {
                return Err(PhdError::BufferOverflow { needed, capacity });
            }
        }
        Ok(())
    }

    /// Write an unsigned 8-bit integer
    pub fn write_u8(&mut self, value: u8) -> PhdResult<()> {
        self.write_bytes(&[value])
    }

    /// Write an unsigned 16-bit integer (big-endian)
    pub fn write_u16(&mut self, value: u16) -> PhdResult<()> {
        self.write_bytes(&value.to_be_bytes())
    }

    /// Write an unsigned 32-bit integer (big-endian)
    pub fn write_u32(&mut self, value: u32) -> PhdResult<()> {
        self.write_bytes(&value.to_be_bytes())
    }

    /// Write a FLOAT
    pub fn write_float(&mut self, value: f64) -> PhdResult<()> {
        self.write_u32(encode_float(value))
    }

    /// Write an SFLOAT
    pub fn write_sfloat(&mut self, value: f64) -> PhdResult<()> {
        self.write_u16(encode_sfloat(value))
    }

    /// Write raw bytes without any prefix
    pub fn write_bytes(&mut self, bytes: &[u8]) -> PhdResult<()> {
        self.ensure(bytes.len())?;
        self.buffer.extend_from_slice(bytes);
        Ok(())
    }

    /// Write an octet string with its 16-bit length prefix
    pub fn write_octet_string(&mut self, bytes: &[u8]) -> PhdResult<()> {
        let length = u16::try_from(bytes.len()).map_err(|_| {
            PhdError::InvalidData(format!("Octet string too long: {} bytes", bytes.len()))
        })?;
        self.write_u16(length)?;
        self.write_bytes(bytes)
    }

    /// Reserve a 16-bit length field and return its position
    pub fn reserve_length(&mut self) -> PhdResult<usize> {
        let position = self.buffer.len();
        self.write_u16(0)?;
        Ok(position)
    }

    /// Fill in a reserved length field with the number of bytes written after it
    pub fn patch_length(&mut self, position: usize) -> PhdResult<()> {
        let start = position + 2;
        if start > self.buffer.len() {
            return Err(PhdError::InvalidData(format!(
                "Length placeholder at {position} is out of range"
            )));
        }
        let length = u16::try_from(self.buffer.len() - start).map_err(|_| {
            PhdError::InvalidData(format!(
                "Encoded length {} exceeds 16 bits",
                self.buffer.len() - start
            ))
        })?;
        self.buffer[position..start].copy_from_slice(&length.to_be_bytes());
        Ok(())
    }

    /// Write a counted, length-prefixed list
    ///
    /// Emits `count`, a length placeholder, every element in order and then
    /// back-patches the length.
    pub fn write_list<T, F>(&mut self, items: &[T], mut encode: F) -> PhdResult<()>
    where
        F: FnMut(&mut Self, &T) -> PhdResult<()>,
    {
        let count = u16::try_from(items.len()).map_err(|_| {
            PhdError::InvalidData(format!("List too long: {} elements", items.len()))
        })?;
        self.write_u16(count)?;
        let length_at = self.reserve_length()?;
        for item in items {
            encode(self, item)?;
        }
        self.patch_length(length_at)
    }

    /// Number of bytes written so far
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if nothing has been written
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Get the written bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    /// Consume the writer and return the written bytes
    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }
}

impl Default for MderWriter {
    fn default() -> Self {
        Self::new()
    }
}
