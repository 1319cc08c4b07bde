//! Medical Device Encoding Rules (MDER)
//!
//! Big-endian integers, base-10 FLOAT/SFLOAT, length-prefixed octet strings
//! and counted lists. Every compound type is written as
//! `count (u16) | length (u16) | elements` with the length back-patched.

pub mod float;
pub mod reader;
pub mod writer;

pub use float::{decode_float, decode_sfloat, encode_float, encode_sfloat};
pub use reader::MderReader;
pub use writer::MderWriter;

use phd_core::{PhdError, PhdResult};

/// Types that can be written in MDER
pub trait MderEncode {
    /// Append the encoding of `self` to `writer`
    fn encode_to(&self, writer: &mut MderWriter) -> PhdResult<()>;

    /// Encode into a fresh byte vector
    fn to_bytes(&self) -> PhdResult<Vec<u8>> {
        let mut writer = MderWriter::new();
        self.encode_to(&mut writer)?;
        Ok(writer.into_bytes())
    }
}

/// Types that can be read from MDER
pub trait MderDecode: Sized {
    /// Decode a value from the reader's current position
    fn decode_from(reader: &mut MderReader<'_>) -> PhdResult<Self>;

    /// Decode a value that must span the whole input
    fn from_bytes(bytes: &[u8]) -> PhdResult<Self> {
        let mut reader = MderReader::new(bytes);
        let value = Self::decode_from(&mut reader)?;
        if !reader.is_empty() {
            return Err(PhdError::InvalidData(format!(
                "{} trailing bytes after value",
                reader.remaining()
            )));
        }
        Ok(value)
    }
}

impl MderEncode for u8 {
    fn encode_to(&self, writer: &mut MderWriter) -> PhdResult<()> {
        writer.write_u8(*self)
    }
}

impl MderDecode for u8 {
    fn decode_from(reader: &mut MderReader<'_>) -> PhdResult<Self> {
        reader.read_u8()
    }
}

impl MderEncode for u16 {
    fn encode_to(&self, writer: &mut MderWriter) -> PhdResult<()> {
        writer.write_u16(*self)
    }
}

impl MderDecode for u16 {
    fn decode_from(reader: &mut MderReader<'_>) -> PhdResult<Self> {
        reader.read_u16()
    }
}

impl MderEncode for u32 {
    fn encode_to(&self, writer: &mut MderWriter) -> PhdResult<()> {
        writer.write_u32(*self)
    }
}

impl MderDecode for u32 {
    fn decode_from(reader: &mut MderReader<'_>) -> PhdResult<Self> {
        reader.read_u32()
    }
}

impl<T: MderEncode> MderEncode for Vec<T> {
    fn encode_to(&self, writer: &mut MderWriter) -> PhdResult<()> {
        writer.write_list(self, |w, item| item.encode_to(w))
    }
}

impl<T: MderDecode> MderDecode for Vec<T> {
    fn decode_from(reader: &mut MderReader<'_>) -> PhdResult<Self> {
        reader.read_list(std::any::type_name::<T>(), T::decode_from)
    }
}
