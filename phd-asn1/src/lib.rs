//! MDER encoding/decoding for ISO/IEEE 11073-20601
//!
//! This crate provides the byte-level MDER codec and the APDU structures
//! exchanged between agents and managers.

pub mod apdu;
pub mod codec;
pub mod mder;
pub mod types;

pub use apdu::{
    AareApdu, AarqApdu, AbrtApdu, Apdu, DataApdu, DataMessage, PrstApdu, RlreApdu, RlrqApdu,
};
pub use codec::{ApduCodec, frame_length};
pub use mder::{MderDecode, MderEncode, MderReader, MderWriter};
pub use types::*;
