//! APDU framing and size-bounded encode/decode

use crate::apdu::Apdu;
use crate::mder::{MderDecode, MderEncode, MderWriter};
use phd_core::{PhdError, PhdResult};

/// Size of the `choice | length` header of every APDU
pub const APDU_HEADER_LENGTH: usize = 4;

/// Largest APDU an agent is required to receive
pub const AGENT_MAX_APDU_SIZE: usize = 8_192;
/// Largest APDU a manager is required to receive
pub const MANAGER_MAX_APDU_SIZE: usize = 63_488;

/// Total frame size announced by an APDU header, if the header is complete
pub fn frame_length(header: &[u8]) -> Option<usize> {
    if header.len() < APDU_HEADER_LENGTH {
        return None;
    }
    Some(APDU_HEADER_LENGTH + u16::from_be_bytes([header[2], header[3]]) as usize)
}

/// Size-bounded APDU codec
///
/// Outgoing APDUs are written into a writer of exactly `max_tx_size` bytes so
/// an oversized APDU fails with [`PhdError::BufferOverflow`] instead of
/// being sent. Incoming frames larger than `max_rx_size` are refused before
/// decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApduCodec {
    pub max_tx_size: usize,
    pub max_rx_size: usize,
}

impl ApduCodec {
    pub const fn new(max_tx_size: usize, max_rx_size: usize) -> Self {
        Self {
            max_tx_size,
            max_rx_size,
        }
    }

    /// Codec limits for the manager end
    pub const fn manager() -> Self {
        Self::new(AGENT_MAX_APDU_SIZE, MANAGER_MAX_APDU_SIZE)
    }

    /// Codec limits for the agent end
    pub const fn agent() -> Self {
        Self::new(MANAGER_MAX_APDU_SIZE, AGENT_MAX_APDU_SIZE)
    }

    /// Encode an APDU
    pub fn encode(&self, apdu: &Apdu) -> PhdResult<Vec<u8>> {
        let mut writer = MderWriter::with_capacity(self.max_tx_size);
        apdu.encode_to(&mut writer)?;
        Ok(writer.into_bytes())
    }

    /// Decode one complete APDU frame
    pub fn decode(&self, bytes: &[u8]) -> PhdResult<Apdu> {
        if bytes.len() > self.max_rx_size {
            return Err(PhdError::InvalidData(format!(
                "APDU of {} bytes exceeds limit of {}",
                bytes.len(),
                self.max_rx_size
            )));
        }
        Apdu::from_bytes(bytes).inspect_err(|e| {
            log::debug!("Failed to decode {} byte APDU: {}", bytes.len(), e);
        })
    }
}

impl Default for ApduCodec {
    fn default() -> Self {
        Self::manager()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::apdu::{DataApdu, DataMessage};
    use crate::types::EventReportArgumentSimple;

    #[test]
    fn test_frame_length() {
        assert_eq!(frame_length(&[0xE5, 0x00]), None);
        assert_eq!(frame_length(&[0xE5, 0x00, 0x00, 0x02]), Some(6));
    }

    #[test]
    fn test_encode_respects_limit() {
        let codec = ApduCodec::new(32, 32);
        let apdu = Apdu::prst(DataApdu::new(
            0,
            DataMessage::RoivEventReport(EventReportArgumentSimple {
                event_info: vec![0; 64],
                ..Default::default()
            }),
        ));
        assert!(matches!(
            codec.encode(&apdu).unwrap_err(),
            PhdError::BufferOverflow { capacity: 32, .. }
        ));
    }

    #[test]
    fn test_decode_respects_limit() {
        let codec = ApduCodec::new(8, 4);
        assert!(codec.decode(&[0xE5, 0x00, 0x00, 0x02, 0x00, 0x00]).is_err());
        let codec = ApduCodec::default();
        assert!(codec.decode(&[0xE5, 0x00, 0x00, 0x02, 0x00, 0x00]).is_ok());
    }
}
