//! Top-level APDUs and the DATA-APDU carried by PRST
//!
//! # Encoding Format
//!
//! ```text
//! APDU:      choice (u16) | length (u16) | payload
//! PRST:      0xE700       | length (u16) | octet string (DATA-APDU)
//! DATA-APDU: invoke-id (u16) | message choice (u16) | length (u16) | message
//! ```
//!
//! Length fields are never stored on the structures. They are back-patched
//! while encoding and checked against the consumed bytes while decoding.

use crate::mder::{MderDecode, MderEncode, MderReader, MderWriter};
use crate::types::*;
use bytes::{Bytes, BytesMut};
use phd_core::protocol::{AbortReason, AssociateResult, DATA_PROTO_ID_20601};
use phd_core::{PhdError, PhdResult};
use std::borrow::Cow;

/// APDU choices
pub const AARQ_CHOSEN: u16 = 0xE200;
pub const AARE_CHOSEN: u16 = 0xE300;
pub const RLRQ_CHOSEN: u16 = 0xE400;
pub const RLRE_CHOSEN: u16 = 0xE500;
pub const ABRT_CHOSEN: u16 = 0xE600;
pub const PRST_CHOSEN: u16 = 0xE700;

/// DATA-APDU message choices
pub const ROIV_CMIP_EVENT_REPORT_CHOSEN: u16 = 0x0100;
pub const ROIV_CMIP_CONFIRMED_EVENT_REPORT_CHOSEN: u16 = 0x0101;
pub const ROIV_CMIP_GET_CHOSEN: u16 = 0x0103;
pub const ROIV_CMIP_SET_CHOSEN: u16 = 0x0104;
pub const ROIV_CMIP_CONFIRMED_SET_CHOSEN: u16 = 0x0105;
pub const ROIV_CMIP_ACTION_CHOSEN: u16 = 0x0106;
pub const ROIV_CMIP_CONFIRMED_ACTION_CHOSEN: u16 = 0x0107;
pub const RORS_CMIP_CONFIRMED_EVENT_REPORT_CHOSEN: u16 = 0x0201;
pub const RORS_CMIP_GET_CHOSEN: u16 = 0x0203;
pub const RORS_CMIP_CONFIRMED_SET_CHOSEN: u16 = 0x0205;
pub const RORS_CMIP_CONFIRMED_ACTION_CHOSEN: u16 = 0x0207;
pub const ROER_CHOSEN: u16 = 0x0300;
pub const RORJ_CHOSEN: u16 = 0x0400;

/// AARQ (Association Request)
///
/// Sent by the agent. Carries the association version and the list of data
/// protocols the agent can speak, each with its own association information.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AarqApdu {
    pub assoc_version: u32,
    pub data_proto_list: Vec<DataProto>,
}

impl AarqApdu {
    /// First data protocol entry for ISO/IEEE 11073-20601, if any
    pub fn phd_data_proto(&self) -> Option<&DataProto> {
        self.data_proto_list
            .iter()
            .find(|proto| proto.data_proto_id == DATA_PROTO_ID_20601)
    }
}

impl MderEncode for AarqApdu {
    fn encode_to(&self, writer: &mut MderWriter) -> PhdResult<()> {
        writer.write_u32(self.assoc_version)?;
        self.data_proto_list.encode_to(writer)
    }
}

impl MderDecode for AarqApdu {
    fn decode_from(reader: &mut MderReader<'_>) -> PhdResult<Self> {
        Ok(Self {
            assoc_version: reader.read_u32()?,
            data_proto_list: Vec::decode_from(reader)?,
        })
    }
}

/// AARE (Association Response)
///
/// Sent by the manager with the association result and the selected data
/// protocol, which carries the manager's association information.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AareApdu {
    pub result: AssociateResult,
    pub selected_data_proto: DataProto,
}

impl MderEncode for AareApdu {
    fn encode_to(&self, writer: &mut MderWriter) -> PhdResult<()> {
        writer.write_u16(self.result.as_u16())?;
        self.selected_data_proto.encode_to(writer)
    }
}

impl MderDecode for AareApdu {
    fn decode_from(reader: &mut MderReader<'_>) -> PhdResult<Self> {
        Ok(Self {
            result: AssociateResult::from_u16(reader.read_u16()?),
            selected_data_proto: DataProto::decode_from(reader)?,
        })
    }
}

/// RLRQ (Release Request)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RlrqApdu {
    pub reason: u16,
}

/// RLRE (Release Response)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RlreApdu {
    pub reason: u16,
}

/// ABRT (Abort)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AbrtApdu {
    pub reason: AbortReason,
}

impl MderEncode for RlrqApdu {
    fn encode_to(&self, writer: &mut MderWriter) -> PhdResult<()> {
        writer.write_u16(self.reason)
    }
}

impl MderDecode for RlrqApdu {
    fn decode_from(reader: &mut MderReader<'_>) -> PhdResult<Self> {
        Ok(Self {
            reason: reader.read_u16()?,
        })
    }
}

impl MderEncode for RlreApdu {
    fn encode_to(&self, writer: &mut MderWriter) -> PhdResult<()> {
        writer.write_u16(self.reason)
    }
}

impl MderDecode for RlreApdu {
    fn decode_from(reader: &mut MderReader<'_>) -> PhdResult<Self> {
        Ok(Self {
            reason: reader.read_u16()?,
        })
    }
}

impl MderEncode for AbrtApdu {
    fn encode_to(&self, writer: &mut MderWriter) -> PhdResult<()> {
        writer.write_u16(self.reason.as_u16())
    }
}

impl MderDecode for AbrtApdu {
    fn decode_from(reader: &mut MderReader<'_>) -> PhdResult<Self> {
        Ok(Self {
            reason: AbortReason::from_u16(reader.read_u16()?),
        })
    }
}

/// Message body of a DATA-APDU
#[derive(Debug, Clone, PartialEq)]
pub enum DataMessage {
    RoivEventReport(EventReportArgumentSimple),
    RoivConfirmedEventReport(EventReportArgumentSimple),
    RoivGet(GetArgumentSimple),
    RoivSet(SetArgumentSimple),
    RoivConfirmedSet(SetArgumentSimple),
    RoivAction(ActionArgumentSimple),
    RoivConfirmedAction(ActionArgumentSimple),
    RorsConfirmedEventReport(EventReportResultSimple),
    RorsGet(GetResultSimple),
    RorsConfirmedSet(SetResultSimple),
    RorsConfirmedAction(ActionResultSimple),
    Roer(ErrorResult),
    Rorj(RejectResult),
}

impl DataMessage {
    /// Wire discriminant of this message
    pub const fn choice(&self) -> u16 {
        match self {
            Self::RoivEventReport(_) => ROIV_CMIP_EVENT_REPORT_CHOSEN,
            Self::RoivConfirmedEventReport(_) => ROIV_CMIP_CONFIRMED_EVENT_REPORT_CHOSEN,
            Self::RoivGet(_) => ROIV_CMIP_GET_CHOSEN,
            Self::RoivSet(_) => ROIV_CMIP_SET_CHOSEN,
            Self::RoivConfirmedSet(_) => ROIV_CMIP_CONFIRMED_SET_CHOSEN,
            Self::RoivAction(_) => ROIV_CMIP_ACTION_CHOSEN,
            Self::RoivConfirmedAction(_) => ROIV_CMIP_CONFIRMED_ACTION_CHOSEN,
            Self::RorsConfirmedEventReport(_) => RORS_CMIP_CONFIRMED_EVENT_REPORT_CHOSEN,
            Self::RorsGet(_) => RORS_CMIP_GET_CHOSEN,
            Self::RorsConfirmedSet(_) => RORS_CMIP_CONFIRMED_SET_CHOSEN,
            Self::RorsConfirmedAction(_) => RORS_CMIP_CONFIRMED_ACTION_CHOSEN,
            Self::Roer(_) => ROER_CHOSEN,
            Self::Rorj(_) => RORJ_CHOSEN,
        }
    }

    /// Check if this is a remote operation invoke (ROIV)
    pub const fn is_invoke(&self) -> bool {
        matches!(
            self,
            Self::RoivEventReport(_)
                | Self::RoivConfirmedEventReport(_)
                | Self::RoivGet(_)
                | Self::RoivSet(_)
                | Self::RoivConfirmedSet(_)
                | Self::RoivAction(_)
                | Self::RoivConfirmedAction(_)
        )
    }

    /// Check if this invoke expects a response from the peer
    pub const fn expects_response(&self) -> bool {
        matches!(
            self,
            Self::RoivConfirmedEventReport(_)
                | Self::RoivGet(_)
                | Self::RoivConfirmedSet(_)
                | Self::RoivConfirmedAction(_)
        )
    }

    /// Check if this is a response, an error or a reject
    pub const fn is_response(&self) -> bool {
        !self.is_invoke()
    }

    /// Short name for logging
    pub const fn name(&self) -> &'static str {
        match self {
            Self::RoivEventReport(_) => "roiv-event-report",
            Self::RoivConfirmedEventReport(_) => "roiv-confirmed-event-report",
            Self::RoivGet(_) => "roiv-get",
            Self::RoivSet(_) => "roiv-set",
            Self::RoivConfirmedSet(_) => "roiv-confirmed-set",
            Self::RoivAction(_) => "roiv-action",
            Self::RoivConfirmedAction(_) => "roiv-confirmed-action",
            Self::RorsConfirmedEventReport(_) => "rors-confirmed-event-report",
            Self::RorsGet(_) => "rors-get",
            Self::RorsConfirmedSet(_) => "rors-confirmed-set",
            Self::RorsConfirmedAction(_) => "rors-confirmed-action",
            Self::Roer(_) => "roer",
            Self::Rorj(_) => "rorj",
        }
    }

    fn encode_body(&self, writer: &mut MderWriter) -> PhdResult<()> {
        match self {
            Self::RoivEventReport(arg) | Self::RoivConfirmedEventReport(arg) => {
                arg.encode_to(writer)
            }
            Self::RoivGet(arg) => arg.encode_to(writer),
            Self::RoivSet(arg) | Self::RoivConfirmedSet(arg) => arg.encode_to(writer),
            Self::RoivAction(arg) | Self::RoivConfirmedAction(arg) => arg.encode_to(writer),
            Self::RorsConfirmedEventReport(res) => res.encode_to(writer),
            Self::RorsGet(res) | Self::RorsConfirmedSet(res) => res.encode_to(writer),
            Self::RorsConfirmedAction(res) => res.encode_to(writer),
            Self::Roer(err) => err.encode_to(writer),
            Self::Rorj(rej) => rej.encode_to(writer),
        }
    }

    fn decode_body(choice: u16, reader: &mut MderReader<'_>) -> PhdResult<Self> {
        let message = match choice {
            ROIV_CMIP_EVENT_REPORT_CHOSEN => {
                Self::RoivEventReport(EventReportArgumentSimple::decode_from(reader)?)
            }
            ROIV_CMIP_CONFIRMED_EVENT_REPORT_CHOSEN => {
                Self::RoivConfirmedEventReport(EventReportArgumentSimple::decode_from(reader)?)
            }
            ROIV_CMIP_GET_CHOSEN => Self::RoivGet(GetArgumentSimple::decode_from(reader)?),
            ROIV_CMIP_SET_CHOSEN => Self::RoivSet(SetArgumentSimple::decode_from(reader)?),
            ROIV_CMIP_CONFIRMED_SET_CHOSEN => {
                Self::RoivConfirmedSet(SetArgumentSimple::decode_from(reader)?)
            }
            ROIV_CMIP_ACTION_CHOSEN => Self::RoivAction(ActionArgumentSimple::decode_from(reader)?),
            ROIV_CMIP_CONFIRMED_ACTION_CHOSEN => {
                Self::RoivConfirmedAction(ActionArgumentSimple::decode_from(reader)?)
            }
            RORS_CMIP_CONFIRMED_EVENT_REPORT_CHOSEN => {
                Self::RorsConfirmedEventReport(EventReportResultSimple::decode_from(reader)?)
            }
            RORS_CMIP_GET_CHOSEN => Self::RorsGet(GetResultSimple::decode_from(reader)?),
            RORS_CMIP_CONFIRMED_SET_CHOSEN => {
                Self::RorsConfirmedSet(SetResultSimple::decode_from(reader)?)
            }
            RORS_CMIP_CONFIRMED_ACTION_CHOSEN => {
                Self::RorsConfirmedAction(ActionResultSimple::decode_from(reader)?)
            }
            ROER_CHOSEN => Self::Roer(ErrorResult::decode_from(reader)?),
            RORJ_CHOSEN => Self::Rorj(RejectResult::decode_from(reader)?),
            other => {
                return Err(PhdError::UnknownChoice {
                    context: "DATA-APDU message",
                    choice: other,
                });
            }
        };
        Ok(message)
    }
}

/// DATA-APDU: one remote operation with its invoke id
#[derive(Debug, Clone, PartialEq)]
pub struct DataApdu {
    pub invoke_id: u16,
    pub message: DataMessage,
}

impl DataApdu {
    pub fn new(invoke_id: u16, message: DataMessage) -> Self {
        Self { invoke_id, message }
    }
}

impl MderEncode for DataApdu {
    fn encode_to(&self, writer: &mut MderWriter) -> PhdResult<()> {
        writer.write_u16(self.invoke_id)?;
        writer.write_u16(self.message.choice())?;
        let length_at = writer.reserve_length()?;
        self.message.encode_body(writer)?;
        writer.patch_length(length_at)
    }
}

impl MderDecode for DataApdu {
    fn decode_from(reader: &mut MderReader<'_>) -> PhdResult<Self> {
        let invoke_id = reader.read_u16()?;
        let choice = reader.read_u16()?;
        let mut body = reader.take_length_prefixed()?;
        let message = DataMessage::decode_body(choice, &mut body)?;
        body.expect_end("DATA-APDU message")?;
        Ok(Self { invoke_id, message })
    }
}

/// PRST payload
///
/// Holds either a decoded DATA-APDU (built locally) or its raw encoding
/// (as received). Inbound frames stay encoded until the state machine
/// dispatches them, so a malformed DATA-APDU inside a well-formed frame still
/// reaches the state machine. Equality compares the canonical encoding.
#[derive(Debug, Clone)]
pub enum PrstApdu {
    Data(DataApdu),
    Encoded(Bytes),
}

impl PrstApdu {
    /// Get the DATA-APDU, decoding it if needed
    pub fn data_apdu(&self) -> PhdResult<Cow<'_, DataApdu>> {
        match self {
            Self::Data(data) => Ok(Cow::Borrowed(data)),
            Self::Encoded(bytes) => DataApdu::from_bytes(bytes).map(Cow::Owned),
        }
    }

    /// Consume the payload and return the DATA-APDU
    pub fn into_data_apdu(self) -> PhdResult<DataApdu> {
        match self {
            Self::Data(data) => Ok(data),
            Self::Encoded(bytes) => DataApdu::from_bytes(&bytes),
        }
    }

    /// Get the encoded DATA-APDU, encoding it if needed
    pub fn data_bytes(&self) -> PhdResult<Cow<'_, [u8]>> {
        match self {
            Self::Data(data) => data.to_bytes().map(Cow::Owned),
            Self::Encoded(bytes) => Ok(Cow::Borrowed(bytes.as_ref())),
        }
    }

    /// Invoke id of the DATA-APDU, read without a full decode
    pub fn invoke_id(&self) -> Option<u16> {
        match self {
            Self::Data(data) => Some(data.invoke_id),
            Self::Encoded(bytes) => MderReader::new(bytes).read_u16().ok(),
        }
    }

    /// Overwrite the invoke id in place
    pub fn set_invoke_id(&mut self, invoke_id: u16) -> PhdResult<()> {
        match self {
            Self::Data(data) => {
                data.invoke_id = invoke_id;
                Ok(())
            }
            Self::Encoded(bytes) => {
                if bytes.len() < 2 {
                    return Err(PhdError::InsufficientData {
                        needed: 2,
                        available: bytes.len(),
                    });
                }
                let mut patched = BytesMut::from(bytes.as_ref());
                patched[0..2].copy_from_slice(&invoke_id.to_be_bytes());
                *bytes = patched.freeze();
                Ok(())
            }
        }
    }
}

impl From<DataApdu> for PrstApdu {
    fn from(data: DataApdu) -> Self {
        Self::Data(data)
    }
}

impl PartialEq for PrstApdu {
    fn eq(&self, other: &Self) -> bool {
        match (self.data_bytes(), other.data_bytes()) {
            (Ok(left), Ok(right)) => left == right,
            _ => false,
        }
    }
}

impl MderEncode for PrstApdu {
    fn encode_to(&self, writer: &mut MderWriter) -> PhdResult<()> {
        match self {
            Self::Data(data) => {
                let length_at = writer.reserve_length()?;
                data.encode_to(writer)?;
                writer.patch_length(length_at)
            }
            Self::Encoded(bytes) => writer.write_octet_string(bytes),
        }
    }
}

impl MderDecode for PrstApdu {
    fn decode_from(reader: &mut MderReader<'_>) -> PhdResult<Self> {
        Ok(Self::Encoded(Bytes::from(reader.read_octet_string()?)))
    }
}

/// Top-level APDU
#[derive(Debug, Clone, PartialEq)]
pub enum Apdu {
    Aarq(AarqApdu),
    Aare(AareApdu),
    Rlrq(RlrqApdu),
    Rlre(RlreApdu),
    Abrt(AbrtApdu),
    Prst(PrstApdu),
}

impl Apdu {
    /// Wrap a DATA-APDU into a PRST
    pub fn prst(data: DataApdu) -> Self {
        Self::Prst(PrstApdu::Data(data))
    }

    /// Wire discriminant of this APDU
    pub const fn choice(&self) -> u16 {
        match self {
            Self::Aarq(_) => AARQ_CHOSEN,
            Self::Aare(_) => AARE_CHOSEN,
            Self::Rlrq(_) => RLRQ_CHOSEN,
            Self::Rlre(_) => RLRE_CHOSEN,
            Self::Abrt(_) => ABRT_CHOSEN,
            Self::Prst(_) => PRST_CHOSEN,
        }
    }

    /// Short name for logging
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Aarq(_) => "AARQ",
            Self::Aare(_) => "AARE",
            Self::Rlrq(_) => "RLRQ",
            Self::Rlre(_) => "RLRE",
            Self::Abrt(_) => "ABRT",
            Self::Prst(_) => "PRST",
        }
    }
}

impl MderEncode for Apdu {
    fn encode_to(&self, writer: &mut MderWriter) -> PhdResult<()> {
        writer.write_u16(self.choice())?;
        let length_at = writer.reserve_length()?;
        match self {
            Self::Aarq(aarq) => aarq.encode_to(writer)?,
            Self::Aare(aare) => aare.encode_to(writer)?,
            Self::Rlrq(rlrq) => rlrq.encode_to(writer)?,
            Self::Rlre(rlre) => rlre.encode_to(writer)?,
            Self::Abrt(abrt) => abrt.encode_to(writer)?,
            Self::Prst(prst) => prst.encode_to(writer)?,
        }
        writer.patch_length(length_at)
    }
}

impl MderDecode for Apdu {
    fn decode_from(reader: &mut MderReader<'_>) -> PhdResult<Self> {
        let choice = reader.read_u16()?;
        let mut body = reader.take_length_prefixed()?;
        let apdu = match choice {
            AARQ_CHOSEN => Self::Aarq(AarqApdu::decode_from(&mut body)?),
            AARE_CHOSEN => Self::Aare(AareApdu::decode_from(&mut body)?),
            RLRQ_CHOSEN => Self::Rlrq(RlrqApdu::decode_from(&mut body)?),
            RLRE_CHOSEN => Self::Rlre(RlreApdu::decode_from(&mut body)?),
            ABRT_CHOSEN => Self::Abrt(AbrtApdu::decode_from(&mut body)?),
            PRST_CHOSEN => Self::Prst(PrstApdu::decode_from(&mut body)?),
            other => {
                return Err(PhdError::UnknownChoice {
                    context: "APDU",
                    choice: other,
                });
            }
        };
        body.expect_end(apdu.name())?;
        Ok(apdu)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use phd_core::protocol::{ConfigResult, ENCODING_MDER, PROTOCOL_VERSION1, SYS_TYPE_MANAGER};

    const ASSOCIATION_RESPONSE: [u8; 48] = [
        0xE3, 0x00, 0x00, 0x2C, 0x00, 0x03, 0x50, 0x79, 0x00, 0x26, 0x80, 0x00, 0x00, 0x00,
        0x80, 0x00, 0x80, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x80, 0x00, 0x00, 0x00,
        0x00, 0x08, 0x88, 0x77, 0x66, 0x55, 0x44, 0x33, 0x22, 0x11, 0x00, 0x00, 0x00, 0x00,
        0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    ];

    const CONFIGURATION_RESPONSE: [u8; 26] = [
        0xE7, 0x00, 0x00, 0x16, 0x00, 0x14, 0x00, 0x02, 0x02, 0x01, 0x00, 0x0E, 0x00, 0x00,
        0x00, 0x00, 0x00, 0x00, 0x0D, 0x1C, 0x00, 0x04, 0x40, 0x00, 0x00, 0x00,
    ];

    #[test]
    fn test_decode_association_response() {
        let apdu = Apdu::from_bytes(&ASSOCIATION_RESPONSE).unwrap();
        let Apdu::Aare(aare) = &apdu else {
            panic!("expected AARE, got {apdu:?}");
        };
        assert_eq!(aare.result, AssociateResult::AcceptedUnknownConfig);
        let info = aare.selected_data_proto.phd_info().unwrap();
        assert_eq!(info.protocol_version, PROTOCOL_VERSION1);
        assert_eq!(info.encoding_rules, ENCODING_MDER);
        assert_eq!(info.system_type, SYS_TYPE_MANAGER);
        assert_eq!(
            info.system_id,
            vec![0x88, 0x77, 0x66, 0x55, 0x44, 0x33, 0x22, 0x11]
        );
        assert_eq!(apdu.to_bytes().unwrap(), ASSOCIATION_RESPONSE.to_vec());
    }

    #[test]
    fn test_decode_configuration_response() {
        let apdu = Apdu::from_bytes(&CONFIGURATION_RESPONSE).unwrap();
        let Apdu::Prst(prst) = &apdu else {
            panic!("expected PRST, got {apdu:?}");
        };
        assert!(matches!(prst, PrstApdu::Encoded(_)));
        assert_eq!(prst.invoke_id(), Some(2));

        let data = prst.data_apdu().unwrap();
        let DataMessage::RorsConfirmedEventReport(result) = &data.message else {
            panic!("unexpected message {:?}", data.message);
        };
        assert_eq!(result.event_type, 3356);
        let rsp = ConfigReportRsp::from_bytes(&result.event_reply_info).unwrap();
        assert_eq!(rsp.config_report_id, 0x4000);
        assert_eq!(rsp.config_result, ConfigResult::AcceptedConfig);

        // Decoded and re-built frames compare equal and encode identically
        let rebuilt = Apdu::prst(data.into_owned());
        assert_eq!(rebuilt, apdu);
        assert_eq!(rebuilt.to_bytes().unwrap(), CONFIGURATION_RESPONSE.to_vec());
    }

    #[test]
    fn test_release_and_abort() {
        let rlre = Apdu::Rlre(RlreApdu { reason: 0 });
        assert_eq!(rlre.to_bytes().unwrap(), vec![0xE5, 0x00, 0x00, 0x02, 0x00, 0x00]);

        let abrt = Apdu::Abrt(AbrtApdu {
            reason: AbortReason::ResponseTimeout,
        });
        let bytes = abrt.to_bytes().unwrap();
        assert_eq!(bytes, vec![0xE6, 0x00, 0x00, 0x02, 0x00, 0x02]);
        assert_eq!(Apdu::from_bytes(&bytes).unwrap(), abrt);
    }

    #[test]
    fn test_unknown_apdu_choice() {
        let err = Apdu::from_bytes(&[0xE8, 0x00, 0x00, 0x00]).unwrap_err();
        assert!(matches!(
            err,
            PhdError::UnknownChoice { context: "APDU", choice: 0xE800 }
        ));
    }

    #[test]
    fn test_truncated_apdu() {
        let err = Apdu::from_bytes(&ASSOCIATION_RESPONSE[..20]).unwrap_err();
        assert!(matches!(err, PhdError::InsufficientData { .. }));
    }

    #[test]
    fn test_length_mismatch_is_invalid() {
        // RLRQ declaring 4 bytes of payload but carrying a 2-byte reason
        let err = Apdu::from_bytes(&[0xE4, 0x00, 0x00, 0x04, 0x00, 0x00, 0x00, 0x00]).unwrap_err();
        assert!(matches!(err, PhdError::InvalidData(_)));
    }

    #[test]
    fn test_malformed_data_apdu_is_deferred() {
        // Well-formed PRST frame wrapping an unknown message choice
        let bytes = [
            0xE7, 0x00, 0x00, 0x08, 0x00, 0x06, 0x00, 0x01, 0x09, 0x99, 0x00, 0x00,
        ];
        let apdu = Apdu::from_bytes(&bytes).unwrap();
        let Apdu::Prst(prst) = apdu else {
            panic!("expected PRST");
        };
        let err = prst.data_apdu().unwrap_err();
        assert!(matches!(err, PhdError::UnknownChoice { choice: 0x0999, .. }));
    }

    #[test]
    fn test_set_invoke_id_on_encoded() {
        let Apdu::Prst(mut prst) = Apdu::from_bytes(&CONFIGURATION_RESPONSE).unwrap() else {
            panic!("expected PRST");
        };
        prst.set_invoke_id(0x0007).unwrap();
        assert_eq!(prst.invoke_id(), Some(7));
        assert_eq!(prst.data_apdu().unwrap().invoke_id, 7);
    }

    #[test]
    fn test_aarq_data_proto_list_round_trip() {
        let empty = Apdu::Aarq(AarqApdu {
            assoc_version: 0x8000_0000,
            data_proto_list: vec![],
        });
        let bytes = empty.to_bytes().unwrap();
        assert_eq!(
            bytes,
            vec![0xE2, 0x00, 0x00, 0x08, 0x80, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00]
        );
        assert_eq!(Apdu::from_bytes(&bytes).unwrap(), empty);

        let aarq = AarqApdu {
            assoc_version: 0x8000_0000,
            data_proto_list: vec![
                DataProto {
                    data_proto_id: 0xFFFF,
                    data_proto_info: vec![],
                },
                DataProto {
                    data_proto_id: DATA_PROTO_ID_20601,
                    data_proto_info: vec![0x01, 0x02],
                },
            ],
        };
        let bytes = Apdu::Aarq(aarq.clone()).to_bytes().unwrap();
        assert_eq!(&bytes[8..12], &[0x00, 0x02, 0x00, 0x0A]);
        assert_eq!(&bytes[12..16], &[0xFF, 0xFF, 0x00, 0x00]);
        let Apdu::Aarq(decoded) = Apdu::from_bytes(&bytes).unwrap() else {
            panic!("expected AARQ");
        };
        assert_eq!(decoded.phd_data_proto(), aarq.data_proto_list.get(1));
        assert_eq!(decoded, aarq);
    }

    #[test]
    fn test_every_message_round_trips() {
        let messages = vec![
            DataMessage::RoivEventReport(EventReportArgumentSimple::default()),
            DataMessage::RoivConfirmedEventReport(EventReportArgumentSimple {
                obj_handle: 0,
                event_time: 0xFFFF_FFFF,
                event_type: 3356,
                event_info: vec![1, 2, 3],
            }),
            DataMessage::RoivGet(GetArgumentSimple {
                obj_handle: 0,
                attribute_id_list: vec![2436, 2628],
            }),
            DataMessage::RoivSet(SetArgumentSimple::default()),
            DataMessage::RoivConfirmedSet(SetArgumentSimple {
                obj_handle: 1,
                modification_list: vec![AttributeModEntry::replace(Ava::new(1, vec![0]))],
            }),
            DataMessage::RoivAction(ActionArgumentSimple::default()),
            DataMessage::RoivConfirmedAction(ActionArgumentSimple {
                obj_handle: 0,
                action_type: 3095,
                action_info_args: vec![0; 12],
            }),
            DataMessage::RorsConfirmedEventReport(EventReportResultSimple::default()),
            DataMessage::RorsGet(GetResultSimple {
                obj_handle: 0,
                attribute_list: vec![Ava::new(2436, vec![1; 8])],
            }),
            DataMessage::RorsConfirmedSet(SetResultSimple::default()),
            DataMessage::RorsConfirmedAction(ActionResultSimple::default()),
            DataMessage::Roer(ErrorResult::new(1)),
            DataMessage::Rorj(RejectResult { problem: 303 }),
        ];

        for (invoke_id, message) in messages.into_iter().enumerate() {
            let data = DataApdu::new(invoke_id as u16, message);
            let apdu = Apdu::prst(data.clone());
            let bytes = apdu.to_bytes().unwrap();
            // frame length and octet string length agree with the payload
            assert_eq!(u16::from_be_bytes([bytes[2], bytes[3]]) as usize, bytes.len() - 4);
            assert_eq!(u16::from_be_bytes([bytes[4], bytes[5]]) as usize, bytes.len() - 6);
            let Apdu::Prst(decoded) = Apdu::from_bytes(&bytes).unwrap() else {
                panic!("expected PRST");
            };
            assert_eq!(decoded.into_data_apdu().unwrap(), data);
        }
    }
}
