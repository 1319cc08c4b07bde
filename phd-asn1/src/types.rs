//! ISO/IEEE 11073-20601 structure types
//!
//! This module provides the nested structures carried inside APDUs:
//! - Attribute structures (AVA, attribute lists, modification lists)
//! - Association information (data protocols, PHD association information)
//! - Configuration reports and their responses
//! - Scan reports (fixed, variable and multi-person variants)
//! - Time and numeric observation values
//!
//! # Encoding Format
//!
//! Every structure is a plain concatenation of its fields in declaration
//! order. `Any` values and octet strings carry a 16-bit length prefix; lists
//! carry a 16-bit count followed by a 16-bit byte length.

use crate::mder::{MderDecode, MderEncode, MderReader, MderWriter};
use phd_core::protocol::{ConfigResult, DATA_PROTO_ID_20601};
use phd_core::{PhdError, PhdResult};

/// Attribute value assertion
///
/// The value is an `Any`: its encoding depends on the attribute id and is
/// kept as raw bytes here.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Ava {
    pub attribute_id: u16,
    pub attribute_value: Vec<u8>,
}

impl Ava {
    pub fn new(attribute_id: u16, attribute_value: Vec<u8>) -> Self {
        Self {
            attribute_id,
            attribute_value,
        }
    }

    /// Build an AVA whose value is the MDER encoding of `value`
    pub fn from_value<T: MderEncode>(attribute_id: u16, value: &T) -> PhdResult<Self> {
        Ok(Self::new(attribute_id, value.to_bytes()?))
    }

    /// Decode the value as `T`
    pub fn value<T: MderDecode>(&self) -> PhdResult<T> {
        T::from_bytes(&self.attribute_value)
    }
}

impl MderEncode for Ava {
    fn encode_to(&self, writer: &mut MderWriter) -> PhdResult<()> {
        writer.write_u16(self.attribute_id)?;
        writer.write_octet_string(&self.attribute_value)
    }
}

impl MderDecode for Ava {
    fn decode_from(reader: &mut MderReader<'_>) -> PhdResult<Self> {
        Ok(Self {
            attribute_id: reader.read_u16()?,
            attribute_value: reader.read_octet_string()?,
        })
    }
}

/// Find an attribute by id in an attribute list
pub fn find_attribute(attributes: &[Ava], attribute_id: u16) -> Option<&Ava> {
    attributes.iter().find(|ava| ava.attribute_id == attribute_id)
}

/// Replace or append an attribute in an attribute list
pub fn upsert_attribute(attributes: &mut Vec<Ava>, ava: Ava) {
    match attributes
        .iter_mut()
        .find(|existing| existing.attribute_id == ava.attribute_id)
    {
        Some(existing) => *existing = ava,
        None => attributes.push(ava),
    }
}

/// Modify operators of a SET
pub mod modify_operator {
    pub const REPLACE: u16 = 0;
    pub const ADD_VALUES: u16 = 1;
    pub const REMOVE_VALUES: u16 = 2;
    pub const SET_TO_DEFAULT: u16 = 3;
}

/// One entry of a SET modification list
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AttributeModEntry {
    pub modify_operator: u16,
    pub attribute: Ava,
}

impl AttributeModEntry {
    /// Replace the value of an attribute
    pub fn replace(attribute: Ava) -> Self {
        Self {
            modify_operator: modify_operator::REPLACE,
            attribute,
        }
    }
}

impl MderEncode for AttributeModEntry {
    fn encode_to(&self, writer: &mut MderWriter) -> PhdResult<()> {
        writer.write_u16(self.modify_operator)?;
        self.attribute.encode_to(writer)
    }
}

impl MderDecode for AttributeModEntry {
    fn decode_from(reader: &mut MderReader<'_>) -> PhdResult<Self> {
        Ok(Self {
            modify_operator: reader.read_u16()?,
            attribute: Ava::decode_from(reader)?,
        })
    }
}

/// Data protocol entry of an AARQ/AARE
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DataProto {
    pub data_proto_id: u16,
    pub data_proto_info: Vec<u8>,
}

impl DataProto {
    /// Wrap 20601 association information into a data protocol entry
    pub fn phd(info: &PhdAssociationInformation) -> PhdResult<Self> {
        Ok(Self {
            data_proto_id: DATA_PROTO_ID_20601,
            data_proto_info: info.to_bytes()?,
        })
    }

    /// Decode the info field as 20601 association information
    pub fn phd_info(&self) -> PhdResult<PhdAssociationInformation> {
        PhdAssociationInformation::from_bytes(&self.data_proto_info)
    }
}

impl MderEncode for DataProto {
    fn encode_to(&self, writer: &mut MderWriter) -> PhdResult<()> {
        writer.write_u16(self.data_proto_id)?;
        writer.write_octet_string(&self.data_proto_info)
    }
}

impl MderDecode for DataProto {
    fn decode_from(reader: &mut MderReader<'_>) -> PhdResult<Self> {
        Ok(Self {
            data_proto_id: reader.read_u16()?,
            data_proto_info: reader.read_octet_string()?,
        })
    }
}

/// Data request mode capabilities
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DataReqModeCapab {
    pub data_req_mode_flags: u16,
    pub data_req_init_agent_count: u8,
    pub data_req_init_manager_count: u8,
}

impl MderEncode for DataReqModeCapab {
    fn encode_to(&self, writer: &mut MderWriter) -> PhdResult<()> {
        writer.write_u16(self.data_req_mode_flags)?;
        writer.write_u8(self.data_req_init_agent_count)?;
        writer.write_u8(self.data_req_init_manager_count)
    }
}

impl MderDecode for DataReqModeCapab {
    fn decode_from(reader: &mut MderReader<'_>) -> PhdResult<Self> {
        Ok(Self {
            data_req_mode_flags: reader.read_u16()?,
            data_req_init_agent_count: reader.read_u8()?,
            data_req_init_manager_count: reader.read_u8()?,
        })
    }
}

/// 20601 association information carried in a data protocol entry
///
/// # Structure
///
/// | Field | Size |
/// |---|---|
/// | protocol version | 4 |
/// | encoding rules | 2 |
/// | nomenclature version | 4 |
/// | functional units | 4 |
/// | system type | 4 |
/// | system id | 2 + n |
/// | device configuration id | 2 |
/// | data request mode capabilities | 4 |
/// | option list | 4 + attributes |
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PhdAssociationInformation {
    pub protocol_version: u32,
    pub encoding_rules: u16,
    pub nomenclature_version: u32,
    pub functional_units: u32,
    pub system_type: u32,
    pub system_id: Vec<u8>,
    pub dev_config_id: u16,
    pub data_req_mode_capab: DataReqModeCapab,
    pub option_list: Vec<Ava>,
}

impl MderEncode for PhdAssociationInformation {
    fn encode_to(&self, writer: &mut MderWriter) -> PhdResult<()> {
        writer.write_u32(self.protocol_version)?;
        writer.write_u16(self.encoding_rules)?;
        writer.write_u32(self.nomenclature_version)?;
        writer.write_u32(self.functional_units)?;
        writer.write_u32(self.system_type)?;
        writer.write_octet_string(&self.system_id)?;
        writer.write_u16(self.dev_config_id)?;
        self.data_req_mode_capab.encode_to(writer)?;
        self.option_list.encode_to(writer)
    }
}

impl MderDecode for PhdAssociationInformation {
    fn decode_from(reader: &mut MderReader<'_>) -> PhdResult<Self> {
        Ok(Self {
            protocol_version: reader.read_u32()?,
            encoding_rules: reader.read_u16()?,
            nomenclature_version: reader.read_u32()?,
            functional_units: reader.read_u32()?,
            system_type: reader.read_u32()?,
            system_id: reader.read_octet_string()?,
            dev_config_id: reader.read_u16()?,
            data_req_mode_capab: DataReqModeCapab::decode_from(reader)?,
            option_list: Vec::decode_from(reader)?,
        })
    }
}

/// TYPE: a nomenclature code qualified by its partition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Type {
    pub partition: u16,
    pub code: u16,
}

impl Type {
    pub const fn new(partition: u16, code: u16) -> Self {
        Self { partition, code }
    }
}

impl MderEncode for Type {
    fn encode_to(&self, writer: &mut MderWriter) -> PhdResult<()> {
        writer.write_u16(self.partition)?;
        writer.write_u16(self.code)
    }
}

impl MderDecode for Type {
    fn decode_from(reader: &mut MderReader<'_>) -> PhdResult<Self> {
        Ok(Self {
            partition: reader.read_u16()?,
            code: reader.read_u16()?,
        })
    }
}

/// Numeric observation with its own metric id, state and unit
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct NuObsValue {
    pub metric_id: u16,
    pub state: u16,
    pub unit_code: u16,
    pub value: f64,
}

impl MderEncode for NuObsValue {
    fn encode_to(&self, writer: &mut MderWriter) -> PhdResult<()> {
        writer.write_u16(self.metric_id)?;
        writer.write_u16(self.state)?;
        writer.write_u16(self.unit_code)?;
        writer.write_float(self.value)
    }
}

impl MderDecode for NuObsValue {
    fn decode_from(reader: &mut MderReader<'_>) -> PhdResult<Self> {
        Ok(Self {
            metric_id: reader.read_u16()?,
            state: reader.read_u16()?,
            unit_code: reader.read_u16()?,
            value: reader.read_float()?,
        })
    }
}

/// One entry of an attribute-value map: which attribute, how many bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AttrValMapEntry {
    pub attribute_id: u16,
    pub attribute_len: u16,
}

impl AttrValMapEntry {
    pub const fn new(attribute_id: u16, attribute_len: u16) -> Self {
        Self {
            attribute_id,
            attribute_len,
        }
    }
}

impl MderEncode for AttrValMapEntry {
    fn encode_to(&self, writer: &mut MderWriter) -> PhdResult<()> {
        writer.write_u16(self.attribute_id)?;
        writer.write_u16(self.attribute_len)
    }
}

impl MderDecode for AttrValMapEntry {
    fn decode_from(reader: &mut MderReader<'_>) -> PhdResult<Self> {
        Ok(Self {
            attribute_id: reader.read_u16()?,
            attribute_len: reader.read_u16()?,
        })
    }
}

/// Object description inside a configuration report
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConfigObject {
    pub obj_class: u16,
    pub obj_handle: u16,
    pub attributes: Vec<Ava>,
}

impl MderEncode for ConfigObject {
    fn encode_to(&self, writer: &mut MderWriter) -> PhdResult<()> {
        writer.write_u16(self.obj_class)?;
        writer.write_u16(self.obj_handle)?;
        self.attributes.encode_to(writer)
    }
}

impl MderDecode for ConfigObject {
    fn decode_from(reader: &mut MderReader<'_>) -> PhdResult<Self> {
        Ok(Self {
            obj_class: reader.read_u16()?,
            obj_handle: reader.read_u16()?,
            attributes: Vec::decode_from(reader)?,
        })
    }
}

/// Configuration report sent by the agent with MDC_NOTI_CONFIG
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConfigReport {
    pub config_report_id: u16,
    pub config_obj_list: Vec<ConfigObject>,
}

impl MderEncode for ConfigReport {
    fn encode_to(&self, writer: &mut MderWriter) -> PhdResult<()> {
        writer.write_u16(self.config_report_id)?;
        self.config_obj_list.encode_to(writer)
    }
}

impl MderDecode for ConfigReport {
    fn decode_from(reader: &mut MderReader<'_>) -> PhdResult<Self> {
        Ok(Self {
            config_report_id: reader.read_u16()?,
            config_obj_list: Vec::decode_from(reader)?,
        })
    }
}

/// Manager's answer to a configuration report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfigReportRsp {
    pub config_report_id: u16,
    pub config_result: ConfigResult,
}

impl MderEncode for ConfigReportRsp {
    fn encode_to(&self, writer: &mut MderWriter) -> PhdResult<()> {
        writer.write_u16(self.config_report_id)?;
        writer.write_u16(self.config_result.as_u16())
    }
}

impl MderDecode for ConfigReportRsp {
    fn decode_from(reader: &mut MderReader<'_>) -> PhdResult<Self> {
        Ok(Self {
            config_report_id: reader.read_u16()?,
            config_result: ConfigResult::from_u16(reader.read_u16()?),
        })
    }
}

/// Observation of one object in a variable-format scan report
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ObservationScan {
    pub obj_handle: u16,
    pub attributes: Vec<Ava>,
}

impl MderEncode for ObservationScan {
    fn encode_to(&self, writer: &mut MderWriter) -> PhdResult<()> {
        writer.write_u16(self.obj_handle)?;
        self.attributes.encode_to(writer)
    }
}

impl MderDecode for ObservationScan {
    fn decode_from(reader: &mut MderReader<'_>) -> PhdResult<Self> {
        Ok(Self {
            obj_handle: reader.read_u16()?,
            attributes: Vec::decode_from(reader)?,
        })
    }
}

/// Observation of one object in a fixed-format scan report
///
/// `obs_val_data` is laid out according to the object's attribute-value map.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ObservationScanFixed {
    pub obj_handle: u16,
    pub obs_val_data: Vec<u8>,
}

impl MderEncode for ObservationScanFixed {
    fn encode_to(&self, writer: &mut MderWriter) -> PhdResult<()> {
        writer.write_u16(self.obj_handle)?;
        writer.write_octet_string(&self.obs_val_data)
    }
}

impl MderDecode for ObservationScanFixed {
    fn decode_from(reader: &mut MderReader<'_>) -> PhdResult<Self> {
        Ok(Self {
            obj_handle: reader.read_u16()?,
            obs_val_data: reader.read_octet_string()?,
        })
    }
}

/// Fixed-format scan report (MDC_NOTI_SCAN_REPORT_FIXED)
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ScanReportInfoFixed {
    pub data_req_id: u16,
    pub scan_report_no: u16,
    pub obs_scan_fixed: Vec<ObservationScanFixed>,
}

impl MderEncode for ScanReportInfoFixed {
    fn encode_to(&self, writer: &mut MderWriter) -> PhdResult<()> {
        writer.write_u16(self.data_req_id)?;
        writer.write_u16(self.scan_report_no)?;
        self.obs_scan_fixed.encode_to(writer)
    }
}

impl MderDecode for ScanReportInfoFixed {
    fn decode_from(reader: &mut MderReader<'_>) -> PhdResult<Self> {
        Ok(Self {
            data_req_id: reader.read_u16()?,
            scan_report_no: reader.read_u16()?,
            obs_scan_fixed: Vec::decode_from(reader)?,
        })
    }
}

/// Variable-format scan report (MDC_NOTI_SCAN_REPORT_VAR)
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ScanReportInfoVar {
    pub data_req_id: u16,
    pub scan_report_no: u16,
    pub obs_scan_var: Vec<ObservationScan>,
}

impl MderEncode for ScanReportInfoVar {
    fn encode_to(&self, writer: &mut MderWriter) -> PhdResult<()> {
        writer.write_u16(self.data_req_id)?;
        writer.write_u16(self.scan_report_no)?;
        self.obs_scan_var.encode_to(writer)
    }
}

impl MderDecode for ScanReportInfoVar {
    fn decode_from(reader: &mut MderReader<'_>) -> PhdResult<Self> {
        Ok(Self {
            data_req_id: reader.read_u16()?,
            scan_report_no: reader.read_u16()?,
            obs_scan_var: Vec::decode_from(reader)?,
        })
    }
}

/// Per-person block of a multi-person fixed scan report
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ScanReportPerFixed {
    pub person_id: u16,
    pub obs_scan_fixed: Vec<ObservationScanFixed>,
}

impl MderEncode for ScanReportPerFixed {
    fn encode_to(&self, writer: &mut MderWriter) -> PhdResult<()> {
        writer.write_u16(self.person_id)?;
        self.obs_scan_fixed.encode_to(writer)
    }
}

impl MderDecode for ScanReportPerFixed {
    fn decode_from(reader: &mut MderReader<'_>) -> PhdResult<Self> {
        Ok(Self {
            person_id: reader.read_u16()?,
            obs_scan_fixed: Vec::decode_from(reader)?,
        })
    }
}

/// Multi-person fixed-format scan report (MDC_NOTI_SCAN_REPORT_MP_FIXED)
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ScanReportInfoMpFixed {
    pub data_req_id: u16,
    pub scan_report_no: u16,
    pub scan_per_fixed: Vec<ScanReportPerFixed>,
}

impl MderEncode for ScanReportInfoMpFixed {
    fn encode_to(&self, writer: &mut MderWriter) -> PhdResult<()> {
        writer.write_u16(self.data_req_id)?;
        writer.write_u16(self.scan_report_no)?;
        self.scan_per_fixed.encode_to(writer)
    }
}

impl MderDecode for ScanReportInfoMpFixed {
    fn decode_from(reader: &mut MderReader<'_>) -> PhdResult<Self> {
        Ok(Self {
            data_req_id: reader.read_u16()?,
            scan_report_no: reader.read_u16()?,
            scan_per_fixed: Vec::decode_from(reader)?,
        })
    }
}

/// Per-person block of a multi-person variable scan report
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ScanReportPerVar {
    pub person_id: u16,
    pub obs_scan_var: Vec<ObservationScan>,
}

impl MderEncode for ScanReportPerVar {
    fn encode_to(&self, writer: &mut MderWriter) -> PhdResult<()> {
        writer.write_u16(self.person_id)?;
        self.obs_scan_var.encode_to(writer)
    }
}

impl MderDecode for ScanReportPerVar {
    fn decode_from(reader: &mut MderReader<'_>) -> PhdResult<Self> {
        Ok(Self {
            person_id: reader.read_u16()?,
            obs_scan_var: Vec::decode_from(reader)?,
        })
    }
}

/// Multi-person variable-format scan report (MDC_NOTI_SCAN_REPORT_MP_VAR)
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ScanReportInfoMpVar {
    pub data_req_id: u16,
    pub scan_report_no: u16,
    pub scan_per_var: Vec<ScanReportPerVar>,
}

impl MderEncode for ScanReportInfoMpVar {
    fn encode_to(&self, writer: &mut MderWriter) -> PhdResult<()> {
        writer.write_u16(self.data_req_id)?;
        writer.write_u16(self.scan_report_no)?;
        self.scan_per_var.encode_to(writer)
    }
}

impl MderDecode for ScanReportInfoMpVar {
    fn decode_from(reader: &mut MderReader<'_>) -> PhdResult<Self> {
        Ok(Self {
            data_req_id: reader.read_u16()?,
            scan_report_no: reader.read_u16()?,
            scan_per_var: Vec::decode_from(reader)?,
        })
    }
}

/// Absolute time, encoded as eight BCD bytes
///
/// Fields hold decimal values (`year` is the two-digit year within
/// `century`). Encoding fails for any field above 99.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct AbsoluteTime {
    pub century: u8,
    pub year: u8,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
    pub sec_fractions: u8,
}

/// Encoded size of an [`AbsoluteTime`]
pub const ABSOLUTE_TIME_LENGTH: u16 = 8;

fn to_bcd(value: u8) -> PhdResult<u8> {
    if value > 99 {
        return Err(PhdError::InvalidData(format!(
            "Value {value} does not fit in two BCD digits"
        )));
    }
    Ok(((value / 10) << 4) | (value % 10))
}

fn from_bcd(byte: u8) -> PhdResult<u8> {
    let (high, low) = (byte >> 4, byte & 0x0F);
    if high > 9 || low > 9 {
        return Err(PhdError::InvalidData(format!("Invalid BCD byte 0x{byte:02X}")));
    }
    Ok(high * 10 + low)
}

impl AbsoluteTime {
    /// Build a time from a four-digit year and the remaining components
    pub fn new(year: u16, month: u8, day: u8, hour: u8, minute: u8, second: u8) -> Self {
        Self {
            century: (year / 100) as u8,
            year: (year % 100) as u8,
            month,
            day,
            hour,
            minute,
            second,
            sec_fractions: 0,
        }
    }

    /// Convert seconds since the Unix epoch (UTC) to an absolute time
    pub fn from_unix_seconds(seconds: u64) -> Self {
        let days = (seconds / 86_400) as i64;
        let secs_of_day = seconds % 86_400;

        // Civil-from-days over 400-year eras
        let z = days + 719_468;
        let era = z.div_euclid(146_097);
        let doe = z - era * 146_097;
        let yoe = (doe - doe / 1_460 + doe / 36_524 - doe / 146_096) / 365;
        let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
        let mp = (5 * doy + 2) / 153;
        let day = (doy - (153 * mp + 2) / 5 + 1) as u8;
        let month = (if mp < 10 { mp + 3 } else { mp - 9 }) as u8;
        let year = (yoe + era * 400 + i64::from(month <= 2)) as u16;

        Self::new(
            year,
            month,
            day,
            (secs_of_day / 3_600) as u8,
            ((secs_of_day / 60) % 60) as u8,
            (secs_of_day % 60) as u8,
        )
    }

    /// Current wall-clock time
    pub fn now() -> Self {
        let seconds = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        Self::from_unix_seconds(seconds)
    }

    /// Four-digit year
    pub fn full_year(&self) -> u16 {
        u16::from(self.century) * 100 + u16::from(self.year)
    }
}

impl MderEncode for AbsoluteTime {
    fn encode_to(&self, writer: &mut MderWriter) -> PhdResult<()> {
        for field in [
            self.century,
            self.year,
            self.month,
            self.day,
            self.hour,
            self.minute,
            self.second,
            self.sec_fractions,
        ] {
            writer.write_u8(to_bcd(field)?)?;
        }
        Ok(())
    }
}

impl MderDecode for AbsoluteTime {
    fn decode_from(reader: &mut MderReader<'_>) -> PhdResult<Self> {
        let raw: [u8; 8] = reader.read_array()?;
        Ok(Self {
            century: from_bcd(raw[0])?,
            year: from_bcd(raw[1])?,
            month: from_bcd(raw[2])?,
            day: from_bcd(raw[3])?,
            hour: from_bcd(raw[4])?,
            minute: from_bcd(raw[5])?,
            second: from_bcd(raw[6])?,
            sec_fractions: from_bcd(raw[7])?,
        })
    }
}

/// Argument of the MDC_ACT_SET_TIME action
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SetTimeInvoke {
    pub date_time: AbsoluteTime,
    pub accuracy: f64,
}

impl MderEncode for SetTimeInvoke {
    fn encode_to(&self, writer: &mut MderWriter) -> PhdResult<()> {
        self.date_time.encode_to(writer)?;
        writer.write_float(self.accuracy)
    }
}

impl MderDecode for SetTimeInvoke {
    fn decode_from(reader: &mut MderReader<'_>) -> PhdResult<Self> {
        Ok(Self {
            date_time: AbsoluteTime::decode_from(reader)?,
            accuracy: reader.read_float()?,
        })
    }
}

/// Event report invoke (unconfirmed and confirmed)
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EventReportArgumentSimple {
    pub obj_handle: u16,
    pub event_time: u32,
    pub event_type: u16,
    pub event_info: Vec<u8>,
}

impl MderEncode for EventReportArgumentSimple {
    fn encode_to(&self, writer: &mut MderWriter) -> PhdResult<()> {
        writer.write_u16(self.obj_handle)?;
        writer.write_u32(self.event_time)?;
        writer.write_u16(self.event_type)?;
        writer.write_octet_string(&self.event_info)
    }
}

impl MderDecode for EventReportArgumentSimple {
    fn decode_from(reader: &mut MderReader<'_>) -> PhdResult<Self> {
        Ok(Self {
            obj_handle: reader.read_u16()?,
            event_time: reader.read_u32()?,
            event_type: reader.read_u16()?,
            event_info: reader.read_octet_string()?,
        })
    }
}

/// GET invoke
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GetArgumentSimple {
    pub obj_handle: u16,
    pub attribute_id_list: Vec<u16>,
}

impl MderEncode for GetArgumentSimple {
    fn encode_to(&self, writer: &mut MderWriter) -> PhdResult<()> {
        writer.write_u16(self.obj_handle)?;
        self.attribute_id_list.encode_to(writer)
    }
}

impl MderDecode for GetArgumentSimple {
    fn decode_from(reader: &mut MderReader<'_>) -> PhdResult<Self> {
        Ok(Self {
            obj_handle: reader.read_u16()?,
            attribute_id_list: Vec::decode_from(reader)?,
        })
    }
}

/// SET invoke (unconfirmed and confirmed)
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SetArgumentSimple {
    pub obj_handle: u16,
    pub modification_list: Vec<AttributeModEntry>,
}

impl MderEncode for SetArgumentSimple {
    fn encode_to(&self, writer: &mut MderWriter) -> PhdResult<()> {
        writer.write_u16(self.obj_handle)?;
        self.modification_list.encode_to(writer)
    }
}

impl MderDecode for SetArgumentSimple {
    fn decode_from(reader: &mut MderReader<'_>) -> PhdResult<Self> {
        Ok(Self {
            obj_handle: reader.read_u16()?,
            modification_list: Vec::decode_from(reader)?,
        })
    }
}

/// ACTION invoke (unconfirmed and confirmed)
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ActionArgumentSimple {
    pub obj_handle: u16,
    pub action_type: u16,
    pub action_info_args: Vec<u8>,
}

impl MderEncode for ActionArgumentSimple {
    fn encode_to(&self, writer: &mut MderWriter) -> PhdResult<()> {
        writer.write_u16(self.obj_handle)?;
        writer.write_u16(self.action_type)?;
        writer.write_octet_string(&self.action_info_args)
    }
}

impl MderDecode for ActionArgumentSimple {
    fn decode_from(reader: &mut MderReader<'_>) -> PhdResult<Self> {
        Ok(Self {
            obj_handle: reader.read_u16()?,
            action_type: reader.read_u16()?,
            action_info_args: reader.read_octet_string()?,
        })
    }
}

/// Confirmed event report result
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EventReportResultSimple {
    pub obj_handle: u16,
    pub current_time: u32,
    pub event_type: u16,
    pub event_reply_info: Vec<u8>,
}

impl MderEncode for EventReportResultSimple {
    fn encode_to(&self, writer: &mut MderWriter) -> PhdResult<()> {
        writer.write_u16(self.obj_handle)?;
        writer.write_u32(self.current_time)?;
        writer.write_u16(self.event_type)?;
        writer.write_octet_string(&self.event_reply_info)
    }
}

impl MderDecode for EventReportResultSimple {
    fn decode_from(reader: &mut MderReader<'_>) -> PhdResult<Self> {
        Ok(Self {
            obj_handle: reader.read_u16()?,
            current_time: reader.read_u32()?,
            event_type: reader.read_u16()?,
            event_reply_info: reader.read_octet_string()?,
        })
    }
}

/// GET result
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GetResultSimple {
    pub obj_handle: u16,
    pub attribute_list: Vec<Ava>,
}

impl MderEncode for GetResultSimple {
    fn encode_to(&self, writer: &mut MderWriter) -> PhdResult<()> {
        writer.write_u16(self.obj_handle)?;
        self.attribute_list.encode_to(writer)
    }
}

impl MderDecode for GetResultSimple {
    fn decode_from(reader: &mut MderReader<'_>) -> PhdResult<Self> {
        Ok(Self {
            obj_handle: reader.read_u16()?,
            attribute_list: Vec::decode_from(reader)?,
        })
    }
}

/// Confirmed SET result; same layout as a GET result
pub type SetResultSimple = GetResultSimple;

/// Confirmed ACTION result
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ActionResultSimple {
    pub obj_handle: u16,
    pub action_type: u16,
    pub action_info_args: Vec<u8>,
}

impl MderEncode for ActionResultSimple {
    fn encode_to(&self, writer: &mut MderWriter) -> PhdResult<()> {
        writer.write_u16(self.obj_handle)?;
        writer.write_u16(self.action_type)?;
        writer.write_octet_string(&self.action_info_args)
    }
}

impl MderDecode for ActionResultSimple {
    fn decode_from(reader: &mut MderReader<'_>) -> PhdResult<Self> {
        Ok(Self {
            obj_handle: reader.read_u16()?,
            action_type: reader.read_u16()?,
            action_info_args: reader.read_octet_string()?,
        })
    }
}

/// Remote operation error (ROER)
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ErrorResult {
    pub error_value: u16,
    pub parameter: Vec<u8>,
}

impl ErrorResult {
    pub fn new(error_value: u16) -> Self {
        Self {
            error_value,
            parameter: Vec::new(),
        }
    }
}

impl MderEncode for ErrorResult {
    fn encode_to(&self, writer: &mut MderWriter) -> PhdResult<()> {
        writer.write_u16(self.error_value)?;
        writer.write_octet_string(&self.parameter)
    }
}

impl MderDecode for ErrorResult {
    fn decode_from(reader: &mut MderReader<'_>) -> PhdResult<Self> {
        Ok(Self {
            error_value: reader.read_u16()?,
            parameter: reader.read_octet_string()?,
        })
    }
}

/// Remote operation reject (RORJ)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RejectResult {
    pub problem: u16,
}

impl MderEncode for RejectResult {
    fn encode_to(&self, writer: &mut MderWriter) -> PhdResult<()> {
        writer.write_u16(self.problem)
    }
}

impl MderDecode for RejectResult {
    fn decode_from(reader: &mut MderReader<'_>) -> PhdResult<Self> {
        Ok(Self {
            problem: reader.read_u16()?,
        })
    }
}
