//! Decoding of measurement event reports
//!
//! Fixed-format scans are sliced with the attribute-value map of their
//! object in the configuration snapshot. Variable-format scans carry their
//! attributes inline.

use crate::mds::{Mds, MdsObject};
use phd_asn1::{
    AbsoluteTime, Ava, EventReportArgumentSimple, MderDecode, MderReader, NuObsValue,
    ObservationScan, ObservationScanFixed, ScanReportInfoFixed, ScanReportInfoMpFixed,
    ScanReportInfoMpVar, ScanReportInfoVar, Type, find_attribute,
};
use phd_core::nomenclature::*;
use phd_core::{PhdError, PhdResult};

/// Decoded observed value
#[derive(Debug, Clone, PartialEq)]
pub enum ObservedValue {
    /// `MDC_ATTR_NU_VAL_OBS_BASIC` (SFLOAT) or `MDC_ATTR_NU_VAL_OBS_SIMP` (FLOAT)
    Numeric(f64),
    /// Compound basic or simple values
    Compound(Vec<f64>),
    /// `MDC_ATTR_NU_VAL_OBS` with its own metric id, state and unit
    Nu(NuObsValue),
    /// `MDC_ATTR_ENUM_OBS_VAL_SIMP_OID`
    Enumerated(u16),
}

impl ObservedValue {
    /// Scalar value, if there is one
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Numeric(value) => Some(*value),
            Self::Nu(nu) => Some(nu.value),
            Self::Compound(_) | Self::Enumerated(_) => None,
        }
    }
}

/// One object's observation inside a scan report
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub obj_handle: u16,
    /// Person the observation belongs to (multi-person reports)
    pub person_id: Option<u16>,
    pub metric: Option<Type>,
    pub unit_code: Option<u16>,
    pub value: Option<ObservedValue>,
    pub timestamp: Option<AbsoluteTime>,
    /// Every attribute of the observation as received
    pub attributes: Vec<Ava>,
}

/// Scan report as carried on the wire
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanReport {
    Fixed(ScanReportInfoFixed),
    Var(ScanReportInfoVar),
    MpFixed(ScanReportInfoMpFixed),
    MpVar(ScanReportInfoMpVar),
}

impl ScanReport {
    pub fn scan_report_no(&self) -> u16 {
        match self {
            Self::Fixed(scan) => scan.scan_report_no,
            Self::Var(scan) => scan.scan_report_no,
            Self::MpFixed(scan) => scan.scan_report_no,
            Self::MpVar(scan) => scan.scan_report_no,
        }
    }
}

/// Measurement event report decoded against the configuration snapshot
#[derive(Debug, Clone, PartialEq)]
pub struct DataReport {
    pub event_time: u32,
    pub event_type: u16,
    pub scan: ScanReport,
    pub observations: Vec<Observation>,
}

impl DataReport {
    /// First observation of `obj_handle`
    pub fn observation(&self, obj_handle: u16) -> Option<&Observation> {
        self.observations
            .iter()
            .find(|observation| observation.obj_handle == obj_handle)
    }
}

/// Check whether an event type carries a scan report
pub const fn is_scan_report(event_type: u16) -> bool {
    matches!(
        event_type,
        MDC_NOTI_SCAN_REPORT_FIXED
            | MDC_NOTI_SCAN_REPORT_VAR
            | MDC_NOTI_SCAN_REPORT_MP_FIXED
            | MDC_NOTI_SCAN_REPORT_MP_VAR
    )
}

/// Decode a measurement event report
///
/// # Arguments
///
/// * `mds` - Configuration snapshot of the connection
/// * `event` - Event report argument; its type selects the scan format
///
/// # Returns
///
/// The decoded report, or an error if the event type is not a scan report,
/// the scan is malformed or it references unconfigured objects
pub fn decode_event_report(mds: &Mds, event: &EventReportArgumentSimple) -> PhdResult<DataReport> {
    let (scan, observations) = match event.event_type {
        MDC_NOTI_SCAN_REPORT_FIXED => {
            let scan = ScanReportInfoFixed::from_bytes(&event.event_info)?;
            let observations = decode_fixed_scans(mds, &scan.obs_scan_fixed, None)?;
            (ScanReport::Fixed(scan), observations)
        }
        MDC_NOTI_SCAN_REPORT_VAR => {
            let scan = ScanReportInfoVar::from_bytes(&event.event_info)?;
            let observations = decode_var_scans(mds, &scan.obs_scan_var, None);
            (ScanReport::Var(scan), observations)
        }
        MDC_NOTI_SCAN_REPORT_MP_FIXED => {
            let scan = ScanReportInfoMpFixed::from_bytes(&event.event_info)?;
            let mut observations = Vec::new();
            for person in &scan.scan_per_fixed {
                observations.extend(decode_fixed_scans(
                    mds,
                    &person.obs_scan_fixed,
                    Some(person.person_id),
                )?);
            }
            (ScanReport::MpFixed(scan), observations)
        }
        MDC_NOTI_SCAN_REPORT_MP_VAR => {
            let scan = ScanReportInfoMpVar::from_bytes(&event.event_info)?;
            let observations = scan
                .scan_per_var
                .iter()
                .flat_map(|person| decode_var_scans(mds, &person.obs_scan_var, Some(person.person_id)))
                .collect();
            (ScanReport::MpVar(scan), observations)
        }
        other => {
            return Err(PhdError::InvalidData(format!(
                "Event type {other} is not a scan report"
            )));
        }
    };

    Ok(DataReport {
        event_time: event.event_time,
        event_type: event.event_type,
        scan,
        observations,
    })
}

fn decode_fixed_scans(
    mds: &Mds,
    scans: &[ObservationScanFixed],
    person_id: Option<u16>,
) -> PhdResult<Vec<Observation>> {
    scans
        .iter()
        .map(|scan| {
            let object = mds.object(scan.obj_handle).ok_or_else(|| {
                PhdError::InvalidData(format!(
                    "Fixed scan for unconfigured object {}",
                    scan.obj_handle
                ))
            })?;
            let attributes = split_fixed(object, &scan.obs_val_data)?;
            Ok(build_observation(scan.obj_handle, person_id, Some(object), attributes))
        })
        .collect()
}

fn decode_var_scans(
    mds: &Mds,
    scans: &[ObservationScan],
    person_id: Option<u16>,
) -> Vec<Observation> {
    scans
        .iter()
        .map(|scan| {
            build_observation(
                scan.obj_handle,
                person_id,
                mds.object(scan.obj_handle),
                scan.attributes.clone(),
            )
        })
        .collect()
}

/// Cut fixed-format observation data into attributes following the map
fn split_fixed(object: &MdsObject, data: &[u8]) -> PhdResult<Vec<Ava>> {
    let map = object.attribute_value_map();
    if map.is_empty() {
        return Err(PhdError::InvalidData(format!(
            "Object {} has no attribute-value map",
            object.obj_handle
        )));
    }
    let mut reader = MderReader::new(data);
    let mut attributes = Vec::with_capacity(map.len());
    for entry in map {
        let value = reader.read_bytes(usize::from(entry.attribute_len))?;
        attributes.push(Ava::new(entry.attribute_id, value.to_vec()));
    }
    reader.expect_end("fixed observation")?;
    Ok(attributes)
}

fn build_observation(
    obj_handle: u16,
    person_id: Option<u16>,
    object: Option<&MdsObject>,
    attributes: Vec<Ava>,
) -> Observation {
    let metric = find_attribute(&attributes, MDC_ATTR_ID_TYPE)
        .and_then(|ava| ava.value().ok())
        .or_else(|| object.and_then(MdsObject::metric_type));
    let unit_code = find_attribute(&attributes, MDC_ATTR_UNIT_CODE)
        .and_then(|ava| ava.value().ok())
        .or_else(|| object.and_then(MdsObject::unit_code));
    let timestamp = find_attribute(&attributes, MDC_ATTR_TIME_STAMP_ABS)
        .and_then(|ava| ava.value().ok());
    let value = attributes.iter().find_map(|ava| match decode_value(ava) {
        Ok(value) => value,
        Err(e) => {
            log::warn!(
                "Object {}: undecodable attribute {}: {}",
                obj_handle,
                ava.attribute_id,
                e
            );
            None
        }
    });

    Observation {
        obj_handle,
        person_id,
        metric,
        unit_code,
        value,
        timestamp,
        attributes,
    }
}

fn decode_value(ava: &Ava) -> PhdResult<Option<ObservedValue>> {
    let mut reader = MderReader::new(&ava.attribute_value);
    let value = match ava.attribute_id {
        MDC_ATTR_NU_VAL_OBS_BASIC => ObservedValue::Numeric(reader.read_sfloat()?),
        MDC_ATTR_NU_VAL_OBS_SIMP => ObservedValue::Numeric(reader.read_float()?),
        MDC_ATTR_NU_VAL_OBS => ObservedValue::Nu(NuObsValue::decode_from(&mut reader)?),
        MDC_ATTR_NU_CMPD_VAL_OBS_BASIC => {
            ObservedValue::Compound(reader.read_list("compound basic value", |r| r.read_sfloat())?)
        }
        MDC_ATTR_NU_CMPD_VAL_OBS_SIMP => {
            ObservedValue::Compound(reader.read_list("compound simple value", |r| r.read_float())?)
        }
        MDC_ATTR_ENUM_OBS_VAL_SIMP_OID => ObservedValue::Enumerated(reader.read_u16()?),
        _ => return Ok(None),
    };
    reader.expect_end("observed value")?;
    Ok(Some(value))
}
