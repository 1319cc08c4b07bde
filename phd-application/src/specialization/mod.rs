//! Device specializations
//!
//! A specialization knows the standard configuration of one device type and
//! how to turn a reading into an event report.

pub mod blood_pressure_monitor;
pub mod glucometer;
pub mod pulse_oximeter;
pub mod weighing_scale;

pub use blood_pressure_monitor::BloodPressureMonitor;
pub use glucometer::Glucometer;
pub use pulse_oximeter::PulseOximeter;
pub use weighing_scale::WeighingScale;

use phd_asn1::{
    AbsoluteTime, AttrValMapEntry, Ava, ConfigObject, DataApdu, DataMessage,
    EventReportArgumentSimple, MderEncode, MderWriter, ObservationScanFixed, ScanReportInfoFixed,
    Type,
};
use phd_core::nomenclature::*;
use phd_core::protocol::{DATA_REQ_ID_AGENT_INITIATED, MDS_HANDLE, RELATIVE_TIME_UNSPECIFIED};
use phd_core::{PhdError, PhdResult};
use std::sync::Arc;

/// One set of measured values, keyed by object handle
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    pub time: AbsoluteTime,
    pub values: Vec<(u16, f64)>,
    /// Scan report number, assigned by the connection when sent
    pub scan_report_no: u16,
}

impl Reading {
    pub fn new(time: AbsoluteTime) -> Self {
        Self {
            time,
            values: Vec::new(),
            scan_report_no: 0,
        }
    }

    /// Add the value measured by object `obj_handle`
    pub fn with_value(mut self, obj_handle: u16, value: f64) -> Self {
        self.values.push((obj_handle, value));
        self
    }

    pub fn value(&self, obj_handle: u16) -> Option<f64> {
        self.values
            .iter()
            .find(|(handle, _)| *handle == obj_handle)
            .map(|(_, value)| *value)
    }

    /// Every value of `obj_handle`, in the order they were added
    pub fn values_of(&self, obj_handle: u16) -> Vec<f64> {
        self.values
            .iter()
            .filter(|(handle, _)| *handle == obj_handle)
            .map(|(_, value)| *value)
            .collect()
    }

    /// Value of `obj_handle`, or an error naming the missing object
    pub fn require(&self, obj_handle: u16) -> PhdResult<f64> {
        self.value(obj_handle).ok_or_else(|| {
            PhdError::InvalidData(format!("Reading has no value for object {obj_handle}"))
        })
    }
}

/// Configuration and event-report provider of one device type
pub trait Specialization: Send + Sync {
    /// Configuration id announced in the AARQ
    fn dev_config_id(&self) -> u16;

    /// Device specialization code (`MDC_DEV_SPEC_PROFILE_*`)
    fn device_profile(&self) -> u16;

    /// Objects of the configuration, as sent in a configuration report
    fn config_objects(&self) -> Vec<ConfigObject>;

    /// Build the event report carrying `reading`
    ///
    /// The invoke id of the returned APDU is a placeholder; the service
    /// layer assigns the real one.
    fn event_report(&self, reading: &Reading) -> PhdResult<DataApdu>;

    /// Extra attributes of the agent's MDS object
    fn mds_attributes(&self) -> PhdResult<Vec<Ava>> {
        Ok(vec![system_type_spec_list(self.device_profile(), 1)?])
    }
}

/// `MDC_ATTR_SYS_TYPE_SPEC_LIST` with a single profile entry
pub fn system_type_spec_list(profile: u16, version: u16) -> PhdResult<Ava> {
    let mut writer = MderWriter::new();
    writer.write_list(&[(profile, version)], |w, (profile, version)| {
        w.write_u16(*profile)?;
        w.write_u16(*version)
    })?;
    Ok(Ava::new(MDC_ATTR_SYS_TYPE_SPEC_LIST, writer.into_bytes()))
}

/// Numeric metric object of a standard configuration
///
/// `extra` goes between the metric-spec and the unit code.
pub(crate) fn numeric_metric(
    obj_handle: u16,
    code: u16,
    metric_spec: u16,
    extra: Vec<Ava>,
    unit: u16,
    val_map: &[AttrValMapEntry],
) -> PhdResult<ConfigObject> {
    let mut attributes = vec![
        Ava::from_value(MDC_ATTR_ID_TYPE, &Type::new(MDC_PART_SCADA, code))?,
        Ava::from_value(MDC_ATTR_METRIC_SPEC_SMALL, &metric_spec)?,
    ];
    attributes.extend(extra);
    attributes.push(Ava::from_value(MDC_ATTR_UNIT_CODE, &unit)?);
    attributes.push(Ava::from_value(MDC_ATTR_ATTRIBUTE_VAL_MAP, &val_map.to_vec())?);
    Ok(ConfigObject {
        obj_class: MDC_MOC_VMO_METRIC_NU,
        obj_handle,
        attributes,
    })
}

/// Fixed-format observation: encoded value followed by the reading time
pub(crate) fn timestamped_scan(
    obj_handle: u16,
    mut value: MderWriter,
    time: &AbsoluteTime,
) -> PhdResult<ObservationScanFixed> {
    time.encode_to(&mut value)?;
    Ok(ObservationScanFixed {
        obj_handle,
        obs_val_data: value.into_bytes(),
    })
}

/// Agent-initiated fixed scan report sent from the MDS
pub(crate) fn fixed_scan_event(
    scan_report_no: u16,
    obs_scan_fixed: Vec<ObservationScanFixed>,
) -> PhdResult<DataApdu> {
    let scan = ScanReportInfoFixed {
        data_req_id: DATA_REQ_ID_AGENT_INITIATED,
        scan_report_no,
        obs_scan_fixed,
    };
    Ok(DataApdu::new(
        0xFFFF,
        DataMessage::RoivEventReport(EventReportArgumentSimple {
            obj_handle: MDS_HANDLE,
            event_time: RELATIVE_TIME_UNSPECIFIED,
            event_type: MDC_NOTI_SCAN_REPORT_FIXED,
            event_info: scan.to_bytes()?,
        }),
    ))
}

/// Specializations whose configurations are known without a report
pub fn standard_specializations() -> Vec<Arc<dyn Specialization>> {
    vec![
        Arc::new(PulseOximeter::new(pulse_oximeter::CONFIG_ID_0190)),
        Arc::new(PulseOximeter::new(pulse_oximeter::CONFIG_ID_0191)),
        Arc::new(BloodPressureMonitor),
        Arc::new(WeighingScale),
        Arc::new(Glucometer),
    ]
}
