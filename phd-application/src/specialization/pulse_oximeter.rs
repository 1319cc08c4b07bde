//! Pulse oximeter (ISO/IEEE 11073-10404)

use super::{Reading, Specialization, fixed_scan_event, numeric_metric, timestamped_scan};
use phd_asn1::{AbsoluteTime, AttrValMapEntry, ConfigObject, DataApdu, MderWriter};
use phd_core::nomenclature::*;
use phd_core::PhdResult;

pub const CONFIG_ID_0190: u16 = 0x0190;
pub const CONFIG_ID_0191: u16 = 0x0191;

/// Object handle of the SpO2 metric
pub const HANDLE_SPO2: u16 = 1;
/// Object handle of the pulse rate metric
pub const HANDLE_PULSE_RATE: u16 = 10;

/// avail-stored-data, acc-agent-init, measured
const METRIC_SPEC_SMALL: u16 = 0x4040;

const VAL_MAP: [AttrValMapEntry; 2] = [
    AttrValMapEntry::new(MDC_ATTR_NU_VAL_OBS_BASIC, 2),
    AttrValMapEntry::new(MDC_ATTR_TIME_STAMP_ABS, 8),
];

/// Pulse oximeter with one of the standard configurations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PulseOximeter {
    dev_config_id: u16,
}

impl PulseOximeter {
    pub fn new(dev_config_id: u16) -> Self {
        Self { dev_config_id }
    }

    /// Reading with SpO2 (percent) and pulse rate (beats per minute)
    pub fn reading(spo2: f64, pulse_rate: f64, time: AbsoluteTime) -> Reading {
        Reading::new(time)
            .with_value(HANDLE_SPO2, spo2)
            .with_value(HANDLE_PULSE_RATE, pulse_rate)
    }

    fn try_config_objects() -> PhdResult<Vec<ConfigObject>> {
        Ok(vec![
            numeric_metric(
                HANDLE_SPO2,
                MDC_PULS_OXIM_SAT_O2,
                METRIC_SPEC_SMALL,
                Vec::new(),
                MDC_DIM_PERCENT,
                &VAL_MAP,
            )?,
            numeric_metric(
                HANDLE_PULSE_RATE,
                MDC_PULS_OXIM_PULS_RATE,
                METRIC_SPEC_SMALL,
                Vec::new(),
                MDC_DIM_BEAT_PER_MIN,
                &VAL_MAP,
            )?,
        ])
    }
}

impl Specialization for PulseOximeter {
    fn dev_config_id(&self) -> u16 {
        self.dev_config_id
    }

    fn device_profile(&self) -> u16 {
        MDC_DEV_SPEC_PROFILE_PULS_OXIM
    }

    fn config_objects(&self) -> Vec<ConfigObject> {
        // only fixed-size scalars are encoded, which cannot fail
        Self::try_config_objects().unwrap_or_default()
    }

    fn event_report(&self, reading: &Reading) -> PhdResult<DataApdu> {
        let mut obs_scan_fixed = Vec::with_capacity(2);
        for handle in [HANDLE_SPO2, HANDLE_PULSE_RATE] {
            let mut value = MderWriter::new();
            value.write_sfloat(reading.require(handle)?)?;
            obs_scan_fixed.push(timestamped_scan(handle, value, &reading.time)?);
        }
        fixed_scan_event(reading.scan_report_no, obs_scan_fixed)
    }
}
