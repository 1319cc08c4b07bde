//! Blood pressure monitor (ISO/IEEE 11073-10407)
//!
//! Systolic, diastolic and mean arterial pressure share one compound
//! metric; the pulse rate has its own.

use super::{Reading, Specialization, fixed_scan_event, numeric_metric, timestamped_scan};
use phd_asn1::{AbsoluteTime, AttrValMapEntry, Ava, ConfigObject, DataApdu, MderWriter};
use phd_core::nomenclature::*;
use phd_core::{PhdError, PhdResult};

pub const CONFIG_ID_02BC: u16 = 0x02BC;

/// Object handle of the systolic/diastolic/MAP compound metric
pub const HANDLE_PRESSURE: u16 = 1;
/// Object handle of the pulse rate metric
pub const HANDLE_PULSE_RATE: u16 = 2;

const METRIC_SPEC_SMALL: u16 = 0xF040;
/// compound, three components
const METRIC_STRUCT_SMALL: u16 = 0x0303;

/// Blood pressure monitor with the standard configuration 0x02BC
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BloodPressureMonitor;

impl BloodPressureMonitor {
    /// Reading with pressures in mmHg and the pulse rate in beats per minute
    pub fn reading(
        systolic: f64,
        diastolic: f64,
        mean: f64,
        pulse_rate: f64,
        time: AbsoluteTime,
    ) -> Reading {
        Reading::new(time)
            .with_value(HANDLE_PRESSURE, systolic)
            .with_value(HANDLE_PRESSURE, diastolic)
            .with_value(HANDLE_PRESSURE, mean)
            .with_value(HANDLE_PULSE_RATE, pulse_rate)
    }

    fn try_config_objects() -> PhdResult<Vec<ConfigObject>> {
        let physio = vec![
            MDC_PRESS_BLD_NONINV_SYS,
            MDC_PRESS_BLD_NONINV_DIA,
            MDC_PRESS_BLD_NONINV_MEAN,
        ];
        Ok(vec![
            numeric_metric(
                HANDLE_PRESSURE,
                MDC_PRESS_BLD_NONINV,
                METRIC_SPEC_SMALL,
                vec![
                    Ava::from_value(MDC_ATTR_METRIC_STRUCT_SMALL, &METRIC_STRUCT_SMALL)?,
                    Ava::from_value(MDC_ATTR_ID_PHYSIO_LIST, &physio)?,
                ],
                MDC_DIM_MMHG,
                &[
                    AttrValMapEntry::new(MDC_ATTR_NU_CMPD_VAL_OBS_BASIC, 10),
                    AttrValMapEntry::new(MDC_ATTR_TIME_STAMP_ABS, 8),
                ],
            )?,
            numeric_metric(
                HANDLE_PULSE_RATE,
                MDC_PULS_RATE_NON_INV,
                METRIC_SPEC_SMALL,
                Vec::new(),
                MDC_DIM_BEAT_PER_MIN,
                &[
                    AttrValMapEntry::new(MDC_ATTR_NU_VAL_OBS_BASIC, 2),
                    AttrValMapEntry::new(MDC_ATTR_TIME_STAMP_ABS, 8),
                ],
            )?,
        ])
    }
}

impl Specialization for BloodPressureMonitor {
    fn dev_config_id(&self) -> u16 {
        CONFIG_ID_02BC
    }

    fn device_profile(&self) -> u16 {
        MDC_DEV_SPEC_PROFILE_BPM
    }

    fn config_objects(&self) -> Vec<ConfigObject> {
        Self::try_config_objects().unwrap_or_default()
    }

    fn event_report(&self, reading: &Reading) -> PhdResult<DataApdu> {
        let pressures = reading.values_of(HANDLE_PRESSURE);
        if pressures.len() != 3 {
            return Err(PhdError::InvalidData(format!(
                "Blood pressure needs 3 values, reading has {}",
                pressures.len()
            )));
        }
        let mut compound = MderWriter::new();
        compound.write_list(&pressures, |w, value| w.write_sfloat(*value))?;

        let mut pulse = MderWriter::new();
        pulse.write_sfloat(reading.require(HANDLE_PULSE_RATE)?)?;

        fixed_scan_event(
            reading.scan_report_no,
            vec![
                timestamped_scan(HANDLE_PRESSURE, compound, &reading.time)?,
                timestamped_scan(HANDLE_PULSE_RATE, pulse, &reading.time)?,
            ],
        )
    }
}
