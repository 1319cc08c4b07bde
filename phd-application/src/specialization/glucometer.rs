//! Glucose meter (ISO/IEEE 11073-10417)

use super::{Reading, Specialization, fixed_scan_event, numeric_metric, timestamped_scan};
use phd_asn1::{AbsoluteTime, AttrValMapEntry, ConfigObject, DataApdu, MderWriter};
use phd_core::nomenclature::*;
use phd_core::PhdResult;

pub const CONFIG_ID_06A4: u16 = 0x06A4;

/// Object handle of the capillary whole blood glucose metric
pub const HANDLE_CAPILLARY_WHOLE_BLOOD: u16 = 1;

const METRIC_SPEC_SMALL: u16 = 0xF040;

/// Glucose meter with the standard configuration 0x06A4
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Glucometer;

impl Glucometer {
    /// Reading with the capillary whole blood glucose in mg/dL
    pub fn reading(glucose: f64, time: AbsoluteTime) -> Reading {
        Reading::new(time).with_value(HANDLE_CAPILLARY_WHOLE_BLOOD, glucose)
    }

    fn try_config_objects() -> PhdResult<Vec<ConfigObject>> {
        Ok(vec![numeric_metric(
            HANDLE_CAPILLARY_WHOLE_BLOOD,
            MDC_CONC_GLU_CAPILLARY_WHOLEBLOOD,
            METRIC_SPEC_SMALL,
            Vec::new(),
            MDC_DIM_MILLI_G_PER_DL,
            &[
                AttrValMapEntry::new(MDC_ATTR_NU_VAL_OBS_BASIC, 2),
                AttrValMapEntry::new(MDC_ATTR_TIME_STAMP_ABS, 8),
            ],
        )?])
    }
}

impl Specialization for Glucometer {
    fn dev_config_id(&self) -> u16 {
        CONFIG_ID_06A4
    }

    fn device_profile(&self) -> u16 {
        MDC_DEV_SPEC_PROFILE_GLUCOSE
    }

    fn config_objects(&self) -> Vec<ConfigObject> {
        Self::try_config_objects().unwrap_or_default()
    }

    fn event_report(&self, reading: &Reading) -> PhdResult<DataApdu> {
        let mut value = MderWriter::new();
        value.write_sfloat(reading.require(HANDLE_CAPILLARY_WHOLE_BLOOD)?)?;
        fixed_scan_event(
            reading.scan_report_no,
            vec![timestamped_scan(HANDLE_CAPILLARY_WHOLE_BLOOD, value, &reading.time)?],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mds::Mds;
    use crate::report::{ObservedValue, decode_event_report};
    use phd_asn1::DataMessage;

    #[test]
    fn test_event_report_decodes_on_manager() {
        let time = AbsoluteTime::new(2026, 10, 19, 6, 45, 0);
        let mut reading = Glucometer::reading(105.0, time);
        reading.scan_report_no = 3;
        let data = Glucometer.event_report(&reading).unwrap();
        let DataMessage::RoivEventReport(event) = &data.message else {
            panic!("expected unconfirmed event report");
        };
        assert_eq!(event.event_info.len(), 22);
        assert_eq!(&event.event_info[8..14], &[0x00, 0x01, 0x00, 0x0A, 0x00, 0x69]);

        let objects = Glucometer.config_objects();
        assert_eq!(objects.len(), 1);
        let mds = Mds::from_config(&[0x22; 8], CONFIG_ID_06A4, &objects).unwrap();
        let report = decode_event_report(&mds, event).unwrap();
        assert_eq!(report.scan.scan_report_no(), 3);
        let glucose = report.observation(HANDLE_CAPILLARY_WHOLE_BLOOD).unwrap();
        assert_eq!(glucose.value, Some(ObservedValue::Numeric(105.0)));
        assert_eq!(glucose.unit_code, Some(MDC_DIM_MILLI_G_PER_DL));
    }
}
