//! Weighing scale (ISO/IEEE 11073-10415)

use super::{Reading, Specialization, fixed_scan_event, numeric_metric, timestamped_scan};
use phd_asn1::{AbsoluteTime, AttrValMapEntry, ConfigObject, DataApdu, MderWriter};
use phd_core::nomenclature::*;
use phd_core::PhdResult;

pub const CONFIG_ID_05DC: u16 = 0x05DC;

/// Object handle of the body weight metric
pub const HANDLE_BODY_WEIGHT: u16 = 1;

/// intermittent, avail-stored-data, upd & msmt aperiodic, acc-agent-init, measured
const METRIC_SPEC_SMALL: u16 = 0xF040;

/// Weighing scale with the standard configuration 0x05DC
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WeighingScale;

impl WeighingScale {
    /// Reading with the body weight in kilograms
    pub fn reading(weight: f64, time: AbsoluteTime) -> Reading {
        Reading::new(time).with_value(HANDLE_BODY_WEIGHT, weight)
    }

    fn try_config_objects() -> PhdResult<Vec<ConfigObject>> {
        Ok(vec![numeric_metric(
            HANDLE_BODY_WEIGHT,
            MDC_MASS_BODY_ACTUAL,
            METRIC_SPEC_SMALL,
            Vec::new(),
            MDC_DIM_KILO_G,
            &[
                AttrValMapEntry::new(MDC_ATTR_NU_VAL_OBS_SIMP, 4),
                AttrValMapEntry::new(MDC_ATTR_TIME_STAMP_ABS, 8),
            ],
        )?])
    }
}

impl Specialization for WeighingScale {
    fn dev_config_id(&self) -> u16 {
        CONFIG_ID_05DC
    }

    fn device_profile(&self) -> u16 {
        MDC_DEV_SPEC_PROFILE_SCALE
    }

    fn config_objects(&self) -> Vec<ConfigObject> {
        Self::try_config_objects().unwrap_or_default()
    }

    fn event_report(&self, reading: &Reading) -> PhdResult<DataApdu> {
        let mut value = MderWriter::new();
        value.write_float(reading.require(HANDLE_BODY_WEIGHT)?)?;
        fixed_scan_event(
            reading.scan_report_no,
            vec![timestamped_scan(HANDLE_BODY_WEIGHT, value, &reading.time)?],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mds::Mds;
    use crate::report::{ObservedValue, decode_event_report};
    use phd_asn1::{ConfigReport, DataMessage, MderEncode};

    #[test]
    fn test_config_objects() {
        let objects = WeighingScale.config_objects();
        assert_eq!(objects.len(), 1);
        let report = ConfigReport {
            config_report_id: CONFIG_ID_05DC,
            config_obj_list: objects,
        };
        let bytes = report.to_bytes().unwrap();
        // one object of 44 bytes: class, handle, 4 attributes of 36 bytes
        assert_eq!(&bytes[..6], &[0x05, 0xDC, 0x00, 0x01, 0x00, 0x2C]);
        assert_eq!(&bytes[6..14], &[0x00, 0x06, 0x00, 0x01, 0x00, 0x04, 0x00, 0x24]);
        assert_eq!(bytes.len(), 50);
    }

    #[test]
    fn test_event_report_decodes_on_manager() {
        let time = AbsoluteTime::new(2026, 10, 19, 7, 15, 0);
        let data = WeighingScale
            .event_report(&WeighingScale::reading(80.0, time))
            .unwrap();
        let DataMessage::RoivEventReport(event) = &data.message else {
            panic!("expected unconfirmed event report");
        };
        // data-req-id, scan no, count 1, length 16, then one 16-byte scan
        assert_eq!(&event.event_info[..8], &[0xF0, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x10]);
        assert_eq!(event.event_info.len(), 24);

        let mds = Mds::from_config(&[0x11; 8], CONFIG_ID_05DC, &WeighingScale.config_objects())
            .unwrap();
        let report = decode_event_report(&mds, event).unwrap();
        let weight = report.observation(HANDLE_BODY_WEIGHT).unwrap();
        assert_eq!(weight.value, Some(ObservedValue::Numeric(80.0)));
        assert_eq!(weight.unit_code, Some(MDC_DIM_KILO_G));
        assert_eq!(weight.timestamp, Some(time));
    }

    #[test]
    fn test_event_report_needs_weight() {
        let reading = Reading::new(AbsoluteTime::default());
        assert!(WeighingScale.event_report(&reading).is_err());
    }
}
