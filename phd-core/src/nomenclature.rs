//! ISO/IEEE 11073-10101 nomenclature codes
//!
//! Only the codes the protocol engine and the bundled specializations refer
//! to are listed here.

/// Partitions
pub const MDC_PART_OBJ: u16 = 1;
pub const MDC_PART_SCADA: u16 = 2;
pub const MDC_PART_DIM: u16 = 4;
pub const MDC_PART_INFRA: u16 = 8;

/// Object classes
pub const MDC_MOC_VMO_METRIC: u16 = 4;
pub const MDC_MOC_VMO_METRIC_ENUM: u16 = 5;
pub const MDC_MOC_VMO_METRIC_NU: u16 = 6;
pub const MDC_MOC_VMO_METRIC_SA_RT: u16 = 9;
pub const MDC_MOC_SCAN: u16 = 16;
pub const MDC_MOC_SCAN_CFG: u16 = 17;
pub const MDC_MOC_SCAN_CFG_EPI: u16 = 18;
pub const MDC_MOC_SCAN_CFG_PERI: u16 = 19;
pub const MDC_MOC_VMS_MDS_SIMP: u16 = 37;
pub const MDC_MOC_VMO_PMSTORE: u16 = 61;
pub const MDC_MOC_PM_SEGMENT: u16 = 62;

/// Attributes
pub const MDC_ATTR_ID_HANDLE: u16 = 2337;
pub const MDC_ATTR_ID_INSTNO: u16 = 2338;
pub const MDC_ATTR_ID_MODEL: u16 = 2344;
pub const MDC_ATTR_ID_PHYSIO: u16 = 2347;
pub const MDC_ATTR_ID_PROD_SPECN: u16 = 2349;
pub const MDC_ATTR_ID_TYPE: u16 = 2351;
pub const MDC_ATTR_NU_VAL_OBS: u16 = 2384;
pub const MDC_ATTR_OP_STAT: u16 = 2387;
pub const MDC_ATTR_SYS_ID: u16 = 2436;
pub const MDC_ATTR_TIME_ABS: u16 = 2439;
pub const MDC_ATTR_TIME_REL: u16 = 2447;
pub const MDC_ATTR_TIME_STAMP_ABS: u16 = 2448;
pub const MDC_ATTR_TIME_STAMP_REL: u16 = 2449;
pub const MDC_ATTR_UNIT_CODE: u16 = 2454;
pub const MDC_ATTR_DEV_CONFIG_ID: u16 = 2628;
pub const MDC_ATTR_METRIC_SPEC_SMALL: u16 = 2630;
pub const MDC_ATTR_NU_VAL_OBS_BASIC: u16 = 2636;
pub const MDC_ATTR_ATTRIBUTE_VAL_MAP: u16 = 2645;
pub const MDC_ATTR_NU_VAL_OBS_SIMP: u16 = 2646;
pub const MDC_ATTR_SYS_TYPE_SPEC_LIST: u16 = 2650;
pub const MDC_ATTR_METRIC_STRUCT_SMALL: u16 = 2675;
pub const MDC_ATTR_NU_CMPD_VAL_OBS_SIMP: u16 = 2676;
pub const MDC_ATTR_NU_CMPD_VAL_OBS_BASIC: u16 = 2677;
pub const MDC_ATTR_ID_PHYSIO_LIST: u16 = 2678;
pub const MDC_ATTR_ENUM_OBS_VAL_SIMP_OID: u16 = 2633;

/// Notifications
pub const MDC_NOTI_CONFIG: u16 = 3356;
pub const MDC_NOTI_SCAN_REPORT_FIXED: u16 = 3357;
pub const MDC_NOTI_SCAN_REPORT_VAR: u16 = 3358;
pub const MDC_NOTI_SCAN_REPORT_MP_FIXED: u16 = 3359;
pub const MDC_NOTI_SCAN_REPORT_MP_VAR: u16 = 3360;

/// Actions
pub const MDC_ACT_SET_TIME: u16 = 3095;
pub const MDC_ACT_DATA_REQUEST: u16 = 3099;

/// Metrics
pub const MDC_PULS_OXIM_PULS_RATE: u16 = 18458;
pub const MDC_PULS_OXIM_SAT_O2: u16 = 19384;
pub const MDC_PULS_RATE_NON_INV: u16 = 18474;
pub const MDC_PRESS_BLD_NONINV: u16 = 18948;
pub const MDC_PRESS_BLD_NONINV_SYS: u16 = 18949;
pub const MDC_PRESS_BLD_NONINV_DIA: u16 = 18950;
pub const MDC_PRESS_BLD_NONINV_MEAN: u16 = 18951;
pub const MDC_CONC_GLU_CAPILLARY_WHOLEBLOOD: u16 = 29112;
pub const MDC_MASS_BODY_ACTUAL: u16 = 57664;

/// Dimensions
pub const MDC_DIM_PERCENT: u16 = 544;
pub const MDC_DIM_BEAT_PER_MIN: u16 = 2720;
pub const MDC_DIM_KILO_G: u16 = 1731;
pub const MDC_DIM_MILLI_G_PER_DL: u16 = 2130;
pub const MDC_DIM_MMHG: u16 = 3872;

/// Device specializations (MDC_PART_INFRA)
pub const MDC_DEV_SPEC_PROFILE_PULS_OXIM: u16 = 4100;
pub const MDC_DEV_SPEC_PROFILE_BPM: u16 = 4103;
pub const MDC_DEV_SPEC_PROFILE_SCALE: u16 = 4111;
pub const MDC_DEV_SPEC_PROFILE_GLUCOSE: u16 = 4113;

/// Build a 32-bit TYPE value out of a partition and a code
#[must_use]
pub const fn oid_type(partition: u16, code: u16) -> u32 {
    ((partition as u32) << 16) | code as u32
}
