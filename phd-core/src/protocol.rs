//! Protocol-level constants for ISO/IEEE 11073-20601
//!
//! Values carried in association information, association results, release
//! and abort reasons, and the error/reject codes of remote operations.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Association version 1 (BITS-32, first bit set)
pub const ASSOC_VERSION1: u32 = 0x8000_0000;
/// Protocol version 1 of the 20601 data protocol
pub const PROTOCOL_VERSION1: u32 = 0x8000_0000;
/// Nomenclature version 1
pub const NOM_VERSION1: u32 = 0x8000_0000;

/// Encoding rules bits
pub const ENCODING_MDER: u16 = 0x8000;
pub const ENCODING_XER: u16 = 0x4000;
pub const ENCODING_PER: u16 = 0x2000;

/// Functional units bits
pub const FUN_UNITS_UNIDIRECTIONAL: u32 = 0x8000_0000;
pub const FUN_UNITS_HAVETESTCAP: u32 = 0x4000_0000;
pub const FUN_UNITS_CREATETESTASSOC: u32 = 0x2000_0000;

/// System type bits
pub const SYS_TYPE_MANAGER: u32 = 0x8000_0000;
pub const SYS_TYPE_AGENT: u32 = 0x0080_0000;

/// Data protocol identifiers
pub const DATA_PROTO_ID_20601: u16 = 20601;
pub const DATA_PROTO_ID_EXTERNAL: u16 = 65535;

/// Data request mode capability flags
pub const DATA_REQ_SUPP_STOP: u16 = 0x8000;
pub const DATA_REQ_SUPP_SCOPE_ALL: u16 = 0x0800;
pub const DATA_REQ_SUPP_SCOPE_CLASS: u16 = 0x0400;
pub const DATA_REQ_SUPP_SCOPE_HANDLE: u16 = 0x0200;
pub const DATA_REQ_SUPP_MODE_SINGLE_RSP: u16 = 0x0080;
pub const DATA_REQ_SUPP_MODE_TIME_PERIOD: u16 = 0x0040;
pub const DATA_REQ_SUPP_MODE_TIME_NO_LIMIT: u16 = 0x0020;
pub const DATA_REQ_SUPP_PERSON_ID: u16 = 0x0010;
pub const DATA_REQ_SUPP_INIT_AGENT: u16 = 0x0001;

/// Data request id used by agent-initiated scan reports
pub const DATA_REQ_ID_AGENT_INITIATED: u16 = 0xF000;

/// Configuration id used by the manager in its AARE
pub const MANAGER_CONFIG_RESPONSE: u16 = 0x0000;
pub const STANDARD_CONFIG_START: u16 = 0x0001;
pub const STANDARD_CONFIG_END: u16 = 0x3FFF;
pub const EXTENDED_CONFIG_START: u16 = 0x4000;
pub const EXTENDED_CONFIG_END: u16 = 0x7FFF;

/// Handle of the MDS object
pub const MDS_HANDLE: u16 = 0;

/// Relative time value meaning "no time available"
pub const RELATIVE_TIME_UNSPECIFIED: u32 = 0xFFFF_FFFF;

/// Release reason `normal`, shared by RLRQ and RLRE
pub const RELEASE_REASON_NORMAL: u16 = 0;

/// ROER error values
pub mod error_value {
    pub const NO_SUCH_OBJECT_INSTANCE: u16 = 1;
    pub const ACCESS_DENIED: u16 = 2;
    pub const NO_SUCH_ACTION: u16 = 9;
    pub const INVALID_OBJECT_INSTANCE: u16 = 17;
    pub const PROTOCOL_VIOLATION: u16 = 23;
    pub const NOT_ALLOWED_BY_OBJECT: u16 = 24;
    pub const ACTION_TIMED_OUT: u16 = 25;
    pub const ACTION_ABORTED: u16 = 26;
}

/// RORJ problem codes
pub mod reject_problem {
    pub const UNRECOGNIZED_APDU: u16 = 0;
    pub const BADLY_STRUCTURED_APDU: u16 = 2;
    pub const UNRECOGNIZED_OPERATION: u16 = 101;
    pub const RESOURCE_LIMITATION: u16 = 103;
    pub const UNEXPECTED_ERROR: u16 = 303;
}

/// Result carried in an AARE
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AssociateResult {
    Accepted,
    RejectedPermanent,
    RejectedTransient,
    AcceptedUnknownConfig,
    RejectedNoCommonProtocol,
    RejectedNoCommonParameter,
    RejectedUnknown,
    RejectedUnauthorized,
    RejectedUnsupportedAssocVersion,
    /// A value outside the defined range, kept for round-tripping
    Other(u16),
}

impl AssociateResult {
    #[must_use]
    pub const fn from_u16(value: u16) -> Self {
        match value {
            0 => Self::Accepted,
            1 => Self::RejectedPermanent,
            2 => Self::RejectedTransient,
            3 => Self::AcceptedUnknownConfig,
            4 => Self::RejectedNoCommonProtocol,
            5 => Self::RejectedNoCommonParameter,
            6 => Self::RejectedUnknown,
            7 => Self::RejectedUnauthorized,
            8 => Self::RejectedUnsupportedAssocVersion,
            other => Self::Other(other),
        }
    }

    #[must_use]
    pub const fn as_u16(&self) -> u16 {
        match self {
            Self::Accepted => 0,
            Self::RejectedPermanent => 1,
            Self::RejectedTransient => 2,
            Self::AcceptedUnknownConfig => 3,
            Self::RejectedNoCommonProtocol => 4,
            Self::RejectedNoCommonParameter => 5,
            Self::RejectedUnknown => 6,
            Self::RejectedUnauthorized => 7,
            Self::RejectedUnsupportedAssocVersion => 8,
            Self::Other(value) => *value,
        }
    }

    /// Check if the association was accepted (with or without a known configuration)
    #[must_use]
    pub const fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted | Self::AcceptedUnknownConfig)
    }
}

impl fmt::Display for AssociateResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Accepted => "accepted",
            Self::RejectedPermanent => "rejected-permanent",
            Self::RejectedTransient => "rejected-transient",
            Self::AcceptedUnknownConfig => "accepted-unknown-config",
            Self::RejectedNoCommonProtocol => "rejected-no-common-protocol",
            Self::RejectedNoCommonParameter => "rejected-no-common-parameter",
            Self::RejectedUnknown => "rejected-unknown",
            Self::RejectedUnauthorized => "rejected-unauthorized",
            Self::RejectedUnsupportedAssocVersion => "rejected-unsupported-assoc-version",
            Self::Other(value) => return write!(f, "associate-result({value})"),
        };
        f.write_str(name)
    }
}

/// Result of configuration evaluation, sent back in a ConfigReportRsp
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConfigResult {
    AcceptedConfig,
    UnsupportedConfig,
    StandardConfigUnknown,
    Other(u16),
}

impl ConfigResult {
    #[must_use]
    pub const fn from_u16(value: u16) -> Self {
        match value {
            0 => Self::AcceptedConfig,
            1 => Self::UnsupportedConfig,
            2 => Self::StandardConfigUnknown,
            other => Self::Other(other),
        }
    }

    #[must_use]
    pub const fn as_u16(&self) -> u16 {
        match self {
            Self::AcceptedConfig => 0,
            Self::UnsupportedConfig => 1,
            Self::StandardConfigUnknown => 2,
            Self::Other(value) => *value,
        }
    }
}

/// Reason carried in an ABRT
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AbortReason {
    Undefined,
    BufferOverflow,
    ResponseTimeout,
    ConfigurationTimeout,
    Other(u16),
}

impl AbortReason {
    #[must_use]
    pub const fn from_u16(value: u16) -> Self {
        match value {
            0 => Self::Undefined,
            1 => Self::BufferOverflow,
            2 => Self::ResponseTimeout,
            3 => Self::ConfigurationTimeout,
            other => Self::Other(other),
        }
    }

    #[must_use]
    pub const fn as_u16(&self) -> u16 {
        match self {
            Self::Undefined => 0,
            Self::BufferOverflow => 1,
            Self::ResponseTimeout => 2,
            Self::ConfigurationTimeout => 3,
            Self::Other(value) => *value,
        }
    }
}

/// Which end of the association this engine plays
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Manager,
    Agent,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Manager => f.write_str("manager"),
            Self::Agent => f.write_str("agent"),
        }
    }
}

/// Check whether a configuration id lies in the standard range
#[must_use]
pub const fn is_standard_config_id(config_id: u16) -> bool {
    config_id >= STANDARD_CONFIG_START && config_id <= STANDARD_CONFIG_END
}

/// Check whether a configuration id lies in the extended range
#[must_use]
pub const fn is_extended_config_id(config_id: u16) -> bool {
    config_id >= EXTENDED_CONFIG_START && config_id <= EXTENDED_CONFIG_END
}
