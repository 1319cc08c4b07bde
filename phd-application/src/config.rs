//! Engine configuration
//!
//! Timeouts and retry counts bounding every handshake stage, plus the local
//! system identity announced during association.

use phd_asn1::codec::{AGENT_MAX_APDU_SIZE, MANAGER_MAX_APDU_SIZE};
use phd_asn1::ApduCodec;
use phd_core::protocol::Role;
use serde::{Deserialize, Serialize};

/// Timeouts in seconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timeouts {
    /// AARQ sent, waiting for the AARE
    pub association: u64,
    /// RLRQ sent, waiting for the RLRE
    pub association_release: u64,
    /// AARE accepted-unknown sent, waiting for the configuration report
    pub configuring: u64,
    /// Configuration report sent, waiting for the verdict
    pub config_report: u64,
    /// Confirmed GET/SET/ACTION in flight
    pub request: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            association: 10,
            association_release: 10,
            configuring: 10,
            config_report: 3,
            request: 3,
        }
    }
}

/// Number of retransmissions before a handshake stage gives up
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub association: u8,
    pub configuring: u8,
    pub release: u8,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            association: 3,
            configuring: 0,
            release: 3,
        }
    }
}

/// Configuration of one connection context
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// EUI-64 system id announced in AARQ/AARE
    #[serde(with = "serde_bytes")]
    pub system_id: Vec<u8>,
    pub timeouts: Timeouts,
    pub retries: RetryPolicy,
    /// Largest APDU this end sends
    pub max_tx_apdu_size: usize,
    /// Largest APDU this end accepts
    pub max_rx_apdu_size: usize,
}

impl EngineConfig {
    /// Default configuration for `role`, with the role's APDU size limits
    pub fn for_role(role: Role) -> Self {
        let codec = match role {
            Role::Manager => ApduCodec::manager(),
            Role::Agent => ApduCodec::agent(),
        };
        Self {
            max_tx_apdu_size: codec.max_tx_size,
            max_rx_apdu_size: codec.max_rx_size,
            ..Self::default()
        }
    }

    pub fn with_system_id(mut self, system_id: impl Into<Vec<u8>>) -> Self {
        self.system_id = system_id.into();
        self
    }

    pub fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn with_retries(mut self, retries: RetryPolicy) -> Self {
        self.retries = retries;
        self
    }

    pub fn with_apdu_limits(mut self, max_tx: usize, max_rx: usize) -> Self {
        self.max_tx_apdu_size = max_tx;
        self.max_rx_apdu_size = max_rx;
        self
    }

    /// Codec bounded by this configuration's APDU limits
    pub fn codec(&self) -> ApduCodec {
        ApduCodec::new(self.max_tx_apdu_size, self.max_rx_apdu_size)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            system_id: vec![0; 8],
            timeouts: Timeouts::default(),
            retries: RetryPolicy::default(),
            max_tx_apdu_size: AGENT_MAX_APDU_SIZE,
            max_rx_apdu_size: MANAGER_MAX_APDU_SIZE,
        }
    }
}
