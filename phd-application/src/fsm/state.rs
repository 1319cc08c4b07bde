//! Connection states of the ISO/IEEE 11073-20601 state machine

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};

/// State of one agent-manager connection
///
/// # State Transitions
///
/// ```text
/// Disconnected -> Unassociated -> Associating -> Operating -> Disassociating -> Unassociated
///                      |              |              ^
///                      |              v              |
///                      |         ConfigSending <-> WaitingApproval     (agent)
///                      v                             |
///               WaitingForConfig <-> CheckingConfig -+                 (manager)
/// ```
///
/// Manager and agent share the outer states. Configuring is split into
/// `ConfigSending`/`WaitingApproval` on the agent and
/// `WaitingForConfig`/`CheckingConfig` on the manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FsmState {
    /// No transport connection
    Disconnected,

    /// Transport connected, no association
    Unassociated,

    /// AARQ sent, waiting for the AARE (agent only)
    Associating,

    /// Configuration report about to be sent (agent only)
    ///
    /// Entering this state immediately sends the configuration report.
    ConfigSending,

    /// Configuration report sent, waiting for the manager's verdict (agent only)
    WaitingApproval,

    /// Association accepted with an unknown configuration, waiting for the
    /// agent's configuration report (manager only)
    WaitingForConfig,

    /// Configuration report received and being evaluated (manager only)
    CheckingConfig,

    /// Associated and configured
    ///
    /// Measurements flow from agent to manager. GET, SET and ACTION may be
    /// invoked by either side.
    Operating,

    /// RLRQ sent, waiting for the RLRE
    Disassociating,
}

impl FsmState {
    /// All states, in lifecycle order
    pub const ALL: [FsmState; 9] = [
        Self::Disconnected,
        Self::Unassociated,
        Self::Associating,
        Self::ConfigSending,
        Self::WaitingApproval,
        Self::WaitingForConfig,
        Self::CheckingConfig,
        Self::Operating,
        Self::Disassociating,
    ];

    /// Check if the state is one of the configuring sub-states
    #[must_use]
    pub const fn is_configuring(&self) -> bool {
        matches!(
            self,
            Self::ConfigSending
                | Self::WaitingApproval
                | Self::WaitingForConfig
                | Self::CheckingConfig
        )
    }

    /// Check if an association exists (possibly still being configured)
    #[must_use]
    pub const fn is_associated(&self) -> bool {
        self.is_configuring() || matches!(self, Self::Operating | Self::Disassociating)
    }

    /// Check if the transport is connected
    #[must_use]
    pub const fn is_connected(&self) -> bool {
        !matches!(self, Self::Disconnected)
    }

    /// Check if this state waits on the peer before it can move on
    #[must_use]
    pub const fn is_pending(&self) -> bool {
        matches!(
            self,
            Self::Associating | Self::WaitingApproval | Self::WaitingForConfig | Self::Disassociating
        )
    }
}

impl Display for FsmState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Disconnected => "disconnected",
            Self::Unassociated => "unassociated",
            Self::Associating => "associating",
            Self::ConfigSending => "config_sending",
            Self::WaitingApproval => "waiting_approval",
            Self::WaitingForConfig => "waiting_for_config",
            Self::CheckingConfig => "checking_config",
            Self::Operating => "operating",
            Self::Disassociating => "disassociating",
        };
        f.write_str(name)
    }
}

impl Default for FsmState {
    fn default() -> Self {
        Self::Disconnected
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_predicates() {
        assert!(FsmState::WaitingForConfig.is_configuring());
        assert!(!FsmState::Operating.is_configuring());
        assert!(FsmState::Operating.is_associated());
        assert!(!FsmState::Unassociated.is_associated());
        assert!(!FsmState::Disconnected.is_connected());
        assert!(FsmState::Associating.is_pending());
        assert_eq!(FsmState::CheckingConfig.to_string(), "checking_config");
    }
}
