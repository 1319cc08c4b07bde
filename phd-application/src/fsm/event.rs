//! Events fed to the state machine

use std::fmt::{self, Display};

/// Input of the state machine
///
/// `Ind*` events come from the transport, `Req*` events from the local
/// application or from actions, `Rx*` events from received APDUs after the
/// current state has classified them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FsmEvent {
    IndTransportConnection,
    IndTransportDisconnect,
    IndTimeout,

    ReqAssoc,
    ReqAssocRel,
    ReqAssocAbort,
    ReqAgentSuppliedUnknownConfiguration,
    ReqAgentSuppliedKnownConfiguration,
    ReqSendConfig,
    ReqSendEvent,

    RxAarq,
    RxAarqAcceptableAndKnownConfiguration,
    RxAarqAcceptableAndUnknownConfiguration,
    RxAarqUnacceptableConfiguration,
    RxAare,
    RxAareRejected,
    RxAareAcceptedKnown,
    RxAareAcceptedUnknown,
    RxRlrq,
    RxRlre,
    RxAbrt,
    RxPrst,

    RxRoiv,
    RxRoivEventReport,
    RxRoivConfirmedEventReport,
    RxRoivAllExceptConfirmedEventReport,
    RxRoivGet,
    RxRoivSet,
    RxRoivConfirmedSet,
    RxRoivAction,
    RxRoivConfirmedAction,

    RxRors,
    RxRorsConfirmedEventReport,
    RxRorsConfirmedEventReportUnknown,
    RxRorsConfirmedEventReportKnown,
    RxRorsGet,
    RxRorsConfirmedSet,
    RxRorsConfirmedAction,
    RxRoer,
    RxRorj,
}

impl FsmEvent {
    /// Check if the event was produced by a received APDU
    #[must_use]
    pub const fn is_rx(&self) -> bool {
        !matches!(
            self,
            Self::IndTransportConnection
                | Self::IndTransportDisconnect
                | Self::IndTimeout
                | Self::ReqAssoc
                | Self::ReqAssocRel
                | Self::ReqAssocAbort
                | Self::ReqAgentSuppliedUnknownConfiguration
                | Self::ReqAgentSuppliedKnownConfiguration
                | Self::ReqSendConfig
                | Self::ReqSendEvent
        )
    }
}

impl Display for FsmEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}
