//! Transition tables for the manager and agent roles
//!
//! Each table is an exhaustive match over `(state, event)`. A `None` result
//! means the event is not processed in that state.

use super::{FsmEvent, FsmState, Rule};

/// Post-transition actions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    /// Send ABRT, reason taken from the event data (undefined by default)
    AbortTx,
    /// Send ROER no-such-object-instance in response to a confirmed invoke
    RoerTx,
    /// Retire the matching request, or abort if its invoke id is unknown
    CheckInvokeIdAbortTx,

    /// Agent: build the local MDS from the specialization
    AgentMds,
    /// Agent: send AARQ and start the association timer
    AarqTx,
    /// Manager: accept an AARQ whose configuration is known
    AcceptConfigTx,
    /// Manager: accept an AARQ and wait for the configuration report
    WaitForConfigTx,
    /// Manager: reject an AARQ with the evaluated result code
    UnacceptConfigTx,
    /// Agent: reject any AARQ (agents never accept associations)
    AareRejectedPermanentTx,

    /// Manager: evaluate a received configuration report
    PerformConfiguration,
    /// Manager: send the ConfigReportRsp verdict
    ConfigurationResponseTx,
    /// Manager: confirmed event report received while checking configuration
    NewMeasurementsResponseTx,
    /// Agent: send the configuration report as a confirmed event report
    SendConfigTx,

    /// Manager: decode an event report and answer confirmed ones
    EventReport,
    /// Manager: GET response for a pending request
    GetResponse,
    /// Manager: confirmed SET response for a pending request
    SetResponse,
    /// Manager: confirmed ACTION response for a pending request
    ActionResponse,
    /// Agent: answer a GET on the MDS object
    AgentGetMdsTx,
    /// Agent: answer a confirmed SET, ACTION or event report invoke
    AgentRoivRespondTx,
    /// Agent: send an unconfirmed measurement event report
    AgentSendEventTx,

    /// Send RLRQ(normal), starting the release timer when disassociating
    ReleaseRequestTx,
    /// Send RLRE(normal)
    ReleaseResponseTx,
}

const fn rule(next: FsmState, action: Action) -> Option<Rule> {
    Some(Rule {
        next,
        action: Some(action),
    })
}

const fn goto(next: FsmState) -> Option<Rule> {
    Some(Rule { next, action: None })
}

/// Rows shared by every associated state of both roles
fn associated_common(state: FsmState, event: FsmEvent) -> Option<Rule> {
    use Action::*;
    use FsmEvent::*;
    use FsmState::*;

    match event {
        IndTransportDisconnect => goto(Disconnected),
        IndTimeout | ReqAssocAbort | RxRlre => rule(Unassociated, AbortTx),
        ReqAssocRel => rule(Disassociating, ReleaseRequestTx),
        RxAarq
        | RxAarqAcceptableAndKnownConfiguration
        | RxAarqAcceptableAndUnknownConfiguration
        | RxAarqUnacceptableConfiguration
        | RxAare
        | RxAareRejected
        | RxAareAcceptedKnown
        | RxAareAcceptedUnknown => rule(Unassociated, AbortTx),
        RxRlrq => rule(Unassociated, ReleaseResponseTx),
        RxAbrt => goto(Unassociated),
        _ => {
            log::trace!("No common row for {} in {}", event, state);
            None
        }
    }
}

/// Rows of the disassociating state, shared by both roles
fn disassociating(event: FsmEvent, response_action: Option<Action>) -> Option<Rule> {
    use Action::*;
    use FsmEvent::*;
    use FsmState::*;

    match event {
        IndTransportDisconnect => goto(Disconnected),
        IndTimeout | ReqAssocAbort => rule(Unassociated, AbortTx),
        ReqAssocRel => goto(Disassociating),
        RxAarq
        | RxAarqAcceptableAndKnownConfiguration
        | RxAarqAcceptableAndUnknownConfiguration
        | RxAarqUnacceptableConfiguration
        | RxAare
        | RxAareRejected
        | RxAareAcceptedKnown
        | RxAareAcceptedUnknown => rule(Unassociated, AbortTx),
        RxRlrq => rule(Disassociating, ReleaseResponseTx),
        RxRlre | RxAbrt => goto(Unassociated),
        RxRoiv => goto(Disassociating),
        RxRors => match response_action {
            Some(action) => rule(Disassociating, action),
            None => rule(Unassociated, AbortTx),
        },
        RxRoer | RxRorj => rule(Unassociated, AbortTx),
        _ => None,
    }
}

/// Transition table of the manager role
pub fn manager_rule(state: FsmState, event: FsmEvent) -> Option<Rule> {
    use Action::*;
    use FsmEvent::*;
    use FsmState::*;

    match state {
        Disconnected => match event {
            IndTransportConnection => goto(Unassociated),
            _ => None,
        },
        Unassociated => match event {
            IndTransportDisconnect => goto(Disconnected),
            RxAarqAcceptableAndKnownConfiguration => rule(Operating, AcceptConfigTx),
            RxAarqAcceptableAndUnknownConfiguration => rule(WaitingForConfig, WaitForConfigTx),
            RxAarqUnacceptableConfiguration => rule(Unassociated, UnacceptConfigTx),
            RxAare | RxRlrq | RxPrst => rule(Unassociated, AbortTx),
            RxRlre | RxAbrt | ReqAssocRel | ReqAssocAbort => goto(Unassociated),
            _ => None,
        },
        WaitingForConfig => match event {
            RxRoivConfirmedEventReport => rule(CheckingConfig, PerformConfiguration),
            RxRoivEventReport => rule(WaitingForConfig, RoerTx),
            RxRoivGet | RxRoivSet | RxRoivConfirmedSet | RxRoivAction | RxRoivConfirmedAction => {
                goto(WaitingForConfig)
            }
            RxRors => rule(WaitingForConfig, CheckInvokeIdAbortTx),
            RxRoer | RxRorj => goto(WaitingForConfig),
            _ => associated_common(state, event),
        },
        CheckingConfig => match event {
            ReqAgentSuppliedKnownConfiguration => rule(Operating, ConfigurationResponseTx),
            ReqAgentSuppliedUnknownConfiguration => {
                rule(WaitingForConfig, ConfigurationResponseTx)
            }
            RxRoivConfirmedEventReport => rule(CheckingConfig, NewMeasurementsResponseTx),
            RxRoivAllExceptConfirmedEventReport => rule(Unassociated, RoerTx),
            RxRorsConfirmedEventReport
            | RxRorsGet
            | RxRorsConfirmedSet
            | RxRorsConfirmedAction
            | RxRoer
            | RxRorj => goto(CheckingConfig),
            _ => associated_common(state, event),
        },
        Operating => match event {
            RxRoivEventReport | RxRoivConfirmedEventReport => rule(Operating, EventReport),
            RxRoivGet | RxRoivSet | RxRoivConfirmedSet | RxRoivAction | RxRoivConfirmedAction => {
                rule(Operating, RoerTx)
            }
            RxRorsConfirmedEventReport => rule(Operating, CheckInvokeIdAbortTx),
            RxRorsGet => rule(Operating, GetResponse),
            RxRorsConfirmedSet => rule(Operating, SetResponse),
            RxRorsConfirmedAction => rule(Operating, ActionResponse),
            RxRoer | RxRorj => rule(Operating, CheckInvokeIdAbortTx),
            _ => associated_common(state, event),
        },
        Disassociating => disassociating(event, Some(CheckInvokeIdAbortTx)),
        Associating | ConfigSending | WaitingApproval => None,
    }
}

/// Transition table of the agent role
pub fn agent_rule(state: FsmState, event: FsmEvent) -> Option<Rule> {
    use Action::*;
    use FsmEvent::*;
    use FsmState::*;

    match state {
        Disconnected => match event {
            IndTransportConnection => rule(Unassociated, AgentMds),
            _ => None,
        },
        Unassociated => match event {
            IndTransportDisconnect => goto(Disconnected),
            ReqAssoc => rule(Associating, AarqTx),
            ReqAssocRel | RxRlre | RxAbrt => goto(Unassociated),
            ReqAssocAbort | RxAare | RxRlrq | RxPrst => rule(Unassociated, AbortTx),
            RxAarq => rule(Unassociated, AareRejectedPermanentTx),
            _ => None,
        },
        Associating => match event {
            IndTransportDisconnect => goto(Disconnected),
            IndTimeout | ReqAssocAbort => rule(Unassociated, AbortTx),
            ReqAssocRel => rule(Unassociated, ReleaseRequestTx),
            RxAarq => rule(Unassociated, AareRejectedPermanentTx),
            RxAareAcceptedKnown => goto(Operating),
            RxAareAcceptedUnknown => goto(ConfigSending),
            RxAareRejected => goto(Unassociated),
            RxRlrq | RxRlre | RxPrst => rule(Unassociated, AbortTx),
            RxAbrt => goto(Unassociated),
            _ => None,
        },
        ConfigSending => match event {
            ReqSendConfig => rule(WaitingApproval, SendConfigTx),
            RxRoivGet => rule(ConfigSending, AgentGetMdsTx),
            RxRoivEventReport
            | RxRoivConfirmedEventReport
            | RxRoivSet
            | RxRoivConfirmedSet
            | RxRoivAction
            | RxRoivConfirmedAction => rule(ConfigSending, RoerTx),
            RxRors
            | RxRorsConfirmedEventReport
            | RxRorsConfirmedEventReportKnown
            | RxRorsConfirmedEventReportUnknown
            | RxRorsGet
            | RxRorsConfirmedSet
            | RxRorsConfirmedAction
            | RxRoer
            | RxRorj => rule(Unassociated, AbortTx),
            _ => associated_common(state, event),
        },
        WaitingApproval => match event {
            RxRorsConfirmedEventReportKnown => goto(Operating),
            RxRorsConfirmedEventReportUnknown => goto(ConfigSending),
            RxRoivGet => rule(ConfigSending, AgentGetMdsTx),
            RxRoivEventReport
            | RxRoivConfirmedEventReport
            | RxRoivSet
            | RxRoivConfirmedSet
            | RxRoivAction
            | RxRoivConfirmedAction => rule(ConfigSending, RoerTx),
            RxRors
            | RxRorsConfirmedEventReport
            | RxRorsGet
            | RxRorsConfirmedSet
            | RxRorsConfirmedAction
            | RxRoer
            | RxRorj => rule(Unassociated, AbortTx),
            _ => associated_common(state, event),
        },
        Operating => match event {
            ReqSendEvent => rule(Operating, AgentSendEventTx),
            RxRoivGet => rule(Operating, AgentGetMdsTx),
            RxRoivConfirmedEventReport | RxRoivConfirmedSet | RxRoivConfirmedAction => {
                rule(Operating, AgentRoivRespondTx)
            }
            RxRoivEventReport | RxRoivSet | RxRoivAction => goto(Operating),
            RxRors
            | RxRorsConfirmedEventReport
            | RxRorsConfirmedEventReportKnown
            | RxRorsConfirmedEventReportUnknown
            | RxRorsGet
            | RxRorsConfirmedSet
            | RxRorsConfirmedAction
            | RxRoer
            | RxRorj => rule(Operating, CheckInvokeIdAbortTx),
            _ => associated_common(state, event),
        },
        Disassociating => disassociating(event, None),
        WaitingForConfig | CheckingConfig => None,
    }
}
