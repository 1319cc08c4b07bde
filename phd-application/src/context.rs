//! Connection context
//!
//! One [`ConnectionContext`] exists per agent-manager connection. It owns
//! the state machine, the outbound link with its timer slot, the request
//! table and the configuration snapshot, and it is driven by three inputs:
//! received bytes, fired timers and application requests.
//!
//! Every input ends up as a [`FsmEvent`] fired through
//! [`ConnectionContext::fire`]. Firing sets the next state, notifies
//! listeners and then runs the transition's action, so events caused by the
//! action reach listeners after the transition that caused them.

use crate::config::EngineConfig;
use crate::configurations::ConfigurationRegistry;
use crate::fsm::{Action, FsmEvent, FsmOutcome, FsmState, StateMachine, Transition};
use crate::link::{Link, TimeoutKind};
use crate::listener::{ConnectionEvent, ConnectionListener, ContextId};
use crate::mds::Mds;
use crate::service::{RequestCallback, RequestOutcome, ServiceTable};
use crate::specialization::{Reading, Specialization};
use crate::{association, configuring, disassociating, operating};
use phd_asn1::{
    AbrtApdu, AbsoluteTime, ActionArgumentSimple, Apdu, AttributeModEntry, DataApdu, DataMessage,
    ErrorResult, GetArgumentSimple, MderEncode, PhdAssociationInformation, PrstApdu,
    SetArgumentSimple, SetTimeInvoke,
};
use phd_core::nomenclature::MDC_ACT_SET_TIME;
use phd_core::protocol::{MDS_HANDLE, Role, error_value};
use phd_core::{AbortReason, AssociateResult, ConfigResult, PhdError, PhdResult};
use phd_transport::{TimerHandle, TransportPlugin};
use std::sync::Arc;

/// Data travelling with a fired event to its action
#[derive(Debug, Clone, Default)]
pub(crate) enum EventData {
    #[default]
    None,
    /// Received DATA-APDU
    Data(DataApdu),
    /// Received DATA-APDU to be answered with a ROER
    Error { received: DataApdu, error_value: u16 },
    /// Result to put in an AARE
    AssociateResult(AssociateResult),
    /// Verdict on a configuration report
    Configuration {
        received: DataApdu,
        config_report_id: u16,
        result: ConfigResult,
    },
    /// Measurement to send
    Reading(Reading),
    /// Reason to put in an ABRT
    Abort(AbortReason),
}

impl EventData {
    pub(crate) fn received(&self) -> Option<&DataApdu> {
        match self {
            Self::Data(data) | Self::Error { received: data, .. } => Some(data),
            Self::Configuration { received, .. } => Some(received),
            _ => None,
        }
    }
}

/// State of one agent-manager connection
pub struct ConnectionContext {
    pub(crate) id: ContextId,
    pub(crate) fsm: StateMachine,
    pub(crate) link: Link,
    pub(crate) service: ServiceTable,
    pub(crate) config: EngineConfig,
    pub(crate) registry: Option<Arc<ConfigurationRegistry>>,
    pub(crate) specialization: Option<Arc<dyn Specialization>>,
    pub(crate) mds: Option<Mds>,
    pub(crate) peer: Option<PhdAssociationInformation>,
    pub(crate) association_retries: u8,
    pub(crate) config_retries: u8,
    pub(crate) release_retries: u8,
    pub(crate) release_pending: bool,
    pub(crate) scan_report_no: u16,
    listeners: Vec<Arc<dyn ConnectionListener>>,
}

impl ConnectionContext {
    /// Create a manager-side context
    ///
    /// # Arguments
    /// * `id` - Identifier used in notifications
    /// * `transport` - Outbound transport of the connection
    /// * `config` - Engine configuration
    /// * `registry` - Known configurations, shared between connections
    pub fn manager(
        id: ContextId,
        transport: Box<dyn TransportPlugin>,
        config: EngineConfig,
        registry: Arc<ConfigurationRegistry>,
    ) -> Self {
        let mut ctx = Self::new(id, Role::Manager, transport, config);
        ctx.registry = Some(registry);
        ctx
    }

    /// Create an agent-side context for a device of type `specialization`
    pub fn agent(
        id: ContextId,
        transport: Box<dyn TransportPlugin>,
        config: EngineConfig,
        specialization: Arc<dyn Specialization>,
    ) -> Self {
        let mut ctx = Self::new(id, Role::Agent, transport, config);
        ctx.specialization = Some(specialization);
        ctx
    }

    fn new(
        id: ContextId,
        role: Role,
        transport: Box<dyn TransportPlugin>,
        config: EngineConfig,
    ) -> Self {
        let link = Link::new(transport, config.codec());
        Self {
            id,
            fsm: StateMachine::new(role),
            link,
            service: ServiceTable::new(),
            config,
            registry: None,
            specialization: None,
            mds: None,
            peer: None,
            association_retries: 0,
            config_retries: 0,
            release_retries: 0,
            release_pending: false,
            scan_report_no: 0,
            listeners: Vec::new(),
        }
    }

    pub fn id(&self) -> ContextId {
        self.id
    }

    pub fn role(&self) -> Role {
        self.fsm.role()
    }

    pub fn state(&self) -> FsmState {
        self.fsm.state()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Configuration snapshot, once negotiated
    pub fn mds(&self) -> Option<&Mds> {
        self.mds.as_ref()
    }

    /// Association information announced by the peer
    pub fn peer(&self) -> Option<&PhdAssociationInformation> {
        self.peer.as_ref()
    }

    pub fn service(&self) -> &ServiceTable {
        &self.service
    }

    pub fn add_listener(&mut self, listener: Arc<dyn ConnectionListener>) {
        self.listeners.push(listener);
    }

    /// Transport connection established
    pub fn transport_connected(&mut self) -> PhdResult<FsmOutcome> {
        self.link.init()?;
        Ok(self.fire(FsmEvent::IndTransportConnection))
    }

    /// Transport connection lost
    pub fn transport_disconnected(&mut self) -> FsmOutcome {
        self.fire(FsmEvent::IndTransportDisconnect)
    }

    /// Close the transport and tear the connection down
    pub fn disconnect(&mut self) -> PhdResult<FsmOutcome> {
        self.link.disconnect()?;
        Ok(self.fire(FsmEvent::IndTransportDisconnect))
    }

    /// Decode and process one complete APDU
    ///
    /// Input that does not decode is dropped.
    pub fn process_input_data(&mut self, bytes: &[u8]) -> FsmOutcome {
        match self.link.codec().decode(bytes) {
            Ok(apdu) => self.process_apdu(apdu),
            Err(e) => {
                log::warn!(
                    "{}: dropping undecodable input ({} bytes, {:?}): {}",
                    self.id,
                    bytes.len(),
                    e.decode_kind(),
                    e
                );
                FsmOutcome::NotProcessed
            }
        }
    }

    /// Process one decoded APDU in the current state
    ///
    /// # Returns
    /// [`FsmOutcome::Changed`] whenever the state differs afterwards,
    /// including when an abort fired while handling the APDU
    pub fn process_apdu(&mut self, apdu: Apdu) -> FsmOutcome {
        log::debug!("{}: received {} in {}", self.id, apdu.name(), self.state());
        match self.state() {
            FsmState::Disconnected => {
                log::error!("{}: cannot process {} while disconnected", self.id, apdu.name());
                FsmOutcome::NotProcessed
            }
            FsmState::Unassociated | FsmState::Associating => association::process_apdu(self, apdu),
            FsmState::ConfigSending
            | FsmState::WaitingApproval
            | FsmState::WaitingForConfig
            | FsmState::CheckingConfig => configuring::process_apdu(self, apdu),
            FsmState::Operating => operating::process_apdu(self, apdu),
            FsmState::Disassociating => disassociating::process_apdu(self, apdu),
        }
    }

    /// A timer started through the transport expired
    pub fn timer_fired(&mut self, handle: TimerHandle) -> FsmOutcome {
        let Some(kind) = self.link.take_fired(handle) else {
            log::debug!("{}: ignoring stale {}", self.id, handle);
            return FsmOutcome::NotProcessed;
        };
        log::debug!("{}: {:?} timer expired in {}", self.id, kind, self.state());

        match kind {
            TimeoutKind::Association => {
                if self.state() == FsmState::Associating
                    && self.association_retries < self.config.retries.association
                {
                    self.association_retries += 1;
                    log::info!(
                        "{}: retransmitting AARQ ({}/{})",
                        self.id,
                        self.association_retries,
                        self.config.retries.association
                    );
                    if let Err(e) = association::send_aarq(self) {
                        log::error!("{}: AARQ retransmission failed: {}", self.id, e);
                    }
                    return FsmOutcome::Unchanged;
                }
                self.timeout(AbortReason::ResponseTimeout)
            }
            TimeoutKind::Configuring => self.timeout(AbortReason::ConfigurationTimeout),
            TimeoutKind::Release => {
                if self.state() == FsmState::Disassociating
                    && self.release_retries < self.config.retries.release
                {
                    self.release_retries += 1;
                    log::info!(
                        "{}: retransmitting RLRQ ({}/{})",
                        self.id,
                        self.release_retries,
                        self.config.retries.release
                    );
                    if let Err(e) = disassociating::send_release_request(self) {
                        log::error!("{}: RLRQ retransmission failed: {}", self.id, e);
                    }
                    return FsmOutcome::Unchanged;
                }
                self.timeout(AbortReason::ResponseTimeout)
            }
            TimeoutKind::Request { invoke_id } => {
                self.service.timeout_fired(invoke_id);
                self.timeout(AbortReason::ResponseTimeout)
            }
        }
    }

    fn timeout(&mut self, reason: AbortReason) -> FsmOutcome {
        self.notify(ConnectionEvent::Timeout { context: self.id });
        self.fire_with(FsmEvent::IndTimeout, EventData::Abort(reason))
    }

    /// Agent: start the association
    pub fn associate(&mut self) -> FsmOutcome {
        self.fire(FsmEvent::ReqAssoc)
    }

    /// Agent: send one measurement as an unconfirmed event report
    pub fn send_data(&mut self, reading: Reading) -> PhdResult<()> {
        if self.role() != Role::Agent || self.state() != FsmState::Operating {
            return Err(PhdError::InvalidState(format!(
                "Cannot send data as {} in {}",
                self.role(),
                self.state()
            )));
        }
        match self.fire_with(FsmEvent::ReqSendEvent, EventData::Reading(reading)) {
            FsmOutcome::NotProcessed => Err(PhdError::InvalidState(format!(
                "Event report not sent in {}",
                self.state()
            ))),
            _ => Ok(()),
        }
    }

    /// Release the association normally
    pub fn request_association_release(&mut self) -> FsmOutcome {
        self.fire(FsmEvent::ReqAssocRel)
    }

    /// Abort the association
    pub fn request_association_abort(&mut self) -> FsmOutcome {
        self.fire(FsmEvent::ReqAssocAbort)
    }

    /// Manager: read attributes of an agent object
    ///
    /// An empty `attribute_ids` list asks for every attribute.
    ///
    /// # Returns
    /// The invoke id of the request
    pub fn request_get(
        &mut self,
        obj_handle: u16,
        attribute_ids: Vec<u16>,
        callback: RequestCallback,
    ) -> PhdResult<u16> {
        self.send_request(
            DataMessage::RoivGet(GetArgumentSimple {
                obj_handle,
                attribute_id_list: attribute_ids,
            }),
            callback,
        )
    }

    /// Manager: modify attributes of an agent object (confirmed SET)
    pub fn request_set(
        &mut self,
        obj_handle: u16,
        modifications: Vec<AttributeModEntry>,
        callback: RequestCallback,
    ) -> PhdResult<u16> {
        self.send_request(
            DataMessage::RoivConfirmedSet(SetArgumentSimple {
                obj_handle,
                modification_list: modifications,
            }),
            callback,
        )
    }

    /// Manager: set the agent clock
    pub fn request_set_time(
        &mut self,
        time: AbsoluteTime,
        callback: RequestCallback,
    ) -> PhdResult<u16> {
        let args = SetTimeInvoke {
            date_time: time,
            accuracy: 0.0,
        };
        self.request_action(MDS_HANDLE, MDC_ACT_SET_TIME, args.to_bytes()?, callback)
    }

    /// Manager: invoke a confirmed ACTION on an agent object
    pub fn request_action(
        &mut self,
        obj_handle: u16,
        action_type: u16,
        action_info_args: Vec<u8>,
        callback: RequestCallback,
    ) -> PhdResult<u16> {
        self.send_request(
            DataMessage::RoivConfirmedAction(ActionArgumentSimple {
                obj_handle,
                action_type,
                action_info_args,
            }),
            callback,
        )
    }

    fn send_request(&mut self, message: DataMessage, callback: RequestCallback) -> PhdResult<u16> {
        if self.role() != Role::Manager || self.state() != FsmState::Operating {
            return Err(PhdError::InvalidState(format!(
                "Cannot send {} as {} in {}",
                message.name(),
                self.role(),
                self.state()
            )));
        }
        let timeout = self.config.timeouts.request;
        self.service.send_remote_operation_request(
            &mut self.link,
            DataApdu::new(0, message),
            timeout,
            callback,
        )
    }

    /// Fire an event without data
    pub(crate) fn fire(&mut self, event: FsmEvent) -> FsmOutcome {
        self.fire_with(event, EventData::None)
    }

    /// Fire an event: set the next state, notify, run the action
    pub(crate) fn fire_with(&mut self, event: FsmEvent, data: EventData) -> FsmOutcome {
        let Some(transition) = self.fsm.process(event) else {
            return FsmOutcome::NotProcessed;
        };
        let changed = transition.from != transition.to;

        if changed {
            // A request still in flight keeps its timer through a release
            if transition.to != FsmState::Disassociating {
                self.link.cancel_timeout();
            }
            self.state_changed(transition.from, transition.to);
        }

        if let Some(action) = transition.action
            && let Err(e) = self.run_action(action, &transition, data)
        {
            log::error!("{}: action {:?} failed: {}", self.id, action, e);
        }

        if changed
            && transition.to == FsmState::ConfigSending
            && self.state() == FsmState::ConfigSending
        {
            self.fire(FsmEvent::ReqSendConfig);
        }
        // events fired by the action count
        if self.state() != transition.from {
            FsmOutcome::Changed
        } else {
            transition.outcome()
        }
    }

    fn run_action(&mut self, action: Action, transition: &Transition, data: EventData) -> PhdResult<()> {
        match action {
            Action::AbortTx => self.abort_tx(&data),
            Action::RoerTx => self.roer_tx(&data),
            Action::CheckInvokeIdAbortTx => {
                self.check_invoke_id_abort(&data);
                Ok(())
            }
            Action::AgentMds => association::agent_mds(self),
            Action::AarqTx => association::aarq_tx(self),
            Action::AcceptConfigTx => association::accept_config_tx(self, &data),
            Action::WaitForConfigTx => association::wait_for_config_tx(self, &data),
            Action::UnacceptConfigTx => association::unaccept_config_tx(self, &data),
            Action::AareRejectedPermanentTx => association::aare_rejected_permanent_tx(self),
            Action::PerformConfiguration => configuring::perform_configuration(self, &data),
            Action::ConfigurationResponseTx => configuring::configuration_response_tx(self, &data),
            Action::NewMeasurementsResponseTx => {
                configuring::new_measurements_response_tx(self, &data)
            }
            Action::SendConfigTx => configuring::send_config_tx(self),
            Action::EventReport => operating::event_report(self, &data),
            Action::GetResponse | Action::SetResponse | Action::ActionResponse => {
                operating::response(self, &data)
            }
            Action::AgentGetMdsTx => operating::agent_get_mds_tx(self, &data),
            Action::AgentRoivRespondTx => operating::agent_roiv_respond_tx(self, &data),
            Action::AgentSendEventTx => operating::agent_send_event_tx(self, data),
            Action::ReleaseRequestTx => disassociating::release_request_tx(self, transition),
            Action::ReleaseResponseTx => disassociating::release_response_tx(self),
        }
    }

    fn state_changed(&mut self, from: FsmState, to: FsmState) {
        match to {
            FsmState::Unassociated | FsmState::Disconnected => {
                self.service.finalize();
                self.service
                    .release_all(&mut self.link, RequestOutcome::Disassociated);
                self.release_pending = false;
                self.peer = None;
                if self.role() == Role::Manager || to == FsmState::Disconnected {
                    self.mds = None;
                }
                if to == FsmState::Disconnected {
                    self.link.cancel_timeout();
                }
            }
            FsmState::ConfigSending if from == FsmState::WaitingApproval => {
                self.service
                    .release_all(&mut self.link, RequestOutcome::Disassociated);
                self.service.reset(&mut self.link);
            }
            _ => {}
        }

        self.notify(ConnectionEvent::StateChanged {
            context: self.id,
            from,
            to,
        });
        if from == FsmState::Disconnected && to == FsmState::Unassociated {
            self.notify(ConnectionEvent::Connected { context: self.id });
        }
        if to == FsmState::Operating {
            self.notify(ConnectionEvent::Associated { context: self.id });
        }
        if from == FsmState::Operating {
            self.notify(ConnectionEvent::Unavailable { context: self.id });
        }
        if to == FsmState::Disconnected {
            self.notify(ConnectionEvent::Disconnected { context: self.id });
        }
    }

    pub(crate) fn notify(&self, event: ConnectionEvent) {
        for listener in &self.listeners {
            listener.on_event(&event);
        }
    }

    pub(crate) fn send_data_apdu(&mut self, data: DataApdu) -> PhdResult<()> {
        self.link.send(&Apdu::prst(data))
    }

    pub(crate) fn send_roer(&mut self, invoke_id: u16, error_value: u16) -> PhdResult<()> {
        log::debug!("{}: sending ROER {} for invoke {}", self.id, error_value, invoke_id);
        self.send_data_apdu(DataApdu::new(
            invoke_id,
            DataMessage::Roer(ErrorResult::new(error_value)),
        ))
    }

    fn abort_tx(&mut self, data: &EventData) -> PhdResult<()> {
        let reason = match data {
            EventData::Abort(reason) => *reason,
            _ => AbortReason::Undefined,
        };
        log::info!("{}: aborting association ({:?})", self.id, reason);
        self.link.send(&Apdu::Abrt(AbrtApdu { reason }))
    }

    fn roer_tx(&mut self, data: &EventData) -> PhdResult<()> {
        let (received, error_value) = match data {
            EventData::Error {
                received,
                error_value,
            } => (received, *error_value),
            EventData::Data(received) => (received, error_value::NO_SUCH_OBJECT_INSTANCE),
            _ => {
                log::warn!("{}: no invoke to answer with ROER", self.id);
                return Ok(());
            }
        };
        if !received.message.expects_response() {
            log::debug!("{}: dropping unexpected {}", self.id, received.message.name());
            return Ok(());
        }
        self.send_roer(received.invoke_id, error_value)
    }

    /// Retire the request answered by the received response
    ///
    /// # Returns
    /// `false` if the response matched no pending request, in which case
    /// the association has been aborted
    pub(crate) fn check_invoke_id_abort(&mut self, data: &EventData) -> bool {
        let Some(response) = data.received() else {
            return true;
        };
        if self.service.request_retired(&mut self.link, response) {
            disassociating::release_if_idle(self);
            return true;
        }
        log::warn!(
            "{}: {} with unknown invoke id {}, aborting",
            self.id,
            response.message.name(),
            response.invoke_id
        );
        self.fire(FsmEvent::ReqAssocAbort);
        false
    }

    /// Take the DATA-APDU out of a PRST, aborting on malformed content
    pub(crate) fn open_prst(&mut self, prst: PrstApdu) -> Result<DataApdu, FsmOutcome> {
        prst.into_data_apdu().map_err(|e| {
            log::warn!("{}: malformed DATA-APDU in {}: {}", self.id, self.state(), e);
            self.fire(FsmEvent::ReqAssocAbort)
        })
    }
}

/// Event fired for APDUs other than PRST in an associated state
pub(crate) fn session_event(apdu: &Apdu) -> Option<FsmEvent> {
    match apdu {
        Apdu::Aarq(_) => Some(FsmEvent::RxAarq),
        Apdu::Aare(_) => Some(FsmEvent::RxAare),
        Apdu::Rlrq(_) => Some(FsmEvent::RxRlrq),
        Apdu::Rlre(_) => Some(FsmEvent::RxRlre),
        Apdu::Abrt(abrt) => {
            log::info!("Peer aborted the association ({:?})", abrt.reason);
            Some(FsmEvent::RxAbrt)
        }
        Apdu::Prst(_) => None,
    }
}

impl std::fmt::Debug for ConnectionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionContext")
            .field("id", &self.id)
            .field("role", &self.role())
            .field("state", &self.state())
            .field("link", &self.link)
            .field("service", &self.service)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::link::tests::RecordingTransport;
    use crate::listener::CallbackListener;
    use crate::specialization::PulseOximeter;
    use phd_asn1::{
        AareApdu, AarqApdu, ActionResultSimple, DataProto, EventReportArgumentSimple,
        EventReportResultSimple, GetResultSimple, RejectResult, RlreApdu, RlrqApdu,
    };
    use phd_core::nomenclature::MDC_NOTI_CONFIG;
    use std::sync::Mutex;

    pub(crate) const AGENT_ID: [u8; 8] = [0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88];
    pub(crate) const MANAGER_ID: [u8; 8] = [0xA1, 0xA2, 0xA3, 0xA4, 0xA5, 0xA6, 0xA7, 0xA8];

    pub(crate) fn manager() -> (ConnectionContext, RecordingTransport) {
        let transport = RecordingTransport::default();
        let ctx = ConnectionContext::manager(
            ContextId(1),
            Box::new(transport.clone()),
            EngineConfig::for_role(Role::Manager).with_system_id(MANAGER_ID),
            Arc::new(ConfigurationRegistry::with_defaults()),
        );
        (ctx, transport)
    }

    pub(crate) fn agent(config_id: u16) -> (ConnectionContext, RecordingTransport) {
        let transport = RecordingTransport::default();
        let ctx = ConnectionContext::agent(
            ContextId(2),
            Box::new(transport.clone()),
            EngineConfig::for_role(Role::Agent).with_system_id(AGENT_ID),
            Arc::new(PulseOximeter::new(config_id)),
        );
        (ctx, transport)
    }

    fn recorded_events(ctx: &mut ConnectionContext) -> Arc<Mutex<Vec<ConnectionEvent>>> {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        ctx.add_listener(Arc::new(CallbackListener::new(move |event: &ConnectionEvent| {
            sink.lock().unwrap().push(event.clone());
        })));
        events
    }

    fn agent_aarq() -> Apdu {
        let (mut agent, transport) = agent(0x0190);
        agent.transport_connected().unwrap();
        agent.associate();
        transport.take_sent().remove(0)
    }

    fn aare_result(apdu: &Apdu) -> AssociateResult {
        match apdu {
            Apdu::Aare(aare) => aare.result,
            other => panic!("expected AARE, got {}", other.name()),
        }
    }

    fn every_apdu() -> Vec<Apdu> {
        let event = EventReportArgumentSimple {
            obj_handle: 0,
            event_time: 0,
            event_type: MDC_NOTI_CONFIG,
            event_info: Vec::new(),
        };
        let messages = vec![
            DataMessage::RoivEventReport(event.clone()),
            DataMessage::RoivConfirmedEventReport(event),
            DataMessage::RoivGet(GetArgumentSimple::default()),
            DataMessage::RoivSet(SetArgumentSimple::default()),
            DataMessage::RoivConfirmedSet(SetArgumentSimple::default()),
            DataMessage::RoivAction(ActionArgumentSimple::default()),
            DataMessage::RoivConfirmedAction(ActionArgumentSimple::default()),
            DataMessage::RorsConfirmedEventReport(EventReportResultSimple::default()),
            DataMessage::RorsGet(GetResultSimple::default()),
            DataMessage::RorsConfirmedSet(GetResultSimple::default()),
            DataMessage::RorsConfirmedAction(ActionResultSimple::default()),
            DataMessage::Roer(ErrorResult::new(error_value::ACCESS_DENIED)),
            DataMessage::Rorj(RejectResult::default()),
        ];
        let mut apdus = vec![
            Apdu::Aarq(AarqApdu {
                assoc_version: 0,
                data_proto_list: Vec::new(),
            }),
            Apdu::Aare(AareApdu {
                result: AssociateResult::Accepted,
                selected_data_proto: DataProto::default(),
            }),
            Apdu::Rlrq(RlrqApdu { reason: 0 }),
            Apdu::Rlre(RlreApdu { reason: 0 }),
            Apdu::Abrt(AbrtApdu {
                reason: AbortReason::Undefined,
            }),
        ];
        apdus.extend(
            messages
                .into_iter()
                .map(|message| Apdu::prst(DataApdu::new(5, message))),
        );
        apdus
    }

    #[test]
    fn test_every_apdu_handled_in_every_state() {
        let roles = [
            (
                Role::Manager,
                vec![
                    FsmState::Unassociated,
                    FsmState::WaitingForConfig,
                    FsmState::CheckingConfig,
                    FsmState::Operating,
                    FsmState::Disassociating,
                ],
            ),
            (
                Role::Agent,
                vec![
                    FsmState::Unassociated,
                    FsmState::Associating,
                    FsmState::ConfigSending,
                    FsmState::WaitingApproval,
                    FsmState::Operating,
                    FsmState::Disassociating,
                ],
            ),
        ];
        for (role, states) in roles {
            for state in states {
                for apdu in every_apdu() {
                    let (mut ctx, _) = match role {
                        Role::Manager => manager(),
                        Role::Agent => agent(0x0190),
                    };
                    ctx.transport_connected().unwrap();
                    ctx.fsm.force_state(state);
                    let name = apdu.name();
                    let outcome = ctx.process_apdu(apdu);
                    assert_ne!(
                        outcome,
                        FsmOutcome::NotProcessed,
                        "{role} in {state} left {name} unhandled"
                    );
                }
            }
        }
    }

    #[test]
    fn test_manager_rejects_bad_assoc_version() {
        let (mut manager, transport) = manager();
        manager.transport_connected().unwrap();
        manager.process_apdu(Apdu::Aarq(AarqApdu {
            assoc_version: 0,
            data_proto_list: Vec::new(),
        }));
        let sent = transport.take_sent();
        assert_eq!(aare_result(&sent[0]), AssociateResult::RejectedUnsupportedAssocVersion);
        assert_eq!(manager.state(), FsmState::Unassociated);
    }

    #[test]
    fn test_manager_rejects_missing_protocol() {
        let (mut manager, transport) = manager();
        manager.transport_connected().unwrap();
        let Apdu::Aarq(mut aarq) = agent_aarq() else {
            panic!("expected AARQ");
        };
        aarq.data_proto_list[0].data_proto_id = 1234;
        manager.process_apdu(Apdu::Aarq(aarq));
        assert_eq!(
            aare_result(&transport.take_sent()[0]),
            AssociateResult::RejectedNoCommonProtocol
        );
    }

    #[test]
    fn test_manager_rejects_protocol_version() {
        let (mut manager, transport) = manager();
        manager.transport_connected().unwrap();
        let Apdu::Aarq(mut aarq) = agent_aarq() else {
            panic!("expected AARQ");
        };
        let mut info = aarq.data_proto_list[0].phd_info().unwrap();
        info.protocol_version = 0x4000_0000;
        aarq.data_proto_list[0] = DataProto::phd(&info).unwrap();
        manager.process_apdu(Apdu::Aarq(aarq));
        assert_eq!(
            aare_result(&transport.take_sent()[0]),
            AssociateResult::RejectedNoCommonParameter
        );
    }

    #[test]
    fn test_manager_accepts_known_configuration() {
        let (mut manager, transport) = manager();
        let events = recorded_events(&mut manager);
        manager.transport_connected().unwrap();
        let outcome = manager.process_apdu(agent_aarq());

        assert_eq!(outcome, FsmOutcome::Changed);
        assert_eq!(manager.state(), FsmState::Operating);
        assert_eq!(aare_result(&transport.take_sent()[0]), AssociateResult::Accepted);
        assert_eq!(manager.mds().map(|m| m.objects().count()), Some(2));
        assert_eq!(manager.peer().map(|p| p.system_id.clone()), Some(AGENT_ID.to_vec()));

        let events = events.lock().unwrap();
        assert!(events.contains(&ConnectionEvent::Connected { context: ContextId(1) }));
        assert!(events.contains(&ConnectionEvent::Associated { context: ContextId(1) }));
    }

    #[test]
    fn test_agent_retransmits_aarq_then_aborts() {
        let (mut agent, transport) = agent(0x0190);
        let events = recorded_events(&mut agent);
        agent.transport_connected().unwrap();
        agent.associate();

        for _ in 0..3 {
            let timer = transport.last_timer().unwrap();
            assert_eq!(agent.timer_fired(timer), FsmOutcome::Unchanged);
        }
        let sent = transport.take_sent();
        assert_eq!(sent.iter().filter(|a| matches!(a, Apdu::Aarq(_))).count(), 4);

        let timer = transport.last_timer().unwrap();
        assert_eq!(agent.timer_fired(timer), FsmOutcome::Changed);
        assert_eq!(agent.state(), FsmState::Unassociated);
        assert_eq!(
            transport.take_sent(),
            vec![Apdu::Abrt(AbrtApdu {
                reason: AbortReason::ResponseTimeout
            })]
        );
        assert!(events
            .lock()
            .unwrap()
            .contains(&ConnectionEvent::Timeout { context: ContextId(2) }));
        // stale handle
        assert_eq!(agent.timer_fired(timer), FsmOutcome::NotProcessed);
    }

    #[test]
    fn test_unknown_invoke_id_aborts() {
        let (mut manager, transport) = manager();
        manager.transport_connected().unwrap();
        manager.process_apdu(agent_aarq());
        transport.take_sent();

        let outcome = manager.process_apdu(Apdu::prst(DataApdu::new(
            9,
            DataMessage::RorsGet(GetResultSimple::default()),
        )));
        assert_eq!(outcome, FsmOutcome::Changed);
        assert_eq!(manager.state(), FsmState::Unassociated);
        assert!(matches!(transport.take_sent()[..], [Apdu::Abrt(_)]));
    }

    #[test]
    fn test_get_request_retired_once() {
        let (mut manager, transport) = manager();
        manager.transport_connected().unwrap();
        manager.process_apdu(agent_aarq());
        transport.take_sent();

        let outcomes = Arc::new(Mutex::new(Vec::new()));
        let sink = outcomes.clone();
        let invoke_id = manager
            .request_get(
                MDS_HANDLE,
                Vec::new(),
                Box::new(move |outcome| sink.lock().unwrap().push(outcome)),
            )
            .unwrap();
        assert!(matches!(
            &transport.take_sent()[..],
            [Apdu::Prst(PrstApdu::Encoded(_))]
        ));

        let response = DataApdu::new(
            invoke_id,
            DataMessage::RorsGet(GetResultSimple {
                obj_handle: MDS_HANDLE,
                attribute_list: Vec::new(),
            }),
        );
        manager.process_apdu(Apdu::prst(response.clone()));
        assert_eq!(manager.state(), FsmState::Operating);
        assert_eq!(outcomes.lock().unwrap().len(), 1);

        // a duplicate now matches nothing and aborts
        manager.process_apdu(Apdu::prst(response));
        assert_eq!(outcomes.lock().unwrap().len(), 1);
        assert_eq!(manager.state(), FsmState::Unassociated);
    }

    #[test]
    fn test_requests_need_operating() {
        let (mut manager, _) = manager();
        manager.transport_connected().unwrap();
        let err = manager
            .request_get(MDS_HANDLE, Vec::new(), Box::new(|_| {}))
            .unwrap_err();
        assert!(matches!(err, PhdError::InvalidState(_)));

        let (mut agent, _) = agent(0x0190);
        agent.transport_connected().unwrap();
        let reading = PulseOximeter::reading(97.0, 72.0, AbsoluteTime::default());
        assert!(agent.send_data(reading).is_err());
    }

    #[test]
    fn test_disconnect_clears_state() {
        let (mut manager, transport) = manager();
        let events = recorded_events(&mut manager);
        manager.transport_connected().unwrap();
        manager.process_apdu(agent_aarq());
        manager.disconnect().unwrap();

        assert_eq!(manager.state(), FsmState::Disconnected);
        assert!(manager.mds().is_none());
        assert!(transport.0.lock().unwrap().disconnected);
        let events = events.lock().unwrap();
        assert!(events.contains(&ConnectionEvent::Unavailable { context: ContextId(1) }));
        assert!(events.contains(&ConnectionEvent::Disconnected { context: ContextId(1) }));
    }

    #[test]
    fn test_undecodable_input_dropped() {
        let (mut manager, transport) = manager();
        manager.transport_connected().unwrap();
        assert_eq!(
            manager.process_input_data(&[0xE2, 0x00, 0x00, 0x10, 0x00]),
            FsmOutcome::NotProcessed
        );
        assert_eq!(manager.state(), FsmState::Unassociated);
        assert!(transport.take_sent().is_empty());
    }
}
