//! End-to-end exchanges between an agent and a manager context, wired back
//! to back through in-process transports.

use phd::application::{
    BloodPressureMonitor, CallbackListener, ConfigurationRegistry, ConnectionContext,
    ConnectionEvent, ContextId, EngineConfig, FsmState, Glucometer, InMemoryExtConfigStore,
    ObservedValue, PulseOximeter, Reading, RequestOutcome, ScanReport, Specialization,
    WeighingScale,
};
use phd::application::specialization::pulse_oximeter::{HANDLE_PULSE_RATE, HANDLE_SPO2};
use phd::asn1::mder::decode_sfloat;
use phd::asn1::{
    AbsoluteTime, Apdu, ApduCodec, ConfigReportRsp, DataApdu, DataMessage, GetResultSimple,
    MderDecode, ScanReportInfoFixed,
};
use phd::nomenclature::MDC_NOTI_CONFIG;
use phd::transport::{TimerHandle, TransportPlugin};
use phd::{AssociateResult, ConfigResult, PhdResult, Role};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

const AGENT_SYSTEM_ID: [u8; 8] = [0x00, 0x1C, 0x05, 0xFF, 0xFE, 0x12, 0x34, 0x56];
const MANAGER_SYSTEM_ID: [u8; 8] = [0x00, 0x1C, 0x05, 0xFF, 0xFE, 0xAB, 0xCD, 0xEF];

/// Frames one side sent and the other has not read yet
#[derive(Clone, Default)]
struct Wire(Arc<Mutex<VecDeque<Vec<u8>>>>);

impl Wire {
    fn pop(&self) -> Option<Vec<u8>> {
        self.0.lock().unwrap().pop_front()
    }
}

struct Loopback {
    outgoing: Wire,
    next_timer: u64,
}

impl TransportPlugin for Loopback {
    fn send_apdu(&mut self, apdu: &[u8]) -> PhdResult<()> {
        self.outgoing.0.lock().unwrap().push_back(apdu.to_vec());
        Ok(())
    }

    fn disconnect(&mut self) -> PhdResult<()> {
        Ok(())
    }

    fn count_timeout(&mut self, _seconds: u64) -> TimerHandle {
        self.next_timer += 1;
        TimerHandle(self.next_timer)
    }

    fn reset_timeout(&mut self, _handle: TimerHandle) {}
}

struct Pair {
    agent: ConnectionContext,
    manager: ConnectionContext,
    to_manager: Wire,
    to_agent: Wire,
    manager_events: Arc<Mutex<Vec<ConnectionEvent>>>,
    /// Every frame that crossed the wire, tagged with its sender
    trace: Vec<(Role, Vec<u8>)>,
}

impl Pair {
    fn new(registry: Arc<ConfigurationRegistry>) -> Self {
        Self::with_specialization(registry, Arc::new(PulseOximeter::new(0x0190)))
    }

    fn with_specialization(
        registry: Arc<ConfigurationRegistry>,
        specialization: Arc<dyn Specialization>,
    ) -> Self {
        let to_manager = Wire::default();
        let to_agent = Wire::default();
        let agent = ConnectionContext::agent(
            ContextId(1),
            Box::new(Loopback {
                outgoing: to_manager.clone(),
                next_timer: 0,
            }),
            EngineConfig::for_role(Role::Agent).with_system_id(AGENT_SYSTEM_ID),
            specialization,
        );
        let mut manager = ConnectionContext::manager(
            ContextId(2),
            Box::new(Loopback {
                outgoing: to_agent.clone(),
                next_timer: 0,
            }),
            EngineConfig::for_role(Role::Manager).with_system_id(MANAGER_SYSTEM_ID),
            registry,
        );
        let manager_events = Arc::new(Mutex::new(Vec::new()));
        let sink = manager_events.clone();
        manager.add_listener(Arc::new(CallbackListener::new(move |event: &ConnectionEvent| {
            sink.lock().unwrap().push(event.clone());
        })));
        Self {
            agent,
            manager,
            to_manager,
            to_agent,
            manager_events,
            trace: Vec::new(),
        }
    }

    /// Deliver frames both ways until the wire is quiet
    fn pump(&mut self) {
        loop {
            if let Some(frame) = self.to_manager.pop() {
                self.manager.process_input_data(&frame);
                self.trace.push((Role::Agent, frame));
            } else if let Some(frame) = self.to_agent.pop() {
                self.agent.process_input_data(&frame);
                self.trace.push((Role::Manager, frame));
            } else {
                return;
            }
        }
    }

    fn connect(&mut self) {
        self.agent.transport_connected().unwrap();
        self.manager.transport_connected().unwrap();
    }

    fn associated(registry: Arc<ConfigurationRegistry>) -> Self {
        let mut pair = Self::new(registry);
        pair.connect();
        pair.agent.associate();
        pair.pump();
        assert_eq!(pair.agent.state(), FsmState::Operating);
        assert_eq!(pair.manager.state(), FsmState::Operating);
        pair.trace.clear();
        pair
    }

    fn decoded_trace(&self) -> Vec<(Role, Apdu)> {
        let codec = ApduCodec::default();
        self.trace
            .iter()
            .map(|(role, frame)| (*role, codec.decode(frame).unwrap()))
            .collect()
    }
}

/// Manager that has to learn the oximeter configuration from the agent
fn empty_registry() -> Arc<ConfigurationRegistry> {
    Arc::new(ConfigurationRegistry::new(Arc::new(
        InMemoryExtConfigStore::new(),
    )))
}

fn data(apdu: &Apdu) -> DataApdu {
    match apdu {
        Apdu::Prst(prst) => prst.data_apdu().unwrap().into_owned(),
        other => panic!("expected PRST, got {}", other.name()),
    }
}

fn reading_time() -> AbsoluteTime {
    AbsoluteTime {
        century: 0x20,
        year: 0x26,
        month: 0x10,
        day: 0x19,
        hour: 0x08,
        minute: 0x30,
        second: 0x00,
        sec_fractions: 0x00,
    }
}

#[test]
fn scenario_unknown_configuration_is_learned() {
    let mut pair = Pair::new(empty_registry());
    pair.connect();
    pair.agent.associate();
    pair.pump();

    let trace = pair.decoded_trace();
    assert_eq!(trace.len(), 4);

    let (Role::Agent, Apdu::Aarq(aarq)) = &trace[0] else {
        panic!("expected the agent's AARQ first");
    };
    let info = aarq.phd_data_proto().unwrap().phd_info().unwrap();
    assert_eq!(info.dev_config_id, 0x0190);
    assert_eq!(info.system_id, AGENT_SYSTEM_ID);

    let (Role::Manager, Apdu::Aare(aare)) = &trace[1] else {
        panic!("expected the manager's AARE second");
    };
    assert_eq!(aare.result, AssociateResult::AcceptedUnknownConfig);

    let (Role::Agent, report) = &trace[2] else {
        panic!("expected the agent's configuration report");
    };
    let report = data(report);
    let DataMessage::RoivConfirmedEventReport(event) = &report.message else {
        panic!("expected a confirmed event report, got {}", report.message.name());
    };
    assert_eq!(event.event_type, MDC_NOTI_CONFIG);

    let (Role::Manager, answer) = &trace[3] else {
        panic!("expected the manager's answer");
    };
    let answer = data(answer);
    assert_eq!(answer.invoke_id, report.invoke_id);
    let DataMessage::RorsConfirmedEventReport(result) = &answer.message else {
        panic!("expected RORS, got {}", answer.message.name());
    };
    let rsp = ConfigReportRsp::from_bytes(&result.event_reply_info).unwrap();
    assert_eq!(rsp.config_report_id, 0x0190);
    assert_eq!(rsp.config_result, ConfigResult::AcceptedConfig);

    assert_eq!(pair.agent.state(), FsmState::Operating);
    assert_eq!(pair.manager.state(), FsmState::Operating);
    assert!(pair
        .manager_events
        .lock()
        .unwrap()
        .contains(&ConnectionEvent::Associated { context: ContextId(2) }));
}

#[test]
fn scenario_measurement_reaches_manager() {
    let mut pair = Pair::associated(empty_registry());
    pair.agent
        .send_data(PulseOximeter::reading(97.0, 72.0, reading_time()))
        .unwrap();
    pair.pump();

    // unconfirmed: nothing comes back
    let trace = pair.decoded_trace();
    assert_eq!(trace.len(), 1);
    let report = data(&trace[0].1);
    let DataMessage::RoivEventReport(event) = &report.message else {
        panic!("expected an unconfirmed event report, got {}", report.message.name());
    };
    let scan = ScanReportInfoFixed::from_bytes(&event.event_info).unwrap();
    assert_eq!(scan.obs_scan_fixed.len(), 2);

    let events = pair.manager_events.lock().unwrap();
    let report = events
        .iter()
        .find_map(|event| match event {
            ConnectionEvent::Measurement { report, .. } => Some(report.clone()),
            _ => None,
        })
        .expect("no measurement notified");
    let ScanReport::Fixed(decoded) = &report.scan else {
        panic!("expected a fixed scan report");
    };
    assert_eq!(decoded, &scan);

    let spo2 = report.observation(HANDLE_SPO2).unwrap();
    let pulse = report.observation(HANDLE_PULSE_RATE).unwrap();
    let spo2_value = spo2.value.as_ref().and_then(|v| v.as_f64()).unwrap();
    let pulse_value = pulse.value.as_ref().and_then(|v| v.as_f64()).unwrap();
    assert!((spo2_value - 97.0).abs() < 1e-6);
    assert!((pulse_value - 72.0).abs() < 1e-6);
    assert_eq!(spo2.timestamp, Some(reading_time()));

    let raw = u16::from_be_bytes([
        scan.obs_scan_fixed[0].obs_val_data[0],
        scan.obs_scan_fixed[0].obs_val_data[1],
    ]);
    assert!((decode_sfloat(raw) - 97.0).abs() < 1e-6);
}

#[test]
fn scenario_release_retires_pending_requests() {
    let mut pair = Pair::associated(Arc::new(ConfigurationRegistry::with_defaults()));

    let outcomes = Arc::new(Mutex::new(Vec::new()));
    let mut invoke_ids = Vec::new();
    for _ in 0..2 {
        let sink = outcomes.clone();
        let id = pair
            .manager
            .request_get(
                0,
                Vec::new(),
                Box::new(move |outcome| sink.lock().unwrap().push(outcome)),
            )
            .unwrap();
        invoke_ids.push(id);
    }
    assert_eq!(pair.manager.service().pending_count(), 2);

    pair.manager.request_association_release();
    assert_eq!(pair.manager.state(), FsmState::Disassociating);
    // the queued request never went out
    assert!(matches!(
        outcomes.lock().unwrap()[..],
        [RequestOutcome::Disassociated]
    ));

    pair.pump();
    let trace = pair.decoded_trace();
    let names: Vec<(Role, &str)> = trace.iter().map(|(role, apdu)| (*role, apdu.name())).collect();
    assert_eq!(
        names,
        vec![
            (Role::Manager, "PRST"),
            (Role::Agent, "PRST"),
            (Role::Manager, "RLRQ"),
            (Role::Agent, "RLRE"),
        ]
    );
    let Apdu::Rlrq(rlrq) = &trace[2].1 else { unreachable!() };
    assert_eq!(rlrq.reason, 0);
    let Apdu::Rlre(rlre) = &trace[3].1 else { unreachable!() };
    assert_eq!(rlre.reason, 0);

    {
        let outcomes = outcomes.lock().unwrap();
        assert_eq!(outcomes.len(), 2);
        assert!(matches!(&outcomes[1], RequestOutcome::Response(r) if r.invoke_id == invoke_ids[0]));
    }
    assert_eq!(pair.manager.service().pending_count(), 0);
    assert_eq!(pair.agent.state(), FsmState::Unassociated);
    assert_eq!(pair.manager.state(), FsmState::Unassociated);

    pair.agent.transport_disconnected();
    pair.manager.transport_disconnected();
    assert_eq!(pair.agent.state(), FsmState::Disconnected);
    assert_eq!(pair.manager.state(), FsmState::Disconnected);
}

#[test]
fn scenario_unknown_invoke_id_aborts() {
    let mut pair = Pair::associated(Arc::new(ConfigurationRegistry::with_defaults()));

    let outcomes = Arc::new(Mutex::new(Vec::new()));
    let sink = outcomes.clone();
    let invoke_id = pair
        .manager
        .request_get(
            0,
            Vec::new(),
            Box::new(move |outcome| sink.lock().unwrap().push(outcome)),
        )
        .unwrap();
    // the request is lost on the way
    pair.to_agent.pop().unwrap();

    let stray = DataApdu::new(
        invoke_id.wrapping_add(7) & 0x000F,
        DataMessage::RorsGet(GetResultSimple::default()),
    );
    let frame = ApduCodec::agent().encode(&Apdu::prst(stray)).unwrap();
    pair.manager.process_input_data(&frame);

    assert_eq!(pair.manager.state(), FsmState::Unassociated);
    let abort = pair.to_agent.pop().expect("no ABRT sent");
    assert!(matches!(
        ApduCodec::agent().decode(&abort).unwrap(),
        Apdu::Abrt(_)
    ));
    assert!(pair.to_agent.pop().is_none());

    assert!(matches!(
        outcomes.lock().unwrap()[..],
        [RequestOutcome::Disassociated]
    ));
    assert!(pair
        .manager_events
        .lock()
        .unwrap()
        .contains(&ConnectionEvent::Unavailable { context: ContextId(2) }));

    pair.agent.process_input_data(&abort);
    assert_eq!(pair.agent.state(), FsmState::Unassociated);
}

#[test]
fn scenario_agent_refuses_approval_for_unknown_invoke_id() {
    let mut pair = Pair::new(empty_registry());
    pair.connect();
    pair.agent.associate();

    // AARQ, AARE, configuration report
    let aarq = pair.to_manager.pop().unwrap();
    pair.manager.process_input_data(&aarq);
    let aare = pair.to_agent.pop().unwrap();
    pair.agent.process_input_data(&aare);
    assert_eq!(pair.agent.state(), FsmState::WaitingApproval);
    let report = pair.to_manager.pop().unwrap();
    pair.manager.process_input_data(&report);
    assert_eq!(pair.manager.state(), FsmState::Operating);

    // the approval arrives carrying another invoke id
    let codec = ApduCodec::default();
    let mut approval = data(&codec.decode(&pair.to_agent.pop().unwrap()).unwrap());
    let real = approval.invoke_id;
    approval.invoke_id = (real + 3) & 0x000F;
    let frame = codec.encode(&Apdu::prst(approval)).unwrap();
    pair.agent.process_input_data(&frame);

    assert_eq!(pair.agent.state(), FsmState::Unassociated);
    assert_eq!(pair.agent.service().pending_count(), 0);
    let abort = pair.to_manager.pop().expect("no ABRT sent");
    assert!(matches!(codec.decode(&abort).unwrap(), Apdu::Abrt(_)));
    assert!(pair.to_manager.pop().is_none());

    pair.manager.process_input_data(&abort);
    assert_eq!(pair.manager.state(), FsmState::Unassociated);
}

#[test]
fn scenario_standard_devices_skip_configuration() {
    let devices: Vec<(Arc<dyn Specialization>, Reading, u16, ObservedValue)> = vec![
        (
            Arc::new(BloodPressureMonitor),
            BloodPressureMonitor::reading(120.0, 80.0, 93.0, 64.0, reading_time()),
            1,
            ObservedValue::Compound(vec![120.0, 80.0, 93.0]),
        ),
        (
            Arc::new(WeighingScale),
            WeighingScale::reading(80.0, reading_time()),
            1,
            ObservedValue::Numeric(80.0),
        ),
        (
            Arc::new(Glucometer),
            Glucometer::reading(105.0, reading_time()),
            1,
            ObservedValue::Numeric(105.0),
        ),
    ];

    for (specialization, reading, handle, expected) in devices {
        let config_id = specialization.dev_config_id();
        let registry = Arc::new(ConfigurationRegistry::with_defaults());
        let mut pair = Pair::with_specialization(registry, specialization);
        pair.connect();
        pair.agent.associate();
        pair.pump();

        let trace = pair.decoded_trace();
        assert_eq!(trace.len(), 2, "0x{config_id:04X}");
        let (Role::Manager, Apdu::Aare(aare)) = &trace[1] else {
            panic!("expected the manager's AARE");
        };
        assert_eq!(aare.result, AssociateResult::Accepted, "0x{config_id:04X}");
        assert_eq!(pair.agent.state(), FsmState::Operating);
        assert_eq!(pair.manager.state(), FsmState::Operating);

        pair.agent.send_data(reading).unwrap();
        pair.pump();
        let events = pair.manager_events.lock().unwrap();
        let report = events
            .iter()
            .find_map(|event| match event {
                ConnectionEvent::Measurement { report, .. } => Some(report.clone()),
                _ => None,
            })
            .expect("no measurement notified");
        assert_eq!(
            report.observation(handle).and_then(|o| o.value.clone()),
            Some(expected),
            "0x{config_id:04X}"
        );
    }
}
