//! Unassociated and associating states
//!
//! The manager evaluates AARQs against the configuration registry and
//! answers with an AARE. The agent sends the AARQ, retransmits it on
//! timeout and classifies the AARE it gets back.

use crate::context::{ConnectionContext, EventData, session_event};
use crate::fsm::{FsmEvent, FsmOutcome, FsmState};
use crate::link::TimeoutKind;
use crate::mds::Mds;
use phd_asn1::{
    AareApdu, AarqApdu, Apdu, DataProto, DataReqModeCapab, PhdAssociationInformation,
};
use phd_core::protocol::{
    ASSOC_VERSION1, DATA_REQ_SUPP_INIT_AGENT, ENCODING_MDER,
    MANAGER_CONFIG_RESPONSE, NOM_VERSION1, PROTOCOL_VERSION1, Role, SYS_TYPE_AGENT,
    SYS_TYPE_MANAGER,
};
use phd_core::{AssociateResult, PhdError, PhdResult};

pub(crate) fn process_apdu(ctx: &mut ConnectionContext, apdu: Apdu) -> FsmOutcome {
    match (ctx.role(), ctx.state(), apdu) {
        (Role::Manager, FsmState::Unassociated, Apdu::Aarq(aarq)) => {
            let (result, info) = evaluate_aarq(ctx, &aarq);
            log::info!("{}: AARQ evaluated as {}", ctx.id, result);
            ctx.peer = info;
            let event = match result {
                AssociateResult::Accepted => FsmEvent::RxAarqAcceptableAndKnownConfiguration,
                AssociateResult::AcceptedUnknownConfig => {
                    FsmEvent::RxAarqAcceptableAndUnknownConfiguration
                }
                _ => FsmEvent::RxAarqUnacceptableConfiguration,
            };
            ctx.fire_with(event, EventData::AssociateResult(result))
        }
        (Role::Agent, FsmState::Associating, Apdu::Aare(aare)) => {
            log::info!("{}: association {}", ctx.id, aare.result);
            let event = match aare.result {
                AssociateResult::Accepted => FsmEvent::RxAareAcceptedKnown,
                AssociateResult::AcceptedUnknownConfig => FsmEvent::RxAareAcceptedUnknown,
                _ => FsmEvent::RxAareRejected,
            };
            if aare.result.is_accepted() {
                ctx.peer = aare.selected_data_proto.phd_info().ok();
            }
            ctx.fire(event)
        }
        (_, _, Apdu::Prst(_)) => ctx.fire(FsmEvent::RxPrst),
        (_, _, apdu) => match session_event(&apdu) {
            Some(event) => ctx.fire(event),
            None => FsmOutcome::NotProcessed,
        },
    }
}

/// Decide on an AARQ
///
/// # Returns
/// The association result and, when it could be read, the agent's
/// association information
fn evaluate_aarq(
    ctx: &ConnectionContext,
    aarq: &AarqApdu,
) -> (AssociateResult, Option<PhdAssociationInformation>) {
    if aarq.assoc_version != ASSOC_VERSION1 {
        return (AssociateResult::RejectedUnsupportedAssocVersion, None);
    }
    let Some(proto) = aarq.phd_data_proto() else {
        return (AssociateResult::RejectedNoCommonProtocol, None);
    };
    let info = match proto.phd_info() {
        Ok(info) => info,
        Err(e) => {
            log::warn!("{}: unreadable association information: {}", ctx.id, e);
            return (AssociateResult::RejectedNoCommonParameter, None);
        }
    };
    if info.protocol_version & PROTOCOL_VERSION1 == 0 || info.encoding_rules & ENCODING_MDER == 0
    {
        return (AssociateResult::RejectedNoCommonParameter, Some(info));
    }

    let known = ctx
        .registry
        .as_ref()
        .is_some_and(|registry| registry.is_supported(&info.system_id, info.dev_config_id));
    if known {
        (AssociateResult::Accepted, Some(info))
    } else {
        (AssociateResult::AcceptedUnknownConfig, Some(info))
    }
}

/// Association information the manager puts in its AARE
fn manager_info(ctx: &ConnectionContext) -> PhdAssociationInformation {
    PhdAssociationInformation {
        protocol_version: PROTOCOL_VERSION1,
        encoding_rules: ENCODING_MDER,
        nomenclature_version: NOM_VERSION1,
        functional_units: 0,
        system_type: SYS_TYPE_MANAGER,
        system_id: ctx.config.system_id.clone(),
        dev_config_id: MANAGER_CONFIG_RESPONSE,
        data_req_mode_capab: DataReqModeCapab::default(),
        option_list: Vec::new(),
    }
}

fn send_aare(ctx: &mut ConnectionContext, result: AssociateResult) -> PhdResult<()> {
    let selected_data_proto = DataProto::phd(&manager_info(ctx))?;
    ctx.link.send(&Apdu::Aare(AareApdu {
        result,
        selected_data_proto,
    }))
}

fn peer_identity(ctx: &ConnectionContext) -> PhdResult<(Vec<u8>, u16)> {
    ctx.peer
        .as_ref()
        .map(|info| (info.system_id.clone(), info.dev_config_id))
        .ok_or_else(|| PhdError::InvalidState("No association information from the agent".into()))
}

/// Agent: build the local MDS
pub(crate) fn agent_mds(ctx: &mut ConnectionContext) -> PhdResult<()> {
    let specialization = ctx
        .specialization
        .clone()
        .ok_or_else(|| PhdError::InvalidState("Agent has no specialization".into()))?;
    let mut mds = Mds::from_config(
        &ctx.config.system_id,
        specialization.dev_config_id(),
        &specialization.config_objects(),
    )?;
    for ava in specialization.mds_attributes()? {
        mds.set_attribute(ava);
    }
    ctx.mds = Some(mds);
    Ok(())
}

/// Agent: send the AARQ and start the association timer
pub(crate) fn send_aarq(ctx: &mut ConnectionContext) -> PhdResult<()> {
    let dev_config_id = ctx
        .specialization
        .as_ref()
        .map(|s| s.dev_config_id())
        .ok_or_else(|| PhdError::InvalidState("Agent has no specialization".into()))?;
    let info = PhdAssociationInformation {
        protocol_version: PROTOCOL_VERSION1,
        encoding_rules: ENCODING_MDER,
        nomenclature_version: NOM_VERSION1,
        functional_units: 0,
        system_type: SYS_TYPE_AGENT,
        system_id: ctx.config.system_id.clone(),
        dev_config_id,
        data_req_mode_capab: DataReqModeCapab {
            data_req_mode_flags: DATA_REQ_SUPP_INIT_AGENT,
            data_req_init_agent_count: 1,
            data_req_init_manager_count: 0,
        },
        option_list: Vec::new(),
    };
    let aarq = AarqApdu {
        assoc_version: ASSOC_VERSION1,
        data_proto_list: vec![DataProto::phd(&info)?],
    };

    ctx.link.send(&Apdu::Aarq(aarq))?;
    let timeout = ctx.config.timeouts.association;
    ctx.link.start_timeout(timeout, TimeoutKind::Association);
    Ok(())
}

pub(crate) fn aarq_tx(ctx: &mut ConnectionContext) -> PhdResult<()> {
    ctx.service.reset(&mut ctx.link);
    ctx.association_retries = 0;
    ctx.config_retries = 0;
    ctx.release_retries = 0;
    ctx.scan_report_no = 0;
    send_aarq(ctx)
}

/// Manager: accept an agent whose configuration is known
pub(crate) fn accept_config_tx(ctx: &mut ConnectionContext, data: &EventData) -> PhdResult<()> {
    ctx.service.reset(&mut ctx.link);
    let (system_id, config_id) = peer_identity(ctx)?;
    let objects = ctx
        .registry
        .as_ref()
        .and_then(|registry| registry.get(&system_id, config_id))
        .ok_or_else(|| {
            PhdError::InvalidState(format!("Configuration 0x{config_id:04X} vanished"))
        })?;
    ctx.mds = Some(Mds::from_config(&system_id, config_id, &objects)?);
    send_aare(ctx, result_or(data, AssociateResult::Accepted))
}

/// Manager: accept the association and wait for a configuration report
pub(crate) fn wait_for_config_tx(ctx: &mut ConnectionContext, data: &EventData) -> PhdResult<()> {
    ctx.service.reset(&mut ctx.link);
    let (system_id, config_id) = peer_identity(ctx)?;
    ctx.mds = Some(Mds::new(&system_id, config_id)?);
    send_aare(ctx, result_or(data, AssociateResult::AcceptedUnknownConfig))?;
    let timeout = ctx.config.timeouts.configuring;
    ctx.link.start_timeout(timeout, TimeoutKind::Configuring);
    Ok(())
}

/// Manager: refuse the association
pub(crate) fn unaccept_config_tx(ctx: &mut ConnectionContext, data: &EventData) -> PhdResult<()> {
    ctx.peer = None;
    send_aare(ctx, result_or(data, AssociateResult::RejectedUnknown))
}

/// Agent: refuse an AARQ
pub(crate) fn aare_rejected_permanent_tx(ctx: &mut ConnectionContext) -> PhdResult<()> {
    ctx.link.send(&Apdu::Aare(AareApdu {
        result: AssociateResult::RejectedPermanent,
        selected_data_proto: DataProto::default(),
    }))
}

fn result_or(data: &EventData, default: AssociateResult) -> AssociateResult {
    match data {
        EventData::AssociateResult(result) => *result,
        _ => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::tests::{AGENT_ID, MANAGER_ID, agent, manager};
    use phd_asn1::{AbrtApdu, RlrqApdu};

    #[test]
    fn test_agent_aarq_contents() {
        let (mut agent, transport) = agent(0x0191);
        agent.transport_connected().unwrap();
        assert_eq!(agent.associate(), FsmOutcome::Changed);
        assert_eq!(agent.state(), FsmState::Associating);

        let sent = transport.take_sent();
        let Apdu::Aarq(aarq) = &sent[0] else {
            panic!("expected AARQ");
        };
        assert_eq!(aarq.assoc_version, ASSOC_VERSION1);
        let info = aarq.phd_data_proto().unwrap().phd_info().unwrap();
        assert_eq!(info.system_type, SYS_TYPE_AGENT);
        assert_eq!(info.system_id, AGENT_ID.to_vec());
        assert_eq!(info.dev_config_id, 0x0191);
        assert_eq!(info.data_req_mode_capab.data_req_init_agent_count, 1);
        assert_eq!(
            transport.0.lock().unwrap().started.last().map(|(_, s)| *s),
            Some(10)
        );
    }

    #[test]
    fn test_agent_handles_unknown_config_aare() {
        let (mut agent, transport) = agent(0x0190);
        agent.transport_connected().unwrap();
        agent.associate();
        transport.take_sent();

        let info = PhdAssociationInformation {
            system_type: SYS_TYPE_MANAGER,
            system_id: MANAGER_ID.to_vec(),
            ..Default::default()
        };
        agent.process_apdu(Apdu::Aare(AareApdu {
            result: AssociateResult::AcceptedUnknownConfig,
            selected_data_proto: DataProto::phd(&info).unwrap(),
        }));

        // the configuration report goes out on entering config-sending
        assert_eq!(agent.state(), FsmState::WaitingApproval);
        assert_eq!(agent.peer().map(|p| p.system_id.clone()), Some(MANAGER_ID.to_vec()));
        let sent = transport.take_sent();
        assert_eq!(sent.len(), 1);
        assert!(matches!(sent[0], Apdu::Prst(_)));
    }

    #[test]
    fn test_agent_rejected() {
        let (mut agent, _) = agent(0x0190);
        agent.transport_connected().unwrap();
        agent.associate();
        agent.process_apdu(Apdu::Aare(AareApdu {
            result: AssociateResult::RejectedPermanent,
            selected_data_proto: DataProto::default(),
        }));
        assert_eq!(agent.state(), FsmState::Unassociated);
        assert!(agent.peer().is_none());
    }

    #[test]
    fn test_agent_refuses_aarq() {
        let (mut agent, transport) = agent(0x0190);
        agent.transport_connected().unwrap();
        agent.process_apdu(Apdu::Aarq(AarqApdu::default()));
        let sent = transport.take_sent();
        let Apdu::Aare(aare) = &sent[0] else {
            panic!("expected AARE");
        };
        assert_eq!(aare.result, AssociateResult::RejectedPermanent);
        assert_eq!(agent.state(), FsmState::Unassociated);
    }

    #[test]
    fn test_manager_unknown_config_waits() {
        let (mut manager, transport) = manager();
        manager.transport_connected().unwrap();

        let info = PhdAssociationInformation {
            protocol_version: PROTOCOL_VERSION1,
            encoding_rules: ENCODING_MDER,
            system_type: SYS_TYPE_AGENT,
            system_id: AGENT_ID.to_vec(),
            dev_config_id: 0x4000,
            ..Default::default()
        };
        manager.process_apdu(Apdu::Aarq(AarqApdu {
            assoc_version: ASSOC_VERSION1,
            data_proto_list: vec![DataProto::phd(&info).unwrap()],
        }));

        assert_eq!(manager.state(), FsmState::WaitingForConfig);
        assert_eq!(manager.mds().map(|m| m.dev_config_id()), Some(0x4000));
        let sent = transport.take_sent();
        let Apdu::Aare(aare) = &sent[0] else {
            panic!("expected AARE");
        };
        assert_eq!(aare.result, AssociateResult::AcceptedUnknownConfig);
        let selected = aare.selected_data_proto.phd_info().unwrap();
        assert_eq!(selected.system_type, SYS_TYPE_MANAGER);
        assert_eq!(selected.system_id, MANAGER_ID.to_vec());
        assert_eq!(selected.dev_config_id, MANAGER_CONFIG_RESPONSE);
    }

    #[test]
    fn test_unassociated_manager_aborts_on_release() {
        let (mut manager, transport) = manager();
        manager.transport_connected().unwrap();
        manager.process_apdu(Apdu::Rlrq(RlrqApdu { reason: 0 }));
        assert!(matches!(transport.take_sent()[..], [Apdu::Abrt(AbrtApdu { .. })]));
        assert_eq!(manager.state(), FsmState::Unassociated);
    }
}
