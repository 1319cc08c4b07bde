//! Configuration exchange
//!
//! ```text
//! manager: waiting-for-config --config report--> checking-config
//!              ^                                      |
//!              +------- unsupported (RORS) ----------+---- accepted (RORS) --> operating
//!
//! agent:   config-sending --report--> waiting-approval --accepted--> operating
//! ```

use crate::context::{ConnectionContext, EventData, session_event};
use crate::fsm::{FsmEvent, FsmOutcome, FsmState};
use crate::link::TimeoutKind;
use crate::mds::Mds;
use phd_asn1::{
    Apdu, ConfigReport, ConfigReportRsp, DataApdu, DataMessage, EventReportArgumentSimple,
    EventReportResultSimple, MderDecode, MderEncode,
};
use phd_core::nomenclature::MDC_NOTI_CONFIG;
use phd_core::protocol::{MDS_HANDLE, RELATIVE_TIME_UNSPECIFIED, Role, error_value};
use phd_core::{ConfigResult, PhdError, PhdResult};

pub(crate) fn process_apdu(ctx: &mut ConnectionContext, apdu: Apdu) -> FsmOutcome {
    let prst = match apdu {
        Apdu::Prst(prst) => prst,
        other => {
            return match session_event(&other) {
                Some(event) => ctx.fire(event),
                None => FsmOutcome::NotProcessed,
            };
        }
    };
    let data = match ctx.open_prst(prst) {
        Ok(data) => data,
        Err(outcome) => return outcome,
    };

    match (ctx.role(), ctx.state()) {
        (Role::Manager, FsmState::WaitingForConfig) => waiting_for_config(ctx, data),
        (Role::Manager, FsmState::CheckingConfig) => checking_config(ctx, data),
        (Role::Agent, FsmState::WaitingApproval) => waiting_approval(ctx, data),
        _ => {
            let event = data_event(&data.message);
            ctx.fire_with(event, EventData::Data(data))
        }
    }
}

fn is_config_report(message: &DataMessage) -> bool {
    matches!(
        message,
        DataMessage::RoivConfirmedEventReport(event) if event.event_type == MDC_NOTI_CONFIG
    )
}

fn waiting_for_config(ctx: &mut ConnectionContext, data: DataApdu) -> FsmOutcome {
    let event = match &data.message {
        message if is_config_report(message) => FsmEvent::RxRoivConfirmedEventReport,
        DataMessage::RoivEventReport(_) | DataMessage::RoivConfirmedEventReport(_) => {
            FsmEvent::RxRoivEventReport
        }
        DataMessage::RoivGet(_) => FsmEvent::RxRoivGet,
        DataMessage::RoivSet(_) => FsmEvent::RxRoivSet,
        DataMessage::RoivConfirmedSet(_) => FsmEvent::RxRoivConfirmedSet,
        DataMessage::RoivAction(_) => FsmEvent::RxRoivAction,
        DataMessage::RoivConfirmedAction(_) => FsmEvent::RxRoivConfirmedAction,
        DataMessage::RorsConfirmedEventReport(_)
        | DataMessage::RorsGet(_)
        | DataMessage::RorsConfirmedSet(_)
        | DataMessage::RorsConfirmedAction(_) => FsmEvent::RxRors,
        DataMessage::Roer(_) => FsmEvent::RxRoer,
        DataMessage::Rorj(_) => FsmEvent::RxRorj,
    };
    ctx.fire_with(event, EventData::Data(data))
}

fn checking_config(ctx: &mut ConnectionContext, data: DataApdu) -> FsmOutcome {
    let (event, error) = match &data.message {
        DataMessage::RoivConfirmedEventReport(_) => (FsmEvent::RxRoivConfirmedEventReport, None),
        DataMessage::RoivEventReport(_)
        | DataMessage::RoivGet(_)
        | DataMessage::RoivSet(_)
        | DataMessage::RoivConfirmedSet(_)
        | DataMessage::RoivAction(_)
        | DataMessage::RoivConfirmedAction(_) => (
            FsmEvent::RxRoivAllExceptConfirmedEventReport,
            Some(error_value::NO_SUCH_ACTION),
        ),
        DataMessage::RorsConfirmedEventReport(_) => (FsmEvent::RxRorsConfirmedEventReport, None),
        DataMessage::RorsGet(_) => (FsmEvent::RxRorsGet, None),
        DataMessage::RorsConfirmedSet(_) => (FsmEvent::RxRorsConfirmedSet, None),
        DataMessage::RorsConfirmedAction(_) => (FsmEvent::RxRorsConfirmedAction, None),
        DataMessage::Roer(_) => (FsmEvent::RxRoer, None),
        DataMessage::Rorj(_) => (FsmEvent::RxRorj, None),
    };
    let data = match error {
        Some(error_value) => EventData::Error {
            received: data,
            error_value,
        },
        None => EventData::Data(data),
    };
    ctx.fire_with(event, data)
}

fn waiting_approval(ctx: &mut ConnectionContext, data: DataApdu) -> FsmOutcome {
    let DataMessage::RorsConfirmedEventReport(result) = &data.message else {
        let event = data_event(&data.message);
        return ctx.fire_with(event, EventData::Data(data));
    };

    if !ctx.service.request_retired(&mut ctx.link, &data) {
        log::warn!(
            "{}: configuration response with unknown invoke id {}, aborting",
            ctx.id,
            data.invoke_id
        );
        return ctx.fire(FsmEvent::ReqAssocAbort);
    }
    if result.obj_handle != MDS_HANDLE || result.event_type != MDC_NOTI_CONFIG {
        return ctx.fire_with(FsmEvent::RxRors, EventData::Data(data));
    }

    let response = match ConfigReportRsp::from_bytes(&result.event_reply_info) {
        Ok(response) => response,
        Err(e) => {
            log::warn!("{}: malformed configuration response: {}", ctx.id, e);
            return ctx.fire(FsmEvent::ReqAssocAbort);
        }
    };
    log::info!(
        "{}: configuration 0x{:04X} answered with {:?}",
        ctx.id,
        response.config_report_id,
        response.config_result
    );
    if response.config_result == ConfigResult::AcceptedConfig {
        return ctx.fire(FsmEvent::RxRorsConfirmedEventReportKnown);
    }
    if ctx.config_retries >= ctx.config.retries.configuring {
        log::warn!("{}: configuration refused, giving up", ctx.id);
        return ctx.fire(FsmEvent::ReqAssocAbort);
    }
    ctx.config_retries += 1;
    ctx.fire(FsmEvent::RxRorsConfirmedEventReportUnknown)
}

/// Plain event for a received DATA-APDU
pub(crate) fn data_event(message: &DataMessage) -> FsmEvent {
    match message {
        DataMessage::RoivEventReport(_) => FsmEvent::RxRoivEventReport,
        DataMessage::RoivConfirmedEventReport(_) => FsmEvent::RxRoivConfirmedEventReport,
        DataMessage::RoivGet(_) => FsmEvent::RxRoivGet,
        DataMessage::RoivSet(_) => FsmEvent::RxRoivSet,
        DataMessage::RoivConfirmedSet(_) => FsmEvent::RxRoivConfirmedSet,
        DataMessage::RoivAction(_) => FsmEvent::RxRoivAction,
        DataMessage::RoivConfirmedAction(_) => FsmEvent::RxRoivConfirmedAction,
        DataMessage::RorsConfirmedEventReport(_) => FsmEvent::RxRorsConfirmedEventReport,
        DataMessage::RorsGet(_) => FsmEvent::RxRorsGet,
        DataMessage::RorsConfirmedSet(_) => FsmEvent::RxRorsConfirmedSet,
        DataMessage::RorsConfirmedAction(_) => FsmEvent::RxRorsConfirmedAction,
        DataMessage::Roer(_) => FsmEvent::RxRoer,
        DataMessage::Rorj(_) => FsmEvent::RxRorj,
    }
}

/// Manager: evaluate the configuration report in `data`
pub(crate) fn perform_configuration(ctx: &mut ConnectionContext, data: &EventData) -> PhdResult<()> {
    let Some(received) = data.received().cloned() else {
        return Err(PhdError::InvalidState("No configuration report to evaluate".into()));
    };
    let DataMessage::RoivConfirmedEventReport(event) = &received.message else {
        return Err(PhdError::InvalidState(format!(
            "Expected a configuration report, got {}",
            received.message.name()
        )));
    };

    let report = match ConfigReport::from_bytes(&event.event_info) {
        Ok(report) => report,
        Err(e) => {
            log::warn!("{}: malformed configuration report: {}", ctx.id, e);
            ctx.fire(FsmEvent::ReqAssocAbort);
            return Ok(());
        }
    };
    let system_id = ctx
        .mds
        .as_ref()
        .map(|mds| mds.system_id().to_vec())
        .or_else(|| ctx.peer.as_ref().map(|info| info.system_id.clone()))
        .unwrap_or_default();
    let config_id = report.config_report_id;

    let mut result = match &ctx.registry {
        Some(registry) => registry.evaluate(&system_id, &report),
        None => ConfigResult::UnsupportedConfig,
    };
    if result == ConfigResult::AcceptedConfig {
        let objects = ctx
            .registry
            .as_ref()
            .and_then(|registry| registry.get(&system_id, config_id))
            .unwrap_or_else(|| report.config_obj_list.clone());
        match Mds::from_config(&system_id, config_id, &objects) {
            Ok(mds) => ctx.mds = Some(mds),
            Err(e) => {
                log::warn!("{}: configuration 0x{config_id:04X} unusable: {}", ctx.id, e);
                result = ConfigResult::UnsupportedConfig;
            }
        }
    }
    log::info!("{}: configuration 0x{config_id:04X} evaluated as {:?}", ctx.id, result);

    let event = if result == ConfigResult::AcceptedConfig {
        FsmEvent::ReqAgentSuppliedKnownConfiguration
    } else {
        FsmEvent::ReqAgentSuppliedUnknownConfiguration
    };
    ctx.fire_with(
        event,
        EventData::Configuration {
            received,
            config_report_id: config_id,
            result,
        },
    );
    Ok(())
}

/// Manager: answer the configuration report with the verdict
pub(crate) fn configuration_response_tx(
    ctx: &mut ConnectionContext,
    data: &EventData,
) -> PhdResult<()> {
    let EventData::Configuration {
        received,
        config_report_id,
        result,
    } = data
    else {
        return Err(PhdError::InvalidState("No configuration verdict to send".into()));
    };
    let DataMessage::RoivConfirmedEventReport(event) = &received.message else {
        return Err(PhdError::InvalidState("Verdict for a non-report invoke".into()));
    };

    let reply = ConfigReportRsp {
        config_report_id: *config_report_id,
        config_result: *result,
    };
    ctx.send_data_apdu(DataApdu::new(
        received.invoke_id,
        DataMessage::RorsConfirmedEventReport(EventReportResultSimple {
            obj_handle: event.obj_handle,
            current_time: event.event_time,
            event_type: event.event_type,
            event_reply_info: reply.to_bytes()?,
        }),
    ))?;

    if *result != ConfigResult::AcceptedConfig {
        let timeout = ctx.config.timeouts.configuring;
        ctx.link.start_timeout(timeout, TimeoutKind::Configuring);
    }
    Ok(())
}

/// Manager: a second confirmed event report arrived while checking
pub(crate) fn new_measurements_response_tx(
    ctx: &mut ConnectionContext,
    data: &EventData,
) -> PhdResult<()> {
    let Some(received) = data.received().cloned() else {
        return Ok(());
    };
    if is_config_report(&received.message) {
        log::warn!("{}: configuration report while checking one, aborting", ctx.id);
        ctx.fire(FsmEvent::ReqAssocAbort);
        return Ok(());
    }
    ctx.send_roer(received.invoke_id, error_value::NO_SUCH_OBJECT_INSTANCE)
}

/// Agent: send the configuration report
pub(crate) fn send_config_tx(ctx: &mut ConnectionContext) -> PhdResult<()> {
    let mds = ctx
        .mds
        .as_ref()
        .ok_or_else(|| PhdError::InvalidState("Agent MDS not built".into()))?;
    let report = ConfigReport {
        config_report_id: mds.dev_config_id(),
        config_obj_list: mds.config_objects(),
    };
    let request = DataApdu::new(
        0,
        DataMessage::RoivConfirmedEventReport(EventReportArgumentSimple {
            obj_handle: MDS_HANDLE,
            event_time: RELATIVE_TIME_UNSPECIFIED,
            event_type: MDC_NOTI_CONFIG,
            event_info: report.to_bytes()?,
        }),
    );
    let timeout = ctx.config.timeouts.config_report;
    let id = ctx.id;
    let invoke_id = ctx.service.send_remote_operation_request(
        &mut ctx.link,
        request,
        timeout,
        Box::new(move |outcome| log::debug!("{id}: configuration report ended: {outcome:?}")),
    )?;
    log::info!(
        "{}: sent configuration 0x{:04X} as invoke {}",
        ctx.id,
        report.config_report_id,
        invoke_id
    );
    Ok(())
}
