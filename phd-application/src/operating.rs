//! Operating state
//!
//! The manager decodes measurement reports and correlates responses to its
//! GET, SET and ACTION requests. The agent answers the manager's invokes and
//! sends its readings.

use crate::configuring::data_event;
use crate::context::{ConnectionContext, EventData, session_event};
use crate::fsm::FsmOutcome;
use crate::listener::ConnectionEvent;
use crate::report::{decode_event_report, is_scan_report};
use phd_asn1::{
    ActionResultSimple, Apdu, Ava, DataApdu, DataMessage, EventReportArgumentSimple,
    EventReportResultSimple, GetResultSimple, MderDecode, SetTimeInvoke,
};
use phd_core::nomenclature::{MDC_ACT_SET_TIME, MDC_ATTR_TIME_ABS};
use phd_core::protocol::{MDS_HANDLE, error_value};
use phd_core::{PhdError, PhdResult};

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
    match ctx.open_prst(prst) {
        Ok(data) => {
            let event = data_event(&data.message);
            ctx.fire_with(event, EventData::Data(data))
        }
        Err(outcome) => outcome,
    }
}

fn event_report_response(invoke_id: u16, event: &EventReportArgumentSimple) -> DataApdu {
    DataApdu::new(
        invoke_id,
        DataMessage::RorsConfirmedEventReport(EventReportResultSimple {
            obj_handle: event.obj_handle,
            current_time: event.event_time,
            event_type: event.event_type,
            event_reply_info: Vec::new(),
        }),
    )
}

/// Manager: decode a measurement report and answer it when confirmed
pub(crate) fn event_report(ctx: &mut ConnectionContext, data: &EventData) -> PhdResult<()> {
    let Some(received) = data.received() else {
        return Ok(());
    };
    let (event, confirmed) = match &received.message {
        DataMessage::RoivEventReport(event) => (event, false),
        DataMessage::RoivConfirmedEventReport(event) => (event, true),
        other => {
            return Err(PhdError::InvalidState(format!(
                "{} is not an event report",
                other.name()
            )));
        }
    };

    if is_scan_report(event.event_type) {
        let decoded = ctx
            .mds
            .as_ref()
            .ok_or_else(|| PhdError::InvalidState("No configuration snapshot".into()))
            .and_then(|mds| decode_event_report(mds, event));
        match decoded {
            Ok(report) => {
                log::debug!(
                    "{}: scan report {} with {} observations",
                    ctx.id,
                    report.scan.scan_report_no(),
                    report.observations.len()
                );
                ctx.notify(ConnectionEvent::Measurement {
                    context: ctx.id,
                    report,
                });
            }
            Err(e) => {
                log::warn!("{}: undecodable event report: {}", ctx.id, e);
                if confirmed {
                    return ctx.send_roer(received.invoke_id, error_value::PROTOCOL_VIOLATION);
                }
                return Ok(());
            }
        }
    } else {
        log::debug!("{}: ignoring event type {}", ctx.id, event.event_type);
    }

    if confirmed {
        ctx.send_data_apdu(event_report_response(received.invoke_id, event))?;
    }
    Ok(())
}

/// Manager: response to a GET, SET or ACTION request
pub(crate) fn response(ctx: &mut ConnectionContext, data: &EventData) -> PhdResult<()> {
    let Some(received) = data.received() else {
        return Ok(());
    };
    if ctx.service.check_known_invoke_id(received) {
        let applied = match &received.message {
            DataMessage::RorsGet(result) | DataMessage::RorsConfirmedSet(result) => {
                match ctx.mds.as_mut() {
                    Some(mds) => mds.apply_attributes(result.obj_handle, &result.attribute_list),
                    None => Ok(()),
                }
            }
            _ => Ok(()),
        };
        if let Err(e) = applied {
            log::warn!("{}: attributes of {} not applied: {}", ctx.id, received.message.name(), e);
        }
    }
    ctx.check_invoke_id_abort(data);
    Ok(())
}

/// Agent: answer a GET
pub(crate) fn agent_get_mds_tx(ctx: &mut ConnectionContext, data: &EventData) -> PhdResult<()> {
    let Some(received) = data.received() else {
        return Ok(());
    };
    let DataMessage::RoivGet(arg) = &received.message else {
        return Ok(());
    };
    let invoke_id = received.invoke_id;

    let attribute_list = match (&ctx.mds, arg.obj_handle) {
        (Some(mds), MDS_HANDLE) => mds.select_attributes(&arg.attribute_id_list),
        _ => return ctx.send_roer(invoke_id, error_value::NO_SUCH_OBJECT_INSTANCE),
    };
    ctx.send_data_apdu(DataApdu::new(
        invoke_id,
        DataMessage::RorsGet(GetResultSimple {
            obj_handle: MDS_HANDLE,
            attribute_list,
        }),
    ))
}

/// Agent: answer a confirmed invoke other than GET
pub(crate) fn agent_roiv_respond_tx(ctx: &mut ConnectionContext, data: &EventData) -> PhdResult<()> {
    let Some(received) = data.received() else {
        return Ok(());
    };
    let invoke_id = received.invoke_id;

    match &received.message {
        DataMessage::RoivConfirmedEventReport(event) => {
            ctx.send_data_apdu(event_report_response(invoke_id, event))
        }
        DataMessage::RoivConfirmedSet(_) => ctx.send_roer(invoke_id, error_value::ACCESS_DENIED),
        DataMessage::RoivConfirmedAction(action)
            if action.obj_handle == MDS_HANDLE && action.action_type == MDC_ACT_SET_TIME =>
        {
            let invoke = match SetTimeInvoke::from_bytes(&action.action_info_args) {
                Ok(invoke) => invoke,
                Err(e) => {
                    log::warn!("{}: malformed set-time argument: {}", ctx.id, e);
                    return ctx.send_roer(invoke_id, error_value::PROTOCOL_VIOLATION);
                }
            };
            log::info!("{}: clock set to {:?}", ctx.id, invoke.date_time);
            let ava = Ava::from_value(MDC_ATTR_TIME_ABS, &invoke.date_time)?;
            if let Some(mds) = ctx.mds.as_mut() {
                mds.set_attribute(ava);
            }
            ctx.send_data_apdu(DataApdu::new(
                invoke_id,
                DataMessage::RorsConfirmedAction(ActionResultSimple {
                    obj_handle: MDS_HANDLE,
                    action_type: MDC_ACT_SET_TIME,
                    action_info_args: Vec::new(),
                }),
            ))
        }
        DataMessage::RoivConfirmedAction(_) => ctx.send_roer(invoke_id, error_value::NO_SUCH_ACTION),
        other => {
            log::debug!("{}: no answer for {}", ctx.id, other.name());
            Ok(())
        }
    }
}

/// Agent: send a reading as an unconfirmed event report
pub(crate) fn agent_send_event_tx(ctx: &mut ConnectionContext, data: EventData) -> PhdResult<()> {
    let EventData::Reading(mut reading) = data else {
        return Err(PhdError::InvalidState("No reading to send".into()));
    };
    let specialization = ctx
        .specialization
        .clone()
        .ok_or_else(|| PhdError::InvalidState("Agent has no specialization".into()))?;

    reading.scan_report_no = ctx.scan_report_no;
    ctx.scan_report_no = ctx.scan_report_no.wrapping_add(1);
    let apdu = specialization.event_report(&reading)?;
    ctx.service
        .send_unconfirmed_operation_request(&mut ctx.link, apdu)
}
