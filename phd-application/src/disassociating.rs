//! Association release
//!
//! A release requested while a confirmed request is in flight waits for
//! that request to end before the RLRQ goes out.

use crate::context::{ConnectionContext, EventData, session_event};
use crate::fsm::{FsmEvent, FsmOutcome, FsmState, Transition};
use crate::link::TimeoutKind;
use crate::service::ServiceState;
use phd_asn1::{Apdu, DataMessage, RlreApdu, RlrqApdu};
use phd_core::PhdResult;
use phd_core::protocol::RELEASE_REASON_NORMAL;

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
    let event = match &data.message {
        DataMessage::Roer(_) => FsmEvent::RxRoer,
        DataMessage::Rorj(_) => FsmEvent::RxRorj,
        message if message.is_invoke() => FsmEvent::RxRoiv,
        _ => FsmEvent::RxRors,
    };
    ctx.fire_with(event, EventData::Data(data))
}

/// Send RLRQ and start the release timer
pub(crate) fn send_release_request(ctx: &mut ConnectionContext) -> PhdResult<()> {
    ctx.link.send(&Apdu::Rlrq(RlrqApdu {
        reason: RELEASE_REASON_NORMAL,
    }))?;
    let timeout = ctx.config.timeouts.association_release;
    ctx.link.start_timeout(timeout, TimeoutKind::Release);
    Ok(())
}

pub(crate) fn release_request_tx(
    ctx: &mut ConnectionContext,
    transition: &Transition,
) -> PhdResult<()> {
    if transition.to != FsmState::Disassociating {
        // release of an association still being negotiated
        return ctx.link.send(&Apdu::Rlrq(RlrqApdu {
            reason: RELEASE_REASON_NORMAL,
        }));
    }

    ctx.release_retries = 0;
    ctx.service.finalize();
    if ctx.service.state() == ServiceState::Finalized {
        send_release_request(ctx)
    } else {
        log::info!(
            "{}: release deferred until request {:?} ends",
            ctx.id,
            ctx.service.in_flight()
        );
        ctx.release_pending = true;
        Ok(())
    }
}

/// Send a deferred RLRQ once no request is in flight any more
pub(crate) fn release_if_idle(ctx: &mut ConnectionContext) {
    if !ctx.release_pending
        || ctx.state() != FsmState::Disassociating
        || ctx.service.state() != ServiceState::Finalized
    {
        return;
    }
    ctx.release_pending = false;
    if let Err(e) = send_release_request(ctx) {
        log::error!("{}: deferred RLRQ failed: {}", ctx.id, e);
    }
}

pub(crate) fn release_response_tx(ctx: &mut ConnectionContext) -> PhdResult<()> {
    ctx.link.send(&Apdu::Rlre(RlreApdu {
        reason: RELEASE_REASON_NORMAL,
    }))
}
