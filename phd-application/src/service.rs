//! Remote operation service
//!
//! Correlates confirmed requests with their responses by invoke id. At most
//! one confirmed request is in flight per connection; later ones wait in a
//! FIFO queue and are transmitted as earlier ones retire.
//!
//! # States
//!
//! ```text
//! Ready <-> Processing
//!   |           |
//!   |       Finalizing   (release requested mid-flight)
//!   v           v
//!       Finalized        (left only through reset())
//! ```

use crate::link::{Link, TimeoutKind};
use phd_asn1::{Apdu, DataApdu};
use phd_core::{PhdError, PhdResult};
use std::collections::VecDeque;
use std::fmt;

/// Number of request slots, one per 4-bit invoke id
pub const MAX_PENDING_REQUESTS: usize = 16;

/// Invoke id carried by unconfirmed requests
pub const UNCONFIRMED_INVOKE_ID: u16 = 0x1111;

const INVOKE_ID_MASK: u16 = 0x000F;

/// How a confirmed request ended
#[derive(Debug, Clone, PartialEq)]
pub enum RequestOutcome {
    /// The peer answered (RORS, ROER or RORJ)
    Response(DataApdu),
    /// No answer before the request timeout
    TimedOut,
    /// The association ended before an answer arrived
    Disassociated,
    /// The transport refused the request when it left the queue
    NotSent,
}

/// Completion callback of a confirmed request, invoked exactly once
pub type RequestCallback = Box<dyn FnOnce(RequestOutcome) + Send>;

/// Service state of one connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    Ready,
    Processing,
    Finalizing,
    Finalized,
}

struct Request {
    apdu: DataApdu,
    timeout: u64,
    callback: Option<RequestCallback>,
}

impl Request {
    fn complete(mut self, outcome: RequestOutcome) {
        if let Some(callback) = self.callback.take() {
            callback(outcome);
        }
    }
}

/// Pending request table of one connection
pub struct ServiceTable {
    slots: [Option<Request>; MAX_PENDING_REQUESTS],
    last_invoke_id: u16,
    in_flight: Option<u16>,
    queue: VecDeque<u16>,
    state: ServiceState,
}

impl ServiceTable {
    pub fn new() -> Self {
        Self {
            slots: std::array::from_fn(|_| None),
            last_invoke_id: INVOKE_ID_MASK,
            in_flight: None,
            queue: VecDeque::new(),
            state: ServiceState::Ready,
        }
    }

    pub fn state(&self) -> ServiceState {
        self.state
    }

    /// Invoke id of the request currently awaiting its response
    pub fn in_flight(&self) -> Option<u16> {
        self.in_flight
    }

    /// Number of stored requests, in flight and queued
    pub fn pending_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    /// Send a confirmed request
    ///
    /// The request is transmitted at once when nothing is in flight,
    /// otherwise it is queued.
    ///
    /// # Arguments
    ///
    /// * `link` - Connection the request goes out on
    /// * `apdu` - Request; its invoke id is overwritten
    /// * `timeout` - Seconds to wait for the response once transmitted
    /// * `callback` - Receives the outcome exactly once
    ///
    /// # Returns
    ///
    /// The allocated invoke id. Fails with [`PhdError::ServiceUnavailable`]
    /// when all slots are taken or the table is finalizing, and with the
    /// transport error when an immediate transmission fails. The request is
    /// dropped in both cases.
    pub fn send_remote_operation_request(
        &mut self,
        link: &mut Link,
        mut apdu: DataApdu,
        timeout: u64,
        callback: RequestCallback,
    ) -> PhdResult<u16> {
        if matches!(self.state, ServiceState::Finalizing | ServiceState::Finalized) {
            return Err(PhdError::ServiceUnavailable(format!(
                "Request table is {:?}",
                self.state
            )));
        }
        let invoke_id = self.allocate_invoke_id().ok_or_else(|| {
            PhdError::ServiceUnavailable(format!(
                "All {MAX_PENDING_REQUESTS} request slots are pending"
            ))
        })?;

        apdu.invoke_id = invoke_id;
        log::debug!(
            "Storing request {} ({}), {} pending",
            invoke_id,
            apdu.message.name(),
            self.pending_count() + 1
        );
        self.slots[usize::from(invoke_id)] = Some(Request {
            apdu,
            timeout,
            callback: Some(callback),
        });

        if self.state == ServiceState::Ready {
            if let Err(e) = self.transmit(link, invoke_id) {
                self.slots[usize::from(invoke_id)] = None;
                return Err(e);
            }
        } else {
            log::debug!("Request {} queued behind {:?}", invoke_id, self.in_flight);
            self.queue.push_back(invoke_id);
        }
        Ok(invoke_id)
    }

    /// Send an unconfirmed request
    ///
    /// No slot is used, no timeout is started and nothing is retried.
    pub fn send_unconfirmed_operation_request(
        &mut self,
        link: &mut Link,
        mut apdu: DataApdu,
    ) -> PhdResult<()> {
        apdu.invoke_id = UNCONFIRMED_INVOKE_ID;
        link.send(&Apdu::prst(apdu))
    }

    /// Check whether `response` answers the request in flight
    pub fn check_known_invoke_id(&self, response: &DataApdu) -> bool {
        self.in_flight == Some(response.invoke_id)
    }

    /// Retire the in-flight request with `response`
    ///
    /// # Returns
    ///
    /// `false`, with no effect, when the response does not match the
    /// request in flight (late or duplicate responses)
    pub fn request_retired(&mut self, link: &mut Link, response: &DataApdu) -> bool {
        if !self.check_known_invoke_id(response) {
            log::debug!(
                "Ignoring {} with invoke id {}, expected {:?}",
                response.message.name(),
                response.invoke_id,
                self.in_flight
            );
            return false;
        }
        link.cancel_request_timeout(response.invoke_id);
        self.retire_in_flight(RequestOutcome::Response(response.clone()));
        self.advance(link);
        true
    }

    /// Retire the in-flight request after its timer fired
    ///
    /// Queued requests are not transmitted; the connection is about to be
    /// aborted and they are released with it.
    pub fn timeout_fired(&mut self, invoke_id: u16) -> bool {
        if self.in_flight != Some(invoke_id) {
            return false;
        }
        log::warn!("Request {} timed out", invoke_id);
        self.retire_in_flight(RequestOutcome::TimedOut);
        if self.state == ServiceState::Finalizing {
            self.release_queued(RequestOutcome::Disassociated);
            self.state = ServiceState::Finalized;
        }
        true
    }

    /// Stop accepting requests
    ///
    /// Queued requests are released at once. A request in flight may still
    /// complete normally; the table becomes finalized when it does.
    pub fn finalize(&mut self) {
        self.release_queued(RequestOutcome::Disassociated);
        self.state = match self.state {
            ServiceState::Processing | ServiceState::Finalizing => ServiceState::Finalizing,
            ServiceState::Ready | ServiceState::Finalized => ServiceState::Finalized,
        };
    }

    /// Force-retire every remaining request with `outcome`
    pub fn release_all(&mut self, link: &mut Link, outcome: RequestOutcome) {
        if let Some(invoke_id) = self.in_flight {
            link.cancel_request_timeout(invoke_id);
            self.retire_in_flight(outcome.clone());
        }
        self.release_queued(outcome);
        self.state = ServiceState::Finalized;
    }

    /// Prepare the table for a new association
    pub fn reset(&mut self, link: &mut Link) {
        if self.pending_count() > 0 {
            self.release_all(link, RequestOutcome::Disassociated);
        }
        self.last_invoke_id = INVOKE_ID_MASK;
        self.state = ServiceState::Ready;
    }

    fn allocate_invoke_id(&mut self) -> Option<u16> {
        let free = (1..=MAX_PENDING_REQUESTS as u16)
            .map(|step| (self.last_invoke_id + step) & INVOKE_ID_MASK)
            .find(|id| self.slots[usize::from(*id)].is_none())?;
        self.last_invoke_id = free;
        Some(free)
    }

    /// Put a stored request on the wire and arm its timer
    ///
    /// Nothing is armed when the transport refuses the request.
    fn transmit(&mut self, link: &mut Link, invoke_id: u16) -> PhdResult<()> {
        let Some(request) = &self.slots[usize::from(invoke_id)] else {
            return Ok(());
        };
        let timeout = request.timeout;
        if let Err(e) = link.send(&Apdu::prst(request.apdu.clone())) {
            log::error!("Failed to send request {}: {}", invoke_id, e);
            return Err(e);
        }
        link.start_timeout(timeout, TimeoutKind::Request { invoke_id });
        self.in_flight = Some(invoke_id);
        self.state = ServiceState::Processing;
        Ok(())
    }

    fn retire_in_flight(&mut self, outcome: RequestOutcome) {
        let Some(invoke_id) = self.in_flight.take() else {
            return;
        };
        if self.state == ServiceState::Processing {
            self.state = ServiceState::Ready;
        }
        if let Some(request) = self.slots[usize::from(invoke_id)].take() {
            log::debug!("Retiring request {}", invoke_id);
            request.complete(outcome);
        }
    }

    fn release_queued(&mut self, outcome: RequestOutcome) {
        while let Some(invoke_id) = self.queue.pop_front() {
            if let Some(request) = self.slots[usize::from(invoke_id)].take() {
                log::debug!("Releasing queued request {}", invoke_id);
                request.complete(outcome.clone());
            }
        }
    }

    fn advance(&mut self, link: &mut Link) {
        match self.state {
            ServiceState::Ready => {
                while let Some(next) = self.queue.pop_front() {
                    if self.transmit(link, next).is_ok() {
                        break;
                    }
                    if let Some(request) = self.slots[usize::from(next)].take() {
                        request.complete(RequestOutcome::NotSent);
                    }
                }
            }
            ServiceState::Finalizing => {
                self.release_queued(RequestOutcome::Disassociated);
                self.state = ServiceState::Finalized;
            }
            ServiceState::Processing | ServiceState::Finalized => {}
        }
    }
}

impl Default for ServiceTable {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ServiceTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceTable")
            .field("state", &self.state)
            .field("in_flight", &self.in_flight)
            .field("queue", &self.queue)
            .field("pending", &self.pending_count())
            .finish()
    }
}
