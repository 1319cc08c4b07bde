//! Transport plugin plus the connection's single timer slot

use phd_asn1::{Apdu, ApduCodec};
use phd_core::PhdResult;
use phd_transport::{TimerHandle, TransportPlugin};

/// What a pending timeout guards
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutKind {
    /// AARQ sent
    Association,
    /// Waiting for the agent's configuration report
    Configuring,
    /// RLRQ sent
    Release,
    /// Confirmed request in flight
    Request { invoke_id: u16 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PendingTimeout {
    handle: TimerHandle,
    kind: TimeoutKind,
}

/// Outbound side of a connection
///
/// Owns the transport plugin and the only timer a connection may have
/// running. Starting a timer cancels the previous one.
pub struct Link {
    transport: Box<dyn TransportPlugin>,
    codec: ApduCodec,
    timeout: Option<PendingTimeout>,
}

impl Link {
    pub fn new(transport: Box<dyn TransportPlugin>, codec: ApduCodec) -> Self {
        Self {
            transport,
            codec,
            timeout: None,
        }
    }

    pub fn codec(&self) -> &ApduCodec {
        &self.codec
    }

    pub fn init(&mut self) -> PhdResult<()> {
        self.transport.init()
    }

    /// Encode and send one APDU
    pub fn send(&mut self, apdu: &Apdu) -> PhdResult<()> {
        let bytes = self.codec.encode(apdu)?;
        log::trace!("Sending {} ({} bytes)", apdu.name(), bytes.len());
        self.transport.send_apdu(&bytes)
    }

    pub fn disconnect(&mut self) -> PhdResult<()> {
        self.cancel_timeout();
        self.transport.disconnect()
    }

    /// Start a timer, replacing any running one
    pub fn start_timeout(&mut self, seconds: u64, kind: TimeoutKind) {
        self.cancel_timeout();
        let handle = self.transport.count_timeout(seconds);
        log::trace!("Started {} ({:?}, {}s)", handle, kind, seconds);
        self.timeout = Some(PendingTimeout { handle, kind });
    }

    /// Cancel the running timer, if any
    pub fn cancel_timeout(&mut self) {
        if let Some(pending) = self.timeout.take() {
            self.transport.reset_timeout(pending.handle);
        }
    }

    /// Cancel the running timer only if it guards the request `invoke_id`
    pub fn cancel_request_timeout(&mut self, invoke_id: u16) {
        if self.pending_kind() == Some(TimeoutKind::Request { invoke_id }) {
            self.cancel_timeout();
        }
    }

    pub fn pending_kind(&self) -> Option<TimeoutKind> {
        self.timeout.map(|pending| pending.kind)
    }

    /// Claim a fired timer
    ///
    /// # Returns
    ///
    /// What the timer guarded, or `None` for a stale handle that was
    /// cancelled or replaced before it fired
    pub fn take_fired(&mut self, handle: TimerHandle) -> Option<TimeoutKind> {
        match self.timeout {
            Some(pending) if pending.handle == handle => {
                self.timeout = None;
                Some(pending.kind)
            }
            _ => None,
        }
    }
}

impl std::fmt::Debug for Link {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Link")
            .field("codec", &self.codec)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}
