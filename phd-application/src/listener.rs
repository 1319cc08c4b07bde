//! Connection notifications
//!
//! Listeners are told about lifecycle changes of a connection and about
//! measurements decoded from event reports.

use crate::fsm::FsmState;
use crate::report::DataReport;
use std::fmt;

/// Identifier of a connection context within its host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct ContextId(pub u64);

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A notification emitted by a connection context
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionEvent {
    /// Any state transition
    StateChanged {
        context: ContextId,
        from: FsmState,
        to: FsmState,
    },
    /// Transport connected, association not yet started
    Connected { context: ContextId },
    /// The association reached the operating state
    Associated { context: ContextId },
    /// The operating state was left
    Unavailable { context: ContextId },
    /// Transport disconnected
    Disconnected { context: ContextId },
    /// A protocol timer expired
    Timeout { context: ContextId },
    /// Measurements decoded from an event report
    Measurement {
        context: ContextId,
        report: DataReport,
    },
}

impl ConnectionEvent {
    /// Context the event belongs to
    pub fn context(&self) -> ContextId {
        match self {
            Self::StateChanged { context, .. }
            | Self::Connected { context }
            | Self::Associated { context }
            | Self::Unavailable { context }
            | Self::Disconnected { context }
            | Self::Timeout { context }
            | Self::Measurement { context, .. } => *context,
        }
    }

    /// Check if the event ends the usability of the device
    #[must_use]
    pub fn is_termination(&self) -> bool {
        matches!(self, Self::Unavailable { .. } | Self::Disconnected { .. })
    }
}

/// Receiver of connection notifications
///
/// Called synchronously from the context; implementations must not block.
pub trait ConnectionListener: Send + Sync {
    /// Called when a connection event occurs
    ///
    /// # Arguments
    /// * `event` - The event that occurred
    fn on_event(&self, event: &ConnectionEvent);
}

/// Callback-based listener
pub struct CallbackListener<F>
where
    F: Fn(&ConnectionEvent) + Send + Sync,
{
    callback: F,
}

impl<F> CallbackListener<F>
where
    F: Fn(&ConnectionEvent) + Send + Sync,
{
    /// Create a new callback-based listener
    ///
    /// # Arguments
    /// * `callback` - Function to call when an event occurs
    #[must_use]
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F> ConnectionListener for CallbackListener<F>
where
    F: Fn(&ConnectionEvent) + Send + Sync,
{
    fn on_event(&self, event: &ConnectionEvent) {
        (self.callback)(event);
    }
}

/// Listener forwarding events to a tokio channel
#[cfg(feature = "tokio")]
pub struct ChannelListener {
    tx: tokio::sync::mpsc::UnboundedSender<ConnectionEvent>,
}

#[cfg(feature = "tokio")]
impl ChannelListener {
    /// Create a listener and the receiver of its events
    pub fn new() -> (Self, tokio::sync::mpsc::UnboundedReceiver<ConnectionEvent>) {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Wrap an existing sender
    pub fn from_sender(tx: tokio::sync::mpsc::UnboundedSender<ConnectionEvent>) -> Self {
        Self { tx }
    }
}

#[cfg(feature = "tokio")]
impl ConnectionListener for ChannelListener {
    fn on_event(&self, event: &ConnectionEvent) {
        // the receiver may be gone
        let _ = self.tx.send(event.clone());
    }
}
