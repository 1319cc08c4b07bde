//! Protocol engine for ISO/IEEE 11073-20601
//!
//! This crate drives one agent-manager connection through association,
//! configuration, operation and release:
//!
//! - [`context::ConnectionContext`] owns the per-connection state and is
//!   fed received bytes, fired timers and application requests
//! - [`fsm`] holds the transition tables of both roles
//! - [`service`] correlates confirmed requests with their responses
//! - [`configurations`] keeps the standard and learned configurations
//! - [`specialization`] describes device types an agent can emulate
//! - `driver` (feature `tokio`) runs a context over an async stream

pub mod config;
pub mod configurations;
pub mod context;
pub mod fsm;
pub mod link;
pub mod listener;
pub mod mds;
pub mod report;
pub mod service;
pub mod specialization;

mod association;
mod configuring;
mod disassociating;
mod operating;

#[cfg(feature = "tokio")]
pub mod driver;

pub use config::{EngineConfig, RetryPolicy, Timeouts};
pub use configurations::{ConfigurationRegistry, ExtConfigStore, InMemoryExtConfigStore};
pub use context::ConnectionContext;
pub use fsm::{FsmEvent, FsmOutcome, FsmState};
pub use listener::{CallbackListener, ConnectionEvent, ConnectionListener, ContextId};
pub use mds::{Mds, MdsObject};
pub use report::{DataReport, Observation, ObservedValue, ScanReport};
pub use service::{RequestCallback, RequestOutcome, ServiceState};
pub use specialization::{
    BloodPressureMonitor, Glucometer, PulseOximeter, Reading, Specialization, WeighingScale,
};

#[cfg(feature = "tokio")]
pub use driver::{ChannelPlugin, ConnectionDriver, DriverHandle, ManagerRequest, PluginChannels};
#[cfg(feature = "tokio")]
pub use listener::ChannelListener;
