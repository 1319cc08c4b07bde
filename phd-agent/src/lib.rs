//! ISO/IEEE 11073-20601 agent host
//!
//! Emulates a personal health device: an [`AgentBuilder`] picks the device
//! specialization and the transport, and the resulting [`Agent`] associates
//! with a manager and sends measurements.

pub mod connection;

pub use connection::{Agent, AgentBuilder, AgentConfig};
