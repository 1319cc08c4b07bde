//! Agent connection and its builder

pub mod agent;
pub mod builder;

pub use agent::Agent;
pub use builder::{AgentBuilder, AgentConfig};
