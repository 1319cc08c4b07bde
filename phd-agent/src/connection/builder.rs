//! Agent builder
//!
//! # Usage Example
//!
//! ```rust,no_run
//! use phd_agent::AgentBuilder;
//! use phd_application::PulseOximeter;
//! use std::sync::Arc;
//!
//! # async fn run() -> anyhow::Result<()> {
//! let mut agent = AgentBuilder::new(Arc::new(PulseOximeter::new(0x0190)))
//!     .tcp("127.0.0.1:6024".parse()?)
//!     .system_id([1, 2, 3, 4, 5, 6, 7, 8])
//!     .connect()
//!     .await?;
//! agent.associate().await?;
//! # Ok(())
//! # }
//! ```

use super::Agent;
use anyhow::{Context, Result};
use phd_application::specialization::standard_specializations;
use phd_application::{
    ChannelListener, ChannelPlugin, ConnectionContext, ConnectionDriver, ConnectionListener,
    ContextId, EngineConfig, Specialization,
};
use phd_core::Role;
use phd_transport::tcp::DEFAULT_PORT;
use phd_transport::{ApduStream, TcpSettings, TcpTransport};
use serde::{Deserialize, Serialize};
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

/// Serializable agent configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Manager to connect to
    pub manager_address: SocketAddr,
    /// Standard configuration the agent announces
    pub dev_config_id: u16,
    pub engine: EngineConfig,
    /// How long [`Agent::associate`] waits for the outcome
    pub association_wait: Duration,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            manager_address: SocketAddr::from((Ipv4Addr::LOCALHOST, DEFAULT_PORT)),
            dev_config_id: 0x0190,
            engine: EngineConfig::for_role(Role::Agent),
            association_wait: Duration::from_secs(30),
        }
    }
}

/// Builder of an [`Agent`]
#[derive(Clone)]
pub struct AgentBuilder {
    specialization: Arc<dyn Specialization>,
    engine: EngineConfig,
    manager_address: SocketAddr,
    association_wait: Duration,
    id: ContextId,
    listeners: Vec<Arc<dyn ConnectionListener>>,
}

impl AgentBuilder {
    /// Start building an agent emulating `specialization`
    pub fn new(specialization: Arc<dyn Specialization>) -> Self {
        let defaults = AgentConfig::default();
        Self {
            specialization,
            engine: defaults.engine,
            manager_address: defaults.manager_address,
            association_wait: defaults.association_wait,
            id: ContextId(1),
            listeners: Vec::new(),
        }
    }

    /// Builder for one of the standard device configurations
    ///
    /// # Errors
    /// Returns error if `config.dev_config_id` is not a standard configuration
    pub fn from_config(config: AgentConfig) -> Result<Self> {
        let specialization = standard_specializations()
            .into_iter()
            .find(|s| s.dev_config_id() == config.dev_config_id)
            .with_context(|| {
                format!(
                    "no standard specialization for configuration 0x{:04X}",
                    config.dev_config_id
                )
            })?;
        Ok(Self::new(specialization)
            .tcp(config.manager_address)
            .engine(config.engine)
            .association_wait(config.association_wait))
    }

    /// Manager address used by [`connect`](Self::connect)
    pub fn tcp(mut self, address: SocketAddr) -> Self {
        self.manager_address = address;
        self
    }

    pub fn engine(mut self, engine: EngineConfig) -> Self {
        self.engine = engine;
        self
    }

    /// EUI-64 announced in the AARQ
    pub fn system_id(mut self, system_id: impl Into<Vec<u8>>) -> Self {
        self.engine.system_id = system_id.into();
        self
    }

    pub fn association_wait(mut self, wait: Duration) -> Self {
        self.association_wait = wait;
        self
    }

    /// Identifier used in the agent's notifications
    pub fn id(mut self, id: ContextId) -> Self {
        self.id = id;
        self
    }

    /// Also deliver the agent's notifications to `listener`
    pub fn listener(mut self, listener: Arc<dyn ConnectionListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    /// Connect to the manager over TCP
    pub async fn connect(self) -> Result<Agent> {
        let address = self.manager_address;
        let transport = TcpTransport::connect(TcpSettings::new(address))
            .await
            .with_context(|| format!("failed to connect to manager at {}", address))?;
        Ok(self.attach(transport))
    }

    /// Run the agent over an already connected stream
    ///
    /// Must be called within a tokio runtime.
    pub fn attach<S>(self, stream: S) -> Agent
    where
        S: ApduStream + 'static,
    {
        let (plugin, channels) = ChannelPlugin::new();
        let mut ctx = ConnectionContext::agent(
            self.id,
            Box::new(plugin),
            self.engine,
            self.specialization.clone(),
        );
        let (events, receiver) = ChannelListener::new();
        ctx.add_listener(Arc::new(events));
        for listener in self.listeners {
            ctx.add_listener(listener);
        }
        let (driver, handle) = ConnectionDriver::new(ctx, channels, stream);
        let task = tokio::spawn(driver.run());
        log::info!(
            "{}: agent started with configuration 0x{:04X}",
            self.id,
            self.specialization.dev_config_id()
        );
        Agent::new(self.id, self.specialization, handle, receiver, task, self.association_wait)
    }
}
