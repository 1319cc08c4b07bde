//! Running agent

use anyhow::{Context, Result, bail};
use phd_application::{
    ConnectionContext, ConnectionEvent, ContextId, DriverHandle, FsmState, Reading, Specialization,
};
use phd_core::PhdResult;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;

/// Agent connected to a manager
pub struct Agent {
    id: ContextId,
    specialization: Arc<dyn Specialization>,
    handle: DriverHandle,
    events: UnboundedReceiver<ConnectionEvent>,
    task: JoinHandle<PhdResult<ConnectionContext>>,
    association_wait: Duration,
}

impl Agent {
    pub(crate) fn new(
        id: ContextId,
        specialization: Arc<dyn Specialization>,
        handle: DriverHandle,
        events: UnboundedReceiver<ConnectionEvent>,
        task: JoinHandle<PhdResult<ConnectionContext>>,
        association_wait: Duration,
    ) -> Self {
        Self {
            id,
            specialization,
            handle,
            events,
            task,
            association_wait,
        }
    }

    pub fn id(&self) -> ContextId {
        self.id
    }

    pub fn specialization(&self) -> &Arc<dyn Specialization> {
        &self.specialization
    }

    /// Handle to the connection driver, for use from other tasks
    pub fn handle(&self) -> &DriverHandle {
        &self.handle
    }

    /// Current state of the connection
    pub async fn state(&self) -> Result<FsmState> {
        Ok(self.handle.state().await?)
    }

    /// Next notification of the connection
    ///
    /// # Returns
    /// `None` once the connection is gone
    pub async fn next_event(&mut self) -> Option<ConnectionEvent> {
        self.events.recv().await
    }

    /// Associate and wait until the agent is operating
    ///
    /// Sending the configuration, when the manager asks for it, happens on
    /// the way.
    ///
    /// # Errors
    /// Returns error if the manager rejects the association, the attempt
    /// times out or the connection drops.
    pub async fn associate(&mut self) -> Result<()> {
        self.handle.associate().await?;
        let wait = self.association_wait;
        tokio::time::timeout(wait, self.wait_until_operating())
            .await
            .with_context(|| format!("{}: not associated after {:?}", self.id, wait))?
    }

    async fn wait_until_operating(&mut self) -> Result<()> {
        while let Some(event) = self.events.recv().await {
            match event {
                ConnectionEvent::StateChanged {
                    to: FsmState::Operating,
                    ..
                } => return Ok(()),
                // Disconnected -> Unassociated is the transport coming up
                ConnectionEvent::StateChanged { from, to, .. }
                    if to == FsmState::Disconnected
                        || (to == FsmState::Unassociated && from != FsmState::Disconnected) =>
                {
                    bail!("{}: association failed ({} -> {})", self.id, from, to)
                }
                _ => {}
            }
        }
        bail!("{}: connection closed while associating", self.id)
    }

    /// Send one measurement as an unconfirmed event report
    pub async fn send_data(&self, reading: Reading) -> Result<()> {
        self.handle
            .send_data(reading)
            .await
            .with_context(|| format!("{}: measurement not sent", self.id))
    }

    /// Release the association
    pub async fn release(&self) -> Result<()> {
        self.handle.release().await?;
        Ok(())
    }

    /// Close the connection and wait for the driver to stop
    ///
    /// # Returns
    /// The connection context in its final state
    pub async fn disconnect(self) -> Result<ConnectionContext> {
        if !self.handle.is_closed() {
            // the driver may stop on its own in between
            let _ = self.handle.disconnect().await;
        }
        self.join().await
    }

    /// Wait for the connection to end without closing it
    pub async fn join(self) -> Result<ConnectionContext> {
        let ctx = self
            .task
            .await
            .context("agent task panicked")?
            .context("agent connection failed")?;
        Ok(ctx)
    }
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("id", &self.id)
            .field("dev_config_id", &self.specialization.dev_config_id())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use crate::AgentBuilder;
    use phd_application::{
        ChannelPlugin, ConfigurationRegistry, ConnectionContext, ConnectionDriver, ContextId,
        EngineConfig, FsmState, InMemoryExtConfigStore, PulseOximeter,
    };
    use phd_core::Role;
    use phd_transport::memory_pair;
    use std::sync::Arc;
    use std::time::Duration;

    fn spawn_manager(
        stream: phd_transport::MemoryStream,
        registry: Arc<ConfigurationRegistry>,
    ) -> phd_application::DriverHandle {
        let (plugin, channels) = ChannelPlugin::new();
        let ctx = ConnectionContext::manager(
            ContextId(1),
            Box::new(plugin),
            EngineConfig::for_role(Role::Manager),
            registry,
        );
        let (driver, handle) = ConnectionDriver::new(ctx, channels, stream);
        tokio::spawn(driver.run());
        handle
    }

    #[tokio::test]
    async fn test_associate_with_unknown_configuration() {
        let (agent_stream, manager_stream) = memory_pair();
        // a manager without standard configurations asks for the report
        let store = Arc::new(InMemoryExtConfigStore::new());
        let registry = Arc::new(ConfigurationRegistry::new(store.clone()));
        let manager = spawn_manager(manager_stream, registry);

        let mut agent = AgentBuilder::new(Arc::new(PulseOximeter::new(0x0190)))
            .association_wait(Duration::from_secs(5))
            .attach(agent_stream);
        agent.associate().await.unwrap();
        assert_eq!(agent.state().await.unwrap(), FsmState::Operating);
        assert_eq!(manager.state().await.unwrap(), FsmState::Operating);
        assert_eq!(store.len(), 1);

        let ctx = agent.disconnect().await.unwrap();
        assert_eq!(ctx.state(), FsmState::Disconnected);
    }

    #[tokio::test]
    async fn test_associate_fails_when_manager_gone() {
        let (agent_stream, manager_stream) = memory_pair();
        drop(manager_stream);
        let mut agent = AgentBuilder::new(Arc::new(PulseOximeter::new(0x0190)))
            .association_wait(Duration::from_secs(5))
            .attach(agent_stream);
        assert!(agent.associate().await.is_err());
    }
}
