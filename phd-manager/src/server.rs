//! Manager host
//!
//! Tracks every agent connection by its [`ContextId`]. Each connection runs
//! in its own tokio task; the registry entry disappears when the task ends.

use anyhow::{Context, Result};
use phd_application::{
    ChannelPlugin, ConfigurationRegistry, ConnectionContext, ConnectionDriver, ConnectionListener,
    ContextId, DriverHandle, EngineConfig, FsmState, ManagerRequest, RequestOutcome,
};
use phd_core::Role;
use phd_transport::ApduStream;
use phd_transport::tcp::DEFAULT_PORT;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;

/// Manager configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    /// Address the TCP listener binds to
    pub listen_address: SocketAddr,
    /// Engine settings applied to every connection
    pub engine: EngineConfig,
    /// Connections refused once this many are live
    pub max_connections: usize,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            listen_address: SocketAddr::from((Ipv4Addr::UNSPECIFIED, DEFAULT_PORT)),
            engine: EngineConfig::for_role(Role::Manager),
            max_connections: 64,
        }
    }
}

impl ManagerConfig {
    pub fn with_listen_address(mut self, address: SocketAddr) -> Self {
        self.listen_address = address;
        self
    }

    pub fn with_engine(mut self, engine: EngineConfig) -> Self {
        self.engine = engine;
        self
    }

    pub fn with_max_connections(mut self, max_connections: usize) -> Self {
        self.max_connections = max_connections;
        self
    }
}

type ConnectionMap = Arc<RwLock<HashMap<ContextId, DriverHandle>>>;

/// Manager serving any number of agents
///
/// # Usage Example
/// ```rust,no_run
/// use phd_manager::{Manager, ManagerConfig, ManagerListener};
/// use std::sync::Arc;
///
/// # async fn run() -> anyhow::Result<()> {
/// let manager = Arc::new(Manager::new(ManagerConfig::default()));
/// let listener = ManagerListener::bind(manager.clone()).await?;
/// listener.run().await
/// # }
/// ```
pub struct Manager {
    config: ManagerConfig,
    registry: Arc<ConfigurationRegistry>,
    listeners: std::sync::RwLock<Vec<Arc<dyn ConnectionListener>>>,
    connections: ConnectionMap,
    next_id: AtomicU64,
}

impl Manager {
    /// Create a manager knowing the standard configurations
    pub fn new(config: ManagerConfig) -> Self {
        Self::with_registry(config, Arc::new(ConfigurationRegistry::with_defaults()))
    }

    /// Create a manager sharing an existing configuration registry
    pub fn with_registry(config: ManagerConfig, registry: Arc<ConfigurationRegistry>) -> Self {
        Self {
            config,
            registry,
            listeners: std::sync::RwLock::new(Vec::new()),
            connections: Arc::new(RwLock::new(HashMap::new())),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<ConfigurationRegistry> {
        &self.registry
    }

    /// Subscribe to the events of every connection accepted from now on
    pub fn add_listener(&self, listener: Arc<dyn ConnectionListener>) {
        match self.listeners.write() {
            Ok(mut listeners) => listeners.push(listener),
            Err(poisoned) => poisoned.into_inner().push(listener),
        }
    }

    fn listener_snapshot(&self) -> Vec<Arc<dyn ConnectionListener>> {
        match self.listeners.read() {
            Ok(listeners) => listeners.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Number of live connections
    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }

    /// Identifiers of the live connections
    pub async fn connections(&self) -> Vec<ContextId> {
        let mut ids: Vec<ContextId> = self.connections.read().await.keys().copied().collect();
        ids.sort();
        ids
    }

    /// Handle of a live connection
    pub async fn connection(&self, id: ContextId) -> Option<DriverHandle> {
        self.connections.read().await.get(&id).cloned()
    }

    /// Run the protocol engine over an accepted stream
    ///
    /// # Errors
    /// Returns error if the connection limit is reached; the stream is
    /// dropped in that case.
    pub async fn attach<S>(&self, stream: S) -> Result<ContextId>
    where
        S: ApduStream + 'static,
    {
        let mut connections = self.connections.write().await;
        if connections.len() >= self.config.max_connections {
            anyhow::bail!(
                "connection limit of {} reached",
                self.config.max_connections
            );
        }

        let id = ContextId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (plugin, channels) = ChannelPlugin::new();
        let mut ctx = ConnectionContext::manager(
            id,
            Box::new(plugin),
            self.config.engine.clone(),
            self.registry.clone(),
        );
        for listener in self.listener_snapshot() {
            ctx.add_listener(listener);
        }
        let (driver, handle) = ConnectionDriver::new(ctx, channels, stream);
        connections.insert(id, handle);
        drop(connections);

        let registry = self.connections.clone();
        tokio::spawn(async move {
            match driver.run().await {
                Ok(ctx) => log::info!("{}: connection ended in {}", id, ctx.state()),
                Err(e) => log::error!("{}: connection failed: {}", id, e),
            }
            registry.write().await.remove(&id);
        });
        log::info!("{}: agent connection attached", id);
        Ok(id)
    }

    /// Issue a confirmed request on a connection and wait for its outcome
    pub async fn request(&self, id: ContextId, request: ManagerRequest) -> Result<RequestOutcome> {
        let handle = self.handle(id).await?;
        handle
            .request(request)
            .await
            .with_context(|| format!("request on {} failed", id))
    }

    /// Current state of a connection
    pub async fn state(&self, id: ContextId) -> Result<FsmState> {
        let handle = self.handle(id).await?;
        handle
            .state()
            .await
            .with_context(|| format!("state of {} unavailable", id))
    }

    /// Release the association of a connection
    pub async fn release(&self, id: ContextId) -> Result<()> {
        let handle = self.handle(id).await?;
        handle
            .release()
            .await
            .with_context(|| format!("release of {} failed", id))?;
        Ok(())
    }

    /// Close every connection
    pub async fn shutdown(&self) {
        let handles: Vec<(ContextId, DriverHandle)> = self
            .connections
            .read()
            .await
            .iter()
            .map(|(id, handle)| (*id, handle.clone()))
            .collect();
        for (id, handle) in handles {
            if let Err(e) = handle.disconnect().await {
                log::debug!("{}: already gone: {}", id, e);
            }
        }
        self.registry.shutdown();
    }

    async fn handle(&self, id: ContextId) -> Result<DriverHandle> {
        self.connection(id)
            .await
            .with_context(|| format!("no connection {}", id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use phd_application::{ChannelListener, ConnectionEvent, PulseOximeter};
    use phd_core::protocol::MDS_HANDLE;
    use phd_transport::memory_pair;
    use std::time::Duration;

    fn agent_driver(stream: phd_transport::MemoryStream) -> DriverHandle {
        let (plugin, channels) = ChannelPlugin::new();
        let ctx = ConnectionContext::agent(
            ContextId(100),
            Box::new(plugin),
            EngineConfig::for_role(Role::Agent).with_system_id([1, 2, 3, 4, 5, 6, 7, 8]),
            Arc::new(PulseOximeter::new(0x0190)),
        );
        let (driver, handle) = ConnectionDriver::new(ctx, channels, stream);
        tokio::spawn(driver.run());
        handle
    }

    #[test]
    fn test_config_defaults() {
        let config = ManagerConfig::default();
        assert_eq!(config.listen_address.port(), 6024);
        assert_eq!(config.max_connections, 64);
        let config = config.with_max_connections(1);
        assert_eq!(config.max_connections, 1);
    }

    #[tokio::test]
    async fn test_attach_and_request() {
        let manager = Manager::new(ManagerConfig::default());
        let (listener, mut events) = ChannelListener::new();
        manager.add_listener(Arc::new(listener));

        let (agent_stream, manager_stream) = memory_pair();
        let id = manager.attach(manager_stream).await.unwrap();
        assert_eq!(manager.connections().await, vec![id]);

        let agent = agent_driver(agent_stream);
        agent.associate().await.unwrap();
        loop {
            let event = tokio::time::timeout(Duration::from_secs(5), events.recv())
                .await
                .unwrap()
                .unwrap();
            if matches!(event, ConnectionEvent::Associated { .. }) {
                break;
            }
        }
        assert_eq!(manager.state(id).await.unwrap(), FsmState::Operating);

        let outcome = manager
            .request(
                id,
                ManagerRequest::Get {
                    obj_handle: MDS_HANDLE,
                    attribute_ids: Vec::new(),
                },
            )
            .await
            .unwrap();
        assert!(matches!(outcome, RequestOutcome::Response(_)));

        manager.shutdown().await;
        for _ in 0..50 {
            if manager.connection_count().await == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(manager.connection_count().await, 0);
        assert!(manager.state(id).await.is_err());
    }

    #[tokio::test]
    async fn test_connection_limit() {
        let manager = Manager::new(ManagerConfig::default().with_max_connections(1));
        let (_agent_a, stream_a) = memory_pair();
        let (_agent_b, stream_b) = memory_pair();
        manager.attach(stream_a).await.unwrap();
        let err = manager.attach(stream_b).await.unwrap_err();
        assert!(err.to_string().contains("connection limit"));
    }
}
