//! TCP listener of the manager host
//!
//! Accepts agent connections and attaches each one to the [`Manager`]. A
//! failed accept or attach is logged and the loop keeps going.

use crate::server::Manager;
use anyhow::{Context, Result};
use phd_transport::TcpTransport;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

/// Listening socket bound to a [`Manager`]
pub struct ManagerListener {
    manager: Arc<Manager>,
    listener: TcpListener,
}

impl ManagerListener {
    /// Bind to the address in the manager configuration
    pub async fn bind(manager: Arc<Manager>) -> Result<Self> {
        let address = manager.config().listen_address;
        Self::bind_to(manager, address).await
    }

    /// Bind to an explicit address, port 0 picking a free one
    pub async fn bind_to(manager: Arc<Manager>, address: SocketAddr) -> Result<Self> {
        let listener = TcpListener::bind(address)
            .await
            .with_context(|| format!("failed to bind to {}", address))?;
        log::info!("Manager listening on {}", listener.local_addr()?);
        Ok(Self { manager, listener })
    }

    /// Address actually bound
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connections until the task is cancelled
    pub async fn run(self) -> Result<()> {
        loop {
            match self.listener.accept().await {
                Ok((stream, peer)) => {
                    log::info!("Accepted connection from {}", peer);
                    if let Err(e) = self.accept(stream).await {
                        log::error!("Dropping connection from {}: {:#}", peer, e);
                    }
                }
                Err(e) => {
                    log::error!("Error accepting connection: {}", e);
                }
            }
        }
    }

    async fn accept(&self, stream: tokio::net::TcpStream) -> Result<()> {
        let transport =
            TcpTransport::from_connected_stream(stream).context("failed to set up TCP stream")?;
        let id = self.manager.attach(transport).await?;
        log::debug!("{}: served over TCP", id);
        Ok(())
    }
}
