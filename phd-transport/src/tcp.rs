//! TCP transport implementation

use crate::stream::ApduStream;
use async_trait::async_trait;
use phd_core::{PhdError, PhdResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

/// Default TCP port used by the agent and manager hosts
pub const DEFAULT_PORT: u16 = 6024;

/// Wrapper for TcpStream that implements Debug
struct DebugTcpStream(TcpStream);

impl fmt::Debug for DebugTcpStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TcpStream")
            .field("peer", &self.0.peer_addr().ok())
            .finish()
    }
}

/// TCP transport settings
///
/// `connect_timeout` bounds connection establishment, `write_timeout` bounds
/// each write. Reads never time out: an associated agent may stay silent for
/// a long time and protocol timeouts are handled by the state machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TcpSettings {
    pub address: SocketAddr,
    pub connect_timeout: Option<Duration>,
    pub write_timeout: Option<Duration>,
}

impl TcpSettings {
    /// Create new TCP settings
    pub fn new(address: SocketAddr) -> Self {
        Self {
            address,
            connect_timeout: Some(Duration::from_secs(10)),
            write_timeout: Some(Duration::from_secs(10)),
        }
    }

    /// Set the connection establishment timeout
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Set the per-write timeout
    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = Some(timeout);
        self
    }
}

/// TCP transport carrying APDU frames
#[derive(Debug)]
pub struct TcpTransport {
    stream: Option<DebugTcpStream>,
    settings: TcpSettings,
    closed: bool,
}

fn not_connected() -> PhdError {
    PhdError::Connection(std::io::Error::new(
        std::io::ErrorKind::NotConnected,
        "TCP stream not connected",
    ))
}

impl TcpTransport {
    /// Create a new, unconnected TCP transport
    pub fn new(settings: TcpSettings) -> Self {
        Self {
            stream: None,
            settings,
            closed: true,
        }
    }

    /// Create TCP transport from address string
    pub fn from_address(address: &str) -> PhdResult<Self> {
        let addr: SocketAddr = address
            .parse()
            .map_err(|e| PhdError::InvalidData(format!("Invalid TCP address: {}", e)))?;
        Ok(Self::new(TcpSettings::new(addr)))
    }

    /// Connect to the configured address
    pub async fn connect(settings: TcpSettings) -> PhdResult<Self> {
        let mut transport = Self::new(settings);
        transport.open().await?;
        Ok(transport)
    }

    /// Create TCP transport from an already-connected TcpStream (for manager use)
    pub fn from_connected_stream(stream: TcpStream) -> PhdResult<Self> {
        let address = stream.peer_addr()?;
        stream.set_nodelay(true)?;
        Ok(Self {
            stream: Some(DebugTcpStream(stream)),
            settings: TcpSettings::new(address),
            closed: false,
        })
    }

    /// Open the connection
    pub async fn open(&mut self) -> PhdResult<()> {
        if !self.closed {
            return Err(PhdError::Connection(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "Connection has already been opened",
            )));
        }

        let stream = if let Some(timeout) = self.settings.connect_timeout {
            tokio::time::timeout(timeout, TcpStream::connect(self.settings.address))
                .await
                .map_err(|_| PhdError::Timeout)??
        } else {
            TcpStream::connect(self.settings.address).await?
        };
        stream.set_nodelay(true)?;
        log::debug!("TCP connected to {}", self.settings.address);

        self.stream = Some(DebugTcpStream(stream));
        self.closed = false;
        Ok(())
    }

    /// Address of the remote end
    pub fn peer_address(&self) -> SocketAddr {
        self.settings.address
    }
}

#[async_trait]
impl ApduStream for TcpTransport {
    async fn read(&mut self, buf: &mut [u8]) -> PhdResult<usize> {
        let stream = self.stream.as_mut().ok_or_else(not_connected)?;
        match stream.0.read(buf).await {
            Ok(0) => {
                self.closed = true;
                Ok(0)
            }
            Ok(n) => Ok(n),
            Err(e) => {
                self.closed = true;
                Err(PhdError::Connection(e))
            }
        }
    }

    async fn write_apdu(&mut self, apdu: &[u8]) -> PhdResult<()> {
        let stream = self.stream.as_mut().ok_or_else(not_connected)?;
        let write = async {
            stream.0.write_all(apdu).await?;
            stream.0.flush().await
        };
        if let Some(timeout) = self.settings.write_timeout {
            tokio::time::timeout(timeout, write)
                .await
                .map_err(|_| PhdError::Timeout)??;
        } else {
            write.await?;
        }
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed
    }

    async fn close(&mut self) -> PhdResult<()> {
        if let Some(mut stream) = self.stream.take() {
            let _ = stream.0.shutdown().await;
            log::debug!("TCP connection to {} closed", self.settings.address);
        }
        self.closed = true;
        Ok(())
    }
}
