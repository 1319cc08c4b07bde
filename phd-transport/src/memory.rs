//! In-process transport
//!
//! Two connected [`MemoryStream`]s behave like the ends of a TCP connection
//! without touching the network. Used to run an agent and a manager in the
//! same process.

use crate::stream::ApduStream;
use async_trait::async_trait;
use phd_core::{PhdError, PhdResult};
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};

/// Buffer size of each direction of a pair
pub const DEFAULT_PIPE_CAPACITY: usize = 64 * 1024;

/// One end of an in-process byte pipe
#[derive(Debug)]
pub struct MemoryStream {
    io: Option<DuplexStream>,
    closed: bool,
}

/// Create two connected streams
pub fn memory_pair() -> (MemoryStream, MemoryStream) {
    let (a, b) = tokio::io::duplex(DEFAULT_PIPE_CAPACITY);
    (MemoryStream::new(a), MemoryStream::new(b))
}

impl MemoryStream {
    fn new(io: DuplexStream) -> Self {
        Self {
            io: Some(io),
            closed: false,
        }
    }

    fn io(&mut self) -> PhdResult<&mut DuplexStream> {
        self.io.as_mut().ok_or_else(|| {
            PhdError::Connection(std::io::Error::new(
                std::io::ErrorKind::NotConnected,
                "Memory stream closed",
            ))
        })
    }
}

#[async_trait]
impl ApduStream for MemoryStream {
    async fn read(&mut self, buf: &mut [u8]) -> PhdResult<usize> {
        let n = self.io()?.read(buf).await?;
        if n == 0 {
            self.closed = true;
        }
        Ok(n)
    }

    async fn write_apdu(&mut self, apdu: &[u8]) -> PhdResult<()> {
        let io = self.io()?;
        io.write_all(apdu).await?;
        io.flush().await?;
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed
    }

    async fn close(&mut self) -> PhdResult<()> {
        if let Some(mut io) = self.io.take() {
            let _ = io.shutdown().await;
        }
        self.closed = true;
        Ok(())
    }
}
