//! Framed APDU stream trait

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use phd_core::{PhdError, PhdResult};

/// Size of the `choice | length` header that starts every APDU
pub const APDU_HEADER_LENGTH: usize = 4;

/// Async byte stream carrying whole APDUs
#[async_trait]
pub trait ApduStream: Send {
    /// Read data from the stream
    ///
    /// # Returns
    ///
    /// Number of bytes read, or 0 if EOF
    async fn read(&mut self, buf: &mut [u8]) -> PhdResult<usize>;

    /// Read exact number of bytes from the stream
    async fn read_exact(&mut self, mut buf: &mut [u8]) -> PhdResult<()> {
        while !buf.is_empty() {
            let n = self.read(buf).await?;
            if n == 0 {
                return Err(PhdError::Connection(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "Connection closed inside an APDU",
                )));
            }
            buf = &mut buf[n..];
        }
        Ok(())
    }

    /// Read one complete APDU frame
    ///
    /// # Returns
    ///
    /// The frame including its header, or `None` if the peer closed the
    /// connection between two frames
    async fn read_apdu(&mut self) -> PhdResult<Option<Bytes>> {
        let mut header = [0u8; APDU_HEADER_LENGTH];
        let n = self.read(&mut header).await?;
        if n == 0 {
            return Ok(None);
        }
        self.read_exact(&mut header[n..]).await?;

        let length = u16::from_be_bytes([header[2], header[3]]) as usize;
        let mut frame = BytesMut::zeroed(APDU_HEADER_LENGTH + length);
        frame[..APDU_HEADER_LENGTH].copy_from_slice(&header);
        self.read_exact(&mut frame[APDU_HEADER_LENGTH..]).await?;
        Ok(Some(frame.freeze()))
    }

    /// Write one complete APDU frame
    async fn write_apdu(&mut self, apdu: &[u8]) -> PhdResult<()>;

    /// Check if the stream is closed
    fn is_closed(&self) -> bool;

    /// Close the stream
    async fn close(&mut self) -> PhdResult<()>;
}
