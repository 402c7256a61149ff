//! Block framing for URP.
//!
//! Every block starts with an 8-byte header: the payload size and the number
//! of messages in the block, both `u32` big-endian. LibreOffice puts one
//! message in each block, and so do we.

use bytes::{BufMut, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{Result, UrpError};

/// Upper bound on a single block; anything larger is a corrupt stream.
const MAX_BLOCK_SIZE: u32 = 64 * 1024 * 1024;

/// Framed message stream over any byte stream (TCP in production, an
/// in-memory duplex in tests).
pub struct Transport<S> {
    stream: S,
}

impl<S> Transport<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S) -> Self {
        Self { stream }
    }

    /// Send one message in its own block.
    pub async fn send(&mut self, message: &[u8]) -> Result<()> {
        // Header and payload go out in a single write.
        let mut block = BytesMut::with_capacity(8 + message.len());
        block.put_u32(message.len() as u32);
        block.put_u32(1);
        block.put_slice(message);

        self.stream.write_all(&block).await?;
        self.stream.flush().await?;
        Ok(())
    }

    /// Receive the payload of the next block.
    pub async fn recv(&mut self) -> Result<Bytes> {
        let mut header = [0u8; 8];
        if let Err(e) = self.stream.read_exact(&mut header).await {
            return Err(match e.kind() {
                std::io::ErrorKind::UnexpectedEof => UrpError::ConnectionClosed,
                _ => UrpError::Io(e),
            });
        }

        let size = u32::from_be_bytes([header[0], header[1], header[2], header[3]]);
        let count = u32::from_be_bytes([header[4], header[5], header[6], header[7]]);
        if size > MAX_BLOCK_SIZE {
            return Err(UrpError::Protocol(format!("block of {size} bytes exceeds limit")));
        }
        if count > 1 {
            tracing::trace!("block carries {count} messages; treating payload as one");
        }

        let mut payload = BytesMut::zeroed(size as usize);
        self.stream.read_exact(&mut payload).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::UnexpectedEof => UrpError::ConnectionClosed,
            _ => UrpError::Io(e),
        })?;
        Ok(payload.freeze())
    }

    /// Flush and shut down the write half.
    pub async fn shutdown(&mut self) -> Result<()> {
        self.stream.shutdown().await?;
        Ok(())
    }
}
