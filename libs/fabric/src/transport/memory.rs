use tokio::io::{AsyncWriteExt, DuplexStream};

use crate::error::Result;
use crate::transport::{read_frame, write_frame, Transport, DEFAULT_MAX_FRAME_SIZE};

/// Bytes buffered in each direction of an in-memory pair.
const PIPE_CAPACITY: usize = 64 * 1024;

/// In-process transport over a `tokio::io::duplex` pipe
///
/// Uses the same length-prefix framing as the socket transports.
pub struct MemoryTransport {
    stream: DuplexStream,
    max_frame_size: usize,
}

impl MemoryTransport {
    /// Create two connected ends
    pub fn pair() -> (Self, Self) {
        let (a, b) = tokio::io::duplex(PIPE_CAPACITY);
        (Self::from_stream(a), Self::from_stream(b))
    }

    pub fn from_stream(stream: DuplexStream) -> Self {
        Self {
            stream,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }

    pub fn with_max_frame_size(mut self, bytes: usize) -> Self {
        self.max_frame_size = bytes;
        self
    }
}

#[async_trait::async_trait]
impl Transport for MemoryTransport {
    async fn send(&mut self, bytes: &[u8]) -> Result<()> {
        write_frame(&mut self.stream, bytes, self.max_frame_size).await
    }

    async fn receive(&mut self) -> Result<Vec<u8>> {
        read_frame(&mut self.stream, self.max_frame_size).await
    }

    async fn close(&mut self) -> Result<()> {
        self.stream.shutdown().await?;
        Ok(())
    }
}
