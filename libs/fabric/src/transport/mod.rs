use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{Error, Result};

pub mod memory;
pub mod tcp;

pub use self::memory::MemoryTransport;
pub use self::tcp::{TcpConnector, TcpTransport, TcpTransportListener};

/// Largest frame accepted by default (100 MiB).
pub const DEFAULT_MAX_FRAME_SIZE: usize = 100 * 1024 * 1024;

/// Transport trait for sending and receiving raw bytes
///
/// Each transport instance represents a single connection and is owned by
/// one invocation at a time.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    /// Send bytes over the transport
    async fn send(&mut self, bytes: &[u8]) -> Result<()>;

    /// Receive bytes from the transport
    async fn receive(&mut self) -> Result<Vec<u8>>;

    /// Close the transport connection
    async fn close(&mut self) -> Result<()>;
}

#[async_trait::async_trait]
impl<T: Transport + ?Sized> Transport for Box<T> {
    async fn send(&mut self, bytes: &[u8]) -> Result<()> {
        (**self).send(bytes).await
    }

    async fn receive(&mut self) -> Result<Vec<u8>> {
        (**self).receive().await
    }

    async fn close(&mut self) -> Result<()> {
        (**self).close().await
    }
}

/// Accepts incoming transports
#[async_trait::async_trait]
pub trait TransportListener: Send + Sync {
    type Transport: Transport + 'static;

    /// Wait for the next incoming connection
    async fn accept(&self) -> Result<Self::Transport>;

    /// Stop listening
    async fn close(&mut self) -> Result<()>;
}

/// Hands out a fresh, exclusively owned transport per invocation
#[async_trait::async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self) -> Result<Box<dyn Transport>>;
}

#[async_trait::async_trait]
impl<C: Connector + ?Sized> Connector for Arc<C> {
    async fn connect(&self) -> Result<Box<dyn Transport>> {
        (**self).connect().await
    }
}

/// Run `op`, failing with [`Error::Timeout`] if it outlasts `timeout`.
pub(crate) async fn deadline<T>(
    timeout: Option<Duration>,
    what: &'static str,
    op: impl Future<Output = Result<T>>,
) -> Result<T> {
    match timeout {
        Some(timeout) => tokio::time::timeout(timeout, op)
            .await
            .map_err(|_| Error::Timeout(what))?,
        None => op.await,
    }
}

/// Write one frame: 4-byte big-endian length prefix, then the data.
pub(crate) async fn write_frame<S>(stream: &mut S, bytes: &[u8], max: usize) -> Result<()>
where
    S: AsyncWrite + Unpin + ?Sized,
{
    let len = match u32::try_from(bytes.len()) {
        Ok(len) if bytes.len() <= max => len,
        _ => {
            return Err(Error::InvalidFrame(format!(
                "Message too large: {} bytes",
                bytes.len()
            )))
        }
    };
    stream.write_u32(len).await?;
    stream.write_all(bytes).await?;
    stream.flush().await?;
    Ok(())
}

/// Read one frame written by [`write_frame`].
pub(crate) async fn read_frame<S>(stream: &mut S, max: usize) -> Result<Vec<u8>>
where
    S: AsyncRead + Unpin + ?Sized,
{
    let len = stream.read_u32().await.map_err(closed_on_eof)? as usize;

    // Validate length before allocating
    if len > max {
        return Err(Error::InvalidFrame(format!(
            "Message too large: {} bytes",
            len
        )));
    }

    let mut buf = vec![0u8; len];
    stream.read_exact(&mut buf).await.map_err(closed_on_eof)?;
    Ok(buf)
}

fn closed_on_eof(e: std::io::Error) -> Error {
    if e.kind() == std::io::ErrorKind::UnexpectedEof {
        Error::ConnectionClosed
    } else {
        e.into()
    }
}
