use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};

use crate::error::{Error, Result};
use crate::transport::{
    deadline, read_frame, write_frame, Connector, Transport, TransportListener,
    DEFAULT_MAX_FRAME_SIZE,
};

/// One TCP connection carrying length-prefixed frames
pub struct TcpTransport {
    stream: TcpStream,
    io_timeout: Option<Duration>,
    max_frame_size: usize,
}

impl TcpTransport {
    pub fn from_stream(stream: TcpStream) -> Self {
        Self {
            stream,
            io_timeout: None,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }

    pub fn with_max_frame_size(mut self, bytes: usize) -> Self {
        self.max_frame_size = bytes;
        self
    }

    pub fn peer_addr(&self) -> Result<SocketAddr> {
        self.stream.peer_addr().map_err(Into::into)
    }
}

#[async_trait::async_trait]
impl Transport for TcpTransport {
    async fn send(&mut self, bytes: &[u8]) -> Result<()> {
        let op = write_frame(&mut self.stream, bytes, self.max_frame_size);
        deadline(self.io_timeout, "Send", op).await
    }

    async fn receive(&mut self) -> Result<Vec<u8>> {
        let op = read_frame(&mut self.stream, self.max_frame_size);
        deadline(self.io_timeout, "Receive", op).await
    }

    async fn close(&mut self) -> Result<()> {
        self.stream.shutdown().await?;
        Ok(())
    }
}

/// Dials a fresh connection for every invocation
#[derive(Debug, Clone)]
pub struct TcpConnector {
    address: SocketAddr,
    connect_timeout: Option<Duration>,
    io_timeout: Option<Duration>,
    max_frame_size: usize,
}

impl TcpConnector {
    pub fn new(address: SocketAddr) -> Self {
        Self {
            address,
            connect_timeout: None,
            io_timeout: None,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }

    pub fn address(&self) -> SocketAddr {
        self.address
    }

    /// Bound on establishing each connection
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Bound on each frame written or read
    pub fn io_timeout(mut self, timeout: Duration) -> Self {
        self.io_timeout = Some(timeout);
        self
    }

    /// Largest frame accepted in either direction
    pub fn max_frame_size(mut self, bytes: usize) -> Self {
        self.max_frame_size = bytes;
        self
    }

    pub async fn dial(&self) -> Result<TcpTransport> {
        let connect = async { TcpStream::connect(self.address).await.map_err(Error::from) };
        let stream = deadline(self.connect_timeout, "Connect", connect).await?;
        Ok(TcpTransport {
            stream,
            io_timeout: self.io_timeout,
            max_frame_size: self.max_frame_size,
        })
    }
}

#[async_trait::async_trait]
impl Connector for TcpConnector {
    async fn connect(&self) -> Result<Box<dyn Transport>> {
        Ok(Box::new(self.dial().await?))
    }
}

/// Accepts TCP connections for a [`Server`](crate::Server)
pub struct TcpTransportListener {
    listener: TcpListener,
    max_frame_size: usize,
}

impl TcpTransportListener {
    pub async fn bind(addr: SocketAddr) -> Result<Self> {
        Ok(Self {
            listener: TcpListener::bind(addr).await?,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        })
    }

    /// Largest frame accepted on connections from this listener
    pub fn with_max_frame_size(mut self, bytes: usize) -> Self {
        self.max_frame_size = bytes;
        self
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener.local_addr().map_err(Into::into)
    }
}

#[async_trait::async_trait]
impl TransportListener for TcpTransportListener {
    type Transport = TcpTransport;

    async fn accept(&self) -> Result<TcpTransport> {
        let (stream, _) = self.listener.accept().await?;
        Ok(TcpTransport::from_stream(stream).with_max_frame_size(self.max_frame_size))
    }

    /// The socket is released on drop.
    async fn close(&mut self) -> Result<()> {
        Ok(())
    }
}
