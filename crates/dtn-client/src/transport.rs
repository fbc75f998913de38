//! Transport seam and line-framed command channel.
//!
//! [`Connector`] opens a byte stream to the daemon; [`CommandChannel`] turns that stream into
//! request/reply lines. Protocol semantics live in [`crate::connection`], so tests can swap the
//! TCP socket for an in-memory duplex.

use std::io;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tracing::debug;

use crate::connection::DaemonAddress;

/// Byte stream the daemon protocol runs over.
pub trait DaemonStream: AsyncRead + AsyncWrite + Unpin + Send {}
impl<T: AsyncRead + AsyncWrite + Unpin + Send> DaemonStream for T {}

/// Boxed stream handed out by a [`Connector`].
pub type BoxedStream = Box<dyn DaemonStream>;

/// Opens transport streams to the daemon.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Open a fresh stream to `address`.
    async fn open(&self, address: &DaemonAddress) -> io::Result<BoxedStream>;
}

/// TCP connector used in production.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpConnector;

#[async_trait]
impl Connector for TcpConnector {
    async fn open(&self, address: &DaemonAddress) -> io::Result<BoxedStream> {
        let stream = TcpStream::connect((address.host(), address.port())).await?;
        stream.set_nodelay(true)?;
        Ok(Box::new(stream))
    }
}

/// Line-buffered request/reply channel over a daemon stream.
pub struct CommandChannel {
    stream: BufReader<BoxedStream>,
}

impl CommandChannel {
    /// Wrap an open stream.
    pub fn new(stream: BoxedStream) -> Self {
        Self {
            stream: BufReader::new(stream),
        }
    }

    /// Read one line, without its terminator.
    ///
    /// A closed stream is reported as `UnexpectedEof`.
    pub async fn read_line(&mut self) -> io::Result<String> {
        let mut line = String::new();
        let read = self.stream.read_line(&mut line).await?;
        if read == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "daemon closed the connection",
            ));
        }
        let line = line.trim_end_matches(['\n', '\r']).to_string();
        debug!(reply = %line, "daemon reply");
        Ok(line)
    }

    /// Write `command` followed by LF and read the one-line reply.
    pub async fn request(&mut self, command: &str) -> io::Result<String> {
        debug!(command, "daemon command");
        self.write_all(format!("{}\n", command).as_bytes()).await?;
        self.read_line().await
    }

    /// Write pre-framed text as-is and read the one-line reply.
    pub async fn send_text(&mut self, text: &str) -> io::Result<String> {
        self.write_all(text.as_bytes()).await?;
        self.read_line().await
    }

    /// Flush and shut down the write half.
    pub async fn shutdown(&mut self) -> io::Result<()> {
        self.stream.get_mut().shutdown().await
    }

    async fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        let stream = self.stream.get_mut();
        stream.write_all(bytes).await?;
        stream.flush().await
    }
}
