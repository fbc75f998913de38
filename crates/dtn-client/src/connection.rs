//! Daemon control connection and handshake.
//!
//! # State Machine
//!
//! ```text
//! Disconnected ──connect()──> Connecting ──socket open──> Handshaking ──EID read──> Ready
//!      ▲                           │                           │                    │
//!      └──────── open / handshake failure ─────────────────────┘      transport error│
//!      └────────────────────────────────────────────────────────────────────────────┘
//!
//! any state ──close()──> Closed      (terminal until a fresh connect())
//! ```
//!
//! # Handshake
//!
//! 1. read the daemon banner
//! 2. `protocol extended`, one reply line
//! 3. `set endpoint <app_source>`, one reply line
//! 4. `registration list`, header line, the assigned EID line, one blank line

use std::fmt;
use std::io;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::error::{ClientError, ProtocolStage, Result};
use crate::transport::{CommandChannel, Connector, TcpConnector};

/// Default IBR-DTN API host.
pub const DEFAULT_DAEMON_HOST: &str = "localhost";

/// Default IBR-DTN API port.
pub const DEFAULT_DAEMON_PORT: u16 = 4550;

/// Host and port of the daemon's API socket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaemonAddress {
    host: String,
    port: u16,
}

impl DaemonAddress {
    /// Create an address.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Host name or IP.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// TCP port.
    #[must_use]
    pub fn port(&self) -> u16 {
        self.port
    }
}

impl fmt::Display for DaemonAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

impl Default for DaemonAddress {
    fn default() -> Self {
        Self::new(DEFAULT_DAEMON_HOST, DEFAULT_DAEMON_PORT)
    }
}

/// Lifecycle state of a [`DaemonConnection`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No transport, may connect.
    Disconnected,
    /// Opening the socket.
    Connecting,
    /// Socket open, handshake in progress.
    Handshaking,
    /// Handshake complete, bundles may be sent.
    Ready,
    /// Explicitly shut down.
    Closed,
}

impl ConnectionState {
    /// Returns true if bundles may be sent.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready)
    }

    /// Returns a short status label.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Disconnected => "Disconnected",
            Self::Connecting => "Connecting...",
            Self::Handshaking => "Handshaking...",
            Self::Ready => "Ready",
            Self::Closed => "Closed",
        }
    }
}

/// Control connection to the local DTN daemon.
///
/// Owns the stream exclusively; every operation takes `&mut self`.
pub struct DaemonConnection<C = TcpConnector> {
    address: DaemonAddress,
    app_source: String,
    destination_eid: String,
    source_eid: Option<String>,
    channel: Option<CommandChannel>,
    state: ConnectionState,
    connector: C,
}

impl DaemonConnection<TcpConnector> {
    /// Create a TCP connection handle. Nothing is opened until [`connect`](Self::connect).
    pub fn new(
        address: DaemonAddress,
        app_source: impl Into<String>,
        destination_eid: impl Into<String>,
    ) -> Self {
        Self::with_connector(address, app_source, destination_eid, TcpConnector)
    }
}

impl<C: Connector> DaemonConnection<C> {
    /// Create a connection handle with a custom transport connector.
    pub fn with_connector(
        address: DaemonAddress,
        app_source: impl Into<String>,
        destination_eid: impl Into<String>,
        connector: C,
    ) -> Self {
        Self {
            address,
            app_source: app_source.into(),
            destination_eid: destination_eid.into(),
            source_eid: None,
            channel: None,
            state: ConnectionState::Disconnected,
            connector,
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Daemon address.
    #[must_use]
    pub fn address(&self) -> &DaemonAddress {
        &self.address
    }

    /// Application name registered with `set endpoint`.
    #[must_use]
    pub fn app_source(&self) -> &str {
        &self.app_source
    }

    /// Destination endpoint for every bundle.
    #[must_use]
    pub fn destination_eid(&self) -> &str {
        &self.destination_eid
    }

    /// EID assigned by the daemon in the last successful handshake.
    #[must_use]
    pub fn source_eid(&self) -> Option<&str> {
        self.source_eid.as_deref()
    }

    /// Open the transport and run the handshake.
    ///
    /// Any existing transport is dropped first. On failure the connection is left
    /// `Disconnected` with no open stream.
    #[instrument(skip(self), fields(address = %self.address, app_source = %self.app_source), err)]
    pub async fn connect(&mut self) -> Result<()> {
        self.channel = None;
        self.state = ConnectionState::Connecting;

        let stream = match self.connector.open(&self.address).await {
            Ok(stream) => stream,
            Err(e) => return Err(self.fail(ProtocolStage::Open, e)),
        };

        self.state = ConnectionState::Handshaking;
        let mut channel = CommandChannel::new(stream);
        match handshake(&mut channel, &self.app_source).await {
            Ok(source_eid) => {
                info!(source_eid = %source_eid, "registered with DTN daemon");
                self.source_eid = Some(source_eid);
                self.channel = Some(channel);
                self.state = ConnectionState::Ready;
                Ok(())
            }
            Err((stage, e)) => Err(self.fail(stage, e)),
        }
    }

    /// Push one plain bundle and tell the daemon to send it.
    ///
    /// Any I/O failure drops the transport and leaves the connection `Disconnected`.
    #[instrument(skip(self, bundle), fields(bytes = bundle.len()), err)]
    pub async fn send_bundle(&mut self, bundle: &str) -> Result<()> {
        let not_ready = match self.state {
            ConnectionState::Ready => None,
            ConnectionState::Closed => Some(ProtocolStage::Closed),
            _ => Some(ProtocolStage::BundlePut),
        };
        let channel = match (not_ready, self.channel.as_mut()) {
            (None, Some(channel)) => channel,
            (stage, _) => {
                return Err(ClientError::connection(
                    self.address.to_string(),
                    stage.unwrap_or(ProtocolStage::BundlePut),
                    io::Error::new(io::ErrorKind::NotConnected, "daemon connection is not ready"),
                ));
            }
        };

        let result = async {
            let reply = channel
                .request("bundle put plain")
                .await
                .map_err(|e| (ProtocolStage::BundlePut, e))?;
            check_reply(ProtocolStage::BundlePut, &reply);

            let reply = channel
                .send_text(bundle)
                .await
                .map_err(|e| (ProtocolStage::BundleBody, e))?;
            check_reply(ProtocolStage::BundleBody, &reply);

            let reply = channel
                .request("bundle send")
                .await
                .map_err(|e| (ProtocolStage::BundleSend, e))?;
            check_reply(ProtocolStage::BundleSend, &reply);
            Ok::<(), (ProtocolStage, io::Error)>(())
        }
        .await;

        match result {
            Ok(()) => {
                debug!("bundle handed to daemon");
                Ok(())
            }
            Err((stage, e)) => Err(self.fail(stage, e)),
        }
    }

    /// Release the transport. Idempotent and safe before any connect.
    pub async fn close(&mut self) {
        self.disconnect().await;
        if self.state != ConnectionState::Closed {
            debug!(address = %self.address, "daemon connection closed");
        }
        self.state = ConnectionState::Closed;
    }

    /// Drop the transport without entering `Closed`, ready for a reconnect.
    pub async fn disconnect(&mut self) {
        if let Some(mut channel) = self.channel.take() {
            if let Err(e) = channel.shutdown().await {
                debug!(error = %e, "transport shutdown failed");
            }
        }
        if self.state != ConnectionState::Closed {
            self.state = ConnectionState::Disconnected;
        }
    }

    fn fail(&mut self, stage: ProtocolStage, source: io::Error) -> ClientError {
        self.channel = None;
        self.state = ConnectionState::Disconnected;
        ClientError::connection(self.address.to_string(), stage, source)
    }
}

async fn handshake(
    channel: &mut CommandChannel,
    app_source: &str,
) -> std::result::Result<String, (ProtocolStage, io::Error)> {
    let banner = channel
        .read_line()
        .await
        .map_err(|e| (ProtocolStage::Greeting, e))?;
    debug!(banner = %banner, "daemon banner");

    let reply = channel
        .request("protocol extended")
        .await
        .map_err(|e| (ProtocolStage::ProtocolExtended, e))?;
    check_reply(ProtocolStage::ProtocolExtended, &reply);

    let reply = channel
        .request(&format!("set endpoint {}", app_source))
        .await
        .map_err(|e| (ProtocolStage::SetEndpoint, e))?;
    check_reply(ProtocolStage::SetEndpoint, &reply);

    let stage = ProtocolStage::RegistrationList;
    let header = channel
        .request("registration list")
        .await
        .map_err(|e| (stage, e))?;
    check_reply(stage, &header);

    let source_eid = channel
        .read_line()
        .await
        .map_err(|e| (stage, e))?
        .trim_end()
        .to_string();
    channel.read_line().await.map_err(|e| (stage, e))?;

    if source_eid.is_empty() {
        return Err((
            stage,
            io::Error::new(io::ErrorKind::InvalidData, "daemon returned an empty endpoint id"),
        ));
    }
    Ok(source_eid)
}

/// Warn on replies whose status code is not 2xx. Replies without a code pass silently.
fn check_reply(stage: ProtocolStage, reply: &str) {
    if let Some(code) = reply_code(reply) {
        if !(200..300).contains(&code) {
            warn!(%stage, code, reply, "daemon rejected command");
        }
    }
}

fn reply_code(reply: &str) -> Option<u16> {
    let code = reply.split_whitespace().next()?;
    if code.len() != 3 {
        return None;
    }
    code.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::BoxedStream;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader, DuplexStream};

    /// Hands out pre-built duplex streams, one per `open`.
    struct DuplexConnector {
        streams: Mutex<Vec<DuplexStream>>,
    }

    #[async_trait]
    impl Connector for DuplexConnector {
        async fn open(&self, _address: &DaemonAddress) -> io::Result<BoxedStream> {
            let stream = self.streams.lock().unwrap().pop();
            match stream {
                Some(stream) => Ok(Box::new(stream)),
                None => Err(io::Error::from(io::ErrorKind::ConnectionRefused)),
            }
        }
    }

    fn connection(streams: Vec<DuplexStream>) -> DaemonConnection<DuplexConnector> {
        DaemonConnection::with_connector(
            DaemonAddress::default(),
            "data_sender",
            "dtn://broker/app",
            DuplexConnector {
                streams: Mutex::new(streams),
            },
        )
    }

    /// Scripted daemon side: answers the handshake and returns the lines it received.
    async fn serve_handshake(stream: DuplexStream, eid: &str) -> (Vec<String>, DuplexStream) {
        let mut reader = BufReader::new(stream);
        let mut received = Vec::new();
        reader
            .get_mut()
            .write_all(b"IBR-DTN 1.0.1 API 1.0\n")
            .await
            .unwrap();
        for reply in ["200 SWITCHED TO EXTENDED\n", "200 OK\n"] {
            let mut line = String::new();
            reader.read_line(&mut line).await.unwrap();
            received.push(line.trim_end().to_string());
            reader.get_mut().write_all(reply.as_bytes()).await.unwrap();
        }
        let mut line = String::new();
        reader.read_line(&mut line).await.unwrap();
        received.push(line.trim_end().to_string());
        let listing = format!("200 REGISTRATION LIST\n{}  \n\n", eid);
        reader.get_mut().write_all(listing.as_bytes()).await.unwrap();
        (received, reader.into_inner())
    }

    #[tokio::test]
    async fn handshake_stores_source_eid() {
        let (client, daemon) = tokio::io::duplex(1024);
        let mut conn = connection(vec![client]);
        assert_eq!(conn.state(), ConnectionState::Disconnected);
        assert!(conn.source_eid().is_none());

        let server = tokio::spawn(serve_handshake(daemon, "dtn://node1/data_sender"));
        conn.connect().await.unwrap();
        let (received, _daemon) = server.await.unwrap();

        assert_eq!(
            received,
            vec![
                "protocol extended".to_string(),
                "set endpoint data_sender".to_string(),
                "registration list".to_string(),
            ]
        );
        assert_eq!(conn.state(), ConnectionState::Ready);
        assert_eq!(conn.source_eid(), Some("dtn://node1/data_sender"));
    }

    #[tokio::test]
    async fn refused_open_leaves_disconnected() {
        let mut conn = connection(vec![]);
        let err = conn.connect().await.unwrap_err();
        match err {
            ClientError::Connection { stage, .. } => assert_eq!(stage, ProtocolStage::Open),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(conn.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn hangup_during_handshake_is_connection_error() {
        let (client, mut daemon) = tokio::io::duplex(256);
        daemon.write_all(b"IBR-DTN 1.0.1 API 1.0\n").await.unwrap();
        drop(daemon);
        let mut conn = connection(vec![client]);

        let err = conn.connect().await.unwrap_err();
        assert!(err.is_retriable());
        assert_eq!(conn.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn send_bundle_follows_put_send_sequence() {
        let (client, daemon) = tokio::io::duplex(4096);
        let mut conn = connection(vec![client]);
        let server = tokio::spawn(serve_handshake(daemon, "dtn://node1/data_sender"));
        conn.connect().await.unwrap();
        let (_, daemon) = server.await.unwrap();

        let bundle = crate::bundle::encode("dtn://node1/data_sender", "dtn://broker/app", "{}", false);
        let expected_body = bundle.clone();
        let server = tokio::spawn(async move {
            let mut reader = BufReader::new(daemon);
            let mut put = String::new();
            reader.read_line(&mut put).await.unwrap();
            reader.get_mut().write_all(b"100 PUT BUNDLE PLAIN\n").await.unwrap();

            let mut body = vec![0u8; expected_body.len()];
            reader.read_exact(&mut body).await.unwrap();
            let body = String::from_utf8(body).unwrap();
            reader.get_mut().write_all(b"200 BUNDLE IN REGISTER\n").await.unwrap();

            let mut send = String::new();
            reader.read_line(&mut send).await.unwrap();
            reader.get_mut().write_all(b"200 BUNDLE SENT\n").await.unwrap();
            (put, body, send)
        });

        conn.send_bundle(&bundle).await.unwrap();
        let (put, body, send) = server.await.unwrap();
        assert_eq!(put, "bundle put plain\n");
        assert_eq!(body, bundle);
        assert_eq!(send, "bundle send\n");
        assert!(conn.state().is_ready());
    }

    #[tokio::test]
    async fn send_failure_drops_to_disconnected() {
        let (client, daemon) = tokio::io::duplex(1024);
        let mut conn = connection(vec![client]);
        let server = tokio::spawn(serve_handshake(daemon, "dtn://node1/data_sender"));
        conn.connect().await.unwrap();
        let (_, daemon) = server.await.unwrap();
        drop(daemon);

        let err = conn.send_bundle("Source: x\n").await.unwrap_err();
        assert!(err.is_retriable());
        assert_eq!(conn.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn send_before_connect_is_not_connected() {
        let mut conn = connection(vec![]);
        let err = conn.send_bundle("Source: x\n").await.unwrap_err();
        match err {
            ClientError::Connection { source, .. } => {
                assert_eq!(source.kind(), io::ErrorKind::NotConnected)
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let mut conn = connection(vec![]);
        conn.close().await;
        conn.close().await;
        assert_eq!(conn.state(), ConnectionState::Closed);

        let err = conn.send_bundle("Source: x\n").await.unwrap_err();
        assert!(!err.is_retriable());
    }

    #[test]
    fn reply_codes() {
        assert_eq!(reply_code("200 OK"), Some(200));
        assert_eq!(reply_code("404 UNKNOWN COMMAND"), Some(404));
        assert_eq!(reply_code("IBR-DTN 1.0.1 API 1.0"), None);
        assert_eq!(reply_code(""), None);
    }
}
