//! TCP connection to the bridge daemon and the forwarded-stream handshake.
//!
//! Each accepted client gets its own connection to the daemon.  The daemon
//! turns that connection into a raw pipe to the target port once it has
//! answered `OKAY` to a `tcp:<port>:127.0.0.1` request:
//!
//! ```text
//! forwarder                         bridge daemon
//! ─────────                         ─────────────
//! connect ───────────────────────▶
//! "0012tcp:9000:127.0.0.1" ──────▶
//!                          ◀────── "OKAY"            (stream is now raw bytes)
//!                          ◀────── "FAIL000ano devices"  (or a refusal)
//! ```
//!
//! The connector never retries.  On any failure the socket is dropped before
//! the error is returned, so a caller can never reuse a half-negotiated
//! connection.

use std::net::SocketAddr;
use std::time::Duration;

use adb_forward_core::protocol::messages::{LENGTH_PREFIX_SIZE, STATUS_SIZE};
use adb_forward_core::{
    decode_length_prefix, decode_status, encode_request, BridgeStatus, ForwardCommand,
    ForwardPort,
};
use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::debug;

use crate::domain::{ForwardError, ForwarderConfig};

/// Longest `FAIL` reason the connector will read.
const MAX_FAILURE_REASON: usize = 1024;

/// How long to wait for the reason that follows `FAIL`.
const FAILURE_REASON_TIMEOUT: Duration = Duration::from_millis(200);

/// Opens forwarded streams for the accept loop.
///
/// [`BridgeConnector`] is the production implementation; tests substitute
/// their own.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BridgeDialer: Send + Sync {
    /// Returns a socket that is already relaying to `port` on the remote side.
    async fn open_stream(&self, port: ForwardPort) -> Result<TcpStream, ForwardError>;
}

/// Performs the forwarded-stream handshake with the bridge daemon.
#[derive(Debug, Clone)]
pub struct BridgeConnector {
    bridge_addr: SocketAddr,
    handshake_timeout: Duration,
}

impl BridgeConnector {
    /// Creates a connector for the daemon at `bridge_addr`.
    pub fn new(bridge_addr: SocketAddr, handshake_timeout: Duration) -> Self {
        Self {
            bridge_addr,
            handshake_timeout,
        }
    }

    /// Creates a connector from the forwarder's configuration.
    pub fn from_config(config: &ForwarderConfig) -> Self {
        Self::new(config.bridge_addr, config.handshake_timeout)
    }

    /// Connects to the daemon and requests a forwarded stream to `port`.
    ///
    /// # Errors
    ///
    /// - [`ForwardError::BridgeUnavailable`] if the daemon cannot be reached or
    ///   the connection fails before a full status word arrives.
    /// - [`ForwardError::BridgeRejected`] if the status word is not `OKAY`.
    /// - [`ForwardError::BridgeTimeout`] if no status word arrives within the
    ///   configured timeout.
    pub async fn connect(&self, port: ForwardPort) -> Result<TcpStream, ForwardError> {
        let (status, mut stream) = timeout(self.handshake_timeout, self.handshake(port))
            .await
            .map_err(|_| ForwardError::BridgeTimeout {
                addr: self.bridge_addr,
                timeout: self.handshake_timeout,
            })??;

        if status.is_okay() {
            debug!(%port, bridge = %self.bridge_addr, "bridge accepted forward request");
            return Ok(stream);
        }

        // Only the status word decides the outcome. The reason gets its own
        // short timeout, separate from the handshake's.
        let reason = match &status {
            BridgeStatus::Fail => timeout(FAILURE_REASON_TIMEOUT, read_failure_reason(&mut stream))
                .await
                .ok()
                .flatten(),
            _ => None,
        };
        Err(ForwardError::BridgeRejected {
            status: status.to_string(),
            reason,
        })
    }

    /// Sends the request and reads the status word.
    async fn handshake(&self, port: ForwardPort) -> Result<(BridgeStatus, TcpStream), ForwardError> {
        let unavailable = |source| ForwardError::BridgeUnavailable {
            addr: self.bridge_addr,
            source,
        };

        let request = encode_request(&ForwardCommand::loopback(port).to_string())?;

        let mut stream = TcpStream::connect(self.bridge_addr)
            .await
            .map_err(unavailable)?;

        // `write_all` keeps writing until the whole frame is in the socket.
        stream.write_all(&request).await.map_err(unavailable)?;
        stream.flush().await.map_err(unavailable)?;

        // `read_exact` fails with UnexpectedEof on a short read, so anything
        // less than four bytes is reported as an unavailable daemon.
        let mut status = [0u8; STATUS_SIZE];
        stream.read_exact(&mut status).await.map_err(unavailable)?;

        Ok((decode_status(&status)?, stream))
    }
}

#[async_trait]
impl BridgeDialer for BridgeConnector {
    async fn open_stream(&self, port: ForwardPort) -> Result<TcpStream, ForwardError> {
        self.connect(port).await
    }
}

/// Reads the hex-length-prefixed reason that follows `FAIL`.
///
/// Best effort: the status word already decided the outcome, so any problem
/// reading the reason just yields `None`.
async fn read_failure_reason(stream: &mut TcpStream) -> Option<String> {
    let mut prefix = [0u8; LENGTH_PREFIX_SIZE];
    stream.read_exact(&mut prefix).await.ok()?;
    let len = decode_length_prefix(&prefix).ok()?.min(MAX_FAILURE_REASON);

    let mut reason = vec![0u8; len];
    stream.read_exact(&mut reason).await.ok()?;
    Some(String::from_utf8_lossy(&reason).into_owned())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
