//! Error taxonomy for the forwarder.
//!
//! Only [`ForwardError::ListenFailed`] and [`ForwardError::AcceptorStopped`]
//! ever reach the caller of `start`.  The bridge variants describe one failed
//! connection attempt; the accept loop logs them and closes the affected
//! client.  Relay I/O errors never become a `ForwardError` at all; they end
//! their connection pair and are logged there.

use std::net::SocketAddr;
use std::time::Duration;

use adb_forward_core::ProtocolError;
use thiserror::Error;

/// Error type for forwarder operations.
#[derive(Debug, Error)]
pub enum ForwardError {
    /// The local listening socket could not be opened.
    #[error("failed to listen on {addr}: {source}")]
    ListenFailed {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// The accept loop ended before reporting whether it was listening.
    #[error("accept loop stopped before the listener was ready")]
    AcceptorStopped,

    /// The bridge daemon could not be reached, or the connection broke during
    /// the handshake (including a short status read).
    #[error("bridge daemon at {addr} unavailable: {source}")]
    BridgeUnavailable {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// The bridge daemon answered with something other than `OKAY`.
    #[error("bridge daemon rejected forward request with {status}{}", reason_suffix(.reason))]
    BridgeRejected {
        status: String,
        reason: Option<String>,
    },

    /// The handshake did not complete within the configured timeout.
    #[error("bridge handshake with {addr} timed out after {timeout:?}")]
    BridgeTimeout { addr: SocketAddr, timeout: Duration },

    /// The request could not be framed or the reply could not be decoded.
    #[error("bridge protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}

impl ForwardError {
    /// Returns `true` for errors that concern a single bridge connection
    /// attempt rather than the forwarder as a whole.
    pub fn is_per_connection(&self) -> bool {
        matches!(
            self,
            ForwardError::BridgeUnavailable { .. }
                | ForwardError::BridgeRejected { .. }
                | ForwardError::BridgeTimeout { .. }
                | ForwardError::Protocol(_)
        )
    }
}

fn reason_suffix(reason: &Option<String>) -> String {
    match reason {
        Some(text) => format!(": {text}"),
        None => String::new(),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejected_message_includes_reason() {
        let err = ForwardError::BridgeRejected {
            status: "FAIL".to_string(),
            reason: Some("device offline".to_string()),
        };
        assert_eq!(
            err.to_string(),
            "bridge daemon rejected forward request with FAIL: device offline"
        );
    }

    #[test]
    fn test_rejected_message_without_reason() {
        let err = ForwardError::BridgeRejected {
            status: "NOPE".to_string(),
            reason: None,
        };
        assert_eq!(
            err.to_string(),
            "bridge daemon rejected forward request with NOPE"
        );
    }

    #[test]
    fn test_listen_failure_is_not_per_connection() {
        let err = ForwardError::ListenFailed {
            addr: "127.0.0.1:1".parse().unwrap(),
            source: std::io::Error::from(std::io::ErrorKind::AddrInUse),
        };
        assert!(!err.is_per_connection());
    }

    #[test]
    fn test_bridge_errors_are_per_connection() {
        let unavailable = ForwardError::BridgeUnavailable {
            addr: "127.0.0.1:5037".parse().unwrap(),
            source: std::io::Error::from(std::io::ErrorKind::ConnectionRefused),
        };
        let timeout = ForwardError::BridgeTimeout {
            addr: "127.0.0.1:5037".parse().unwrap(),
            timeout: Duration::from_secs(5),
        };
        let protocol = ForwardError::from(ProtocolError::InsufficientData {
            needed: 4,
            available: 0,
        });
        assert!(unavailable.is_per_connection());
        assert!(timeout.is_per_connection());
        assert!(protocol.is_per_connection());
    }
}
