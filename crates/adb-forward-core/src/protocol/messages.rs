//! Bridge protocol message types.
//!
//! The forwarder only ever sends one kind of request, the forwarded-stream
//! command `tcp:<port>:<host>`, and only ever interprets the 4-byte status
//! word of the reply.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr};

use crate::domain::port::ForwardPort;

// ── Protocol constants ────────────────────────────────────────────────────────

/// Number of ASCII hex digits in a length prefix.
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// Number of bytes in a reply status word.
pub const STATUS_SIZE: usize = 4;

/// Largest payload a 4-hex-digit length prefix can describe.
pub const MAX_PAYLOAD_LEN: usize = 0xFFFF;

/// Status word sent by the daemon when a request succeeded.
pub const STATUS_OKAY: [u8; STATUS_SIZE] = *b"OKAY";

/// Status word sent by the daemon when a request failed.
pub const STATUS_FAIL: [u8; STATUS_SIZE] = *b"FAIL";

/// Default TCP port of the bridge daemon.
pub const DEFAULT_BRIDGE_PORT: u16 = 5037;

// ── Requests ──────────────────────────────────────────────────────────────────

/// Request that asks the bridge daemon to open a forwarded TCP stream.
///
/// Renders as `tcp:<port>:<host>`.  The host is the address the *remote* side
/// connects to, which for this forwarder is always its own loopback.
///
/// # Examples
///
/// ```rust
/// use adb_forward_core::{ForwardCommand, ForwardPort};
///
/// let cmd = ForwardCommand::loopback(ForwardPort::new(9000).unwrap());
/// assert_eq!(cmd.to_string(), "tcp:9000:127.0.0.1");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForwardCommand {
    /// Port to connect to on the remote side.
    pub port: ForwardPort,
    /// Host the remote side connects to.
    pub host: IpAddr,
}

impl ForwardCommand {
    /// Builds a command targeting `port` on the remote side's loopback address.
    pub fn loopback(port: ForwardPort) -> Self {
        Self {
            port,
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
        }
    }
}

impl fmt::Display for ForwardCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tcp:{}:{}", self.port, self.host)
    }
}

// ── Replies ───────────────────────────────────────────────────────────────────

/// The 4-byte status word at the start of every daemon reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeStatus {
    /// `OKAY`: the stream is open and now carries raw bytes.
    Okay,
    /// `FAIL`: a hex-length-prefixed reason string follows.
    Fail,
    /// Any other 4 bytes.
    Unknown([u8; STATUS_SIZE]),
}

impl BridgeStatus {
    /// Returns `true` only for [`BridgeStatus::Okay`].
    pub fn is_okay(&self) -> bool {
        matches!(self, BridgeStatus::Okay)
    }

    /// Returns the raw status word as sent on the wire.
    pub fn as_bytes(&self) -> [u8; STATUS_SIZE] {
        match self {
            BridgeStatus::Okay => STATUS_OKAY,
            BridgeStatus::Fail => STATUS_FAIL,
            BridgeStatus::Unknown(raw) => *raw,
        }
    }
}

impl From<[u8; STATUS_SIZE]> for BridgeStatus {
    fn from(raw: [u8; STATUS_SIZE]) -> Self {
        match raw {
            STATUS_OKAY => BridgeStatus::Okay,
            STATUS_FAIL => BridgeStatus::Fail,
            other => BridgeStatus::Unknown(other),
        }
    }
}

impl fmt::Display for BridgeStatus {
    /// Renders the status word, escaping non-printable bytes.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.as_bytes() {
            write!(f, "{}", std::ascii::escape_default(byte))?;
        }
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loopback_command_renders_exact_text() {
        let cmd = ForwardCommand::loopback(ForwardPort::new(8080).unwrap());
        assert_eq!(cmd.to_string(), "tcp:8080:127.0.0.1");
    }

    #[test]
    fn test_command_with_custom_host() {
        let cmd = ForwardCommand {
            port: ForwardPort::new(22).unwrap(),
            host: "10.0.2.2".parse().unwrap(),
        };
        assert_eq!(cmd.to_string(), "tcp:22:10.0.2.2");
    }

    #[test]
    fn test_status_from_okay_bytes() {
        assert_eq!(BridgeStatus::from(*b"OKAY"), BridgeStatus::Okay);
        assert!(BridgeStatus::Okay.is_okay());
    }

    #[test]
    fn test_status_from_fail_bytes() {
        assert_eq!(BridgeStatus::from(*b"FAIL"), BridgeStatus::Fail);
        assert!(!BridgeStatus::Fail.is_okay());
    }

    #[test]
    fn test_status_is_case_sensitive() {
        // "okay" in lowercase is not the success word.
        assert_eq!(
            BridgeStatus::from(*b"okay"),
            BridgeStatus::Unknown(*b"okay")
        );
    }

    #[test]
    fn test_status_display_escapes_binary() {
        let status = BridgeStatus::Unknown([b'O', 0x00, b'K', 0xFF]);
        assert_eq!(status.to_string(), "O\\x00K\\xff");
    }
}
