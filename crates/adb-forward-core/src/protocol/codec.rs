//! Text codec for the bridge daemon's request/reply framing.
//!
//! Wire format:
//! ```text
//! request: [len:4 hex ASCII][command:len bytes]
//! reply:   [status:4 ASCII]                       OKAY
//!          [status:4 ASCII][len:4 hex ASCII][reason:len bytes]   FAIL
//! ```
//! There is no terminator.  Lengths are byte counts, zero-padded to four
//! digits.  Requests are written with lowercase hex; lengths are decoded in
//! either case.

use thiserror::Error;

use crate::protocol::messages::{
    BridgeStatus, LENGTH_PREFIX_SIZE, MAX_PAYLOAD_LEN, STATUS_SIZE,
};

/// Errors that can occur while framing a request or decoding a reply.
#[derive(Debug, Error, PartialEq)]
pub enum ProtocolError {
    /// The byte slice is shorter than the field being decoded.
    #[error("insufficient data: need at least {needed} bytes, got {available}")]
    InsufficientData { needed: usize, available: usize },

    /// The command does not fit in a 4-hex-digit length prefix.
    #[error("payload too large: {len} bytes exceeds the {max}-byte limit")]
    PayloadTooLarge { len: usize, max: usize },

    /// A length prefix contained something other than hex digits.
    #[error("invalid length prefix: {0:?}")]
    InvalidLengthPrefix(String),
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Frames `command` as a bridge request: 4 hex digits of length, then the
/// command bytes.
///
/// # Errors
///
/// Returns [`ProtocolError::PayloadTooLarge`] if the command is longer than
/// `0xFFFF` bytes.
///
/// # Examples
///
/// ```rust
/// use adb_forward_core::encode_request;
///
/// let frame = encode_request("tcp:9000:127.0.0.1").unwrap();
/// assert_eq!(frame, b"0012tcp:9000:127.0.0.1");
/// ```
pub fn encode_request(command: &str) -> Result<Vec<u8>, ProtocolError> {
    let payload = command.as_bytes();
    if payload.len() > MAX_PAYLOAD_LEN {
        return Err(ProtocolError::PayloadTooLarge {
            len: payload.len(),
            max: MAX_PAYLOAD_LEN,
        });
    }

    let mut buf = Vec::with_capacity(LENGTH_PREFIX_SIZE + payload.len());
    buf.extend_from_slice(format!("{:04x}", payload.len()).as_bytes());
    buf.extend_from_slice(payload);
    Ok(buf)
}

/// Decodes the 4-byte status word at the start of `bytes`.
///
/// Only the first four bytes are examined; anything after them belongs to the
/// reply body (or, after `OKAY`, to the forwarded stream itself).
///
/// # Errors
///
/// Returns [`ProtocolError::InsufficientData`] if fewer than 4 bytes are
/// available.  A short read is never treated as success.
pub fn decode_status(bytes: &[u8]) -> Result<BridgeStatus, ProtocolError> {
    let word: [u8; STATUS_SIZE] = bytes
        .get(..STATUS_SIZE)
        .and_then(|s| s.try_into().ok())
        .ok_or(ProtocolError::InsufficientData {
            needed: STATUS_SIZE,
            available: bytes.len(),
        })?;
    Ok(BridgeStatus::from(word))
}

/// Decodes a 4-hex-digit length prefix from the start of `bytes`.
///
/// # Errors
///
/// Returns [`ProtocolError::InsufficientData`] for fewer than 4 bytes and
/// [`ProtocolError::InvalidLengthPrefix`] if any of them is not a hex digit.
pub fn decode_length_prefix(bytes: &[u8]) -> Result<usize, ProtocolError> {
    let prefix = bytes
        .get(..LENGTH_PREFIX_SIZE)
        .ok_or(ProtocolError::InsufficientData {
            needed: LENGTH_PREFIX_SIZE,
            available: bytes.len(),
        })?;

    // `from_str_radix` alone would accept a leading '+', so check each digit.
    if !prefix.iter().all(u8::is_ascii_hexdigit) {
        return Err(ProtocolError::InvalidLengthPrefix(
            String::from_utf8_lossy(prefix).into_owned(),
        ));
    }

    let text = std::str::from_utf8(prefix)
        .map_err(|_| ProtocolError::InvalidLengthPrefix(format!("{prefix:?}")))?;
    usize::from_str_radix(text, 16)
        .map_err(|_| ProtocolError::InvalidLengthPrefix(text.to_string()))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
