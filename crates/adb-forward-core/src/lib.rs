//! # adb-forward-core
//!
//! Shared library for adb-forward containing the bridge wire protocol codec
//! and the domain types used by the forwarder.
//!
//! This crate has zero dependencies on OS APIs, async runtimes, or network
//! sockets.  Everything here can be tested with plain byte slices.
//!
//! # Architecture overview (for beginners)
//!
//! adb-forward is a local TCP port forwarder.  Every connection accepted on a
//! local port is paired with a connection to the debug-bridge daemon (the adb
//! server, usually listening on `127.0.0.1:5037`).  Before the daemon will
//! relay bytes to the device, the forwarder must ask it to open a forwarded
//! stream with a tiny text command.
//!
//! - **`protocol`** – How that command travels over the wire.  Requests are a
//!   4-hex-digit length followed by the command text; replies start with a
//!   4-byte status (`OKAY` or `FAIL`).
//!
//! - **`domain`** – Validated value types: the forwarded port number and the
//!   identifier given to each live connection pair.

pub mod domain;
pub mod protocol;

// Re-export the most-used types at the crate root so callers can write
// `adb_forward_core::ForwardPort` instead of the full module path.
pub use domain::port::{ForwardPort, PairId, PortError};
pub use protocol::codec::{decode_length_prefix, decode_status, encode_request, ProtocolError};
pub use protocol::messages::{BridgeStatus, ForwardCommand};
