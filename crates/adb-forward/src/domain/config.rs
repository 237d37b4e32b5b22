//! Forwarder configuration types.
//!
//! [`ForwarderConfig`] is the single source of truth for all runtime settings.
//! It can be built from CLI arguments (see `main.rs`), from a port number with
//! [`ForwarderConfig::for_port`], or field by field in tests.
//!
//! Keeping configuration as a plain struct (no global state, no environment
//! variable reads inside the domain) lets a host application run several
//! forwarders side by side, one per port.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use adb_forward_core::protocol::messages::DEFAULT_BRIDGE_PORT;
use adb_forward_core::ForwardPort;

/// Size of each relay buffer and of the listening socket's receive buffer.
pub const DEFAULT_RELAY_BUFFER_SIZE: usize = 16 * 1024;

// Evaluated at compile time, so a zero here fails the build.
const DEFAULT_PORT: ForwardPort = match ForwardPort::new(8080) {
    Some(port) => port,
    None => panic!("default port must be non-zero"),
};

/// Upper bound on the whole bridge handshake (connect, request, status).
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

/// What the accept loop does after the bridge refuses or fails a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BridgeFailurePolicy {
    /// Close the affected client and keep accepting.
    #[default]
    Continue,
    /// Close the affected client and stop accepting new connections.
    ///
    /// Existing pairs keep running until the forwarder is stopped.
    Abort,
}

/// All runtime configuration for one forwarder.
///
/// # Example
///
/// ```rust
/// use adb_forward::domain::ForwarderConfig;
/// use adb_forward_core::ForwardPort;
///
/// let cfg = ForwarderConfig::for_port(ForwardPort::new(9000).unwrap());
/// assert_eq!(cfg.listen_addr.port(), 9000);
/// assert_eq!(cfg.bridge_addr.port(), 5037);
/// ```
#[derive(Debug, Clone)]
pub struct ForwarderConfig {
    /// Local address the listening socket binds to.
    ///
    /// Port `0` asks the OS for a free port; the bound address is reported by
    /// the forwarder once it is listening.
    pub listen_addr: SocketAddr,

    /// Port the bridge daemon connects to on the remote side.
    pub target_port: ForwardPort,

    /// TCP address of the bridge daemon.
    pub bridge_addr: SocketAddr,

    /// Bytes per relay read; also the listening socket's receive buffer.
    pub relay_buffer_size: usize,

    /// Maximum time for one bridge handshake before the attempt is abandoned.
    pub handshake_timeout: Duration,

    /// Accept-loop behaviour after a failed bridge handshake.
    pub failure_policy: BridgeFailurePolicy,
}

impl ForwarderConfig {
    /// Forwards local loopback `port` to the same `port` on the remote side.
    pub fn for_port(port: ForwardPort) -> Self {
        Self {
            listen_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), port.get()),
            target_port: port,
            ..Self::default()
        }
    }
}

impl Default for ForwarderConfig {
    /// | Field             | Default             |
    /// |-------------------|---------------------|
    /// | listen_addr       | `127.0.0.1:8080`    |
    /// | target_port       | `8080`              |
    /// | bridge_addr       | `127.0.0.1:5037`    |
    /// | relay_buffer_size | 16 KiB              |
    /// | handshake_timeout | 5 seconds           |
    /// | failure_policy    | `Continue`          |
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), DEFAULT_PORT.get()),
            target_port: DEFAULT_PORT,
            bridge_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), DEFAULT_BRIDGE_PORT),
            relay_buffer_size: DEFAULT_RELAY_BUFFER_SIZE,
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            failure_policy: BridgeFailurePolicy::default(),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
