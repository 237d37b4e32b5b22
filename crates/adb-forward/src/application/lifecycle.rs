//! Start and stop a forwarding session.
//!
//! A host application calls [`start`] with a [`ForwarderConfig`] and keeps the
//! returned [`ForwarderHandle`] for as long as the port should stay forwarded.
//! [`stop`] consumes the handle, so a stopped forwarder cannot be used again.
//! Dropping the handle without calling [`stop`] still tells every task to
//! exit, but does not wait for them.

use std::net::SocketAddr;

use adb_forward_core::ForwardPort;
use tracing::info;

use crate::domain::{ForwardError, ForwarderConfig};
use crate::infrastructure::PortForwarder;

/// A running forwarder.
pub struct ForwarderHandle {
    forwarder: PortForwarder,
    local_addr: SocketAddr,
}

impl ForwarderHandle {
    /// Address the listening socket is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Port requested from the bridge daemon for every connection.
    pub fn target_port(&self) -> ForwardPort {
        self.forwarder.config().target_port
    }

    /// Number of connections currently being relayed.
    pub fn active_pairs(&self) -> usize {
        self.forwarder.active_pairs()
    }

    /// Returns `false` once the accept loop has stopped taking connections.
    pub fn is_accepting(&self) -> bool {
        self.forwarder.is_accepting()
    }
}

/// Starts forwarding with `config`.
///
/// Resolves once the listening socket is open.
///
/// # Errors
///
/// Returns [`ForwardError::ListenFailed`] if the local address cannot be
/// bound, or [`ForwardError::AcceptorStopped`] if the accept task died during
/// startup.
pub async fn start(config: ForwarderConfig) -> Result<ForwarderHandle, ForwardError> {
    let mut forwarder = PortForwarder::new(config);
    let local_addr = forwarder.begin_forwarding().await?;
    Ok(ForwarderHandle {
        forwarder,
        local_addr,
    })
}

/// Forwards loopback `port` to the same port on the remote side, with every
/// other setting at its default.
///
/// # Errors
///
/// Same as [`start`].
pub async fn start_on_port(port: ForwardPort) -> Result<ForwarderHandle, ForwardError> {
    start(ForwarderConfig::for_port(port)).await
}

/// Stops forwarding: closes the listener and every live connection, then
/// waits for all tasks to finish.
pub async fn stop(handle: ForwarderHandle) {
    let ForwarderHandle {
        mut forwarder,
        local_addr,
    } = handle;
    forwarder.end_forwarding().await;
    info!(listen = %local_addr, "forwarder handle released");
}

// ── Tests ─────────────────────────────────────────────────────────────────────
