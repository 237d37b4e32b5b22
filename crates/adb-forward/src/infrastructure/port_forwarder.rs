//! Listening socket, accept loop and coordinated shutdown.
//!
//! This module is responsible for:
//!
//! 1. Binding the local listening socket on the configured address.
//! 2. Accepting client connections.
//! 3. Asking the bridge daemon for a forwarded stream for each client.
//! 4. Handing both sockets to a new [`ConnectionPair`].
//! 5. Tearing everything down on [`PortForwarder::end_forwarding`].
//!
//! # Startup handshake
//!
//! The listener is bound inside the acceptor task.  The task reports the bound
//! address (or the bind error) through a `oneshot` channel, and
//! [`PortForwarder::begin_forwarding`] awaits that channel, so the caller
//! learns whether forwarding started without polling.
//!
//! # Shutdown
//!
//! `end_forwarding` publishes `true` on a `watch` channel.  The acceptor races
//! every `accept()` and bridge handshake against that signal; when it fires the
//! task returns and the listener is dropped, which closes it.  Once the
//! acceptor's `JoinHandle` resolves, no new pair can appear, so the registry is
//! drained: every pair is stopped and its relay tasks are awaited.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use adb_forward_core::ForwardPort;
use tokio::net::{TcpListener, TcpSocket};
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::domain::{BridgeFailurePolicy, ForwardError, ForwarderConfig};
use crate::infrastructure::bridge_conn::{BridgeConnector, BridgeDialer};
use crate::infrastructure::connection_pair::ConnectionPair;
use crate::infrastructure::registry::PairRegistry;

/// Pending-connection queue length for the listening socket.
const LISTEN_BACKLOG: u32 = 1024;

/// Pause after a failed `accept()` so a persistent error (e.g. EMFILE) does not
/// spin the acceptor.
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(50);

/// Why the accept loop returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AcceptorExit {
    /// The listener could not be opened.
    ListenFailed,
    /// Shutdown was requested.
    Shutdown,
    /// A bridge handshake failed under [`BridgeFailurePolicy::Abort`].
    BridgeFailure,
    /// Nobody was waiting for the readiness report.
    Abandoned,
}

/// State that exists only while forwarding.
struct Running {
    local_addr: SocketAddr,
    shutdown_tx: watch::Sender<bool>,
    acceptor: JoinHandle<AcceptorExit>,
}

/// Owns the listening endpoint and every connection pair it creates.
///
/// Generic over the [`BridgeDialer`] so tests can inject failures; production
/// code uses [`BridgeConnector`].
pub struct PortForwarder<D: BridgeDialer + 'static = BridgeConnector> {
    config: ForwarderConfig,
    dialer: Arc<D>,
    registry: Arc<PairRegistry>,
    running: Option<Running>,
}

impl PortForwarder<BridgeConnector> {
    /// Creates a forwarder that dials the bridge daemon named in `config`.
    pub fn new(config: ForwarderConfig) -> Self {
        let dialer = BridgeConnector::from_config(&config);
        Self::with_dialer(config, dialer)
    }
}

impl<D: BridgeDialer + 'static> PortForwarder<D> {
    /// Creates a forwarder with a custom dialer.
    pub fn with_dialer(config: ForwarderConfig, dialer: D) -> Self {
        Self {
            config,
            dialer: Arc::new(dialer),
            registry: Arc::new(PairRegistry::new()),
            running: None,
        }
    }

    /// Opens the listening socket and starts the accept loop.
    ///
    /// Resolves once the socket is listening, with the bound address (useful
    /// when the configured port is 0).  Calling it again while forwarding
    /// returns the same address and changes nothing.
    ///
    /// # Errors
    ///
    /// Returns [`ForwardError::ListenFailed`] if the socket cannot be bound,
    /// or [`ForwardError::AcceptorStopped`] if the accept task died before
    /// reporting.  Nothing is left running in either case.
    pub async fn begin_forwarding(&mut self) -> Result<SocketAddr, ForwardError> {
        if let Some(running) = &self.running {
            return Ok(running.local_addr);
        }

        let (ready_tx, ready_rx) = oneshot::channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let acceptor = tokio::spawn(accept_loop(
            AcceptContext {
                listen_addr: self.config.listen_addr,
                target_port: self.config.target_port,
                buffer_size: self.config.relay_buffer_size,
                failure_policy: self.config.failure_policy,
                dialer: Arc::clone(&self.dialer),
                registry: Arc::clone(&self.registry),
            },
            ready_tx,
            shutdown_rx,
        ));

        match ready_rx.await {
            Ok(Ok(local_addr)) => {
                info!(
                    listen = %local_addr,
                    target_port = %self.config.target_port,
                    bridge = %self.config.bridge_addr,
                    "port forwarding started"
                );
                self.running = Some(Running {
                    local_addr,
                    shutdown_tx,
                    acceptor,
                });
                Ok(local_addr)
            }
            Ok(Err(e)) => {
                let _ = acceptor.await;
                Err(e)
            }
            Err(_) => {
                if let Err(e) = acceptor.await {
                    error!("accept loop task failed during startup: {e}");
                }
                Err(ForwardError::AcceptorStopped)
            }
        }
    }

    /// Stops accepting, closes every live pair, and waits for all tasks.
    ///
    /// Does nothing if forwarding is not running.  Never fails: task failures
    /// are logged.
    pub async fn end_forwarding(&mut self) {
        let Some(running) = self.running.take() else {
            return;
        };

        running.shutdown_tx.send_replace(true);
        match running.acceptor.await {
            Ok(exit) => debug!(?exit, "accept loop finished"),
            Err(e) => warn!("accept loop task failed: {e}"),
        }

        // The acceptor is gone, so the registry can only shrink from here.
        let pairs = self.registry.snapshot();
        let closed = pairs.len();
        for pair in &pairs {
            pair.stop_forwarding();
        }
        for pair in pairs {
            pair.join().await;
        }
        self.registry.clear();

        info!(listen = %running.local_addr, closed, "port forwarding stopped");
    }

    /// The bound listening address, while forwarding.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.running.as_ref().map(|r| r.local_addr)
    }

    /// Returns `true` between a successful `begin_forwarding` and
    /// `end_forwarding`.
    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    /// Returns `true` while the accept loop is still taking connections.
    ///
    /// Becomes `false` before `end_forwarding` if the loop stopped on its own
    /// under [`BridgeFailurePolicy::Abort`].
    pub fn is_accepting(&self) -> bool {
        self.running
            .as_ref()
            .is_some_and(|r| !r.acceptor.is_finished())
    }

    /// Number of connection pairs currently forwarding.
    pub fn active_pairs(&self) -> usize {
        self.registry.len()
    }

    /// The configuration this forwarder was built with.
    pub fn config(&self) -> &ForwarderConfig {
        &self.config
    }
}

impl<D: BridgeDialer + 'static> Drop for PortForwarder<D> {
    /// Signals every task to stop without waiting for them.
    fn drop(&mut self) {
        if let Some(running) = self.running.take() {
            running.shutdown_tx.send_replace(true);
            for pair in self.registry.snapshot() {
                pair.stop_forwarding();
            }
        }
    }
}

// ── Accept loop ───────────────────────────────────────────────────────────────

/// Everything the acceptor task needs, moved into it at spawn time.
struct AcceptContext<D: ?Sized> {
    listen_addr: SocketAddr,
    target_port: ForwardPort,
    buffer_size: usize,
    failure_policy: BridgeFailurePolicy,
    dialer: Arc<D>,
    registry: Arc<PairRegistry>,
}

async fn accept_loop<D: BridgeDialer + ?Sized>(
    ctx: AcceptContext<D>,
    ready_tx: oneshot::Sender<Result<SocketAddr, ForwardError>>,
    mut shutdown_rx: watch::Receiver<bool>,
) -> AcceptorExit {
    let listener = match bind_listener(ctx.listen_addr, ctx.buffer_size) {
        Ok(listener) => listener,
        Err(e) => {
            let _ = ready_tx.send(Err(e));
            return AcceptorExit::ListenFailed;
        }
    };

    let local_addr = match listener.local_addr() {
        Ok(addr) => addr,
        Err(source) => {
            let _ = ready_tx.send(Err(ForwardError::ListenFailed {
                addr: ctx.listen_addr,
                source,
            }));
            return AcceptorExit::ListenFailed;
        }
    };

    if ready_tx.send(Ok(local_addr)).is_err() {
        return AcceptorExit::Abandoned;
    }

    loop {
        // Select arms only produce values: the `watch::Ref` held by the
        // shutdown branch is not `Send`, so nothing may be awaited inside.
        let accepted = tokio::select! {
            _ = shutdown_rx.wait_for(|stop| *stop) => return AcceptorExit::Shutdown,
            accepted = listener.accept() => accepted,
        };

        let (client, peer) = match accepted {
            Ok(accepted) => accepted,
            Err(e) => {
                error!(listen = %local_addr, "accept failed: {e}");
                tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
                continue;
            }
        };

        debug!(%peer, "accepted client connection");

        // The handshake runs inline: a pair only exists once the bridge has
        // said OKAY, and shutdown can interrupt a slow daemon.
        let dialed = tokio::select! {
            _ = shutdown_rx.wait_for(|stop| *stop) => return AcceptorExit::Shutdown,
            dialed = ctx.dialer.open_stream(ctx.target_port) => dialed,
        };

        match dialed {
            Ok(remote) => {
                let pair =
                    ConnectionPair::new(client, remote, Arc::clone(&ctx.registry), ctx.buffer_size);
                if pair.start_forwarding() {
                    info!(pair = %pair.id(), %peer, "forwarding connection");
                }
            }
            Err(e) => {
                if e.is_per_connection() {
                    warn!(%peer, "bridge connection failed, closing client: {e}");
                } else {
                    error!(%peer, "unexpected dialer error, closing client: {e}");
                }
                drop(client);
                if ctx.failure_policy == BridgeFailurePolicy::Abort {
                    warn!(listen = %local_addr, "no longer accepting connections after bridge failure");
                    return AcceptorExit::BridgeFailure;
                }
            }
        }
    }
}

/// Binds a listening socket whose receive buffer matches the relay buffer.
fn bind_listener(addr: SocketAddr, recv_buffer: usize) -> Result<TcpListener, ForwardError> {
    let listen_failed = |source| ForwardError::ListenFailed { addr, source };

    let socket = if addr.is_ipv4() {
        TcpSocket::new_v4()
    } else {
        TcpSocket::new_v6()
    }
    .map_err(listen_failed)?;

    // Same choice as `TcpListener::bind`: allow rebinding a port in TIME_WAIT.
    #[cfg(unix)]
    socket.set_reuseaddr(true).map_err(listen_failed)?;

    socket
        .set_recv_buffer_size(u32::try_from(recv_buffer).unwrap_or(u32::MAX))
        .map_err(listen_failed)?;
    socket.bind(addr).map_err(listen_failed)?;
    socket.listen(LISTEN_BACKLOG).map_err(listen_failed)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
