//! A forwarded connection: two sockets and the two relay tasks between them.
//!
//! ```text
//!   local client ──read──▶ [relay local→remote] ──write──▶ bridge stream
//!   local client ◀─write── [relay remote→local] ◀──read─── bridge stream
//! ```
//!
//! # Teardown
//!
//! The pair is all-or-nothing.  The first relay task that sees EOF, a read
//! error or a write error calls [`ConnectionPair::stop_forwarding`], which
//! publishes a close signal on a `watch` channel and removes the pair from the
//! registry.  The other task is parked in `read()` or `write_all()`; each of
//! those awaits is raced against the close signal, so it exits too.  Each task
//! owns one read half and one write half, and when both tasks have returned
//! every half is dropped, which closes both sockets.
//!
//! `stop_forwarding` is guarded by an atomic flag: only the first call does any
//! work and returns `true`, whether it comes from a relay task or from the
//! forwarder's shutdown path.

use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use adb_forward_core::PairId;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::infrastructure::registry::PairRegistry;

/// Which way a relay task copies bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// From the accepted client socket to the bridge stream.
    LocalToRemote,
    /// From the bridge stream back to the client socket.
    RemoteToLocal,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::LocalToRemote => f.write_str("local→remote"),
            Direction::RemoteToLocal => f.write_str("remote→local"),
        }
    }
}

/// Why a relay task stopped.
#[derive(Debug)]
pub enum RelayEnd {
    /// The source socket reached end-of-stream.
    Eof,
    /// Reading from the source failed.
    ReadError(io::Error),
    /// Writing or flushing to the destination failed.
    WriteError(io::Error),
    /// The pair was closed by the other task or by the forwarder.
    Closed,
}

impl RelayEnd {
    /// Returns `true` if this task observed the end itself and must therefore
    /// tear the pair down.
    fn initiates_stop(&self) -> bool {
        !matches!(self, RelayEnd::Closed)
    }
}

/// Sockets waiting for [`ConnectionPair::start_forwarding`].
struct Sockets {
    local: TcpStream,
    remote: TcpStream,
}

/// Two connected sockets relayed against each other.
pub struct ConnectionPair {
    id: PairId,
    peer: Option<SocketAddr>,
    buffer_size: usize,
    sockets: Mutex<Option<Sockets>>,
    closed: AtomicBool,
    close_tx: watch::Sender<bool>,
    registry: Arc<PairRegistry>,
    relays: Mutex<Vec<JoinHandle<()>>>,
    local_to_remote: AtomicU64,
    remote_to_local: AtomicU64,
}

impl ConnectionPair {
    /// Wraps two open sockets.  Nothing is relayed until
    /// [`ConnectionPair::start_forwarding`] is called.
    ///
    /// `local` is the accepted client socket, `remote` the bridge stream.
    pub fn new(
        local: TcpStream,
        remote: TcpStream,
        registry: Arc<PairRegistry>,
        buffer_size: usize,
    ) -> Arc<Self> {
        let (close_tx, _) = watch::channel(false);
        Arc::new(Self {
            id: Uuid::new_v4(),
            peer: local.peer_addr().ok(),
            buffer_size: buffer_size.max(1),
            sockets: Mutex::new(Some(Sockets { local, remote })),
            closed: AtomicBool::new(false),
            close_tx,
            registry,
            relays: Mutex::new(Vec::with_capacity(2)),
            local_to_remote: AtomicU64::new(0),
            remote_to_local: AtomicU64::new(0),
        })
    }

    /// Registers the pair and spawns its two relay tasks.
    ///
    /// Returns `false` (and spawns nothing) if the pair was already started or
    /// already stopped; in the latter case the sockets are closed here.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start_forwarding(self: &Arc<Self>) -> bool {
        let Some(Sockets { local, remote }) = self
            .sockets
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        else {
            return false;
        };

        if self.is_closed() {
            return false;
        }

        // Register before spawning so a relay that ends immediately still
        // finds its own entry to remove.
        self.registry.insert(self);

        // A stop that landed between the check above and the insert has
        // already run its `remove`, so the entry would outlive the pair.
        if self.is_closed() {
            self.registry.remove(self.id);
            return false;
        }

        let (local_read, local_write) = local.into_split();
        let (remote_read, remote_write) = remote.into_split();

        let outbound = tokio::spawn(relay(
            Arc::clone(self),
            Direction::LocalToRemote,
            local_read,
            remote_write,
        ));
        let inbound = tokio::spawn(relay(
            Arc::clone(self),
            Direction::RemoteToLocal,
            remote_read,
            local_write,
        ));

        self.relays
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend([outbound, inbound]);

        debug!(pair = %self.id, peer = ?self.peer, "connection pair forwarding");
        true
    }

    /// Closes both directions and deregisters the pair.
    ///
    /// Idempotent: only the first call does any work and returns `true`.
    pub fn stop_forwarding(&self) -> bool {
        if self.closed.swap(true, Ordering::AcqRel) {
            return false;
        }

        // `send_replace` stores the value even when no task is subscribed yet.
        self.close_tx.send_replace(true);
        self.registry.remove(self.id);
        debug!(pair = %self.id, peer = ?self.peer, "connection pair stopping");
        true
    }

    /// Waits for both relay tasks to exit.
    ///
    /// Returns immediately if the pair was never started or was already joined.
    pub async fn join(&self) {
        let relays = std::mem::take(
            &mut *self
                .relays
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );
        for relay in relays {
            if let Err(e) = relay.await {
                warn!(pair = %self.id, "relay task failed: {e}");
            }
        }
    }

    /// Identifier used as the registry key and in log messages.
    pub fn id(&self) -> PairId {
        self.id
    }

    /// Address of the local client, if it was known when the pair was built.
    pub fn peer(&self) -> Option<SocketAddr> {
        self.peer
    }

    /// Returns `true` once [`ConnectionPair::stop_forwarding`] has run.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Bytes relayed so far as `(local→remote, remote→local)`.
    pub fn bytes_forwarded(&self) -> (u64, u64) {
        (
            self.local_to_remote.load(Ordering::Relaxed),
            self.remote_to_local.load(Ordering::Relaxed),
        )
    }

    fn counter(&self, direction: Direction) -> &AtomicU64 {
        match direction {
            Direction::LocalToRemote => &self.local_to_remote,
            Direction::RemoteToLocal => &self.remote_to_local,
        }
    }
}

impl Drop for ConnectionPair {
    fn drop(&mut self) {
        let (sent, received) = self.bytes_forwarded();
        debug!(
            pair = %self.id,
            peer = ?self.peer,
            sent,
            received,
            "connection pair closed"
        );
    }
}

// ── Relay task ────────────────────────────────────────────────────────────────

/// Copies bytes from `from` to `to` until EOF, an I/O error, or the pair's
/// close signal.  Every chunk is flushed before the next read.
async fn relay(
    pair: Arc<ConnectionPair>,
    direction: Direction,
    mut from: OwnedReadHalf,
    mut to: OwnedWriteHalf,
) {
    let mut close_rx = pair.close_tx.subscribe();
    let mut buf = vec![0u8; pair.buffer_size];

    let end = loop {
        let n = tokio::select! {
            _ = close_rx.wait_for(|closed| *closed) => break RelayEnd::Closed,
            read = from.read(&mut buf) => match read {
                Ok(0) => break RelayEnd::Eof,
                Ok(n) => n,
                Err(e) => break RelayEnd::ReadError(e),
            },
        };

        let write = async {
            to.write_all(&buf[..n]).await?;
            to.flush().await
        };

        tokio::select! {
            _ = close_rx.wait_for(|closed| *closed) => break RelayEnd::Closed,
            written = write => {
                if let Err(e) = written {
                    break RelayEnd::WriteError(e);
                }
            }
        }

        pair.counter(direction).fetch_add(n as u64, Ordering::Relaxed);
    };

    match &end {
        RelayEnd::ReadError(e) | RelayEnd::WriteError(e) => {
            debug!(pair = %pair.id, %direction, "relay ended with I/O error: {e}");
        }
        RelayEnd::Eof | RelayEnd::Closed => {
            debug!(pair = %pair.id, %direction, reason = ?end, "relay ended");
        }
    }

    if end.initiates_stop() {
        pair.stop_forwarding();
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::net::TcpListener;
    use tokio::time::timeout;

    const TEST_TIMEOUT: Duration = Duration::from_secs(5);

    /// Returns two ends of one loopback TCP connection.
    async fn socket_pair() -> (TcpStream, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (connected, accepted) = tokio::join!(TcpStream::connect(addr), listener.accept());
        (connected.unwrap(), accepted.unwrap().0)
    }

    /// Builds a started pair.  Returns (client, bridge peer, pair, registry):
    /// writes on `client` appear on `bridge` and vice versa.
    async fn started_pair() -> (TcpStream, TcpStream, Arc<ConnectionPair>, Arc<PairRegistry>) {
        let (client, local) = socket_pair().await;
        let (remote, bridge) = socket_pair().await;
        let registry = Arc::new(PairRegistry::new());
        let pair = ConnectionPair::new(local, remote, Arc::clone(&registry), 16 * 1024);
        assert!(pair.start_forwarding());
        (client, bridge, pair, registry)
    }

    async fn read_exactly(stream: &mut TcpStream, len: usize) -> Vec<u8> {
        let mut buf = vec![0u8; len];
        timeout(TEST_TIMEOUT, stream.read_exact(&mut buf))
            .await
            .expect("read timed out")
            .expect("read failed");
        buf
    }

    async fn assert_closed(stream: &mut TcpStream) {
        let mut buf = [0u8; 16];
        let n = timeout(TEST_TIMEOUT, stream.read(&mut buf))
            .await
            .expect("socket was not closed in time")
            // A reset also counts as closed.
            .unwrap_or(0);
        assert_eq!(n, 0, "expected EOF");
    }

    #[tokio::test]
    async fn test_bytes_flow_in_both_directions() {
        // Arrange
        let (mut client, mut bridge, pair, _registry) = started_pair().await;

        // Act + Assert: client → bridge
        client.write_all(b"ping").await.unwrap();
        assert_eq!(read_exactly(&mut bridge, 4).await, b"ping");

        // Act + Assert: bridge → client
        bridge.write_all(b"pong").await.unwrap();
        assert_eq!(read_exactly(&mut client, 4).await, b"pong");

        assert_eq!(pair.bytes_forwarded(), (4, 4));
    }

    #[tokio::test]
    async fn test_start_registers_pair() {
        let (_client, _bridge, pair, registry) = started_pair().await;
        assert!(registry.contains(pair.id()));
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn test_second_start_is_rejected() {
        let (_client, _bridge, pair, _registry) = started_pair().await;
        assert!(!pair.start_forwarding());
    }

    #[tokio::test]
    async fn test_client_close_closes_bridge_side_and_deregisters() {
        // Arrange
        let (client, mut bridge, pair, registry) = started_pair().await;

        // Act: the client hangs up
        drop(client);

        // Assert: the bridge side sees EOF and the pair is gone
        assert_closed(&mut bridge).await;
        timeout(TEST_TIMEOUT, pair.join()).await.unwrap();
        assert!(pair.is_closed());
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_bridge_close_closes_client_side() {
        let (mut client, bridge, pair, registry) = started_pair().await;

        drop(bridge);

        assert_closed(&mut client).await;
        timeout(TEST_TIMEOUT, pair.join()).await.unwrap();
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_stop_forwarding_is_idempotent() {
        let (_client, _bridge, pair, registry) = started_pair().await;

        assert!(pair.stop_forwarding(), "first stop does the work");
        assert!(!pair.stop_forwarding(), "second stop is a no-op");
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_stop_unblocks_relays_parked_in_read() {
        // Arrange: both relays are idle, blocked in read()
        let (mut client, mut bridge, pair, _registry) = started_pair().await;

        // Act
        pair.stop_forwarding();

        // Assert: both tasks exit and both far ends see the close
        timeout(TEST_TIMEOUT, pair.join())
            .await
            .expect("relays did not exit after stop");
        assert_closed(&mut client).await;
        assert_closed(&mut bridge).await;
    }

    #[tokio::test]
    async fn test_stopped_pair_cannot_start() {
        // Arrange: a pair stopped before it ever ran
        let (client, local) = socket_pair().await;
        let (remote, mut bridge) = socket_pair().await;
        let registry = Arc::new(PairRegistry::new());
        let pair = ConnectionPair::new(local, remote, Arc::clone(&registry), 1024);
        pair.stop_forwarding();

        // Act
        let started = pair.start_forwarding();

        // Assert: nothing registered and the sockets were dropped
        assert!(!started);
        assert!(registry.is_empty());
        drop(client);
        assert_closed(&mut bridge).await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_stop_racing_start_leaves_no_registry_entry() {
        for _ in 0..50 {
            // Arrange
            let (_client, local) = socket_pair().await;
            let (remote, _bridge) = socket_pair().await;
            let registry = Arc::new(PairRegistry::new());
            let pair = ConnectionPair::new(local, remote, Arc::clone(&registry), 1024);

            // Act: stop from another thread while starting
            let stopper = {
                let pair = Arc::clone(&pair);
                std::thread::spawn(move || pair.stop_forwarding())
            };
            pair.start_forwarding();
            assert!(stopper.join().unwrap(), "the stopping thread runs first stop");
            timeout(TEST_TIMEOUT, pair.join())
                .await
                .expect("relays did not exit after stop");

            // Assert
            assert!(pair.is_closed());
            assert!(!registry.contains(pair.id()));
            assert!(registry.is_empty());
        }
    }

    #[tokio::test]
    async fn test_small_buffer_still_relays_large_writes() {
        let (mut client, local) = socket_pair().await;
        let (remote, mut bridge) = socket_pair().await;
        let registry = Arc::new(PairRegistry::new());
        let pair = ConnectionPair::new(local, remote, registry, 7);
        pair.start_forwarding();

        let payload: Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8).collect();
        client.write_all(&payload).await.unwrap();

        assert_eq!(read_exactly(&mut bridge, payload.len()).await, payload);
    }
}
