//! adb-forward: relay a local TCP port through the adb bridge daemon.
//!
//! Every connection accepted on the local port is paired with a forwarded
//! stream that the bridge daemon opens to the same port on the remote side.
//! Bytes flow both ways until either end closes.
//!
//! # Usage
//!
//! ```text
//! adb-forward --port <PORT> [OPTIONS]
//!
//! Options:
//!   --port                    <PORT>  Port to forward (local and remote) [required]
//!   --bind                    <IP>    Local address to listen on [default: 127.0.0.1]
//!   --bridge-host             <IP>    Bridge daemon host [default: 127.0.0.1]
//!   --bridge-port             <PORT>  Bridge daemon port [default: 5037]
//!   --handshake-timeout       <SECS>  Bridge handshake timeout [default: 5]
//!   --buffer-size             <BYTES> Relay buffer size [default: 16384]
//!   --abort-on-bridge-failure         Stop accepting after a failed handshake
//! ```
//!
//! # Environment variable overrides
//!
//! CLI args take precedence when both are present.
//!
//! | Variable                              | Default     |
//! |---------------------------------------|-------------|
//! | `ADB_FORWARD_PORT`                    | (required)  |
//! | `ADB_FORWARD_BIND`                    | `127.0.0.1` |
//! | `ADB_SERVER_HOST`                     | `127.0.0.1` |
//! | `ANDROID_ADB_SERVER_PORT`             | `5037`      |
//! | `ADB_FORWARD_HANDSHAKE_TIMEOUT`       | `5`         |
//! | `ADB_FORWARD_BUFFER_SIZE`             | `16384`     |
//! | `ADB_FORWARD_ABORT_ON_BRIDGE_FAILURE` | `false`     |

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use adb_forward_core::protocol::messages::DEFAULT_BRIDGE_PORT;
use adb_forward_core::ForwardPort;
use anyhow::{ensure, Context};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use adb_forward::application::{start, stop};
use adb_forward::domain::config::DEFAULT_RELAY_BUFFER_SIZE;
use adb_forward::domain::{BridgeFailurePolicy, ForwarderConfig};

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Relay a local TCP port through the adb bridge daemon.
#[derive(Debug, Parser)]
#[command(
    name = "adb-forward",
    about = "Forward a local TCP port to a device through the adb server",
    version
)]
struct Cli {
    /// Port to forward.  The same number is used locally and on the device.
    #[arg(long, env = "ADB_FORWARD_PORT")]
    port: ForwardPort,

    /// Local IP address to listen on.
    ///
    /// Defaults to loopback so the forwarded port is not exposed to the LAN.
    #[arg(long, default_value = "127.0.0.1", env = "ADB_FORWARD_BIND")]
    bind: IpAddr,

    /// IP address of the adb server.
    #[arg(long, default_value = "127.0.0.1", env = "ADB_SERVER_HOST")]
    bridge_host: IpAddr,

    /// TCP port of the adb server.
    #[arg(long, default_value_t = DEFAULT_BRIDGE_PORT, env = "ANDROID_ADB_SERVER_PORT")]
    bridge_port: u16,

    /// Seconds to wait for the adb server to accept a forward request.
    #[arg(long, default_value_t = 5, env = "ADB_FORWARD_HANDSHAKE_TIMEOUT")]
    handshake_timeout: u64,

    /// Bytes per relay read.
    #[arg(long, default_value_t = DEFAULT_RELAY_BUFFER_SIZE, env = "ADB_FORWARD_BUFFER_SIZE")]
    buffer_size: usize,

    /// Stop accepting new connections after the first failed bridge handshake.
    #[arg(long, env = "ADB_FORWARD_ABORT_ON_BRIDGE_FAILURE")]
    abort_on_bridge_failure: bool,
}

impl Cli {
    /// Converts the parsed CLI arguments into a [`ForwarderConfig`].
    ///
    /// # Errors
    ///
    /// Returns an error if the buffer size or handshake timeout is zero.
    fn into_forwarder_config(self) -> anyhow::Result<ForwarderConfig> {
        ensure!(self.buffer_size > 0, "--buffer-size must be greater than zero");
        ensure!(
            self.handshake_timeout > 0,
            "--handshake-timeout must be greater than zero"
        );

        let failure_policy = if self.abort_on_bridge_failure {
            BridgeFailurePolicy::Abort
        } else {
            BridgeFailurePolicy::Continue
        };

        Ok(ForwarderConfig {
            listen_addr: SocketAddr::new(self.bind, self.port.get()),
            target_port: self.port,
            bridge_addr: SocketAddr::new(self.bridge_host, self.bridge_port),
            relay_buffer_size: self.buffer_size,
            handshake_timeout: Duration::from_secs(self.handshake_timeout),
            failure_policy,
        })
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

/// Program entry point.
///
/// 1. Logging is initialised from `RUST_LOG` (default `info`).
/// 2. CLI arguments are parsed into a [`ForwarderConfig`].
/// 3. The forwarder starts and the bound address is logged.
/// 4. On Ctrl+C the forwarder is stopped and every connection is closed.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Cli::parse().into_forwarder_config()?;

    info!(
        "adb-forward starting: listen={}, target port={}, adb server={}",
        config.listen_addr, config.target_port, config.bridge_addr
    );

    let listen_addr = config.listen_addr;
    let handle = start(config)
        .await
        .with_context(|| format!("could not start forwarding on {listen_addr}"))?;

    let signal = tokio::signal::ctrl_c().await;
    match &signal {
        Ok(()) => info!("received Ctrl+C, shutting down"),
        Err(e) => tracing::error!("failed to listen for Ctrl+C signal: {e}"),
    }

    stop(handle).await;
    info!("adb-forward stopped");

    signal.context("waiting for Ctrl+C")
}

// ── Tests ─────────────────────────────────────────────────────────────────────
