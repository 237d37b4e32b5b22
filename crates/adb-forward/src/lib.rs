//! adb-forward library crate.
//!
//! This crate relays a local TCP port through the adb bridge daemon: every
//! connection accepted locally is paired with a forwarded stream opened by the
//! daemon, and bytes are copied both ways until either side closes.
//!
//! # Architecture (clean architecture)
//!
//! ```text
//! Local client (TCP)
//!         ↕
//! [adb-forward]
//!   ├── domain/           Pure types: ForwarderConfig, ForwardError
//!   ├── application/      start / stop / ForwarderHandle
//!   └── infrastructure/
//!         ├── port_forwarder/  Listener, accept loop, coordinated shutdown
//!         ├── bridge_conn/     Handshake with the bridge daemon
//!         ├── connection_pair/ Two relay tasks per forwarded connection
//!         └── registry/        Live pairs, for shutdown enumeration
//!         ↕
//! Bridge daemon (length-prefixed text commands over TCP, port 5037)
//! ```
//!
//! # Layer rules
//!
//! - `domain` has no I/O and no async.
//! - `application` depends on `domain` and `infrastructure` entry points only.
//! - `infrastructure` owns every socket and every spawned task.
//!
//! # Example
//!
//! ```no_run
//! use adb_forward::application::{start, stop};
//! use adb_forward::domain::ForwarderConfig;
//! use adb_forward_core::ForwardPort;
//!
//! # async fn example() -> Result<(), adb_forward::domain::ForwardError> {
//! let config = ForwarderConfig::for_port(ForwardPort::new(9000).unwrap());
//! let handle = start(config).await?;
//! println!("forwarding on {}", handle.local_addr());
//! stop(handle).await;
//! # Ok(())
//! # }
//! ```

/// Domain layer: configuration and error types (no I/O).
pub mod domain;

/// Application layer: the start/stop interface for host applications.
pub mod application;

/// Infrastructure layer: sockets, the accept loop and relay tasks.
pub mod infrastructure;
