//! Infrastructure layer for adb-forward.
//!
//! The infrastructure layer handles all I/O: accepting client connections,
//! negotiating forwarded streams with the bridge daemon, and relaying bytes.
//!
//! # Responsibilities
//!
//! - Binding the local TCP listener and running the accept loop
//! - Performing the `tcp:<port>:127.0.0.1` handshake with the bridge daemon
//! - Spawning the two relay tasks of each connection pair
//! - Tracking live pairs so shutdown can close them all
//!
//! # What does NOT belong here?
//!
//! - Wire frame encoding (that is `adb-forward-core`)
//! - Configuration parsing (that is done in `main.rs`)

pub mod bridge_conn;
pub mod connection_pair;
pub mod port_forwarder;
pub mod registry;

pub use bridge_conn::{BridgeConnector, BridgeDialer};
pub use connection_pair::{ConnectionPair, Direction};
pub use port_forwarder::PortForwarder;
pub use registry::PairRegistry;
