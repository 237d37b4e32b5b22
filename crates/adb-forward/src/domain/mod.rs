//! Domain layer for adb-forward.
//!
//! Plain data: the forwarder's configuration and the error taxonomy shared by
//! every layer.  Nothing here opens a socket, spawns a task or reads the
//! environment; `main.rs` is responsible for populating [`ForwarderConfig`].

pub mod config;
pub mod error;

pub use config::{BridgeFailurePolicy, ForwarderConfig};
pub use error::ForwardError;
