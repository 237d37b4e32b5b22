//! Application layer for adb-forward.
//!
//! The application layer is the public face of the forwarder: it starts one
//! forwarding session from a [`ForwarderConfig`](crate::domain::ForwarderConfig)
//! and stops it again.  The socket work is delegated to the infrastructure
//! layer.

pub mod lifecycle;

pub use lifecycle::{start, start_on_port, stop, ForwarderHandle};
