//! Domain types for adb-forward.
//!
//! This module contains pure value types with no infrastructure dependencies.
//! Validation happens here, once, when a value is constructed; the rest of the
//! workspace can then pass the types around without re-checking them.

/// Forwarded port number and connection-pair identifiers.
pub mod port;
