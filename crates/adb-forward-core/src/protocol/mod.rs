//! Bridge protocol: command types and the length-prefixed text codec.

pub mod codec;
pub mod messages;

pub use codec::{decode_length_prefix, decode_status, encode_request, ProtocolError};
pub use messages::*;
