//! The forwarded port number and connection-pair identifiers.
//!
//! A port of `0` means "pick any free port" to the OS, which makes no sense as
//! a forwarding *target*: the bridge daemon would be asked to connect to port
//! 0 on the device.  [`ForwardPort`] therefore wraps a [`NonZeroU16`] so an
//! invalid port can never reach the wire.

use std::fmt;
use std::num::NonZeroU16;
use std::str::FromStr;

use thiserror::Error;
use uuid::Uuid;

/// Unique identifier for one live connection pair, derived from UUID v4.
pub type PairId = Uuid;

/// Errors produced when parsing or converting a port number.
#[derive(Debug, Error, PartialEq)]
pub enum PortError {
    /// The value was zero.
    #[error("port must be positive, got 0")]
    Zero,

    /// The value does not fit in a TCP port (1..=65535).
    #[error("port out of range: {0}")]
    OutOfRange(i64),

    /// The text was not a decimal integer.
    #[error("invalid port number: {0:?}")]
    NotANumber(String),
}

/// A validated TCP port number in `1..=65535`.
///
/// # Examples
///
/// ```rust
/// use adb_forward_core::ForwardPort;
///
/// let port: ForwardPort = "9000".parse().unwrap();
/// assert_eq!(port.get(), 9000);
/// assert!(ForwardPort::try_from(0u16).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ForwardPort(NonZeroU16);

impl ForwardPort {
    /// Creates a port, returning `None` for zero.
    pub const fn new(port: u16) -> Option<Self> {
        match NonZeroU16::new(port) {
            Some(p) => Some(Self(p)),
            None => None,
        }
    }

    /// Returns the port as a plain `u16`.
    pub const fn get(self) -> u16 {
        self.0.get()
    }
}

impl TryFrom<u16> for ForwardPort {
    type Error = PortError;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        Self::new(value).ok_or(PortError::Zero)
    }
}

impl TryFrom<i64> for ForwardPort {
    type Error = PortError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        let narrow = u16::try_from(value).map_err(|_| PortError::OutOfRange(value))?;
        Self::try_from(narrow)
    }
}

impl TryFrom<u32> for ForwardPort {
    type Error = PortError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::try_from(i64::from(value))
    }
}

impl FromStr for ForwardPort {
    type Err = PortError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value: i64 = s
            .trim()
            .parse()
            .map_err(|_| PortError::NotANumber(s.to_string()))?;
        Self::try_from(value)
    }
}

impl fmt::Display for ForwardPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.get())
    }
}

impl From<ForwardPort> for u16 {
    fn from(port: ForwardPort) -> Self {
        port.get()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_port_is_rejected() {
        assert_eq!(ForwardPort::try_from(0u16), Err(PortError::Zero));
        assert!(ForwardPort::new(0).is_none());
    }

    #[test]
    fn test_max_port_is_accepted() {
        let port = ForwardPort::try_from(65535u16).unwrap();
        assert_eq!(port.get(), 65535);
    }

    #[test]
    fn test_negative_port_is_out_of_range() {
        assert_eq!(ForwardPort::try_from(-1i64), Err(PortError::OutOfRange(-1)));
    }

    #[test]
    fn test_port_above_u16_is_out_of_range() {
        assert_eq!(
            ForwardPort::try_from(70000u32),
            Err(PortError::OutOfRange(70000))
        );
    }

    #[test]
    fn test_parse_accepts_surrounding_whitespace() {
        let port: ForwardPort = " 9000 ".parse().unwrap();
        assert_eq!(port.get(), 9000);
    }

    #[test]
    fn test_parse_rejects_non_numeric_text() {
        let result: Result<ForwardPort, _> = "adb".parse();
        assert!(matches!(result, Err(PortError::NotANumber(_))));
    }

    #[test]
    fn test_parse_rejects_zero() {
        let result: Result<ForwardPort, _> = "0".parse();
        assert_eq!(result, Err(PortError::Zero));
    }

    #[test]
    fn test_display_is_plain_decimal() {
        let port = ForwardPort::new(5037).unwrap();
        assert_eq!(port.to_string(), "5037");
        assert_eq!(u16::from(port), 5037);
    }
}
