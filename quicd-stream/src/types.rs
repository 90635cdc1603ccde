//! # Core Stream Types (RFC 9000)
//!
//! Identifiers, offsets and error codes shared by the receive path.

#![forbid(unsafe_code)]

use core::fmt;

// ============================================================================
// Variable-Length Integers (RFC 9000 Section 16)
// ============================================================================

/// Variable-Length Integer (RFC 9000 Section 16)
///
/// Values carried on the wire as varints never exceed [`VARINT_MAX`].
pub type VarInt = u64;

/// Maximum value for VarInt (2^62 - 1)
pub const VARINT_MAX: u64 = (1u64 << 62) - 1;

/// Stream Offset - Byte offset within a stream
pub type StreamOffset = u64;

/// Application protocol error code carried by RESET_STREAM and STOP_SENDING
pub type ErrorCode = VarInt;

// ============================================================================
// Stream ID (RFC 9000 Section 2.1)
// ============================================================================

/// Stream ID - Identifies a stream within a connection
///
/// The two least significant bits encode initiator and direction; the
/// receive path only uses the ID to tag frames, errors and log records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StreamId(pub u64);

impl StreamId {
    /// Create a new StreamId
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the raw value
    pub const fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for StreamId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}
