//! Stream Error Types
//!
//! RFC 9000 Section 20 defines two error domains:
//! - **Transport Errors**: Protocol violations at the QUIC layer, fatal for
//!   the connection. Returned from the frame handlers of a stream.
//! - **Application Errors**: Codes chosen by the application when it cancels
//!   or resets a stream. Surfaced to readers as [`StreamError`].

#![forbid(unsafe_code)]

use crate::types::{ErrorCode, StreamId};
use core::fmt;
use std::io;
use thiserror::Error;

/// Transport Error Codes as defined in RFC 9000 Section 20.1
///
/// Only the codes the receive path can raise are listed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u64)]
pub enum TransportError {
    /// Flow Control Error (0x03) - Peer exceeded flow control limits
    FlowControlError = 0x03,

    /// Final Size Error (0x06) - Final size violation
    FinalSizeError = 0x06,

    /// Frame Encoding Error (0x07) - Frame encoding error
    FrameEncodingError = 0x07,
}

impl TransportError {
    /// Wire value of this error code
    pub const fn code(self) -> u64 {
        self as u64
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} (0x{:x})", self, self.code())
    }
}

/// Application Protocol Error Code (RFC 9000 Section 20.2)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApplicationError(pub u64);

impl fmt::Display for ApplicationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Generic Result Type for stream operations
pub type Result<T> = core::result::Result<T, Error>;

/// Unified error type for the receive path
///
/// Flow control violations detected while processing inbound frames are
/// returned as `Transport` errors. The same type is handed to
/// [`ReceiveStream::close_for_shutdown`](crate::stream::ReceiveStream::close_for_shutdown)
/// and returned to every reader afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// Transport-level protocol error
    #[error("transport error: {0}")]
    Transport(TransportError),

    /// Connection closed by the application with the given code
    #[error("application error: {0}")]
    Application(ApplicationError),

    /// Connection is closed
    #[error("connection closed")]
    ConnectionClosed,

    /// Connection timed out due to inactivity
    #[error("idle timeout")]
    IdleTimeout,

    /// Invalid configuration
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl From<TransportError> for Error {
    fn from(e: TransportError) -> Self {
        Error::Transport(e)
    }
}

impl From<ApplicationError> for Error {
    fn from(e: ApplicationError) -> Self {
        Error::Application(e)
    }
}

/// Stream terminated by a local cancellation or a peer reset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamError {
    /// Stream the error belongs to
    pub stream_id: StreamId,

    /// Application error code chosen by whoever terminated the stream
    pub error_code: ErrorCode,

    /// True when the peer reset the stream, false for a local cancellation
    pub remote: bool,
}

impl fmt::Display for StreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let by = if self.remote { "remote" } else { "local" };
        write!(
            f,
            "stream {} canceled by {} with error code {}",
            self.stream_id, by, self.error_code
        )
    }
}

impl std::error::Error for StreamError {}

/// Errors returned by [`ReceiveStream::read`](crate::stream::ReceiveStream::read)
///
/// End-of-stream is not an error, see
/// [`ReadOutcome`](crate::stream::ReadOutcome).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReadError {
    /// The stream was canceled locally or reset by the peer
    #[error(transparent)]
    Stream(#[from] StreamError),

    /// The read deadline passed before any data could be delivered
    #[error("deadline exceeded")]
    DeadlineExceeded,

    /// The connection was shut down
    #[error(transparent)]
    Shutdown(Error),
}

impl ReadError {
    /// True for the deadline error only
    pub fn is_timeout(&self) -> bool {
        matches!(self, ReadError::DeadlineExceeded)
    }

    /// The stream error, if the stream was canceled or reset
    pub fn stream_error(&self) -> Option<&StreamError> {
        match self {
            ReadError::Stream(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ReadError> for io::Error {
    fn from(e: ReadError) -> Self {
        let kind = match &e {
            ReadError::DeadlineExceeded => io::ErrorKind::TimedOut,
            ReadError::Stream(s) if s.remote => io::ErrorKind::ConnectionReset,
            ReadError::Stream(_) => io::ErrorKind::ConnectionAborted,
            ReadError::Shutdown(_) => io::ErrorKind::NotConnected,
        };
        io::Error::new(kind, e)
    }
}
