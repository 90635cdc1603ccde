//! # Flow Control (RFC 9000 Section 4)
//!
//! QUIC uses credit-based flow control at two levels:
//! - **Connection-level**: Total bytes across all streams
//! - **Stream-level**: Bytes per individual stream
//!
//! A receive stream talks to its accountant through [`StreamFlowController`].
//! [`ReceiveFlowController`] is the implementation used by connections; it
//! charges every stream's usage to a shared [`ConnectionFlowController`].

#![forbid(unsafe_code)]

pub mod controller;

pub use controller::{
    ConnectionFlowController, ReceiveFlowController, SharedConnectionFlowController,
};

use crate::error::Result;
use crate::types::StreamOffset;
use std::time::Instant;

/// Stream Flow Controller (receive direction)
///
/// Tracks the highest offset the peer has sent and the bytes the application
/// has consumed, and decides when the peer needs more credit.
///
/// Calls for one stream are serialized by the stream's lock, so methods take
/// `&mut self`.
pub trait StreamFlowController: Send {
    /// Record the end offset of a received frame.
    ///
    /// `is_final` is set for frames carrying FIN and for RESET_STREAM.
    ///
    /// # Errors
    /// - `FLOW_CONTROL_ERROR` if the offset exceeds the receive window
    /// - `FINAL_SIZE_ERROR` if the offset conflicts with a known final size
    fn update_highest_received(
        &mut self,
        offset: StreamOffset,
        is_final: bool,
        now: Instant,
    ) -> Result<()>;

    /// Record bytes delivered to the application.
    ///
    /// Returns true when a window update should be queued.
    fn add_bytes_read(&mut self, n: u64) -> bool;

    /// Compute the new window to announce in MAX_STREAM_DATA.
    ///
    /// Returns `None` if no update is due.
    fn get_window_update(&mut self, now: Instant) -> Option<u64>;

    /// Stop tracking the stream and release its unconsumed credit.
    fn abandon(&mut self);
}
