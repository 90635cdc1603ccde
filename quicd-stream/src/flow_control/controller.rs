//! # Receive Flow Controllers (RFC 9000 Section 4.1, 4.5)
//!
//! ## RFC 9000 Section 4.1:
//! Receivers advertise credit via MAX_DATA and MAX_STREAM_DATA frames. A
//! receiver MUST close the connection with FLOW_CONTROL_ERROR if the sender
//! violates the advertised limits.
//!
//! ## RFC 9000 Section 4.5:
//! Once a final size is known it cannot change. Data beyond the final size,
//! or a final size below data already received, is a FINAL_SIZE_ERROR.

#![forbid(unsafe_code)]

use super::StreamFlowController;
use crate::config::FlowControlConfig;
use crate::error::{Error, Result, TransportError};
use crate::types::{StreamId, StreamOffset};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

/// Connection flow controller shared by every stream of a connection
pub type SharedConnectionFlowController = Arc<Mutex<ConnectionFlowController>>;

/// Window state common to both levels
#[derive(Debug, Clone)]
struct ReceiveWindow {
    /// Absolute offset up to which the peer may send
    receive_window: u64,

    /// Size of the window announced with every update
    window_size: u64,

    /// Upper bound for auto-tuned window growth
    max_window_size: u64,

    /// Highest offset (or connection byte count) received
    highest_received: u64,

    /// Bytes consumed by the application
    bytes_read: u64,

    /// Fraction of the window consumed before an update is due
    update_threshold: f64,

    /// Updates closer together than this double the window
    auto_tune_interval: Option<Duration>,

    /// When the last window update was handed out
    last_update: Option<Instant>,
}

impl ReceiveWindow {
    fn new(
        window_size: u64,
        max_window_size: u64,
        update_threshold: f64,
        auto_tune_interval: Option<Duration>,
    ) -> Self {
        Self {
            receive_window: window_size,
            window_size,
            max_window_size: max_window_size.max(window_size),
            highest_received: 0,
            bytes_read: 0,
            update_threshold,
            auto_tune_interval,
            last_update: None,
        }
    }

    fn exceeds_window(&self) -> bool {
        self.highest_received > self.receive_window
    }

    fn has_window_update(&self) -> bool {
        let remaining = self.receive_window.saturating_sub(self.bytes_read);
        (remaining as f64) <= (self.window_size as f64) * (1.0 - self.update_threshold)
    }

    fn window_update(&mut self, now: Instant) -> Option<u64> {
        if !self.has_window_update() {
            return None;
        }

        self.maybe_grow_window(now);
        self.last_update = Some(now);
        self.receive_window = self.bytes_read + self.window_size;
        Some(self.receive_window)
    }

    fn maybe_grow_window(&mut self, now: Instant) {
        let (Some(interval), Some(last)) = (self.auto_tune_interval, self.last_update) else {
            return;
        };

        let recent = now.saturating_duration_since(last) < interval;
        if recent && self.window_size < self.max_window_size {
            let new_size = (self.window_size * 2).min(self.max_window_size);
            trace!(old = self.window_size, new = new_size, "growing receive window");
            self.window_size = new_size;
        }
    }
}

// ============================================================================
// Connection-Level Flow Control
// ============================================================================

/// Connection Flow Controller (receive direction)
///
/// Sums the usage of all streams of a connection. MAX_DATA updates are sent by
/// the connection, so this controller only answers whether one is due.
#[derive(Debug, Clone)]
pub struct ConnectionFlowController {
    window: ReceiveWindow,
}

impl ConnectionFlowController {
    /// Create new connection flow controller
    pub fn new(config: &FlowControlConfig) -> Self {
        Self {
            window: ReceiveWindow::new(
                config.initial_max_data,
                config.initial_max_data.saturating_mul(4),
                config.window_update_threshold,
                config.auto_tune_interval(),
            ),
        }
    }

    /// Create a controller wrapped for sharing between streams
    pub fn shared(config: &FlowControlConfig) -> SharedConnectionFlowController {
        Arc::new(Mutex::new(Self::new(config)))
    }

    /// Charge newly received stream bytes to the connection
    ///
    /// # Errors
    /// `FLOW_CONTROL_ERROR` if the connection window is exceeded
    pub fn increment_highest_received(&mut self, increment: u64) -> Result<()> {
        self.window.highest_received += increment;
        if self.window.exceeds_window() {
            warn!(
                received = self.window.highest_received,
                limit = self.window.receive_window,
                "peer exceeded connection flow control window"
            );
            return Err(Error::Transport(TransportError::FlowControlError));
        }
        Ok(())
    }

    /// Record bytes consumed on one of the streams
    ///
    /// Returns true when a MAX_DATA update should be queued.
    pub fn add_bytes_read(&mut self, n: u64) -> bool {
        self.window.bytes_read += n;
        self.window.has_window_update()
    }

    /// Whether enough of the connection window was consumed that a MAX_DATA
    /// update is due
    pub fn has_window_update(&self) -> bool {
        self.window.has_window_update()
    }

    /// Get the new MAX_DATA value to send, if one is due
    pub fn get_window_update(&mut self, now: Instant) -> Option<u64> {
        self.window.window_update(now)
    }

    /// Total bytes received across all streams
    pub fn bytes_received(&self) -> u64 {
        self.window.highest_received
    }

    /// Total bytes consumed (or released) across all streams
    pub fn bytes_read(&self) -> u64 {
        self.window.bytes_read
    }

    /// Current connection receive limit
    pub fn receive_window(&self) -> u64 {
        self.window.receive_window
    }
}

// ============================================================================
// Stream-Level Flow Control
// ============================================================================

/// Stream Flow Controller (receive direction)
///
/// Enforces MAX_STREAM_DATA and final size rules for one stream and reports
/// every change to the connection controller, if one is attached.
#[derive(Debug)]
pub struct ReceiveFlowController {
    stream_id: StreamId,
    window: ReceiveWindow,
    final_offset: Option<StreamOffset>,
    connection: Option<SharedConnectionFlowController>,
    abandoned: bool,
}

impl ReceiveFlowController {
    /// Create a stream flow controller from configuration
    pub fn new(
        stream_id: StreamId,
        config: &FlowControlConfig,
        connection: Option<SharedConnectionFlowController>,
    ) -> Self {
        Self {
            stream_id,
            window: ReceiveWindow::new(
                config.initial_max_stream_data,
                config.max_stream_window,
                config.window_update_threshold,
                config.auto_tune_interval(),
            ),
            final_offset: None,
            connection,
            abandoned: false,
        }
    }

    /// Highest offset received on this stream
    pub fn highest_received(&self) -> u64 {
        self.window.highest_received
    }

    /// Bytes consumed by the application
    pub fn bytes_read(&self) -> u64 {
        self.window.bytes_read
    }

    /// Current stream receive limit
    pub fn receive_window(&self) -> u64 {
        self.window.receive_window
    }

    /// Final size, once known
    pub fn final_offset(&self) -> Option<StreamOffset> {
        self.final_offset
    }

    /// Whether [`abandon`](StreamFlowController::abandon) was called
    pub fn is_abandoned(&self) -> bool {
        self.abandoned
    }

    fn final_size_error(&self, offset: StreamOffset) -> Error {
        warn!(
            stream_id = %self.stream_id,
            offset,
            final_offset = ?self.final_offset,
            highest_received = self.window.highest_received,
            "final size violation"
        );
        Error::Transport(TransportError::FinalSizeError)
    }
}

impl StreamFlowController for ReceiveFlowController {
    fn update_highest_received(
        &mut self,
        offset: StreamOffset,
        is_final: bool,
        _now: Instant,
    ) -> Result<()> {
        if let Some(final_offset) = self.final_offset {
            if (is_final && offset != final_offset) || offset > final_offset {
                return Err(self.final_size_error(offset));
            }
        }

        if is_final {
            if offset < self.window.highest_received {
                return Err(self.final_size_error(offset));
            }
            self.final_offset = Some(offset);
        }

        if offset <= self.window.highest_received {
            return Ok(());
        }

        let increment = offset - self.window.highest_received;
        self.window.highest_received = offset;

        if self.window.exceeds_window() {
            warn!(
                stream_id = %self.stream_id,
                received = offset,
                limit = self.window.receive_window,
                "peer exceeded stream flow control window"
            );
            return Err(Error::Transport(TransportError::FlowControlError));
        }

        if let Some(connection) = &self.connection {
            connection.lock().increment_highest_received(increment)?;
        }
        Ok(())
    }

    fn add_bytes_read(&mut self, n: u64) -> bool {
        self.window.bytes_read += n;
        if let Some(connection) = &self.connection {
            if connection.lock().add_bytes_read(n) {
                trace!(stream_id = %self.stream_id, "connection window update due");
            }
        }

        // No credit is needed once the peer has sent everything.
        self.final_offset.is_none() && !self.abandoned && self.window.has_window_update()
    }

    fn get_window_update(&mut self, now: Instant) -> Option<u64> {
        if self.abandoned || self.final_offset.is_some() {
            return None;
        }

        let update = self.window.window_update(now);
        if let Some(window) = update {
            trace!(stream_id = %self.stream_id, window, "stream window update");
        }
        update
    }

    fn abandon(&mut self) {
        if self.abandoned {
            return;
        }
        self.abandoned = true;

        let unread = self.window.highest_received.saturating_sub(self.window.bytes_read);
        debug!(stream_id = %self.stream_id, unread, "abandoning stream flow control");
        if unread > 0 {
            if let Some(connection) = &self.connection {
                connection.lock().add_bytes_read(unread);
            }
        }
    }
}
