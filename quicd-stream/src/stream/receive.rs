//! # Receive Stream State Machine (RFC 9000 Section 3.2)
//!
//! The receiving part of a stream. Frames are handed in by the connection's
//! packet processing path, readers block in [`ReceiveStream::read`].
//!
//! ## Completion sources
//!
//! - data arrival (STREAM frames, possibly out of order or duplicated)
//! - end of stream (FIN bit)
//! - local cancellation ([`ReceiveStream::cancel_read`], queues STOP_SENDING)
//! - remote reset (RESET_STREAM)
//! - connection shutdown ([`ReceiveStream::close_for_shutdown`])
//!
//! All state sits behind one mutex. Blocked readers park on a single condition
//! variable, and every event that could change the outcome of a read signals
//! it before the lock is released. A woken reader re-evaluates everything, so
//! a deadline timer firing is just another wakeup.
//!
//! ## Completion
//!
//! The connection is told exactly once that the stream can be released, as
//! soon as the final size is known and either every byte up to it was
//! delivered to the application or the stream was canceled or reset. Flow control needs
//! the final size to settle the connection-level accounting, which is why a
//! cancellation before the final size arrives does not complete the stream.

#![forbid(unsafe_code)]

use super::buffer::ReassemblyBuffer;
use super::sender::{ControlFrameSource, StreamSender};
use crate::config::FlowControlConfig;
use crate::error::{Error, ReadError, Result, StreamError, TransportError};
use crate::flow_control::{
    ReceiveFlowController, SharedConnectionFlowController, StreamFlowController,
};
use crate::frames::{
    ControlFrame, MaxStreamDataFrame, ResetStreamFrame, StopSendingFrame, StreamFrame,
};
use crate::types::{ErrorCode, StreamId, StreamOffset};
use core::fmt;
use parking_lot::{Condvar, Mutex};
use std::io;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, trace};

/// Result of a successful read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadOutcome {
    /// Bytes copied into the caller's buffer
    pub len: usize,

    /// The end of the stream was reached. Further reads return
    /// `len == 0, fin == true`.
    pub fin: bool,
}

/// Why a stream stopped before its end. The first one recorded sticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Termination {
    LocalCancel(ErrorCode),
    RemoteReset(ErrorCode),
}

struct RecvState {
    buffer: ReassemblyBuffer,
    flow_controller: Box<dyn StreamFlowController>,

    /// Final size, from FIN or RESET_STREAM
    final_offset: Option<StreamOffset>,

    termination: Option<Termination>,

    /// Code of the first RESET_STREAM, kept even when a local cancel won
    remote_error_code: Option<ErrorCode>,

    /// Overrides every other condition for readers
    shutdown: Option<Error>,

    /// Every byte up to the final size was delivered to the application
    drained: bool,

    completed: bool,
    flow_control_released: bool,

    queued_window_update: bool,
    queued_stop_sending: Option<ErrorCode>,

    deadline: Option<Instant>,
}

impl RecvState {
    fn fully_read(&self) -> bool {
        self.final_offset == Some(self.buffer.read_offset())
    }

    /// Release flow control credit once the stream was terminated and its
    /// final size is known.
    fn release_flow_control_if_terminated(&mut self, stream_id: StreamId) {
        if self.flow_control_released
            || self.final_offset.is_none()
            || self.termination.is_none()
        {
            return;
        }

        trace!(stream_id = %stream_id, "releasing flow control");
        self.flow_control_released = true;
        self.flow_controller.abandon();
    }

    /// Latch completion. Returns true exactly once.
    fn take_completion(&mut self) -> bool {
        if self.completed || self.final_offset.is_none() {
            return false;
        }
        if self.termination.is_none() && !self.drained {
            return false;
        }
        self.completed = true;
        true
    }
}

/// Receiving part of a QUIC stream
///
/// Safe to share between the packet processing path and reader threads.
/// Concurrent readers do not corrupt the stream, but they split the data
/// between them in no particular order.
pub struct ReceiveStream {
    stream_id: StreamId,
    state: Mutex<RecvState>,
    readable: Condvar,
    sender: Arc<dyn StreamSender>,
}

impl fmt::Debug for ReceiveStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReceiveStream")
            .field("stream_id", &self.stream_id)
            .finish_non_exhaustive()
    }
}

impl ReceiveStream {
    /// Create a receive stream with the given flow controller
    pub fn new(
        stream_id: StreamId,
        sender: Arc<dyn StreamSender>,
        flow_controller: Box<dyn StreamFlowController>,
    ) -> Self {
        Self {
            stream_id,
            state: Mutex::new(RecvState {
                buffer: ReassemblyBuffer::new(),
                flow_controller,
                final_offset: None,
                termination: None,
                remote_error_code: None,
                shutdown: None,
                drained: false,
                completed: false,
                flow_control_released: false,
                queued_window_update: false,
                queued_stop_sending: None,
                deadline: None,
            }),
            readable: Condvar::new(),
            sender,
        }
    }

    /// Create a receive stream using a [`ReceiveFlowController`] built from
    /// `config`, charging the connection controller if one is given.
    pub fn with_config(
        stream_id: StreamId,
        sender: Arc<dyn StreamSender>,
        config: &FlowControlConfig,
        connection: Option<SharedConnectionFlowController>,
    ) -> Self {
        let flow_controller = ReceiveFlowController::new(stream_id, config, connection);
        Self::new(stream_id, sender, Box::new(flow_controller))
    }

    /// Stream ID
    pub fn stream_id(&self) -> StreamId {
        self.stream_id
    }

    /// Process a STREAM frame.
    ///
    /// # Errors
    /// Flow control and final size violations reported by the flow
    /// controller, unchanged. The frame is not buffered in that case.
    pub fn handle_stream_frame(&self, frame: &StreamFrame, now: Instant) -> Result<()> {
        let end = frame
            .end_offset()
            .ok_or(Error::Transport(TransportError::FrameEncodingError))?;

        let completed = {
            let mut state = self.state.lock();
            if state.shutdown.is_some() {
                return Ok(());
            }

            state.flow_controller.update_highest_received(end, frame.fin, now)?;

            let mut wake = false;
            if frame.fin && state.final_offset.is_none() {
                debug!(stream_id = %self.stream_id, final_offset = end, "final size known");
                state.final_offset = Some(end);
                wake = true;
            }

            // Data for a terminated stream only counts for flow control.
            if state.termination.is_none() && state.buffer.insert(frame.offset, &frame.data) {
                wake = true;
            }
            trace!(
                stream_id = %self.stream_id,
                offset = frame.offset,
                len = frame.data.len(),
                fin = frame.fin,
                buffered = state.buffer.buffered_bytes(),
                ranges = state.buffer.pending_ranges(),
                "stream frame"
            );

            // A FIN behind data the application already consumed ends the
            // stream without another read.
            if state.termination.is_none() && state.fully_read() {
                state.drained = true;
            }

            state.release_flow_control_if_terminated(self.stream_id);
            if wake {
                self.readable.notify_all();
            }
            state.take_completion()
        };

        if completed {
            self.complete();
        }
        Ok(())
    }

    /// Process a RESET_STREAM frame.
    ///
    /// Duplicates are accepted once their final size has been checked.
    ///
    /// # Errors
    /// Final size violations reported by the flow controller, unchanged.
    pub fn handle_reset_stream_frame(&self, frame: &ResetStreamFrame, now: Instant) -> Result<()> {
        let completed = {
            let mut state = self.state.lock();
            if state.shutdown.is_some() {
                return Ok(());
            }

            state
                .flow_controller
                .update_highest_received(frame.final_size, true, now)?;
            if state.final_offset.is_none() {
                state.final_offset = Some(frame.final_size);
            }

            if state.remote_error_code.is_some() {
                return Ok(());
            }

            debug!(
                stream_id = %self.stream_id,
                error_code = frame.error_code,
                final_size = frame.final_size,
                "stream reset by peer"
            );
            state.remote_error_code = Some(frame.error_code);
            if state.termination.is_none() && !state.drained {
                state.termination = Some(Termination::RemoteReset(frame.error_code));
            }

            // The peer stopped sending, neither credit nor STOP_SENDING help.
            state.buffer.clear();
            state.queued_window_update = false;
            state.queued_stop_sending = None;

            state.release_flow_control_if_terminated(self.stream_id);
            self.readable.notify_all();
            state.take_completion()
        };

        if completed {
            self.complete();
        }
        Ok(())
    }

    /// Read contiguous stream data into `buf`, blocking until data is
    /// available, the stream ends, or the read deadline passes.
    ///
    /// The read that delivers the last byte of the stream reports
    /// `fin == true` together with the data.
    ///
    /// # Errors
    /// - [`ReadError::Shutdown`] after [`close_for_shutdown`](Self::close_for_shutdown)
    /// - [`ReadError::Stream`] after a local cancellation or a peer reset
    /// - [`ReadError::DeadlineExceeded`] when the read deadline has passed.
    ///   No data is consumed.
    pub fn read(&self, buf: &mut [u8]) -> core::result::Result<ReadOutcome, ReadError> {
        let mut state = self.state.lock();
        loop {
            if let Some(err) = &state.shutdown {
                return Err(ReadError::Shutdown(err.clone()));
            }

            if let Some(termination) = state.termination {
                return Err(self.stream_error(termination).into());
            }

            if state.fully_read() {
                state.drained = true;
                let completed = state.take_completion();
                drop(state);
                if completed {
                    self.complete();
                }
                return Ok(ReadOutcome { len: 0, fin: true });
            }

            if let Some(deadline) = state.deadline {
                if Instant::now() >= deadline {
                    return Err(ReadError::DeadlineExceeded);
                }
            }

            if buf.is_empty() {
                return Ok(ReadOutcome { len: 0, fin: false });
            }

            if state.buffer.has_data() {
                let len = state.buffer.read(buf);
                let window_update = state.flow_controller.add_bytes_read(len as u64);
                let new_frame = window_update && !state.queued_window_update;
                if window_update {
                    state.queued_window_update = true;
                }

                let fin = state.fully_read();
                if fin {
                    state.drained = true;
                }
                trace!(stream_id = %self.stream_id, len, fin, "read");

                let completed = state.take_completion();
                drop(state);

                if new_frame {
                    self.sender.on_has_stream_control_frame(self.stream_id, self);
                }
                if completed {
                    self.complete();
                }
                return Ok(ReadOutcome { len, fin });
            }

            match state.deadline {
                Some(deadline) => {
                    self.readable.wait_until(&mut state, deadline);
                }
                None => self.readable.wait(&mut state),
            }
        }
    }

    /// Abort reading with the given application error code.
    ///
    /// Queues a STOP_SENDING frame unless the whole stream has already been
    /// received and read. Blocked and future reads fail with a local
    /// [`StreamError`]. Only the first call has an effect, and none after the
    /// end of the stream was read, the peer reset the stream, or the
    /// connection shut down.
    pub fn cancel_read(&self, error_code: ErrorCode) {
        let (new_frame, completed) = {
            let mut state = self.state.lock();
            if state.shutdown.is_some() || state.termination.is_some() || state.drained {
                return;
            }

            debug!(stream_id = %self.stream_id, error_code, "canceling read");
            state.termination = Some(Termination::LocalCancel(error_code));

            let new_frame = !state.fully_read();
            if new_frame {
                state.queued_stop_sending = Some(error_code);
            }
            state.buffer.clear();
            state.queued_window_update = false;

            state.release_flow_control_if_terminated(self.stream_id);
            self.readable.notify_all();
            (new_frame, state.take_completion())
        };

        if new_frame {
            self.sender.on_has_stream_control_frame(self.stream_id, self);
        }
        if completed {
            self.complete();
        }
    }

    /// Close the stream because the connection is going away.
    ///
    /// Every current and future read returns `err`. Later frames are
    /// ignored and no control frames are sent. Only the first call has an
    /// effect.
    pub fn close_for_shutdown(&self, err: Error) {
        let mut state = self.state.lock();
        if state.shutdown.is_some() {
            return;
        }

        debug!(stream_id = %self.stream_id, error = %err, "closing stream for shutdown");
        state.shutdown = Some(err);
        state.buffer.clear();
        state.queued_window_update = false;
        state.queued_stop_sending = None;
        self.readable.notify_all();
    }

    /// Set the read deadline. `None` blocks reads indefinitely.
    ///
    /// A deadline in the past fails every read until it is changed again.
    pub fn set_read_deadline(&self, deadline: Option<Instant>) {
        let mut state = self.state.lock();
        state.deadline = deadline;
        self.readable.notify_all();
    }

    /// Current read deadline
    pub fn read_deadline(&self) -> Option<Instant> {
        self.state.lock().deadline
    }

    /// Error code of the peer's RESET_STREAM, if one was received.
    ///
    /// Available even when a local cancellation was recorded first and
    /// readers see the local error.
    pub fn remote_error_code(&self) -> Option<ErrorCode> {
        self.state.lock().remote_error_code
    }

    /// Final size of the stream, once known
    pub fn final_offset(&self) -> Option<StreamOffset> {
        self.state.lock().final_offset
    }

    /// Bytes delivered to the application so far
    pub fn bytes_read(&self) -> u64 {
        self.state.lock().buffer.read_offset()
    }

    fn stream_error(&self, termination: Termination) -> StreamError {
        let (error_code, remote) = match termination {
            Termination::LocalCancel(code) => (code, false),
            Termination::RemoteReset(code) => (code, true),
        };
        StreamError {
            stream_id: self.stream_id,
            error_code,
            remote,
        }
    }

    fn complete(&self) {
        debug!(stream_id = %self.stream_id, "receive stream completed");
        self.sender.on_stream_completed(self.stream_id);
    }
}

impl ControlFrameSource for ReceiveStream {
    /// MAX_STREAM_DATA goes out before STOP_SENDING.
    fn get_control_frame(&self, now: Instant) -> Option<(ControlFrame, bool)> {
        let mut state = self.state.lock();

        if state.queued_window_update {
            state.queued_window_update = false;
            if let Some(maximum_stream_data) = state.flow_controller.get_window_update(now) {
                let frame = ControlFrame::MaxStreamData(MaxStreamDataFrame {
                    stream_id: self.stream_id,
                    maximum_stream_data,
                });
                return Some((frame, state.queued_stop_sending.is_some()));
            }
        }

        let error_code = state.queued_stop_sending.take()?;
        let frame = ControlFrame::StopSending(StopSendingFrame {
            stream_id: self.stream_id,
            error_code,
        });
        Some((frame, false))
    }
}

impl io::Read for &ReceiveStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match ReceiveStream::read(*self, buf) {
            Ok(outcome) => Ok(outcome.len),
            Err(e) => Err(e.into()),
        }
    }
}

impl io::Read for ReceiveStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        io::Read::read(&mut &*self, buf)
    }
}
