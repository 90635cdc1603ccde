//! Callbacks from a receive stream into its connection.

use crate::frames::ControlFrame;
use crate::types::StreamId;
use std::time::Instant;

/// Something that queues control frames for the connection to send
pub trait ControlFrameSource: Send + Sync {
    /// Pop the next pending control frame.
    ///
    /// Returns the frame and whether more frames are pending, or `None` if
    /// nothing is queued. A returned frame is considered sent.
    fn get_control_frame(&self, now: Instant) -> Option<(ControlFrame, bool)>;
}

/// Connection-side hooks used by a receive stream
///
/// Both methods are invoked after the stream has released its lock, so
/// implementations may call back into the stream.
pub trait StreamSender: Send + Sync {
    /// A control frame became available on `stream`.
    ///
    /// Called once per transition from "nothing of this kind pending" to
    /// "pending", not for every byte read.
    fn on_has_stream_control_frame(&self, stream_id: StreamId, stream: &dyn ControlFrameSource);

    /// The stream's resources may be released. Called at most once per stream.
    fn on_stream_completed(&self, stream_id: StreamId);
}
