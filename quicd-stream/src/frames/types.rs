//! # Receive-Side Frame Types (RFC 9000 Section 19)
//!
//! Wire encoding and decoding happen elsewhere; these are the decoded forms
//! exchanged with the frame layer.
//!
//! Inbound:
//! - STREAM (0x08-0x0f): a fragment of stream data
//! - RESET_STREAM (0x04): the peer abruptly terminated its sending part
//!
//! Outbound:
//! - MAX_STREAM_DATA (0x11): raise the peer's stream send limit
//! - STOP_SENDING (0x05): ask the peer to stop sending on a stream

#![forbid(unsafe_code)]

use crate::types::{ErrorCode, StreamId, StreamOffset, VarInt, VARINT_MAX};
use bytes::Bytes;

pub const FRAME_TYPE_STOP_SENDING: u8 = 0x05;
pub const FRAME_TYPE_MAX_STREAM_DATA: u8 = 0x11;

/// STREAM Frame (RFC 9000 Section 19.8)
///
/// Carries application data on a stream. The payload is reference-counted
/// so the reassembly buffer can keep it without tying it to a packet buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamFrame {
    /// Stream ID
    pub stream_id: StreamId,

    /// Byte offset in stream (0 if OFF bit not set)
    pub offset: StreamOffset,

    /// FIN bit: indicates final frame in stream
    pub fin: bool,

    /// Stream data
    pub data: Bytes,
}

impl StreamFrame {
    /// Create a frame carrying `data` at `offset`
    pub fn new(
        stream_id: StreamId,
        offset: StreamOffset,
        data: impl Into<Bytes>,
        fin: bool,
    ) -> Self {
        Self {
            stream_id,
            offset,
            fin,
            data: data.into(),
        }
    }

    /// Offset one past the last byte of this frame.
    ///
    /// `None` if the frame reaches beyond the largest encodable offset.
    pub fn end_offset(&self) -> Option<StreamOffset> {
        self.offset
            .checked_add(self.data.len() as u64)
            .filter(|end| *end <= VARINT_MAX)
    }
}

/// RESET_STREAM Frame (RFC 9000 Section 19.4)
///
/// Abruptly terminates sending on a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResetStreamFrame {
    /// Stream ID being reset
    pub stream_id: StreamId,

    /// Application-defined error code
    pub error_code: ErrorCode,

    /// Final size of the stream in bytes
    pub final_size: VarInt,
}

/// STOP_SENDING Frame (RFC 9000 Section 19.5)
///
/// Requests peer to stop sending on a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StopSendingFrame {
    /// Stream ID to stop sending on
    pub stream_id: StreamId,

    /// Application-defined error code
    pub error_code: ErrorCode,
}

/// MAX_STREAM_DATA Frame (RFC 9000 Section 19.10)
///
/// Informs peer of maximum data bytes it can send on a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaxStreamDataFrame {
    /// Stream ID
    pub stream_id: StreamId,

    /// Maximum stream data in bytes
    pub maximum_stream_data: VarInt,
}

/// Control frame queued by a receive stream for transmission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlFrame {
    /// MAX_STREAM_DATA frame (0x11)
    MaxStreamData(MaxStreamDataFrame),

    /// STOP_SENDING frame (0x05)
    StopSending(StopSendingFrame),
}

impl ControlFrame {
    /// Frame type byte
    pub fn frame_type(&self) -> u8 {
        match self {
            ControlFrame::MaxStreamData(_) => FRAME_TYPE_MAX_STREAM_DATA,
            ControlFrame::StopSending(_) => FRAME_TYPE_STOP_SENDING,
        }
    }

    /// Stream the frame refers to
    pub fn stream_id(&self) -> StreamId {
        match self {
            ControlFrame::MaxStreamData(f) => f.stream_id,
            ControlFrame::StopSending(f) => f.stream_id,
        }
    }
}
