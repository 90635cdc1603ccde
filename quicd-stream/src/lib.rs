//! quicd-stream: Receive side of QUIC streams
//!
//! The receiving half of a QUIC stream (RFC 9000 Section 2-4): STREAM and
//! RESET_STREAM frames arrive out of order and duplicated, are reassembled,
//! and are handed to the application through a blocking read with deadlines
//! and cancellation.
//!
//! # Architecture
//!
//! - **One lock per stream**: frame handlers and readers serialize on the
//!   stream's mutex, blocked readers park on a condition variable
//! - **Flow control behind a trait**: the stream reports offsets and consumed
//!   bytes to a [`StreamFlowController`], which detects violations and decides
//!   when the peer needs more credit
//! - **Connection hooks**: control frames and stream completion are signalled
//!   through [`StreamSender`]; the connection pulls frames with
//!   [`ControlFrameSource::get_control_frame`]
//!
//! Wire encoding, loss recovery, and routing frames to streams live in the
//! connection layer.
//!
//! # Module Organization
//!
//! - `stream`: reassembly buffer and receive state machine
//! - `flow_control`: stream and connection receive windows
//! - `frames`: decoded inbound frames and outbound control frames
//! - `config`: flow control configuration
//! - `error`: transport and read errors
//! - `types`: stream IDs, offsets, error codes

pub mod config;
pub mod error;
pub mod flow_control;
pub mod frames;
pub mod stream;
pub mod types;

// Re-export key types
pub use config::FlowControlConfig;
pub use error::{ApplicationError, Error, ReadError, Result, StreamError, TransportError};
pub use flow_control::{ConnectionFlowController, ReceiveFlowController, StreamFlowController};
pub use frames::{ControlFrame, MaxStreamDataFrame, ResetStreamFrame, StopSendingFrame, StreamFrame};
pub use stream::{ControlFrameSource, ReadOutcome, ReceiveStream, StreamSender};
pub use types::{ErrorCode, StreamId, StreamOffset};
