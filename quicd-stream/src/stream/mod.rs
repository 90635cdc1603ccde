//! # Receive Streams (RFC 9000 Section 2, 3.2)
//!
//! Reassembly of out-of-order stream data, the receive-side state machine,
//! and the hooks a stream uses to talk to its connection.

pub mod buffer;
pub mod receive;
pub mod sender;

pub use buffer::ReassemblyBuffer;
pub use receive::{ReadOutcome, ReceiveStream};
pub use sender::{ControlFrameSource, StreamSender};
