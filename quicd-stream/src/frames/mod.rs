//! # Stream Frames (RFC 9000 Section 19)
//!
//! Decoded inbound frames handed to a receive stream, and the control frames
//! a receive stream asks the connection to send.

pub mod types;

pub use types::*;
