//! # Stream Data Reassembly Buffer (RFC 9000 Section 2.2)
//!
//! QUIC packets can arrive out of order, be duplicated, or be retransmitted
//! with different framing. Stream data must still be delivered to the
//! application **in order** and **exactly once**.
//!
//! ## Layout
//!
//! Received data is kept as disjoint segments in a `BTreeMap` keyed by
//! stream offset. Segments never overlap or touch: an insert merges with every
//! segment it overlaps or is adjacent to, keeping only one copy of each byte.
//! Bytes below the read offset are dropped as soon as they are delivered, so
//! memory is bounded by the outstanding ranges, not by the stream length.
//!
//! ```text
//! read_offset = 10
//!
//! insert(20, "xyz")   segments: {20: "xyz"}
//! insert(10, "abcdefghij")
//!                     segments: {10: "abcdefghijxyz"}
//! read(4) -> "abcd"   segments: {14: "efghijxyz"}, read_offset = 14
//! ```

#![forbid(unsafe_code)]

use crate::types::StreamOffset;
use bytes::{Buf, BytesMut};
use core::ops::Bound;
use std::collections::BTreeMap;

/// Out-of-order reassembly buffer for one receive stream
#[derive(Debug, Default)]
pub struct ReassemblyBuffer {
    /// Disjoint, non-adjacent segments keyed by start offset
    segments: BTreeMap<StreamOffset, BytesMut>,

    /// Next byte to deliver to the application
    read_offset: StreamOffset,

    /// Bytes currently held
    buffered: usize,
}

impl ReassemblyBuffer {
    /// Create a new empty reassembly buffer
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert received stream data at a specific offset.
    ///
    /// Bytes already delivered or already held are dropped. Returns true if
    /// the buffer gained at least one new byte.
    pub fn insert(&mut self, offset: StreamOffset, data: &[u8]) -> bool {
        let end = offset + data.len() as u64;
        let start = offset.max(self.read_offset);
        if end <= start {
            return false;
        }

        // Segment starting at or before `start` that reaches it
        let pred = self
            .segments
            .range(..=start)
            .next_back()
            .filter(|(k, seg)| **k + seg.len() as u64 >= start)
            .map(|(k, seg)| (*k, *k + seg.len() as u64));

        if let Some((_, pred_end)) = pred {
            if pred_end >= end {
                return false;
            }
        }

        let (merged_off, mut merged) = match pred {
            Some((k, _)) => {
                let seg = self.segments.remove(&k).unwrap_or_default();
                (k, seg)
            }
            None => (start, BytesMut::with_capacity((end - start) as usize)),
        };
        let held_before = merged.len();

        let followers: Vec<StreamOffset> = self
            .segments
            .range((Bound::Excluded(start), Bound::Included(end)))
            .map(|(k, _)| *k)
            .collect();

        let mut absorbed = 0;
        for k in followers {
            let Some(seg) = self.segments.remove(&k) else {
                continue;
            };
            absorbed += seg.len();

            let cur = merged_off + merged.len() as u64;
            if k > cur {
                merged.extend_from_slice(&data[(cur - offset) as usize..(k - offset) as usize]);
            }
            let cur = merged_off + merged.len() as u64;
            let seg_end = k + seg.len() as u64;
            if seg_end > cur {
                merged.extend_from_slice(&seg[(cur - k) as usize..]);
            }
        }

        let cur = merged_off + merged.len() as u64;
        if end > cur {
            merged.extend_from_slice(&data[(cur - offset) as usize..]);
        }

        self.buffered += merged.len() - held_before - absorbed;
        self.segments.insert(merged_off, merged);
        true
    }

    /// Copy contiguous bytes starting at the read offset into `dest`.
    ///
    /// Returns the number of bytes copied, zero if the byte at the read
    /// offset has not arrived yet. Never copies past a gap.
    pub fn read(&mut self, dest: &mut [u8]) -> usize {
        if dest.is_empty() || !self.has_data() {
            return 0;
        }

        let Some((_, mut seg)) = self.segments.pop_first() else {
            return 0;
        };

        let n = seg.len().min(dest.len());
        dest[..n].copy_from_slice(&seg[..n]);
        seg.advance(n);

        self.read_offset += n as u64;
        self.buffered -= n;
        if !seg.is_empty() {
            self.segments.insert(self.read_offset, seg);
        }
        n
    }

    /// Whether the byte at the read offset is present
    pub fn has_data(&self) -> bool {
        self.segments
            .first_key_value()
            .is_some_and(|(k, _)| *k == self.read_offset)
    }

    /// Next byte to deliver to the application
    pub fn read_offset(&self) -> StreamOffset {
        self.read_offset
    }

    /// Number of bytes held, delivered or not yet reachable
    pub fn buffered_bytes(&self) -> usize {
        self.buffered
    }

    /// Number of disjoint ranges held
    pub fn pending_ranges(&self) -> usize {
        self.segments.len()
    }

    /// Discard all held data. The read offset is kept.
    pub fn clear(&mut self) {
        self.segments.clear();
        self.buffered = 0;
    }
}
