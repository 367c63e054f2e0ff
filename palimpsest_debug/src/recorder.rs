// Copyright 2026 the Palimpsest Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Compact binary event recording and decoding.
//!
//! [`RecorderSink`] implements [`TraceSink`] and encodes events into a
//! `Vec<u8>` as fixed-size little-endian records. [`decode`] reads them back
//! as an iterator of [`RecordedEvent`].
//!
//! Node handles are recorded as raw `(index, generation)` pairs and come
//! back as [`NodeRef`]. Per-node visit lists store only their length.

use kurbo::Rect;
use palimpsest_core::node::NodeId;
use palimpsest_core::trace::{
    NodeVisit, SkipReason, TraceSink, TransactionAction, TransactionEvent, WalkBeginEvent,
    WalkEndEvent, WalkSkippedEvent,
};
use palimpsest_core::walker::WalkMode;

// ---------------------------------------------------------------------------
// Event type discriminants
// ---------------------------------------------------------------------------

const TAG_WALK_BEGIN: u8 = 1;
const TAG_WALK_END: u8 = 2;
const TAG_WALK_SKIPPED: u8 = 3;
const TAG_TRANSACTION: u8 = 4;
const TAG_NODE_VISITS_COUNT: u8 = 5;

/// A node handle as recorded: slot index and generation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NodeRef {
    /// Slot index.
    pub index: u32,
    /// Generation of the slot when the event fired.
    pub generation: u32,
}

impl From<NodeId> for NodeRef {
    fn from(id: NodeId) -> Self {
        Self {
            index: id.index(),
            generation: id.generation(),
        }
    }
}

// ---------------------------------------------------------------------------
// RecorderSink
// ---------------------------------------------------------------------------

/// A [`TraceSink`] that encodes events into a compact binary buffer.
#[derive(Debug, Default)]
pub struct RecorderSink {
    buf: Vec<u8>,
}

impl RecorderSink {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a view of the recorded bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Consumes the recorder and returns the recorded bytes.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    // -- encoding helpers --------------------------------------------------

    fn write_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    fn write_u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn write_u64(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn write_f64(&mut self, v: f64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn write_node(&mut self, id: NodeId) {
        self.write_u32(id.index());
        self.write_u32(id.generation());
    }

    fn write_rect(&mut self, r: Rect) {
        self.write_f64(r.x0);
        self.write_f64(r.y0);
        self.write_f64(r.x1);
        self.write_f64(r.y1);
    }

    fn write_mode(&mut self, m: WalkMode) {
        self.write_u8(match m {
            WalkMode::Update => 0,
            WalkMode::FullRefresh => 1,
        });
    }
}

fn count_u32(len: usize) -> u32 {
    u32::try_from(len).unwrap_or(u32::MAX)
}

impl TraceSink for RecorderSink {
    fn on_walk_begin(&mut self, e: &WalkBeginEvent) {
        self.write_u8(TAG_WALK_BEGIN);
        self.write_u64(e.walk_index);
        self.write_mode(e.mode);
        self.write_node(e.start);
        self.write_rect(e.rect);
    }

    fn on_walk_end(&mut self, e: &WalkEndEvent) {
        self.write_u8(TAG_WALK_END);
        self.write_u64(e.walk_index);
        self.write_mode(e.mode);
        self.write_u32(e.visited);
        self.write_u32(e.deferred);
        self.write_rect(e.dirty);
    }

    fn on_walk_skipped(&mut self, e: &WalkSkippedEvent) {
        self.write_u8(TAG_WALK_SKIPPED);
        self.write_node(e.start);
        self.write_mode(e.mode);
        self.write_u8(match e.reason {
            SkipReason::EmptyRect => 0,
            SkipReason::Detached => 1,
            SkipReason::Deferred => 2,
        });
    }

    fn on_transaction(&mut self, e: &TransactionEvent) {
        self.write_u8(TAG_TRANSACTION);
        self.write_node(e.node);
        self.write_u64(e.revision);
        self.write_u8(match e.action {
            TransactionAction::Begin => 0,
            TransactionAction::Finish => 1,
            TransactionAction::Undo => 2,
            TransactionAction::Redo => 3,
            TransactionAction::Purge => 4,
            TransactionAction::Stale => 5,
        });
        self.write_rect(e.rect);
    }

    fn on_node_visits(&mut self, walk_index: u64, visits: &[NodeVisit]) {
        self.write_u8(TAG_NODE_VISITS_COUNT);
        self.write_u64(walk_index);
        self.write_u32(count_u32(visits.len()));
    }
}

// ---------------------------------------------------------------------------
// Decoder
// ---------------------------------------------------------------------------

/// A decoded event from a binary recording.
#[derive(Clone, Debug)]
pub enum RecordedEvent {
    /// A [`WalkBeginEvent`].
    WalkBegin {
        /// Walk counter.
        walk_index: u64,
        /// Update or full refresh.
        mode: WalkMode,
        /// Start node.
        start: NodeRef,
        /// Clamped dirty rect.
        rect: Rect,
    },
    /// A [`WalkEndEvent`].
    WalkEnd(WalkEndEvent),
    /// A [`WalkSkippedEvent`].
    WalkSkipped {
        /// Node the walk would have started from.
        start: NodeRef,
        /// Update or full refresh.
        mode: WalkMode,
        /// Why it did not run.
        reason: SkipReason,
    },
    /// A [`TransactionEvent`].
    Transaction {
        /// Edited node.
        node: NodeRef,
        /// Memento revision.
        revision: u64,
        /// Lifecycle step.
        action: TransactionAction,
        /// Affected rect.
        rect: Rect,
    },
    /// Number of node visits reported for a walk.
    NodeVisitsCount {
        /// Walk counter.
        walk_index: u64,
        /// Number of visits.
        count: u32,
    },
}

/// Decodes a byte slice produced by [`RecorderSink`] into an iterator of
/// [`RecordedEvent`].
pub fn decode(bytes: &[u8]) -> DecodeIter<'_> {
    DecodeIter {
        data: bytes,
        pos: 0,
    }
}

/// Iterator over decoded events.
#[derive(Debug)]
pub struct DecodeIter<'a> {
    data: &'a [u8],
    pos: usize,
}

impl DecodeIter<'_> {
    fn take<const N: usize>(&mut self) -> Option<[u8; N]> {
        let bytes = self.data.get(self.pos..self.pos + N)?;
        self.pos += N;
        bytes.try_into().ok()
    }

    fn read_u8(&mut self) -> Option<u8> {
        self.take::<1>().map(|[b]| b)
    }

    fn read_u32(&mut self) -> Option<u32> {
        self.take().map(u32::from_le_bytes)
    }

    fn read_u64(&mut self) -> Option<u64> {
        self.take().map(u64::from_le_bytes)
    }

    fn read_f64(&mut self) -> Option<f64> {
        self.take().map(f64::from_le_bytes)
    }

    fn read_node(&mut self) -> Option<NodeRef> {
        Some(NodeRef {
            index: self.read_u32()?,
            generation: self.read_u32()?,
        })
    }

    fn read_rect(&mut self) -> Option<Rect> {
        Some(Rect::new(
            self.read_f64()?,
            self.read_f64()?,
            self.read_f64()?,
            self.read_f64()?,
        ))
    }

    fn read_mode(&mut self) -> Option<WalkMode> {
        Some(match self.read_u8()? {
            0 => WalkMode::Update,
            _ => WalkMode::FullRefresh,
        })
    }

    fn read_reason(&mut self) -> Option<SkipReason> {
        Some(match self.read_u8()? {
            0 => SkipReason::EmptyRect,
            1 => SkipReason::Detached,
            _ => SkipReason::Deferred,
        })
    }

    fn read_action(&mut self) -> Option<TransactionAction> {
        Some(match self.read_u8()? {
            0 => TransactionAction::Begin,
            1 => TransactionAction::Finish,
            2 => TransactionAction::Undo,
            3 => TransactionAction::Redo,
            4 => TransactionAction::Purge,
            _ => TransactionAction::Stale,
        })
    }

    fn decode_walk_begin(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::WalkBegin {
            walk_index: self.read_u64()?,
            mode: self.read_mode()?,
            start: self.read_node()?,
            rect: self.read_rect()?,
        })
    }

    fn decode_walk_end(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::WalkEnd(WalkEndEvent {
            walk_index: self.read_u64()?,
            mode: self.read_mode()?,
            visited: self.read_u32()?,
            deferred: self.read_u32()?,
            dirty: self.read_rect()?,
        }))
    }

    fn decode_walk_skipped(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::WalkSkipped {
            start: self.read_node()?,
            mode: self.read_mode()?,
            reason: self.read_reason()?,
        })
    }

    fn decode_transaction(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::Transaction {
            node: self.read_node()?,
            revision: self.read_u64()?,
            action: self.read_action()?,
            rect: self.read_rect()?,
        })
    }

    fn decode_node_visits_count(&mut self) -> Option<RecordedEvent> {
        let walk_index = self.read_u64()?;
        let count = self.read_u32()?;
        Some(RecordedEvent::NodeVisitsCount { walk_index, count })
    }
}

impl Iterator for DecodeIter<'_> {
    type Item = RecordedEvent;

    fn next(&mut self) -> Option<Self::Item> {
        let tag = self.read_u8()?;
        match tag {
            TAG_WALK_BEGIN => self.decode_walk_begin(),
            TAG_WALK_END => self.decode_walk_end(),
            TAG_WALK_SKIPPED => self.decode_walk_skipped(),
            TAG_TRANSACTION => self.decode_transaction(),
            TAG_NODE_VISITS_COUNT => self.decode_node_visits_count(),
            _ => None, // unknown tag → stop iteration
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
