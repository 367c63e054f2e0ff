// Copyright 2026 the Palimpsest Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tracing and diagnostics for walks and transactions.
//!
//! This module provides a [`TraceSink`] trait with per-event methods that the
//! [`Document`](crate::Document) calls as walks run and transactions move
//! through their states. All method bodies default to no-ops, so implementing
//! only the events you care about is fine.
//!
//! [`Tracer`] wraps an optional `&mut dyn TraceSink`. When the `trace` feature
//! is **off**, every `Tracer` method compiles to nothing (zero overhead). When
//! **on**, each method performs a single `Option` branch before dispatching.
//!
//! # Crate features
//!
//! - `trace` — enables the `Tracer` method bodies (one branch per call).
//! - `trace-rich` (implies `trace`) — gates [`NodeVisit`] records and the
//!   corresponding `TraceSink` method.

use std::sync::Arc;

use kurbo::Rect;
use parking_lot::Mutex;

use crate::node::NodeId;
use crate::walker::WalkMode;

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Why a walk request produced no walk.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SkipReason {
    /// The dirty rect was empty after clamping to the document extent.
    EmptyRect,
    /// The start node is no longer attached to the document.
    Detached,
    /// Another walk was running; the request was queued.
    Deferred,
}

/// Which step of a transaction's life an event reports.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TransactionAction {
    /// A memento was captured and the transaction opened.
    Begin,
    /// The transaction committed its writes.
    Finish,
    /// The transaction rolled back.
    Undo,
    /// The transaction rolled forward.
    Redo,
    /// The transaction's memento was purged.
    Purge,
    /// A rollback or rollforward found the history out of order.
    Stale,
}

// ---------------------------------------------------------------------------
// Event structs
// ---------------------------------------------------------------------------

/// Emitted before a walk computes its first entry.
#[derive(Clone, Copy, Debug)]
pub struct WalkBeginEvent {
    /// Monotonic walk counter for the document.
    pub walk_index: u64,
    /// Update or full refresh.
    pub mode: WalkMode,
    /// Node the walk starts from.
    pub start: NodeId,
    /// Dirty rect after clamping (the start's bounds for a full refresh).
    pub rect: Rect,
}

/// Emitted after a walk produced its result.
#[derive(Clone, Copy, Debug)]
pub struct WalkEndEvent {
    /// Walk counter, matching the [`WalkBeginEvent`].
    pub walk_index: u64,
    /// Update or full refresh.
    pub mode: WalkMode,
    /// Number of entries in the result.
    pub visited: u32,
    /// Number of walks queued while this one ran.
    pub deferred: u32,
    /// Union of every entry's change rect.
    pub dirty: Rect,
}

/// Emitted when a walk request does not run immediately.
#[derive(Clone, Copy, Debug)]
pub struct WalkSkippedEvent {
    /// Node the walk would have started from.
    pub start: NodeId,
    /// Update or full refresh.
    pub mode: WalkMode,
    /// Why it did not run.
    pub reason: SkipReason,
}

/// Emitted on every transaction state change.
#[derive(Clone, Copy, Debug)]
pub struct TransactionEvent {
    /// Layer or mask the transaction edits.
    pub node: NodeId,
    /// Revision number of the transaction's memento.
    pub revision: u64,
    /// What happened.
    pub action: TransactionAction,
    /// Affected rect (empty for begin, finish, and purge).
    pub rect: Rect,
}

/// One entry of a walk result.
#[cfg(feature = "trace-rich")]
#[derive(Clone, Copy, Debug)]
pub struct NodeVisit {
    /// Slot index of the visited node.
    pub node_index: u32,
    /// Region of the node's output that changed.
    pub change: Rect,
    /// Region of the node's inputs required to recompute it.
    pub need: Rect,
}

// ---------------------------------------------------------------------------
// TraceSink trait
// ---------------------------------------------------------------------------

/// Receives trace events from a document.
///
/// All methods have default no-op implementations, so you only need to
/// override the events you care about.
pub trait TraceSink {
    /// Called when a walk starts.
    fn on_walk_begin(&mut self, e: &WalkBeginEvent) {
        _ = e;
    }

    /// Called when a walk finishes.
    fn on_walk_end(&mut self, e: &WalkEndEvent) {
        _ = e;
    }

    /// Called when a walk request is dropped or queued.
    fn on_walk_skipped(&mut self, e: &WalkSkippedEvent) {
        _ = e;
    }

    /// Called on every transaction state change.
    fn on_transaction(&mut self, e: &TransactionEvent) {
        _ = e;
    }

    /// Called with every entry of a finished walk (requires `trace-rich`
    /// feature).
    #[cfg(feature = "trace-rich")]
    fn on_node_visits(&mut self, walk_index: u64, visits: &[NodeVisit]) {
        _ = (walk_index, visits);
    }
}

// ---------------------------------------------------------------------------
// NoopSink
// ---------------------------------------------------------------------------

/// A [`TraceSink`] that discards all events.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopSink;

impl TraceSink for NoopSink {}

/// Forwards to a sink shared with other owners, so a recording can be read
/// back while a document still holds the sink.
impl<S: TraceSink + ?Sized> TraceSink for Arc<Mutex<S>> {
    fn on_walk_begin(&mut self, e: &WalkBeginEvent) {
        self.lock().on_walk_begin(e);
    }

    fn on_walk_end(&mut self, e: &WalkEndEvent) {
        self.lock().on_walk_end(e);
    }

    fn on_walk_skipped(&mut self, e: &WalkSkippedEvent) {
        self.lock().on_walk_skipped(e);
    }

    fn on_transaction(&mut self, e: &TransactionEvent) {
        self.lock().on_transaction(e);
    }

    #[cfg(feature = "trace-rich")]
    fn on_node_visits(&mut self, walk_index: u64, visits: &[NodeVisit]) {
        self.lock().on_node_visits(walk_index, visits);
    }
}

// ---------------------------------------------------------------------------
// Tracer wrapper
// ---------------------------------------------------------------------------

/// Thin wrapper around an optional [`TraceSink`].
///
/// When the `trace` feature is **off**, every method compiles to nothing. When
/// **on**, each method checks the inner `Option` (one branch) before
/// dispatching to the sink.
pub struct Tracer<'a> {
    #[cfg(feature = "trace")]
    sink: Option<&'a mut dyn TraceSink>,
    #[cfg(not(feature = "trace"))]
    _marker: core::marker::PhantomData<&'a mut dyn TraceSink>,
}

impl core::fmt::Debug for Tracer<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Tracer").finish_non_exhaustive()
    }
}

impl<'a> Tracer<'a> {
    /// Creates a tracer that dispatches to the given sink.
    #[inline]
    #[must_use]
    pub fn new(sink: &'a mut dyn TraceSink) -> Self {
        #[cfg(feature = "trace")]
        {
            Self { sink: Some(sink) }
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = sink;
            Self {
                _marker: core::marker::PhantomData,
            }
        }
    }

    /// Creates a tracer that discards all events.
    #[inline]
    #[must_use]
    pub fn none() -> Self {
        #[cfg(feature = "trace")]
        {
            Self { sink: None }
        }
        #[cfg(not(feature = "trace"))]
        {
            Self {
                _marker: core::marker::PhantomData,
            }
        }
    }

    /// Creates a tracer from an optional sink.
    #[inline]
    #[must_use]
    pub fn from_option(sink: Option<&'a mut dyn TraceSink>) -> Self {
        match sink {
            Some(s) => Self::new(s),
            None => Self::none(),
        }
    }

    /// Emits a [`WalkBeginEvent`].
    #[inline]
    pub fn walk_begin(&mut self, e: &WalkBeginEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_walk_begin(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits a [`WalkEndEvent`].
    #[inline]
    pub fn walk_end(&mut self, e: &WalkEndEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_walk_end(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits a [`WalkSkippedEvent`].
    #[inline]
    pub fn walk_skipped(&mut self, e: &WalkSkippedEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_walk_skipped(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits a [`TransactionEvent`].
    #[inline]
    pub fn transaction(&mut self, e: &TransactionEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_transaction(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits per-node visit records (requires `trace-rich` feature).
    #[cfg(feature = "trace-rich")]
    #[inline]
    pub fn node_visits(&mut self, walk_index: u64, visits: &[NodeVisit]) {
        if let Some(s) = &mut self.sink {
            s.on_node_visits(walk_index, visits);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{NodeGraph, NodeKind};

    fn sample_node() -> NodeId {
        let mut g = NodeGraph::new(Rect::new(0.0, 0.0, 16.0, 16.0));
        g.create_node(NodeKind::PaintLayer)
    }

    fn sample_begin() -> WalkBeginEvent {
        WalkBeginEvent {
            walk_index: 42,
            mode: WalkMode::Update,
            start: sample_node(),
            rect: Rect::new(0.0, 0.0, 4.0, 4.0),
        }
    }

    #[test]
    fn noop_sink_compiles() {
        let mut sink = NoopSink;
        sink.on_walk_begin(&sample_begin());
        sink.on_transaction(&TransactionEvent {
            node: sample_node(),
            revision: 1,
            action: TransactionAction::Begin,
            rect: Rect::ZERO,
        });
    }

    #[test]
    fn tracer_none_does_nothing() {
        let mut tracer = Tracer::none();
        tracer.walk_begin(&sample_begin());
        tracer.walk_skipped(&WalkSkippedEvent {
            start: sample_node(),
            mode: WalkMode::FullRefresh,
            reason: SkipReason::Detached,
        });
    }

    #[test]
    fn shared_sink_forwards_to_inner() {
        struct Count(u32);
        impl TraceSink for Count {
            fn on_walk_begin(&mut self, _e: &WalkBeginEvent) {
                self.0 += 1;
            }
        }

        let shared = Arc::new(Mutex::new(Count(0)));
        let mut handle = Arc::clone(&shared);
        handle.on_walk_begin(&sample_begin());
        handle.on_walk_end(&WalkEndEvent {
            walk_index: 42,
            mode: WalkMode::Update,
            visited: 0,
            deferred: 0,
            dirty: Rect::ZERO,
        });
        assert_eq!(shared.lock().0, 1);
    }

    #[cfg(feature = "trace")]
    #[test]
    fn tracer_dispatches_to_sink() {
        struct RecordingSink {
            walks: Vec<u64>,
        }
        impl TraceSink for RecordingSink {
            fn on_walk_begin(&mut self, e: &WalkBeginEvent) {
                self.walks.push(e.walk_index);
            }
        }

        let mut sink = RecordingSink { walks: Vec::new() };
        let mut tracer = Tracer::new(&mut sink);
        tracer.walk_begin(&sample_begin());
        // Access sink after tracer is dropped.
        drop(tracer);
        assert_eq!(sink.walks, &[42]);
    }
}
