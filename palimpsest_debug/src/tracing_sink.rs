// Copyright 2026 the Palimpsest Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Bridge from trace events to the `tracing` ecosystem.
//!
//! [`TracingSink`] turns every event into a `tracing` event under the
//! `palimpsest::walk` and `palimpsest::transaction` targets, so documents
//! show up in whatever subscriber the application installed. Out-of-order
//! undo history is reported at `WARN`; everything else at `DEBUG`, and node
//! visits at `TRACE`.

use palimpsest_core::trace::{
    NodeVisit, TraceSink, TransactionAction, TransactionEvent, WalkBeginEvent, WalkEndEvent,
    WalkSkippedEvent,
};

/// A [`TraceSink`] that emits `tracing` events.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingSink {
    visits: bool,
}

impl TracingSink {
    /// Creates a sink that leaves out per-node visits.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Also emits one `TRACE` event per visited node.
    #[must_use]
    pub fn with_visits(mut self, visits: bool) -> Self {
        self.visits = visits;
        self
    }
}

impl TraceSink for TracingSink {
    fn on_walk_begin(&mut self, e: &WalkBeginEvent) {
        tracing::debug!(
            target: "palimpsest::walk",
            walk = e.walk_index,
            mode = ?e.mode,
            start = %e.start,
            rect = ?e.rect,
            "walk begin"
        );
    }

    fn on_walk_end(&mut self, e: &WalkEndEvent) {
        tracing::debug!(
            target: "palimpsest::walk",
            walk = e.walk_index,
            mode = ?e.mode,
            visited = e.visited,
            deferred = e.deferred,
            dirty = ?e.dirty,
            "walk end"
        );
    }

    fn on_walk_skipped(&mut self, e: &WalkSkippedEvent) {
        tracing::debug!(
            target: "palimpsest::walk",
            mode = ?e.mode,
            start = %e.start,
            reason = ?e.reason,
            "walk skipped"
        );
    }

    fn on_transaction(&mut self, e: &TransactionEvent) {
        if e.action == TransactionAction::Stale {
            tracing::warn!(
                target: "palimpsest::transaction",
                node = %e.node,
                revision = e.revision,
                "undo history out of order"
            );
            return;
        }
        tracing::debug!(
            target: "palimpsest::transaction",
            node = %e.node,
            revision = e.revision,
            action = ?e.action,
            rect = ?e.rect,
            "transaction"
        );
    }

    fn on_node_visits(&mut self, walk_index: u64, visits: &[NodeVisit]) {
        if !self.visits {
            return;
        }
        for v in visits {
            tracing::trace!(
                target: "palimpsest::walk",
                walk = walk_index,
                node = v.node_index,
                change = ?v.change,
                need = ?v.need,
                "visit"
            );
        }
    }
}
