// Copyright 2026 the Palimpsest Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Walk output.

use kurbo::Rect;

use crate::node::NodeId;
use crate::rect::RectExt;

/// Which traversal produced a [`WalkResult`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum WalkMode {
    /// Incremental: a rect of one node changed.
    Update,
    /// A whole subtree is recomputed from scratch.
    FullRefresh,
}

/// One node the renderer must recompute.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WalkEntry {
    /// The node.
    pub node: NodeId,
    /// Region of the node's output that is stale.
    pub change: Rect,
    /// Region of the node's inputs needed to recompute `change`.
    ///
    /// Equals `change` grown by the node's processing margin, clamped to the
    /// node's bounds.
    pub need: Rect,
}

/// Ordered `(node, change, need)` records from one walk.
///
/// Entries are bottom-up: every node appears after all of its descendants
/// that appear, and masks appear before the layer that owns them. A renderer
/// can therefore recompute the entries in order.
///
/// Walks queued while this one ran, and run right after it, are attached as
/// [`follow_ups`](Self::follow_ups). Recompute them after this walk, in
/// order.
#[derive(Clone, Debug, PartialEq)]
pub struct WalkResult {
    mode: WalkMode,
    start: NodeId,
    entries: Vec<WalkEntry>,
    deferred: usize,
    follow_ups: Vec<WalkResult>,
}

impl WalkResult {
    pub(crate) fn new(
        mode: WalkMode,
        start: NodeId,
        entries: Vec<WalkEntry>,
        deferred: usize,
    ) -> Self {
        Self {
            mode,
            start,
            entries,
            deferred,
            follow_ups: Vec::new(),
        }
    }

    /// A result with no entries, for walks that had nothing to do.
    #[must_use]
    pub fn empty(mode: WalkMode, start: NodeId) -> Self {
        Self::new(mode, start, Vec::new(), 0)
    }

    /// Returns the traversal mode.
    #[must_use]
    pub fn mode(&self) -> WalkMode {
        self.mode
    }

    /// Returns the node the walk started from.
    #[must_use]
    pub fn start(&self) -> NodeId {
        self.start
    }

    /// Returns the entries in bottom-up order.
    #[must_use]
    pub fn entries(&self) -> &[WalkEntry] {
        &self.entries
    }

    /// Iterates over the entries in bottom-up order.
    pub fn iter(&self) -> core::slice::Iter<'_, WalkEntry> {
        self.entries.iter()
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the walk produced no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the entry for `node`, if the walk visited it.
    #[must_use]
    pub fn get(&self, node: NodeId) -> Option<&WalkEntry> {
        self.entries.iter().find(|e| e.node == node)
    }

    /// Returns the position of `node` in the result.
    #[must_use]
    pub fn index_of(&self, node: NodeId) -> Option<usize> {
        self.entries.iter().position(|e| e.node == node)
    }

    /// Returns how many walks were queued while this one ran.
    #[must_use]
    pub fn deferred_count(&self) -> usize {
        self.deferred
    }

    /// Returns the walks that ran after this one, in the order they ran.
    #[must_use]
    pub fn follow_ups(&self) -> &[WalkResult] {
        &self.follow_ups
    }

    /// Iterates over this walk followed by its follow-ups.
    pub fn walks(&self) -> impl Iterator<Item = &WalkResult> {
        core::iter::once(self).chain(self.follow_ups.iter())
    }

    pub(crate) fn push_follow_up(&mut self, walk: WalkResult) {
        self.follow_ups.push(walk);
    }

    /// Returns the union of every entry's change rect.
    ///
    /// Follow-ups are not included.
    #[must_use]
    pub fn dirty_rect(&self) -> Rect {
        self.entries
            .iter()
            .fold(Rect::ZERO, |acc, e| acc.union_nonempty(e.change))
    }
}

impl<'a> IntoIterator for &'a WalkResult {
    type Item = &'a WalkEntry;
    type IntoIter = core::slice::Iter<'a, WalkEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
