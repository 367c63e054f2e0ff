// Copyright 2026 the Palimpsest Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Walk exclusivity and the queue of deferred walks.

use std::collections::{BTreeSet, VecDeque};

use kurbo::Rect;
use parking_lot::{Mutex, MutexGuard};

use super::result::{WalkEntry, WalkMode};
use crate::node::NodeId;
use crate::rect::RectExt;

/// A walk waiting to run.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PendingWalk {
    /// Start node.
    pub node: NodeId,
    /// Traversal mode.
    pub mode: WalkMode,
    /// Dirty rect for [`WalkMode::Update`]; ignored for a full refresh.
    pub rect: Rect,
}

impl PendingWalk {
    /// An update walk over `rect`.
    #[must_use]
    pub fn update(node: NodeId, rect: Rect) -> Self {
        Self {
            node,
            mode: WalkMode::Update,
            rect,
        }
    }

    /// A full refresh of `node`'s subtree.
    #[must_use]
    pub fn full_refresh(node: NodeId) -> Self {
        Self {
            node,
            mode: WalkMode::FullRefresh,
            rect: Rect::ZERO,
        }
    }
}

/// Per-walk scratch, reused across walks.
#[derive(Debug, Default)]
pub(crate) struct WalkState {
    /// Entry index per node slot; `u32::MAX` when not yet visited.
    pub(crate) slot: Vec<u32>,
    pub(crate) entries: Vec<WalkEntry>,
    /// Per node slot: the node's own output changed (as opposed to a
    /// sibling above that only recomposites over the change).
    pub(crate) changed: Vec<bool>,
}

/// Guarantees that at most one walk runs per document.
///
/// The walker scratch lives behind a mutex, and a [`WalkerHandle`], the only
/// way to run a walk, holds that mutex's guard. Work arriving while a handle
/// is out goes through [`request`](Self::request) and waits in a FIFO queue;
/// it is never folded into the walk already running.
#[derive(Debug, Default)]
pub struct WalkLock {
    state: Mutex<WalkState>,
    pending: Mutex<VecDeque<PendingWalk>>,
    stale: Mutex<BTreeSet<NodeId>>,
}

impl WalkLock {
    /// Creates an idle lock with an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a handle unless another one is outstanding.
    #[must_use]
    pub fn try_acquire(&self) -> Option<WalkerHandle<'_>> {
        let state = self.state.try_lock()?;
        Some(WalkerHandle { state, lock: self })
    }

    /// Returns `true` while a handle is outstanding.
    #[must_use]
    pub fn is_walking(&self) -> bool {
        self.state.is_locked()
    }

    /// Queues a walk.
    ///
    /// A queued walk with the same node and mode absorbs the request (update
    /// rects are unioned) instead of queuing a duplicate.
    pub fn request(&self, walk: PendingWalk) {
        let mut pending = self.pending.lock();
        if let Some(queued) = pending
            .iter_mut()
            .find(|p| p.node == walk.node && p.mode == walk.mode)
        {
            queued.rect = queued.rect.union_nonempty(walk.rect);
            return;
        }
        pending.push_back(walk);
    }

    /// Removes and returns the oldest queued walk.
    pub fn take_pending(&self) -> Option<PendingWalk> {
        self.pending.lock().pop_front()
    }

    /// Returns the number of queued walks.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.pending.lock().len()
    }

    /// Flags `node` as structurally stale.
    ///
    /// The next walk that visits it queues a full refresh of it.
    pub fn mark_stale(&self, node: NodeId) {
        self.stale.lock().insert(node);
    }

    /// Returns whether `node` awaits a full refresh.
    #[must_use]
    pub fn is_stale(&self, node: NodeId) -> bool {
        self.stale.lock().contains(&node)
    }

    pub(crate) fn clear_stale(&self, nodes: impl IntoIterator<Item = NodeId>) {
        let mut stale = self.stale.lock();
        for n in nodes {
            stale.remove(&n);
        }
    }

    pub(crate) fn stale_among(&self, nodes: impl IntoIterator<Item = NodeId>) -> Vec<NodeId> {
        let stale = self.stale.lock();
        if stale.is_empty() {
            return Vec::new();
        }
        nodes.into_iter().filter(|n| stale.contains(n)).collect()
    }
}

/// Exclusive right to run walks.
///
/// Obtained from [`WalkLock::try_acquire`]; the walk methods live in the
/// [`walker`](super) module. Dropping the handle releases the lock.
#[derive(Debug)]
pub struct WalkerHandle<'a> {
    pub(crate) state: MutexGuard<'a, WalkState>,
    pub(crate) lock: &'a WalkLock,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{NodeGraph, NodeKind};
    use crate::rect::pixel_rect;

    fn two_nodes() -> (NodeId, NodeId) {
        let mut g = NodeGraph::new(pixel_rect(0, 0, 32, 32));
        (
            g.create_node(NodeKind::PaintLayer),
            g.create_node(NodeKind::PaintLayer),
        )
    }

    #[test]
    fn only_one_handle_at_a_time() {
        let lock = WalkLock::new();
        let handle = lock.try_acquire();
        assert!(handle.is_some());
        assert!(lock.is_walking());
        assert!(lock.try_acquire().is_none());
        drop(handle);
        assert!(!lock.is_walking());
        assert!(lock.try_acquire().is_some());
    }

    #[test]
    fn identical_requests_merge() {
        let (a, b) = two_nodes();
        let lock = WalkLock::new();
        lock.request(PendingWalk::update(a, pixel_rect(0, 0, 2, 2)));
        lock.request(PendingWalk::update(a, pixel_rect(4, 4, 2, 2)));
        lock.request(PendingWalk::full_refresh(a));
        lock.request(PendingWalk::update(b, pixel_rect(0, 0, 1, 1)));
        assert_eq!(lock.pending_len(), 3);

        let first = lock.take_pending().unwrap();
        assert_eq!(first.node, a);
        assert_eq!(first.rect, pixel_rect(0, 0, 6, 6));
        assert_eq!(lock.take_pending().unwrap().mode, WalkMode::FullRefresh);
        assert_eq!(lock.take_pending().unwrap().node, b);
        assert!(lock.take_pending().is_none());
    }

    #[test]
    fn requests_queue_while_walking() {
        let (a, _) = two_nodes();
        let lock = WalkLock::new();
        let _handle = lock.try_acquire().unwrap();
        lock.request(PendingWalk::full_refresh(a));
        assert_eq!(lock.pending_len(), 1);
    }

    #[test]
    fn stale_flags() {
        let (a, b) = two_nodes();
        let lock = WalkLock::new();
        lock.mark_stale(a);
        assert!(lock.is_stale(a));
        assert_eq!(lock.stale_among([a, b]), vec![a]);
        lock.clear_stale([a]);
        assert!(!lock.is_stale(a));
    }
}
