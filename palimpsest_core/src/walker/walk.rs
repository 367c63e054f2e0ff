// Copyright 2026 the Palimpsest Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The Update and full-refresh traversals.

use kurbo::Rect;

use super::lock::{PendingWalk, WalkerHandle};
use super::result::{WalkEntry, WalkMode, WalkResult};
use crate::error::Error;
use crate::node::{INVALID, NodeGraph, NodeId, NodeKind};
use crate::rect::RectExt;

impl WalkerHandle<'_> {
    /// Computes what must be recomposited after `rect` of `start` changed.
    ///
    /// `rect` is clamped to the document extent; an empty rect yields an
    /// empty result. Walks queued by this one (clone layers of changed
    /// nodes, full refreshes of structurally stale nodes) go to the lock's
    /// pending queue.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DetachedNode`] if `start` is not attached to the
    /// document.
    pub fn update(
        &mut self,
        graph: &NodeGraph,
        start: NodeId,
        rect: Rect,
    ) -> Result<WalkResult, Error> {
        if !graph.is_attached(start) {
            return Err(Error::DetachedNode(start));
        }
        let rect = rect.clamped_to(graph.extent());
        if rect.is_empty_area() {
            return Ok(WalkResult::empty(WalkMode::Update, start));
        }

        self.reset(graph);
        self.propagate_from(graph, start, rect);
        Ok(self.finish(graph, WalkMode::Update, start))
    }

    /// Recomputes the whole subtree of `start`, then propagates the result
    /// outward like an update.
    ///
    /// Every node of the subtree appears in the result exactly once, and
    /// their stale flags are cleared.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DetachedNode`] if `start` is not attached to the
    /// document.
    pub fn full_refresh(&mut self, graph: &NodeGraph, start: NodeId) -> Result<WalkResult, Error> {
        if !graph.is_attached(start) {
            return Err(Error::DetachedNode(start));
        }
        self.reset(graph);
        let extent = graph.extent();

        // Refresh half, top-down: the whole subtree is stale from here on.
        let subtree = graph.subtree_preorder(start);
        self.lock.clear_stale(subtree.iter().copied());

        if graph.kind(start).is_mask() {
            let own = graph.bounds(start).clamped_to(extent);
            self.propagate_from(graph, start, own);
            return Ok(self.finish(graph, WalkMode::FullRefresh, start));
        }

        // Merge half, bottom-up: each layer unions its layer children into
        // its own bounds, then runs the result through its masks.
        let mut start_rect = Rect::ZERO;
        for node in graph.subtree_postorder(start) {
            if graph.kind(node).is_mask() {
                continue;
            }
            let mut acc = graph.bounds(node).clamped_to(extent);
            for child in graph.children(node) {
                if let Some(e) = self.entry(child) {
                    acc = acc.union_nonempty(e.change);
                }
            }
            let acc = self.adjust_masks(graph, node, None, acc, true);
            self.record(graph, node, acc);
            self.state.changed[node.idx as usize] = true;
            start_rect = acc;
        }
        // Post-order ends with `start`.
        self.propagate_up(graph, start, start_rect);
        Ok(self.finish(graph, WalkMode::FullRefresh, start))
    }

    /// Runs a queued walk.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DetachedNode`] if the walk's node was detached since
    /// it was queued.
    pub fn run(&mut self, graph: &NodeGraph, walk: PendingWalk) -> Result<WalkResult, Error> {
        match walk.mode {
            WalkMode::Update => self.update(graph, walk.node, walk.rect),
            WalkMode::FullRefresh => self.full_refresh(graph, walk.node),
        }
    }

    // -- Traversal steps --

    /// Records the origin of a change and everything it reaches.
    ///
    /// A mask start hands the change to its owner, visiting only the masks
    /// from the start upward.
    fn propagate_from(&mut self, graph: &NodeGraph, start: NodeId, rect: Rect) {
        let (layer, from) = if graph.kind(start).is_mask() {
            let Some(owner) = graph.parent(start) else {
                return;
            };
            (owner, Some(start))
        } else {
            (start, None)
        };
        let acc = self.adjust_masks(graph, layer, from, rect, false);
        self.record(graph, layer, acc);
        self.state.changed[layer.idx as usize] = true;
        self.propagate_up(graph, layer, acc);
    }

    /// Runs `acc` through the masks of `layer`, recording each one, and
    /// returns the layer's resulting change rect.
    ///
    /// With `from`, masks below it are skipped. With `refresh`, every mask
    /// also contributes its own bounds.
    fn adjust_masks(
        &mut self,
        graph: &NodeGraph,
        layer: NodeId,
        from: Option<NodeId>,
        acc: Rect,
        refresh: bool,
    ) -> Rect {
        let extent = graph.extent();
        let mut acc = acc;
        let mut active = from.is_none();
        for mask in graph.masks(layer) {
            active |= Some(mask) == from;
            if !active {
                continue;
            }
            if refresh {
                acc = acc.union_nonempty(graph.bounds(mask).clamped_to(extent));
            }
            self.record(graph, mask, acc);
            acc = acc.grown_by(graph.processing_margin(mask)).clamped_to(extent);
        }
        acc
    }

    /// Carries `acc` from `node` to the root: layer siblings drawn above
    /// recomposite over it, and each ancestor absorbs it.
    fn propagate_up(&mut self, graph: &NodeGraph, node: NodeId, acc: Rect) {
        let extent = graph.extent();
        let root = graph.root();
        let mut node = node;
        let mut acc = acc;
        while node != root {
            if !graph.sibling_position(node).is_top() {
                let mut above = graph.next_sibling_above(node);
                while let Some(sibling) = above {
                    let grown = acc
                        .grown_by(graph.processing_margin(sibling))
                        .clamped_to(extent);
                    let out = self.adjust_masks(graph, sibling, None, grown, false);
                    self.record(graph, sibling, out);
                    if graph.kind(sibling) == NodeKind::AdjustmentLayer {
                        self.state.changed[sibling.idx as usize] = true;
                    }
                    acc = acc.union_nonempty(out);
                    above = graph.next_sibling_above(sibling);
                }
            }

            let Some(parent) = graph.parent(node) else {
                break;
            };
            let grown = acc
                .grown_by(graph.processing_margin(parent))
                .clamped_to(extent);
            acc = self.adjust_masks(graph, parent, None, grown, false);
            self.record(graph, parent, acc);
            self.state.changed[parent.idx as usize] = true;
            node = parent;
        }
    }

    // -- Scratch bookkeeping --

    fn reset(&mut self, graph: &NodeGraph) {
        let n = graph.len as usize;
        let state = &mut *self.state;
        state.entries.clear();
        state.slot.clear();
        state.slot.resize(n, INVALID);
        state.changed.clear();
        state.changed.resize(n, false);
    }

    fn entry(&self, node: NodeId) -> Option<&WalkEntry> {
        let slot = self.state.slot[node.idx as usize];
        (slot != INVALID).then(|| &self.state.entries[slot as usize])
    }

    /// Records `node` with change `acc ∩ bounds` and need `change ⊕ margin ∩
    /// bounds`, unioning into an existing entry.
    fn record(&mut self, graph: &NodeGraph, node: NodeId, acc: Rect) {
        let i = node.idx as usize;
        let bounds = graph.bounds[i];
        let margin = graph.margin[i];
        let change = acc.clamped_to(bounds);
        let state = &mut *self.state;

        let slot = state.slot[i];
        if slot == INVALID {
            #[expect(
                clippy::cast_possible_truncation,
                reason = "a walk records each node slot at most once, and slots are u32"
            )]
            let next = state.entries.len() as u32;
            state.slot[i] = next;
            state.entries.push(WalkEntry {
                node,
                change,
                need: change.grown_by(margin).clamped_to(bounds),
            });
        } else {
            let e = &mut state.entries[slot as usize];
            e.change = e.change.union_nonempty(change);
            e.need = e.change.grown_by(margin).clamped_to(bounds);
        }
    }

    /// Moves the entries into a result and queues follow-up walks.
    fn finish(&mut self, graph: &NodeGraph, mode: WalkMode, start: NodeId) -> WalkResult {
        let mut deferred = 0;

        // Clone layers mirror their source; a changed source queues an
        // update of each clone the walk has not reached itself.
        for i in 0..graph.len as usize {
            if !graph.alive[i] || graph.kind[i] != NodeKind::CloneLayer {
                continue;
            }
            let source = graph.clone_source[i];
            if source == INVALID || self.state.slot[i] != INVALID {
                continue;
            }
            let s = source as usize;
            let slot = self.state.slot[s];
            if slot != INVALID && self.state.changed[s] {
                let change = self.state.entries[slot as usize].change;
                #[expect(
                    clippy::cast_possible_truncation,
                    reason = "i ranges over u32 node slots"
                )]
                let clone = graph.id_at(i as u32);
                self.lock.request(PendingWalk::update(clone, change));
                deferred += 1;
            }
        }

        // Structurally stale nodes are never walked incrementally; each one
        // this walk touched gets its own full refresh afterwards.
        let stale = self
            .lock
            .stale_among(self.state.entries.iter().map(|e| e.node));
        for node in stale {
            self.lock.request(PendingWalk::full_refresh(node));
            deferred += 1;
        }

        let entries = core::mem::take(&mut self.state.entries);
        WalkResult::new(mode, start, entries, deferred)
    }
}
