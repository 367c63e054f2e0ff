// Copyright 2026 the Palimpsest Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Struct-of-arrays node storage with allocation, topology, and property management.

use kurbo::Rect;
use understory_dirty::{CycleHandling, DirtyTracker};

use super::id::{INVALID, NodeId};
use super::kind::{CompositeOp, NodeFlags, NodeKind, SiblingPosition};
use super::traverse::Children;
use crate::dirty;
use crate::rect::RectExt;

/// Struct-of-arrays storage for every node of one document.
///
/// Nodes are addressed by [`NodeId`] handles. Internally, each node occupies
/// a slot in parallel arrays. Destroyed nodes are recycled via a free list,
/// and generation counters prevent stale handle access.
///
/// The graph is created with a root [`GroupLayer`](NodeKind::GroupLayer)
/// spanning the document extent. A node is *attached* when its ancestor
/// chain reaches that root.
#[derive(Debug)]
pub struct NodeGraph {
    // -- Topology --
    pub(crate) parent: Vec<u32>,
    pub(crate) first_child: Vec<u32>,
    pub(crate) next_sibling: Vec<u32>,
    pub(crate) prev_sibling: Vec<u32>,
    pub(crate) sibling_position: Vec<SiblingPosition>,

    // -- Properties (set by callers) --
    pub(crate) kind: Vec<NodeKind>,
    pub(crate) flags: Vec<NodeFlags>,
    pub(crate) opacity: Vec<f32>,
    pub(crate) composite: Vec<CompositeOp>,
    pub(crate) margin: Vec<u32>,
    pub(crate) bounds: Vec<Rect>,
    pub(crate) clone_source: Vec<u32>,

    // -- Allocation --
    pub(crate) generation: Vec<u32>,
    pub(crate) alive: Vec<bool>,
    pub(crate) free_list: Vec<u32>,
    pub(crate) len: u32,

    // -- Document --
    pub(crate) root: u32,
    pub(crate) extent: Rect,

    // -- Dirty tracking --
    pub(crate) dirty: DirtyTracker<u32>,
}

impl NodeGraph {
    /// Creates a graph holding only a root group spanning `extent`.
    #[must_use]
    pub fn new(extent: Rect) -> Self {
        let mut graph = Self {
            parent: Vec::new(),
            first_child: Vec::new(),
            next_sibling: Vec::new(),
            prev_sibling: Vec::new(),
            sibling_position: Vec::new(),
            kind: Vec::new(),
            flags: Vec::new(),
            opacity: Vec::new(),
            composite: Vec::new(),
            margin: Vec::new(),
            bounds: Vec::new(),
            clone_source: Vec::new(),
            generation: Vec::new(),
            alive: Vec::new(),
            free_list: Vec::new(),
            len: 0,
            root: INVALID,
            extent,
            dirty: DirtyTracker::with_cycle_handling(CycleHandling::Error),
        };
        let root = graph.create_node(NodeKind::GroupLayer);
        graph.root = root.idx;
        graph
    }

    /// Returns the root group of the document.
    #[must_use]
    pub fn root(&self) -> NodeId {
        self.id_at(self.root)
    }

    /// Returns the document extent; no walk rect ever exceeds it.
    #[must_use]
    pub fn extent(&self) -> Rect {
        self.extent
    }

    // -- Allocation API --

    /// Creates a detached node whose bounds span the document extent.
    pub fn create_node(&mut self, kind: NodeKind) -> NodeId {
        let extent = self.extent;
        self.create_node_with_bounds(kind, extent)
    }

    /// Creates a detached node with explicit bounds.
    ///
    /// Bounds are clamped to the document extent. The node starts visible,
    /// unlocked, fully opaque, with source-over compositing and no
    /// processing margin.
    pub fn create_node_with_bounds(&mut self, kind: NodeKind, bounds: Rect) -> NodeId {
        let bounds = bounds.clamped_to(self.extent);
        let idx = if let Some(idx) = self.free_list.pop() {
            // Reuse a freed slot.
            let i = idx as usize;
            self.generation[i] += 1;
            self.parent[i] = INVALID;
            self.first_child[i] = INVALID;
            self.next_sibling[i] = INVALID;
            self.prev_sibling[i] = INVALID;
            self.sibling_position[i] = SiblingPosition::OnlyOne;
            self.kind[i] = kind;
            self.flags[i] = NodeFlags::default();
            self.opacity[i] = 1.0;
            self.composite[i] = CompositeOp::default();
            self.margin[i] = 0;
            self.bounds[i] = bounds;
            self.clone_source[i] = INVALID;
            self.alive[i] = true;
            idx
        } else {
            // Allocate a new slot.
            let idx = self.len;
            self.len += 1;
            self.parent.push(INVALID);
            self.first_child.push(INVALID);
            self.next_sibling.push(INVALID);
            self.prev_sibling.push(INVALID);
            self.sibling_position.push(SiblingPosition::OnlyOne);
            self.kind.push(kind);
            self.flags.push(NodeFlags::default());
            self.opacity.push(1.0);
            self.composite.push(CompositeOp::default());
            self.margin.push(0);
            self.bounds.push(bounds);
            self.clone_source.push(INVALID);
            self.generation.push(0);
            self.alive.push(true);
            idx
        };

        NodeId {
            idx,
            generation: self.generation[idx as usize],
        }
    }

    /// Destroys a node, freeing its slot for reuse.
    ///
    /// Clone layers that mirrored the node lose their source.
    ///
    /// # Panics
    ///
    /// Panics if the node is the root, has children (remove them first), or
    /// if the handle is stale.
    pub fn destroy_node(&mut self, id: NodeId) {
        self.validate(id);
        let idx = id.idx;
        assert!(idx != self.root, "cannot destroy the root node");
        assert!(
            self.first_child[idx as usize] == INVALID,
            "cannot destroy node with children"
        );

        if self.parent[idx as usize] != INVALID {
            let p = self.parent[idx as usize];
            self.unlink_from_parent(idx);
            self.refresh_sibling_positions(p);
            self.dirty.mark(p, dirty::STRUCTURE);
        }

        for source in &mut self.clone_source {
            if *source == idx {
                *source = INVALID;
            }
        }

        self.dirty.remove_key(idx);

        // Bump generation so old handles immediately fail validation.
        self.generation[idx as usize] += 1;
        self.alive[idx as usize] = false;
        self.free_list.push(idx);
    }

    /// Returns whether the given handle refers to a live node.
    #[must_use]
    pub fn is_alive(&self, id: NodeId) -> bool {
        id.idx < self.len
            && self.generation[id.idx as usize] == id.generation
            && self.alive[id.idx as usize]
    }

    /// Returns whether the node is alive and its ancestor chain reaches the
    /// root.
    #[must_use]
    pub fn is_attached(&self, id: NodeId) -> bool {
        if !self.is_alive(id) {
            return false;
        }
        let mut idx = id.idx;
        while idx != self.root {
            idx = self.parent[idx as usize];
            if idx == INVALID {
                return false;
            }
        }
        true
    }

    // -- Topology API --

    /// Adds `child` as the topmost child of `parent`.
    ///
    /// # Panics
    ///
    /// Panics if either handle is stale, if `child` already has a parent or
    /// is the root, if `parent` cannot own a node of `child`'s kind, or if
    /// the edge would create a cycle.
    pub fn add_child(&mut self, parent: NodeId, child: NodeId) {
        self.check_attach(parent, child);
        let p = parent.idx;
        let c = child.idx;

        self.parent[c as usize] = p;
        self.prev_sibling[c as usize] = INVALID;
        self.next_sibling[c as usize] = INVALID;

        let last = self.last_child(p);
        if last == INVALID {
            self.first_child[p as usize] = c;
        } else {
            self.next_sibling[last as usize] = c;
            self.prev_sibling[c as usize] = last;
        }

        self.refresh_sibling_positions(p);
        self.dirty.mark(p, dirty::STRUCTURE);
    }

    /// Inserts `child` directly below `sibling` in `sibling`'s parent.
    ///
    /// # Panics
    ///
    /// Panics if handles are stale, `child` already has a parent, `sibling`
    /// has no parent, or the kinds are incompatible.
    pub fn insert_before(&mut self, child: NodeId, sibling: NodeId) {
        self.validate(sibling);
        let s = sibling.idx;
        let p = self.parent[s as usize];
        assert!(p != INVALID, "sibling has no parent");
        let parent = self.id_at(p);
        self.check_attach(parent, child);
        let c = child.idx;

        self.parent[c as usize] = p;
        self.next_sibling[c as usize] = s;
        self.prev_sibling[c as usize] = self.prev_sibling[s as usize];

        if self.prev_sibling[s as usize] != INVALID {
            self.next_sibling[self.prev_sibling[s as usize] as usize] = c;
        } else {
            // `sibling` was the first child.
            self.first_child[p as usize] = c;
        }
        self.prev_sibling[s as usize] = c;

        self.refresh_sibling_positions(p);
        self.dirty.mark(p, dirty::STRUCTURE);
    }

    /// Removes `child` from its current parent, leaving it detached.
    ///
    /// # Panics
    ///
    /// Panics if the handle is stale or the node has no parent.
    pub fn remove_from_parent(&mut self, child: NodeId) {
        self.validate(child);
        let c = child.idx;
        let p = self.parent[c as usize];
        assert!(p != INVALID, "node has no parent");

        self.unlink_from_parent(c);
        self.refresh_sibling_positions(p);
        self.dirty.mark(p, dirty::STRUCTURE);
    }

    /// Moves `child` to be the topmost child of `new_parent`.
    ///
    /// # Panics
    ///
    /// Panics under the same conditions as [`add_child`](Self::add_child),
    /// except that `child` may already have a parent.
    pub fn reparent(&mut self, child: NodeId, new_parent: NodeId) {
        self.validate(child);
        if self.parent[child.idx as usize] != INVALID {
            self.remove_from_parent(child);
        }
        self.add_child(new_parent, child);
    }

    /// Moves `node` directly below `sibling`, possibly across parents.
    ///
    /// # Panics
    ///
    /// Panics if either handle is stale, `sibling` has no parent, or the
    /// kinds are incompatible.
    pub fn move_before(&mut self, node: NodeId, sibling: NodeId) {
        self.validate(node);
        assert!(node != sibling, "cannot move a node relative to itself");
        if self.parent[node.idx as usize] != INVALID {
            self.remove_from_parent(node);
        }
        self.insert_before(node, sibling);
    }

    /// Returns the parent of a node, if any.
    #[must_use]
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.validate(id);
        let p = self.parent[id.idx as usize];
        (p != INVALID).then(|| self.id_at(p))
    }

    /// Returns an iterator over the direct children of a node, bottom to top.
    #[must_use]
    pub fn children(&self, id: NodeId) -> Children<'_> {
        self.validate(id);
        Children::new(self, self.first_child[id.idx as usize])
    }

    /// Returns the masks owned by a node, bottom to top.
    pub fn masks(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.children(id)
            .filter(|c| self.kind[c.idx as usize].is_mask())
    }

    /// Returns the node's cached position among its parent's children.
    #[must_use]
    pub fn sibling_position(&self, id: NodeId) -> SiblingPosition {
        self.validate(id);
        self.sibling_position[id.idx as usize]
    }

    /// Returns the nearest sibling drawn above `id` that belongs to the same
    /// category (layers skip masks and vice versa).
    #[must_use]
    pub fn next_sibling_above(&self, id: NodeId) -> Option<NodeId> {
        self.validate(id);
        let is_mask = self.kind[id.idx as usize].is_mask();
        let mut s = self.next_sibling[id.idx as usize];
        while s != INVALID {
            if self.kind[s as usize].is_mask() == is_mask {
                return Some(self.id_at(s));
            }
            s = self.next_sibling[s as usize];
        }
        None
    }

    /// Returns the nearest sibling drawn below `id` that belongs to the same
    /// category.
    #[must_use]
    pub fn next_sibling_below(&self, id: NodeId) -> Option<NodeId> {
        self.validate(id);
        let is_mask = self.kind[id.idx as usize].is_mask();
        let mut s = self.prev_sibling[id.idx as usize];
        while s != INVALID {
            if self.kind[s as usize].is_mask() == is_mask {
                return Some(self.id_at(s));
            }
            s = self.prev_sibling[s as usize];
        }
        None
    }

    /// Returns the clone layers whose source is `id`.
    #[must_use]
    pub fn clones_of(&self, id: NodeId) -> Vec<NodeId> {
        self.validate(id);
        (0..self.len)
            .filter(|&i| self.alive[i as usize] && self.clone_source[i as usize] == id.idx)
            .map(|i| self.id_at(i))
            .collect()
    }

    // -- Property getters (read-only, no dirty marking) --

    /// Returns the kind of a node.
    #[must_use]
    pub fn kind(&self, id: NodeId) -> NodeKind {
        self.validate(id);
        self.kind[id.idx as usize]
    }

    /// Returns the flags of a node.
    #[must_use]
    pub fn flags(&self, id: NodeId) -> NodeFlags {
        self.validate(id);
        self.flags[id.idx as usize]
    }

    /// Returns the opacity of a node.
    #[must_use]
    pub fn opacity(&self, id: NodeId) -> f32 {
        self.validate(id);
        self.opacity[id.idx as usize]
    }

    /// Returns the composite operation of a node.
    #[must_use]
    pub fn composite_op(&self, id: NodeId) -> CompositeOp {
        self.validate(id);
        self.composite[id.idx as usize]
    }

    /// Returns how far the node reads beyond its change rect, in pixels.
    #[must_use]
    pub fn processing_margin(&self, id: NodeId) -> u32 {
        self.validate(id);
        self.margin[id.idx as usize]
    }

    /// Returns the bounds of a node.
    #[must_use]
    pub fn bounds(&self, id: NodeId) -> Rect {
        self.validate(id);
        self.bounds[id.idx as usize]
    }

    /// Returns the layer a clone layer mirrors, if any.
    #[must_use]
    pub fn clone_source(&self, id: NodeId) -> Option<NodeId> {
        self.validate(id);
        let s = self.clone_source[id.idx as usize];
        (s != INVALID).then(|| self.id_at(s))
    }

    // -- Mutation API (auto-marks dirty) --

    /// Sets the flags of a node.
    ///
    /// Only a visibility change marks the APPEARANCE channel; locking carries
    /// no pixel difference.
    pub fn set_flags(&mut self, id: NodeId, flags: NodeFlags) {
        self.validate(id);
        let old = self.flags[id.idx as usize];
        self.flags[id.idx as usize] = flags;
        if old.visible != flags.visible {
            self.dirty.mark(id.idx, dirty::APPEARANCE);
        }
    }

    /// Sets the opacity of a node.
    pub fn set_opacity(&mut self, id: NodeId, opacity: f32) {
        self.validate(id);
        self.opacity[id.idx as usize] = opacity.clamp(0.0, 1.0);
        self.dirty.mark(id.idx, dirty::APPEARANCE);
    }

    /// Sets the composite operation of a node.
    pub fn set_composite_op(&mut self, id: NodeId, op: CompositeOp) {
        self.validate(id);
        self.composite[id.idx as usize] = op;
        self.dirty.mark(id.idx, dirty::APPEARANCE);
    }

    /// Sets how far the node reads beyond its change rect.
    ///
    /// # Panics
    ///
    /// Panics if `margin` is non-zero and the node's kind has no spatial
    /// spread.
    pub fn set_processing_margin(&mut self, id: NodeId, margin: u32) {
        self.validate(id);
        let kind = self.kind[id.idx as usize];
        assert!(
            margin == 0 || kind.capabilities().spatial_spread,
            "{kind:?} cannot carry a processing margin"
        );
        self.margin[id.idx as usize] = margin;
        self.dirty.mark(id.idx, dirty::APPEARANCE);
    }

    /// Sets the bounds of a node, clamped to the document extent.
    pub fn set_bounds(&mut self, id: NodeId, bounds: Rect) {
        self.validate(id);
        self.bounds[id.idx as usize] = bounds.clamped_to(self.extent);
        self.dirty.mark(id.idx, dirty::APPEARANCE);
    }

    /// Sets (or clears) the layer a clone layer mirrors.
    ///
    /// # Panics
    ///
    /// Panics if `id` is not a clone layer, if `source` is stale, or if
    /// following clone sources from `source` leads back to `id`.
    pub fn set_clone_source(&mut self, id: NodeId, source: Option<NodeId>) {
        self.validate(id);
        assert!(
            self.kind[id.idx as usize] == NodeKind::CloneLayer,
            "only clone layers have a source"
        );
        self.clone_source[id.idx as usize] = match source {
            Some(s) => {
                self.validate(s);
                let mut link = s.idx;
                while link != INVALID {
                    assert!(link != id.idx, "clone sources would form a cycle");
                    link = self.clone_source[link as usize];
                }
                s.idx
            }
            None => INVALID,
        };
        self.dirty.mark(id.idx, dirty::APPEARANCE);
    }

    // -- Dirty draining --

    /// Drains the STRUCTURE channel, returning live nodes whose child list
    /// changed since the last drain.
    pub fn drain_structure_changes(&mut self) -> Vec<NodeId> {
        self.drain_channel(dirty::STRUCTURE)
    }

    /// Drains the APPEARANCE channel, returning live nodes whose compositing
    /// properties changed since the last drain.
    pub fn drain_appearance_changes(&mut self) -> Vec<NodeId> {
        self.drain_channel(dirty::APPEARANCE)
    }

    fn drain_channel(&mut self, channel: understory_dirty::Channel) -> Vec<NodeId> {
        let drained: Vec<u32> = self.dirty.drain(channel).deterministic().run().collect();
        drained
            .into_iter()
            .filter(|&idx| idx < self.len && self.alive[idx as usize])
            .map(|idx| self.id_at(idx))
            .collect()
    }

    // -- Internal helpers --

    /// Builds the current handle for a raw slot index.
    pub(crate) fn id_at(&self, idx: u32) -> NodeId {
        NodeId {
            idx,
            generation: self.generation[idx as usize],
        }
    }

    /// Panics if the handle is stale.
    pub(crate) fn validate(&self, id: NodeId) {
        assert!(
            self.is_alive(id),
            "stale NodeId: {id:?} (current gen: {})",
            if id.idx < self.len {
                self.generation[id.idx as usize]
            } else {
                u32::MAX
            }
        );
    }

    fn check_attach(&self, parent: NodeId, child: NodeId) {
        self.validate(parent);
        self.validate(child);
        let c = child.idx;
        assert!(c != self.root, "the root cannot be attached");
        assert!(
            self.parent[c as usize] == INVALID,
            "child already has a parent"
        );
        let (ck, pk) = (self.kind[c as usize], self.kind[parent.idx as usize]);
        assert!(ck.can_attach_to(pk), "cannot attach {ck:?} to {pk:?}");

        // `child` has no parent, so a cycle exists only if `parent` lies in
        // `child`'s subtree.
        let mut a = parent.idx;
        while a != INVALID {
            assert!(a != c, "attaching would create a cycle");
            a = self.parent[a as usize];
        }
    }

    /// Recomputes the sibling position of every child of `p`.
    fn refresh_sibling_positions(&mut self, p: u32) {
        let mut kids = Vec::new();
        let mut c = self.first_child[p as usize];
        while c != INVALID {
            kids.push(c);
            c = self.next_sibling[c as usize];
        }
        let len = kids.len();
        for (i, c) in kids.into_iter().enumerate() {
            self.sibling_position[c as usize] = SiblingPosition::classify(i, len);
        }
    }

    /// Removes `idx` from its parent's child list without touching dirty state.
    fn unlink_from_parent(&mut self, idx: u32) {
        let p = self.parent[idx as usize];
        let prev = self.prev_sibling[idx as usize];
        let next = self.next_sibling[idx as usize];

        if prev != INVALID {
            self.next_sibling[prev as usize] = next;
        } else {
            // Was first child.
            self.first_child[p as usize] = next;
        }

        if next != INVALID {
            self.prev_sibling[next as usize] = prev;
        }

        self.parent[idx as usize] = INVALID;
        self.prev_sibling[idx as usize] = INVALID;
        self.next_sibling[idx as usize] = INVALID;
        self.sibling_position[idx as usize] = SiblingPosition::OnlyOne;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rect::pixel_rect;

    fn graph() -> NodeGraph {
        NodeGraph::new(pixel_rect(0, 0, 256, 256))
    }

    #[test]
    fn create_and_destroy() {
        let mut g = graph();
        let id = g.create_node(NodeKind::PaintLayer);
        assert!(g.is_alive(id));
        assert!(!g.is_attached(id));
        g.destroy_node(id);
        assert!(!g.is_alive(id));
    }

    #[test]
    fn generation_prevents_stale_access() {
        let mut g = graph();
        let id1 = g.create_node(NodeKind::PaintLayer);
        g.destroy_node(id1);
        let id2 = g.create_node(NodeKind::PaintLayer);
        // id2 reuses the same slot but has a different generation.
        assert!(!g.is_alive(id1));
        assert!(g.is_alive(id2));
        assert_eq!(id1.idx, id2.idx);
        assert_ne!(id1.generation, id2.generation);
    }

    #[test]
    fn add_child_and_query() {
        let mut g = graph();
        let root = g.root();
        let a = g.create_node(NodeKind::PaintLayer);
        let b = g.create_node(NodeKind::PaintLayer);
        g.add_child(root, a);
        g.add_child(root, b);

        assert_eq!(g.parent(a), Some(root));
        assert!(g.is_attached(b));
        let kids: Vec<_> = g.children(root).collect();
        assert_eq!(kids, vec![a, b]);
    }

    #[test]
    fn sibling_positions_follow_child_list() {
        let mut g = graph();
        let root = g.root();
        let bottom = g.create_node(NodeKind::PaintLayer);
        g.add_child(root, bottom);
        assert_eq!(g.sibling_position(bottom), SiblingPosition::OnlyOne);

        let middle = g.create_node(NodeKind::PaintLayer);
        let top = g.create_node(NodeKind::PaintLayer);
        g.add_child(root, middle);
        g.add_child(root, top);
        assert_eq!(g.sibling_position(bottom), SiblingPosition::Bottommost);
        assert_eq!(g.sibling_position(middle), SiblingPosition::Normal);
        assert_eq!(g.sibling_position(top), SiblingPosition::Topmost);

        g.remove_from_parent(top);
        assert_eq!(g.sibling_position(middle), SiblingPosition::Topmost);
        assert_eq!(g.sibling_position(top), SiblingPosition::OnlyOne);
    }

    #[test]
    fn insert_before_works() {
        let mut g = graph();
        let root = g.root();
        let a = g.create_node(NodeKind::PaintLayer);
        let b = g.create_node(NodeKind::PaintLayer);
        let c = g.create_node(NodeKind::PaintLayer);
        g.add_child(root, a);
        g.add_child(root, c);
        g.insert_before(b, c);

        let kids: Vec<_> = g.children(root).collect();
        assert_eq!(kids, vec![a, b, c]);
        assert_eq!(g.sibling_position(b), SiblingPosition::Normal);
    }

    #[test]
    fn move_before_reorders() {
        let mut g = graph();
        let root = g.root();
        let a = g.create_node(NodeKind::PaintLayer);
        let b = g.create_node(NodeKind::PaintLayer);
        g.add_child(root, a);
        g.add_child(root, b);
        g.move_before(b, a);
        let kids: Vec<_> = g.children(root).collect();
        assert_eq!(kids, vec![b, a]);
        assert_eq!(g.sibling_position(a), SiblingPosition::Topmost);
    }

    #[test]
    fn reparent_works() {
        let mut g = graph();
        let root = g.root();
        let g1 = g.create_node(NodeKind::GroupLayer);
        let g2 = g.create_node(NodeKind::GroupLayer);
        let child = g.create_node(NodeKind::PaintLayer);
        g.add_child(root, g1);
        g.add_child(root, g2);
        g.add_child(g1, child);

        g.reparent(child, g2);
        assert_eq!(g.parent(child), Some(g2));
        assert!(g.children(g1).next().is_none());
    }

    #[test]
    fn neighbours_skip_masks() {
        let mut g = graph();
        let root = g.root();
        let group_mask = g.create_node(NodeKind::TransparencyMask);
        let a = g.create_node(NodeKind::PaintLayer);
        let b = g.create_node(NodeKind::PaintLayer);
        g.add_child(root, a);
        g.add_child(root, group_mask);
        g.add_child(root, b);

        assert_eq!(g.next_sibling_above(a), Some(b));
        assert_eq!(g.next_sibling_below(b), Some(a));
        assert_eq!(g.next_sibling_above(b), None);
        assert_eq!(g.next_sibling_above(group_mask), None);
        let masks: Vec<_> = g.masks(root).collect();
        assert_eq!(masks, vec![group_mask]);
    }

    #[test]
    fn clones_track_their_source() {
        let mut g = graph();
        let root = g.root();
        let src = g.create_node(NodeKind::PaintLayer);
        let clone = g.create_node(NodeKind::CloneLayer);
        g.add_child(root, src);
        g.add_child(root, clone);
        g.set_clone_source(clone, Some(src));
        assert_eq!(g.clones_of(src), vec![clone]);

        g.remove_from_parent(src);
        g.destroy_node(src);
        assert_eq!(g.clone_source(clone), None);
    }

    #[test]
    #[should_panic(expected = "clone sources would form a cycle")]
    fn clone_cycle_panics() {
        let mut g = graph();
        let a = g.create_node(NodeKind::CloneLayer);
        let b = g.create_node(NodeKind::CloneLayer);
        g.set_clone_source(a, Some(b));
        g.set_clone_source(b, Some(a));
    }

    #[test]
    fn detached_subtree_is_not_attached() {
        let mut g = graph();
        let root = g.root();
        let group = g.create_node(NodeKind::GroupLayer);
        let leaf = g.create_node(NodeKind::PaintLayer);
        g.add_child(root, group);
        g.add_child(group, leaf);
        assert!(g.is_attached(leaf));
        g.remove_from_parent(group);
        assert!(!g.is_attached(leaf));
        assert!(g.is_alive(leaf));
    }

    #[test]
    fn topology_changes_mark_structure() {
        let mut g = graph();
        let root = g.root();
        let _ = g.drain_structure_changes();

        let a = g.create_node(NodeKind::PaintLayer);
        g.add_child(root, a);
        assert_eq!(g.drain_structure_changes(), vec![root]);
        assert!(g.drain_structure_changes().is_empty());
    }

    #[test]
    fn property_changes_mark_appearance() {
        let mut g = graph();
        let a = g.create_node(NodeKind::AdjustmentLayer);
        let _ = g.drain_appearance_changes();

        g.set_opacity(a, 0.5);
        g.set_processing_margin(a, 3);
        assert_eq!(g.drain_appearance_changes(), vec![a]);

        g.set_flags(
            a,
            NodeFlags {
                visible: true,
                locked: true,
            },
        );
        assert!(
            g.drain_appearance_changes().is_empty(),
            "locking carries no pixel difference"
        );
    }

    #[test]
    fn bounds_are_clamped_to_extent() {
        let mut g = NodeGraph::new(pixel_rect(0, 0, 8, 8));
        let a = g.create_node_with_bounds(NodeKind::PaintLayer, pixel_rect(-4, 2, 20, 2));
        assert_eq!(g.bounds(a), pixel_rect(0, 2, 8, 2));
    }

    #[test]
    #[should_panic(expected = "cannot destroy node with children")]
    fn destroy_with_children_panics() {
        let mut g = graph();
        let parent = g.create_node(NodeKind::GroupLayer);
        let child = g.create_node(NodeKind::PaintLayer);
        g.add_child(parent, child);
        g.destroy_node(parent);
    }

    #[test]
    #[should_panic(expected = "cannot attach PaintLayer to PaintLayer")]
    fn layer_under_paint_layer_panics() {
        let mut g = graph();
        let a = g.create_node(NodeKind::PaintLayer);
        let b = g.create_node(NodeKind::PaintLayer);
        g.add_child(a, b);
    }

    #[test]
    #[should_panic(expected = "attaching would create a cycle")]
    fn cycle_panics() {
        let mut g = graph();
        let outer = g.create_node(NodeKind::GroupLayer);
        let inner = g.create_node(NodeKind::GroupLayer);
        g.add_child(outer, inner);
        g.add_child(inner, outer);
    }

    #[test]
    #[should_panic(expected = "cannot carry a processing margin")]
    fn margin_on_paint_layer_panics() {
        let mut g = graph();
        let a = g.create_node(NodeKind::PaintLayer);
        g.set_processing_margin(a, 2);
    }

    #[test]
    #[should_panic(expected = "stale NodeId")]
    fn destroyed_handle_panics_on_parent() {
        let mut g = graph();
        let id = g.create_node(NodeKind::PaintLayer);
        g.destroy_node(id);
        let _ = g.parent(id);
    }
}
