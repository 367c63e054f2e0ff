// Copyright 2026 the Palimpsest Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Change and need rect propagation.
//!
//! After a node's pixels change, the walker decides which region of which
//! node must be recomposited. For every node it visits it records two rects:
//!
//! - **change**: the part of the node's output that is stale.
//! - **need**: the part of the node's inputs required to recompute that
//!   region, i.e. the change grown by the node's processing margin.
//!
//! Both are clamped to the node's bounds. The rect carried between nodes is
//! only clamped to the document extent, so propagation never under-reports.
//!
//! # Modes
//!
//! - [`update`](WalkerHandle::update): starts at one node with a dirty rect.
//!   The rect runs through the node's masks, then climbs: layer siblings
//!   drawn above recomposite over it (each growing it by its own margin and
//!   masks), and each ancestor absorbs it. Starting at a mask hands the
//!   change to its owner and skips the masks below the start.
//! - [`full_refresh`](WalkerHandle::full_refresh): every node of a subtree
//!   takes its whole bounds, layers merge their children bottom-up, and the
//!   result then climbs like an update.
//!
//! Results list masks before their owner and children before their parent.
//!
//! # Exclusivity
//!
//! Walks run through a [`WalkerHandle`], which only a [`WalkLock`] hands out,
//! and only one at a time. Walks a running walk discovers (clone layers
//! mirroring a changed node, full refreshes of structurally stale nodes) are
//! queued on the lock and run afterwards.

mod lock;
mod result;
mod walk;

pub use lock::{PendingWalk, WalkLock, WalkerHandle};
pub use result::{WalkEntry, WalkMode, WalkResult};

#[cfg(test)]
mod tests {
    use kurbo::Rect;
    use proptest::prelude::*;

    use super::*;
    use crate::error::Error;
    use crate::node::{NodeGraph, NodeId, NodeKind};
    use crate::rect::{RectExt, pixel_rect};

    fn attach(g: &mut NodeGraph, parent: NodeId, kind: NodeKind) -> NodeId {
        let id = g.create_node(kind);
        g.add_child(parent, id);
        id
    }

    fn update(g: &NodeGraph, start: NodeId, rect: Rect) -> WalkResult {
        let lock = WalkLock::new();
        let mut h = lock.try_acquire().unwrap();
        h.update(g, start, rect).unwrap()
    }

    fn full_refresh(g: &NodeGraph, start: NodeId) -> WalkResult {
        let lock = WalkLock::new();
        let mut h = lock.try_acquire().unwrap();
        h.full_refresh(g, start).unwrap()
    }

    /// Every (parent, child) edge present in the result is ordered child
    /// first.
    fn assert_bottom_up(g: &NodeGraph, walk: &WalkResult) {
        for (i, e) in walk.iter().enumerate() {
            if let Some(p) = g.parent(e.node)
                && let Some(j) = walk.index_of(p)
            {
                assert!(i < j, "{:?} listed after its parent {:?}", e.node, p);
            }
        }
    }

    #[test]
    fn filter_mask_need_is_grown_and_clamped() {
        let mut g = NodeGraph::new(pixel_rect(0, 0, 8, 8));
        let root = g.root();
        let layer = attach(&mut g, root, NodeKind::PaintLayer);
        let mask = attach(&mut g, layer, NodeKind::FilterMask);
        g.set_processing_margin(mask, 2);

        let walk = update(&g, layer, pixel_rect(0, 0, 4, 4));
        let m = walk.get(mask).unwrap();
        assert_eq!(m.change, pixel_rect(0, 0, 4, 4));
        assert_eq!(m.need, pixel_rect(0, 0, 6, 6));
        assert_eq!(walk.get(layer).unwrap().change, pixel_rect(0, 0, 6, 6));

        let order: Vec<_> = walk.iter().map(|e| e.node).collect();
        assert_eq!(order, vec![mask, layer, root]);
    }

    #[test]
    fn mask_start_hands_change_to_owner() {
        let mut g = NodeGraph::new(pixel_rect(0, 0, 8, 8));
        let root = g.root();
        let layer = attach(&mut g, root, NodeKind::PaintLayer);
        let below = attach(&mut g, layer, NodeKind::TransparencyMask);
        let mask = attach(&mut g, layer, NodeKind::FilterMask);
        let above = attach(&mut g, layer, NodeKind::FilterMask);
        g.set_processing_margin(mask, 2);

        let walk = update(&g, mask, pixel_rect(0, 0, 4, 4));
        assert!(walk.get(below).is_none());
        assert_eq!(walk.get(mask).unwrap().need, pixel_rect(0, 0, 6, 6));
        assert_eq!(walk.get(above).unwrap().change, pixel_rect(0, 0, 6, 6));
        assert!(walk.get(layer).is_some());
        assert_bottom_up(&g, &walk);
    }

    #[test]
    fn siblings_above_are_dirtied() {
        let mut g = NodeGraph::new(pixel_rect(0, 0, 128, 128));
        let root = g.root();
        let group = attach(&mut g, root, NodeKind::GroupLayer);
        let bottom = attach(&mut g, group, NodeKind::PaintLayer);
        let middle = attach(&mut g, group, NodeKind::PaintLayer);
        let top = attach(&mut g, group, NodeKind::PaintLayer);
        let r = pixel_rect(10, 10, 20, 20);

        let walk = update(&g, bottom, r);
        assert!(RectExt::contains_rect(&walk.get(middle).unwrap().change, &r));
        assert!(RectExt::contains_rect(&walk.get(top).unwrap().change, &r));
        assert_eq!(walk.len(), 5);
        assert_bottom_up(&g, &walk);
    }

    #[test]
    fn topmost_start_skips_siblings() {
        let mut g = NodeGraph::new(pixel_rect(0, 0, 64, 64));
        let root = g.root();
        let bottom = attach(&mut g, root, NodeKind::PaintLayer);
        let top = attach(&mut g, root, NodeKind::PaintLayer);

        let walk = update(&g, top, pixel_rect(0, 0, 4, 4));
        assert!(walk.get(bottom).is_none());
        assert_eq!(walk.len(), 2);
    }

    #[test]
    fn sibling_margin_grows_the_change() {
        let mut g = NodeGraph::new(pixel_rect(0, 0, 64, 64));
        let root = g.root();
        let paint = attach(&mut g, root, NodeKind::PaintLayer);
        let blur = attach(&mut g, root, NodeKind::AdjustmentLayer);
        let over = attach(&mut g, root, NodeKind::PaintLayer);
        g.set_processing_margin(blur, 4);

        let walk = update(&g, paint, pixel_rect(10, 10, 4, 4));
        let b = walk.get(blur).unwrap();
        assert_eq!(b.change, pixel_rect(6, 6, 12, 12));
        assert_eq!(b.need, pixel_rect(2, 2, 20, 20));
        // The layer above sees the union, which the blur widened.
        assert_eq!(walk.get(over).unwrap().change, pixel_rect(6, 6, 12, 12));
        assert_eq!(walk.get(root).unwrap().change, pixel_rect(6, 6, 12, 12));
    }

    #[test]
    fn change_is_clamped_to_node_bounds() {
        let mut g = NodeGraph::new(pixel_rect(0, 0, 64, 64));
        let root = g.root();
        let paint = attach(&mut g, root, NodeKind::PaintLayer);
        let small = g.create_node_with_bounds(NodeKind::PaintLayer, pixel_rect(0, 0, 8, 8));
        g.add_child(root, small);

        let walk = update(&g, paint, pixel_rect(4, 4, 16, 16));
        assert_eq!(walk.get(small).unwrap().change, pixel_rect(4, 4, 4, 4));
        assert_eq!(walk.get(root).unwrap().change, pixel_rect(4, 4, 16, 16));
    }

    #[test]
    fn rect_outside_extent_is_a_noop() {
        let mut g = NodeGraph::new(pixel_rect(0, 0, 16, 16));
        let root = g.root();
        let paint = attach(&mut g, root, NodeKind::PaintLayer);

        let walk = update(&g, paint, pixel_rect(32, 32, 4, 4));
        assert!(walk.is_empty());
        assert_eq!(walk.mode(), WalkMode::Update);

        let walk = update(&g, paint, pixel_rect(-4, -4, 8, 8));
        assert_eq!(walk.get(paint).unwrap().change, pixel_rect(0, 0, 4, 4));
    }

    #[test]
    fn detached_start_is_an_error() {
        let mut g = NodeGraph::new(pixel_rect(0, 0, 16, 16));
        let loose = g.create_node(NodeKind::PaintLayer);
        let lock = WalkLock::new();
        let mut h = lock.try_acquire().unwrap();
        assert_eq!(
            h.update(&g, loose, pixel_rect(0, 0, 1, 1)),
            Err(Error::DetachedNode(loose))
        );
        assert_eq!(h.full_refresh(&g, loose), Err(Error::DetachedNode(loose)));
    }

    #[test]
    fn full_refresh_visits_subtree_once() {
        let mut g = NodeGraph::new(pixel_rect(0, 0, 256, 256));
        let root = g.root();
        let group = attach(&mut g, root, NodeKind::GroupLayer);
        let paint = attach(&mut g, group, NodeKind::PaintLayer);
        let transparency = attach(&mut g, paint, NodeKind::TransparencyMask);
        let adjust = attach(&mut g, group, NodeKind::AdjustmentLayer);
        let filter = attach(&mut g, adjust, NodeKind::FilterMask);
        let inner = attach(&mut g, group, NodeKind::GroupLayer);
        let inner_paint = attach(&mut g, inner, NodeKind::PaintLayer);
        let selection = attach(&mut g, inner_paint, NodeKind::SelectionMask);
        let group_mask = attach(&mut g, group, NodeKind::TransformMask);
        g.set_processing_margin(adjust, 2);
        g.set_processing_margin(filter, 3);
        let _outside = attach(&mut g, root, NodeKind::PaintLayer);

        let walk = full_refresh(&g, group);
        assert_eq!(walk.mode(), WalkMode::FullRefresh);
        let subtree = [
            group,
            paint,
            transparency,
            adjust,
            filter,
            inner,
            inner_paint,
            selection,
            group_mask,
        ];
        for node in subtree {
            let hits = walk.iter().filter(|e| e.node == node).count();
            assert_eq!(hits, 1, "{node:?} visited {hits} times");
        }
        // The subtree plus the sibling above and the root.
        assert_eq!(walk.len(), subtree.len() + 2);
        assert_eq!(walk.get(group).unwrap().change, pixel_rect(0, 0, 256, 256));
        assert_bottom_up(&g, &walk);
    }

    #[test]
    fn full_refresh_of_mask_goes_through_owner() {
        let mut g = NodeGraph::new(pixel_rect(0, 0, 32, 32));
        let root = g.root();
        let paint = attach(&mut g, root, NodeKind::PaintLayer);
        let mask = g.create_node_with_bounds(NodeKind::SelectionMask, pixel_rect(0, 0, 8, 8));
        g.add_child(paint, mask);

        let walk = full_refresh(&g, mask);
        let order: Vec<_> = walk.iter().map(|e| e.node).collect();
        assert_eq!(order, vec![mask, paint, root]);
        assert_eq!(walk.get(paint).unwrap().change, pixel_rect(0, 0, 8, 8));
    }

    #[test]
    fn changed_source_queues_clone_update() {
        let mut g = NodeGraph::new(pixel_rect(0, 0, 32, 32));
        let root = g.root();
        let clone = attach(&mut g, root, NodeKind::CloneLayer);
        let source = attach(&mut g, root, NodeKind::PaintLayer);
        g.set_clone_source(clone, Some(source));

        let lock = WalkLock::new();
        let mut h = lock.try_acquire().unwrap();
        let walk = h.update(&g, source, pixel_rect(0, 0, 4, 4)).unwrap();
        assert_eq!(walk.deferred_count(), 1);
        assert!(walk.get(clone).is_none());

        let pending = lock.take_pending().unwrap();
        assert_eq!(pending, PendingWalk::update(clone, pixel_rect(0, 0, 4, 4)));

        // The clone's own walk reaches the source only as a sibling above,
        // which queues nothing further.
        let walk = h.run(&g, pending).unwrap();
        assert!(walk.get(source).is_some());
        assert_eq!(walk.deferred_count(), 0);
        assert_eq!(lock.pending_len(), 0);
    }

    #[test]
    fn stale_nodes_queue_a_full_refresh() {
        let mut g = NodeGraph::new(pixel_rect(0, 0, 32, 32));
        let root = g.root();
        let group = attach(&mut g, root, NodeKind::GroupLayer);
        let paint = attach(&mut g, group, NodeKind::PaintLayer);

        let lock = WalkLock::new();
        lock.mark_stale(group);
        let mut h = lock.try_acquire().unwrap();
        let walk = h.update(&g, paint, pixel_rect(0, 0, 4, 4)).unwrap();
        assert_eq!(walk.deferred_count(), 1);
        assert_eq!(lock.take_pending(), Some(PendingWalk::full_refresh(group)));

        let walk = h.full_refresh(&g, group).unwrap();
        assert_eq!(walk.deferred_count(), 0);
        assert!(!lock.is_stale(group));
    }

    // -- Properties over random trees --

    const KINDS: [NodeKind; 8] = [
        NodeKind::PaintLayer,
        NodeKind::GroupLayer,
        NodeKind::AdjustmentLayer,
        NodeKind::CloneLayer,
        NodeKind::FilterMask,
        NodeKind::TransformMask,
        NodeKind::TransparencyMask,
        NodeKind::SelectionMask,
    ];

    /// Builds a tree from `(kind, parent pick, margin)` triples, skipping
    /// triples no existing node can own.
    fn build(ops: &[(u8, u16, u8)]) -> (NodeGraph, Vec<NodeId>) {
        let mut g = NodeGraph::new(pixel_rect(0, 0, 96, 96));
        let mut nodes = vec![g.root()];
        for &(k, pick, margin) in ops {
            let kind = KINDS[usize::from(k) % KINDS.len()];
            let owners: Vec<_> = nodes
                .iter()
                .copied()
                .filter(|&n| kind.can_attach_to(g.kind(n)))
                .collect();
            if owners.is_empty() {
                continue;
            }
            let parent = owners[usize::from(pick) % owners.len()];
            let id = attach(&mut g, parent, kind);
            if kind.capabilities().spatial_spread {
                g.set_processing_margin(id, u32::from(margin % 5));
            }
            nodes.push(id);
        }
        (g, nodes)
    }

    fn tree_ops() -> impl Strategy<Value = Vec<(u8, u16, u8)>> {
        prop::collection::vec((any::<u8>(), any::<u16>(), any::<u8>()), 1..40)
    }

    proptest! {
        #[test]
        fn update_is_bottom_up_and_need_matches_margin(
            ops in tree_ops(),
            pick in any::<u16>(),
            (x, y, w, h) in (0_i32..96, 0_i32..96, 1_u32..48, 1_u32..48),
        ) {
            let (g, nodes) = build(&ops);
            let start = nodes[usize::from(pick) % nodes.len()];
            let walk = update(&g, start, pixel_rect(x, y, w, h));

            assert_bottom_up(&g, &walk);
            for e in &walk {
                let bounds = g.bounds(e.node);
                let m = g.processing_margin(e.node);
                prop_assert_eq!(e.need, e.change.grown_by(m).clamped_to(bounds));
                prop_assert!(RectExt::contains_rect(&g.extent(), &e.change));
                if m == 0 {
                    prop_assert_eq!(e.need, e.change);
                }
            }
            prop_assert_eq!(walk.index_of(g.root()), Some(walk.len() - 1));
        }

        #[test]
        fn full_refresh_covers_subtree_exactly_once(ops in tree_ops(), pick in any::<u16>()) {
            let (g, nodes) = build(&ops);
            let start = nodes[usize::from(pick) % nodes.len()];
            let walk = full_refresh(&g, start);

            assert_bottom_up(&g, &walk);
            for node in g.subtree_preorder(start) {
                prop_assert_eq!(walk.iter().filter(|e| e.node == node).count(), 1);
            }
        }
    }
}
