// Copyright 2026 the Palimpsest Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Render plan: the nodes of one walk, ready for recompositing.

use kurbo::Rect;
use palimpsest_core::node::{CompositeOp, NodeGraph, NodeId, NodeKind};
use palimpsest_core::walker::{WalkMode, WalkResult};

/// A single node to recomposite.
///
/// Properties are copied out of the graph when the plan is built, so a plan
/// stays valid while the graph is edited further.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RenderItem {
    /// The node this item recomposites.
    pub node: NodeId,
    /// Kind of the node.
    pub kind: NodeKind,
    /// Region of the node's output to recompute.
    pub change: Rect,
    /// Region of the node's inputs the recompute reads.
    pub need: Rect,
    /// Node opacity (0.0–1.0).
    pub opacity: f32,
    /// How the node composites onto what lies below it.
    pub composite: CompositeOp,
    /// Hidden nodes still refresh their own output but contribute nothing
    /// to their parent.
    pub visible: bool,
}

/// The items of one walk in bottom-up order: every item comes after the
/// items of its children.
#[derive(Clone, Debug)]
pub struct RenderPlan {
    /// Mode of the walk the plan came from.
    pub mode: WalkMode,
    /// Items in walk order.
    pub items: Vec<RenderItem>,
}

impl RenderPlan {
    /// Creates an empty plan.
    #[must_use]
    pub fn new(mode: WalkMode) -> Self {
        Self {
            mode,
            items: Vec::new(),
        }
    }

    /// Builds a plan from `walk`, reading node properties from `graph`.
    ///
    /// Nodes destroyed since the walk ran are left out. Follow-up walks are
    /// not included; plan each of [`WalkResult::walks`] in turn.
    #[must_use]
    pub fn from_walk(graph: &NodeGraph, walk: &WalkResult) -> Self {
        let items = walk
            .iter()
            .filter(|e| graph.is_alive(e.node))
            .map(|e| RenderItem {
                node: e.node,
                kind: graph.kind(e.node),
                change: e.change,
                need: e.need,
                opacity: graph.opacity(e.node),
                composite: graph.composite_op(e.node),
                visible: graph.flags(e.node).visible,
            })
            .collect();
        Self {
            mode: walk.mode(),
            items,
        }
    }

    /// Returns `true` if there is nothing to recomposite.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Returns the item for `node`, if planned.
    #[must_use]
    pub fn item(&self, node: NodeId) -> Option<&RenderItem> {
        self.items.iter().find(|i| i.node == node)
    }

    /// Iterates the items that contribute to their parent.
    pub fn visible_items(&self) -> impl Iterator<Item = &RenderItem> + '_ {
        self.items.iter().filter(|i| i.visible)
    }

    /// Clears the plan for reuse.
    pub fn clear(&mut self) {
        self.items.clear();
    }
}
