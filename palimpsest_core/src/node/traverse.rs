// Copyright 2026 the Palimpsest Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tree traversal utilities.

use super::id::{INVALID, NodeId};
use super::store::NodeGraph;

/// An iterator over the direct children of a node, bottom to top.
///
/// Created by [`NodeGraph::children`].
#[derive(Debug)]
pub struct Children<'a> {
    graph: &'a NodeGraph,
    current: u32,
}

impl<'a> Children<'a> {
    pub(crate) fn new(graph: &'a NodeGraph, first: u32) -> Self {
        Self {
            graph,
            current: first,
        }
    }
}

impl Iterator for Children<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        if self.current == INVALID {
            return None;
        }
        let idx = self.current;
        self.current = self.graph.next_sibling[idx as usize];
        Some(self.graph.id_at(idx))
    }
}

impl NodeGraph {
    /// Returns the subtree rooted at `id` in depth-first pre-order
    /// (parents before children, children bottom to top).
    #[must_use]
    pub fn subtree_preorder(&self, id: NodeId) -> Vec<NodeId> {
        self.validate(id);
        let mut out = Vec::new();
        let mut stack = vec![id.idx];
        while let Some(idx) = stack.pop() {
            out.push(self.id_at(idx));
            // Push in reverse so the bottommost child is visited first.
            let mut child = self.last_child(idx);
            while child != INVALID {
                stack.push(child);
                child = self.prev_sibling[child as usize];
            }
        }
        out
    }

    /// Returns the subtree rooted at `id` in depth-first post-order
    /// (children before parents, children bottom to top).
    #[must_use]
    pub fn subtree_postorder(&self, id: NodeId) -> Vec<NodeId> {
        self.validate(id);
        let mut out = Vec::new();
        self.postorder_collect(id.idx, &mut out);
        out
    }

    fn postorder_collect(&self, idx: u32, out: &mut Vec<NodeId>) {
        let mut child = self.first_child[idx as usize];
        while child != INVALID {
            self.postorder_collect(child, out);
            child = self.next_sibling[child as usize];
        }
        out.push(self.id_at(idx));
    }

    pub(crate) fn last_child(&self, idx: u32) -> u32 {
        let mut last = self.first_child[idx as usize];
        if last == INVALID {
            return INVALID;
        }
        while self.next_sibling[last as usize] != INVALID {
            last = self.next_sibling[last as usize];
        }
        last
    }
}
