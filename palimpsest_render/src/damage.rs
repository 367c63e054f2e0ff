// Copyright 2026 the Palimpsest Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Display damage: which part of the composited document changed.

use kurbo::Rect;
use palimpsest_core::node::NodeGraph;
use palimpsest_core::rect::RectExt;
use palimpsest_core::walker::WalkResult;

/// A region of the composited document that needs redisplay.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum DamageRegion {
    /// The whole document needs redisplay.
    #[default]
    Full,
    /// A list of document-space rectangles that need redisplay.
    Rects(Vec<Rect>),
    /// Nothing visible changed.
    None,
}

impl DamageRegion {
    /// Reads the damage off the root's change rect in `walk` and each of
    /// its follow-ups.
    ///
    /// A walk that never reached the root damages nothing; one whose root
    /// change covers the document extent damages everything.
    #[must_use]
    pub fn from_walk(graph: &NodeGraph, walk: &WalkResult) -> Self {
        walk.walks().fold(Self::None, |mut damage, w| {
            damage.merge(&Self::from_root_change(graph, w));
            damage
        })
    }

    fn from_root_change(graph: &NodeGraph, walk: &WalkResult) -> Self {
        let Some(root) = walk.get(graph.root()) else {
            return Self::None;
        };
        if root.change.is_empty_area() {
            Self::None
        } else if RectExt::contains_rect(&root.change, &graph.extent()) {
            Self::Full
        } else {
            Self::Rects(vec![root.change])
        }
    }

    /// Returns `true` if no region needs redisplay.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::None)
    }

    /// Returns the smallest rect covering the damage, given the document
    /// extent for [`Full`](Self::Full).
    #[must_use]
    pub fn bounding_rect(&self, extent: Rect) -> Rect {
        match self {
            Self::Full => extent,
            Self::Rects(rects) => rects
                .iter()
                .fold(Rect::ZERO, |acc, r| acc.union_nonempty(*r)),
            Self::None => Rect::ZERO,
        }
    }

    /// Merges another damage region into this one.
    pub fn merge(&mut self, other: &Self) {
        match (&*self, other) {
            (Self::Full, _) | (_, Self::Full) => *self = Self::Full,
            (Self::None, _) => *self = other.clone(),
            (_, Self::None) => {}
            (Self::Rects(a), Self::Rects(b)) => {
                let mut merged = a.clone();
                merged.extend(b.iter().filter(|r| !a.contains(r)));
                *self = Self::Rects(merged);
            }
        }
    }
}
