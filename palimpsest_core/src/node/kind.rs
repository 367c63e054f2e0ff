// Copyright 2026 the Palimpsest Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Node kinds, their capabilities, and per-node compositing attributes.

/// The closed set of node kinds in a document tree.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// A layer with its own pixel data.
    PaintLayer,
    /// A layer that composites its children.
    GroupLayer,
    /// A layer that filters the projection beneath it.
    AdjustmentLayer,
    /// A layer that mirrors the output of another layer.
    CloneLayer,
    /// A mask that filters its owner's output.
    FilterMask,
    /// A mask that geometrically transforms its owner's output.
    TransformMask,
    /// A mask whose pixels modulate its owner's alpha.
    TransparencyMask,
    /// A mask holding a local selection.
    SelectionMask,
}

/// Static capabilities of a [`NodeKind`].
///
/// The walker, the document, and the graph's topology checks consult this
/// table instead of matching on individual kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Capabilities {
    /// Can own layer children.
    pub accepts_layers: bool,
    /// Can own mask children.
    pub accepts_masks: bool,
    /// Backed by a tile store.
    pub has_pixel_data: bool,
    /// May read beyond its change rect (non-zero processing margin allowed).
    pub spatial_spread: bool,
    /// Is applied by its owner rather than composited as a sibling.
    pub is_mask: bool,
}

impl NodeKind {
    /// Returns the capability table entry for this kind.
    #[must_use]
    pub const fn capabilities(self) -> Capabilities {
        match self {
            Self::PaintLayer => Capabilities {
                accepts_layers: false,
                accepts_masks: true,
                has_pixel_data: true,
                spatial_spread: false,
                is_mask: false,
            },
            Self::GroupLayer => Capabilities {
                accepts_layers: true,
                accepts_masks: true,
                has_pixel_data: false,
                spatial_spread: false,
                is_mask: false,
            },
            Self::AdjustmentLayer | Self::CloneLayer => Capabilities {
                accepts_layers: false,
                accepts_masks: true,
                has_pixel_data: false,
                spatial_spread: true,
                is_mask: false,
            },
            Self::FilterMask | Self::TransformMask => Capabilities {
                accepts_layers: false,
                accepts_masks: false,
                has_pixel_data: false,
                spatial_spread: true,
                is_mask: true,
            },
            Self::TransparencyMask | Self::SelectionMask => Capabilities {
                accepts_layers: false,
                accepts_masks: false,
                has_pixel_data: true,
                spatial_spread: false,
                is_mask: true,
            },
        }
    }

    /// Returns `true` for mask kinds.
    #[inline]
    #[must_use]
    pub const fn is_mask(self) -> bool {
        self.capabilities().is_mask
    }

    /// Returns `true` if a node of this kind may be a child of `parent`.
    #[must_use]
    pub const fn can_attach_to(self, parent: Self) -> bool {
        let caps = parent.capabilities();
        if self.is_mask() {
            caps.accepts_masks
        } else {
            caps.accepts_layers
        }
    }
}

/// How a layer's output is combined with what lies beneath it.
///
/// The core only carries the identifier; the pixel math lives in the
/// external renderer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum CompositeOp {
    /// Standard source-over alpha compositing.
    #[default]
    SourceOver,
    /// Multiply blend.
    Multiply,
    /// Screen blend.
    Screen,
    /// Overlay blend.
    Overlay,
    /// Removes destination alpha where the source is opaque.
    Erase,
    /// Replaces the destination outright.
    Copy,
}

/// Per-node boolean flags.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NodeFlags {
    /// Whether the node contributes to the composited image.
    pub visible: bool,
    /// Whether edits to the node's pixels are refused.
    pub locked: bool,
}

impl Default for NodeFlags {
    fn default() -> Self {
        Self {
            visible: true,
            locked: false,
        }
    }
}

/// A node's position among its parent's children.
///
/// Children are ordered bottom to top: the first child is drawn first.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum SiblingPosition {
    /// Last child; drawn over every sibling.
    Topmost,
    /// First child of several; drawn under every sibling.
    Bottommost,
    /// The parent's only child (also the value for parentless nodes).
    #[default]
    OnlyOne,
    /// Neither first nor last.
    Normal,
}

impl SiblingPosition {
    /// Classifies index `i` in a list of `len` children.
    #[must_use]
    pub const fn classify(i: usize, len: usize) -> Self {
        if len <= 1 {
            Self::OnlyOne
        } else if i == 0 {
            Self::Bottommost
        } else if i + 1 == len {
            Self::Topmost
        } else {
            Self::Normal
        }
    }

    /// Returns `true` if no sibling is drawn above this position.
    #[must_use]
    pub const fn is_top(self) -> bool {
        matches!(self, Self::Topmost | Self::OnlyOne)
    }
}
