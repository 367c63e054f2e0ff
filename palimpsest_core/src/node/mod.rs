// Copyright 2026 the Palimpsest Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Document tree data model.
//!
//! A *node* is a layer or a mask in the document tree. Each node has:
//!
//! - An identity ([`NodeId`]) — a generational handle that becomes stale when
//!   the node is destroyed, so a detached or destroyed node is recognized by
//!   a failed lookup rather than by a dangling pointer.
//! - Topology — parent, first-child, and sibling links forming an ordered
//!   tree. Children are ordered bottom to top, and each child caches its
//!   [`SiblingPosition`].
//! - A [`NodeKind`] whose [`Capabilities`] decide which children it accepts,
//!   whether it is backed by pixels, and whether it may read beyond its
//!   change rect ([`processing_margin`](NodeGraph::processing_margin)).
//! - Compositing attributes: [`flags`](NodeGraph::set_flags),
//!   [`opacity`](NodeGraph::set_opacity),
//!   [`composite op`](NodeGraph::set_composite_op), and
//!   [`bounds`](NodeGraph::set_bounds).
//!
//! Masks are children of the layer they modify. They are applied by their
//! owner and never composited as siblings, so sibling queries such as
//! [`next_sibling_above`](NodeGraph::next_sibling_above) skip them.
//!
//! # Dirty tracking
//!
//! Topology and property mutations mark the channels in
//! [`dirty`](crate::dirty) automatically.

mod id;
mod kind;
mod store;
mod traverse;

pub use id::{INVALID, NodeId};
pub use kind::{Capabilities, CompositeOp, NodeFlags, NodeKind, SiblingPosition};
pub use store::NodeGraph;
pub use traverse::Children;
