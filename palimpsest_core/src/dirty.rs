// Copyright 2026 the Palimpsest Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Dirty-tracking channel constants.
//!
//! The node graph uses multi-channel dirty tracking (via [`understory_dirty`])
//! to remember which nodes changed between walks. Both channels are
//! local-only: the walker, not the tracker, is responsible for spreading
//! dirtiness to siblings and ancestors.
//!
//! - [`STRUCTURE`] — marked on a parent whose child list changed (add,
//!   remove, reorder, reparent). Incremental rects cannot be trusted below
//!   such a node, so the document schedules a full refresh for it.
//! - [`APPEARANCE`] — marked on a node whose visibility, opacity, composite
//!   operation, processing margin, or bounds changed. The document schedules
//!   an update walk over the node's bounds.
//!
//! # Consumption
//!
//! [`Document::flush_graph_changes`](crate::document::Document::flush_graph_changes)
//! drains both channels and turns them into queued walks.

use understory_dirty::Channel;

/// Child list changed; requires a full refresh of the node's subtree.
pub const STRUCTURE: Channel = Channel::new(0);

/// Compositing properties changed; requires an update over the node bounds.
pub const APPEARANCE: Channel = Channel::new(1);
