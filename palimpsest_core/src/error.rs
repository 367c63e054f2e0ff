// Copyright 2026 the Palimpsest Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Error type shared by the tile store, transactions, and the walker.
//!
//! Only conditions a caller can act on are errors. Empty rectangles, walks
//! that start at the root, and zero-margin masks are ordinary cases handled
//! by policy. Misuse of the node graph API (stale handles, illegal parent and
//! child kinds) panics instead, matching the layer-store conventions.

use core::fmt;

use crate::node::NodeId;

/// Errors returned by the core.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Error {
    /// A rollback or rollforward was attempted out of LIFO order, or with a
    /// memento that was purged or captured on a different store.
    ///
    /// The undo history for the store can no longer be trusted; callers
    /// should disable further undo for the document.
    StaleMemento {
        /// Revision number carried by the offending memento.
        revision: u64,
    },
    /// A tile write was attempted with no open transaction on the store.
    NoActiveTransaction,
    /// The node is no longer attached to the document tree.
    DetachedNode(NodeId),
    /// The node is locked against edits.
    NodeLocked(NodeId),
    /// The node kind carries no pixel storage (groups, adjustment layers,
    /// filter and transform masks).
    NoPixelData(NodeId),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StaleMemento { revision } => {
                write!(f, "undo history corrupted: memento r{revision} is stale")
            }
            Self::NoActiveTransaction => write!(f, "tile write without an active transaction"),
            Self::DetachedNode(id) => write!(f, "node {id} is detached from the document"),
            Self::NodeLocked(id) => write!(f, "node {id} is locked"),
            Self::NoPixelData(id) => write!(f, "node {id} has no pixel data"),
        }
    }
}

impl core::error::Error for Error {}
