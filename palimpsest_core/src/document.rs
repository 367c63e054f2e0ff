// Copyright 2026 the Palimpsest Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The facade outer layers talk to.
//!
//! A [`Document`] owns the node graph, one tile store per pixel-backed node,
//! and the walk lock. Editors, command stacks, and display code only use
//! four verbs: begin and end an edit, mark a node dirty, request a
//! recompute, and read pixels back.

use core::fmt;
use std::collections::BTreeMap;

use kurbo::Rect;

use crate::error::Error;
use crate::node::{NodeGraph, NodeId, NodeKind};
use crate::rect::{RectExt, pixel_rect};
use crate::tile::{PixelBuffer, SharedTileStore, TILE_SIZE, TileStore};
#[cfg(feature = "trace-rich")]
use crate::trace::NodeVisit;
use crate::trace::{
    SkipReason, TraceSink, Tracer, TransactionAction, TransactionEvent, WalkBeginEvent,
    WalkEndEvent, WalkSkippedEvent,
};
use crate::transaction::Transaction;
use crate::walker::{PendingWalk, WalkLock, WalkMode, WalkResult};

/// Size and tiling of a [`Document`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DocumentConfig {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Tile edge length in pixels.
    pub tile_size: u32,
}

impl DocumentConfig {
    /// A document of the given size with the default tile size.
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            tile_size: TILE_SIZE,
        }
    }

    /// Returns a copy with a different tile size.
    #[must_use]
    pub const fn with_tile_size(self, tile_size: u32) -> Self {
        Self { tile_size, ..self }
    }

    /// Returns the document extent, anchored at the origin.
    #[must_use]
    pub fn extent(&self) -> Rect {
        pixel_rect(0, 0, self.width, self.height)
    }
}

impl Default for DocumentConfig {
    fn default() -> Self {
        Self::new(1024, 1024)
    }
}

/// A layered raster document.
pub struct Document {
    config: DocumentConfig,
    graph: NodeGraph,
    stores: BTreeMap<NodeId, SharedTileStore>,
    walker: WalkLock,
    sink: Option<Box<dyn TraceSink + Send>>,
    walk_index: u64,
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("config", &self.config)
            .field("graph", &self.graph)
            .field("stores", &self.stores.len())
            .field("walker", &self.walker)
            .field("walk_index", &self.walk_index)
            .finish_non_exhaustive()
    }
}

impl Document {
    /// Creates an empty document holding only the root group.
    ///
    /// # Panics
    ///
    /// Panics if the tile size is zero.
    #[must_use]
    pub fn new(config: DocumentConfig) -> Self {
        assert!(config.tile_size > 0, "tile size must be non-zero");
        Self {
            config,
            graph: NodeGraph::new(config.extent()),
            stores: BTreeMap::new(),
            walker: WalkLock::new(),
            sink: None,
            walk_index: 0,
        }
    }

    /// Returns the configuration the document was created with.
    #[must_use]
    pub fn config(&self) -> &DocumentConfig {
        &self.config
    }

    /// Returns the document extent.
    #[must_use]
    pub fn extent(&self) -> Rect {
        self.graph.extent()
    }

    /// Returns the root group.
    #[must_use]
    pub fn root(&self) -> NodeId {
        self.graph.root()
    }

    /// Returns the node graph.
    #[must_use]
    pub fn graph(&self) -> &NodeGraph {
        &self.graph
    }

    /// Returns the node graph for property and topology edits.
    ///
    /// Edits are picked up by [`flush_graph_changes`](Self::flush_graph_changes).
    pub fn graph_mut(&mut self) -> &mut NodeGraph {
        &mut self.graph
    }

    /// Returns the walk lock, for queuing walks from other owners.
    #[must_use]
    pub fn walker(&self) -> &WalkLock {
        &self.walker
    }

    /// Installs a sink for walk and transaction events.
    pub fn set_trace_sink(&mut self, sink: Box<dyn TraceSink + Send>) {
        self.sink = Some(sink);
    }

    /// Removes and returns the installed trace sink.
    pub fn take_trace_sink(&mut self) -> Option<Box<dyn TraceSink + Send>> {
        self.sink.take()
    }

    // -- Nodes --

    /// Creates a node spanning the document and attaches it as the topmost
    /// child of `parent`.
    ///
    /// # Panics
    ///
    /// Panics under the conditions of [`NodeGraph::add_child`].
    pub fn add_node(&mut self, parent: NodeId, kind: NodeKind) -> NodeId {
        let extent = self.extent();
        self.add_node_with_bounds(parent, kind, extent)
    }

    /// Creates a node with explicit bounds and attaches it as the topmost
    /// child of `parent`.
    ///
    /// # Panics
    ///
    /// Panics under the conditions of [`NodeGraph::add_child`].
    pub fn add_node_with_bounds(&mut self, parent: NodeId, kind: NodeKind, bounds: Rect) -> NodeId {
        let id = self.graph.create_node_with_bounds(kind, bounds);
        self.graph.add_child(parent, id);
        if kind.capabilities().has_pixel_data {
            self.stores.insert(
                id,
                TileStore::new(self.config.tile_size).into_shared(),
            );
        }
        id
    }

    /// Detaches and destroys `node` and its whole subtree.
    ///
    /// Transactions still holding a destroyed node's store keep it alive
    /// until they are dropped.
    ///
    /// # Panics
    ///
    /// Panics if `node` is the root or stale.
    pub fn remove_node(&mut self, node: NodeId) {
        // Post-order: children go before their parent, `node` last.
        for n in self.graph.subtree_postorder(node) {
            self.graph.destroy_node(n);
            self.stores.remove(&n);
        }
    }

    /// Returns the tile store backing `node`, if it has pixel data.
    #[must_use]
    pub fn store(&self, node: NodeId) -> Option<&SharedTileStore> {
        self.stores.get(&node)
    }

    // -- Edits --

    /// Opens a transaction on `node`'s pixels.
    ///
    /// # Errors
    ///
    /// - [`Error::DetachedNode`] if the node is not in the document tree.
    /// - [`Error::NodeLocked`] if the node is locked.
    /// - [`Error::NoPixelData`] if the node kind has no pixels.
    pub fn begin_edit(&mut self, node: NodeId) -> Result<Transaction, Error> {
        if !self.graph.is_attached(node) {
            return Err(Error::DetachedNode(node));
        }
        if self.graph.flags(node).locked {
            return Err(Error::NodeLocked(node));
        }
        let store = self.stores.get(&node).ok_or(Error::NoPixelData(node))?;
        let tx = Transaction::begin(node, store.clone());
        self.trace_transaction(&tx, TransactionAction::Begin, Rect::ZERO);
        Ok(tx)
    }

    /// Commits `tx` and walks the rect it touched.
    pub fn end_edit(&mut self, tx: &mut Transaction, touched: Rect) -> WalkResult {
        tx.finish();
        self.trace_transaction(tx, TransactionAction::Finish, Rect::ZERO);
        self.notify_dirty(tx.node(), touched)
    }

    /// Rolls `tx` back and returns the restored rect.
    ///
    /// No walk runs; pass the rect to [`notify_dirty`](Self::notify_dirty),
    /// once per undo or once for a batch of them.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StaleMemento`] if the undo history of the node is out
    /// of order; further undo on the node should be disabled.
    pub fn undo(&mut self, tx: &mut Transaction) -> Result<Rect, Error> {
        match tx.undo() {
            Ok(rect) => {
                self.trace_transaction(tx, TransactionAction::Undo, rect);
                Ok(rect)
            }
            Err(e) => {
                self.trace_transaction(tx, TransactionAction::Stale, Rect::ZERO);
                Err(e)
            }
        }
    }

    /// Rolls `tx` forward and returns the re-applied rect.
    ///
    /// As with [`undo`](Self::undo), recompositing is left to the caller.
    ///
    /// The first redo of a transaction that was never undone does nothing
    /// and returns an empty rect.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StaleMemento`] if the undo history of the node is out
    /// of order.
    pub fn redo(&mut self, tx: &mut Transaction) -> Result<Rect, Error> {
        match tx.redo() {
            Ok(rect) => {
                self.trace_transaction(tx, TransactionAction::Redo, rect);
                Ok(rect)
            }
            Err(e) => {
                self.trace_transaction(tx, TransactionAction::Stale, Rect::ZERO);
                Err(e)
            }
        }
    }

    /// Drops a transaction that fell out of the command history, purging
    /// its memento.
    pub fn release(&mut self, tx: Transaction) {
        self.trace_transaction(&tx, TransactionAction::Purge, Rect::ZERO);
        drop(tx);
    }

    /// Copies `node`'s pixels inside `rect` (clamped to the document).
    ///
    /// # Errors
    ///
    /// - [`Error::DetachedNode`] if the node is not in the document tree.
    /// - [`Error::NoPixelData`] if the node kind has no pixels.
    pub fn read_pixels(&self, node: NodeId, rect: Rect) -> Result<PixelBuffer, Error> {
        if !self.graph.is_attached(node) {
            return Err(Error::DetachedNode(node));
        }
        let store = self.stores.get(&node).ok_or(Error::NoPixelData(node))?;
        let rect = rect.clamped_to(self.extent());
        Ok(store.lock().read_pixels(rect))
    }

    // -- Walks --

    /// Walks the consequences of `rect` of `node` changing.
    ///
    /// A detached node or an empty rect yields an empty result, reported
    /// through the trace sink. Walks queued along the way run before this
    /// returns and come back as [`WalkResult::follow_ups`].
    pub fn notify_dirty(&mut self, node: NodeId, rect: Rect) -> WalkResult {
        self.walk(PendingWalk::update(node, rect))
    }

    /// Recomputes `node`'s whole subtree.
    ///
    /// Follow-up walks run as for [`notify_dirty`](Self::notify_dirty).
    pub fn request_full_refresh(&mut self, node: NodeId) -> WalkResult {
        self.walk(PendingWalk::full_refresh(node))
    }

    /// Turns graph edits made since the last flush into queued walks.
    ///
    /// A parent whose child list changed is marked stale and gets a full
    /// refresh; a node whose compositing properties changed gets an update
    /// over its bounds. Returns the number of walks queued.
    pub fn flush_graph_changes(&mut self) -> usize {
        let mut queued = 0;
        for parent in self.graph.drain_structure_changes() {
            if self.graph.is_attached(parent) {
                self.walker.mark_stale(parent);
                self.walker.request(PendingWalk::full_refresh(parent));
                queued += 1;
            }
        }
        for node in self.graph.drain_appearance_changes() {
            if self.graph.is_attached(node) {
                let bounds = self.graph.bounds(node);
                self.walker.request(PendingWalk::update(node, bounds));
                queued += 1;
            }
        }
        queued
    }

    /// Returns `true` if walks are waiting in the queue.
    #[must_use]
    pub fn has_pending(&self) -> bool {
        self.walker.pending_len() > 0
    }

    /// Runs the oldest queued walk, then the rest of the queue as its
    /// follow-ups.
    pub fn run_pending(&mut self) -> Option<WalkResult> {
        let walk = self.walker.take_pending()?;
        Some(self.walk(walk))
    }

    /// Runs queued walks until the queue is empty.
    ///
    /// Follow-ups stay attached to the walk they followed.
    pub fn drain_pending(&mut self) -> Vec<WalkResult> {
        let mut out = Vec::new();
        while let Some(result) = self.run_pending() {
            out.push(result);
        }
        out
    }

    // -- Internal helpers --

    fn walk(&mut self, pending: PendingWalk) -> WalkResult {
        let mut result = self.walk_once(pending);
        // A held lock means someone else will drain the queue.
        while !self.walker.is_walking() {
            let Some(next) = self.walker.take_pending() else {
                break;
            };
            let follow_up = self.walk_once(next);
            result.push_follow_up(follow_up);
        }
        result
    }

    fn walk_once(&mut self, pending: PendingWalk) -> WalkResult {
        let PendingWalk { node, mode, rect } = pending;
        let mut tracer = Tracer::from_option(
            self.sink
                .as_deref_mut()
                .map(|s| s as &mut dyn TraceSink),
        );
        let skipped = |reason| WalkSkippedEvent {
            start: node,
            mode,
            reason,
        };

        let Some(mut handle) = self.walker.try_acquire() else {
            self.walker.request(pending);
            tracer.walk_skipped(&skipped(SkipReason::Deferred));
            return WalkResult::empty(mode, node);
        };
        if !self.graph.is_attached(node) {
            tracer.walk_skipped(&skipped(SkipReason::Detached));
            return WalkResult::empty(mode, node);
        }
        let extent = self.graph.extent();
        let rect = match mode {
            WalkMode::Update => rect.clamped_to(extent),
            WalkMode::FullRefresh => self.graph.bounds(node).clamped_to(extent),
        };
        if mode == WalkMode::Update && rect.is_empty_area() {
            tracer.walk_skipped(&skipped(SkipReason::EmptyRect));
            return WalkResult::empty(mode, node);
        }

        self.walk_index += 1;
        let walk_index = self.walk_index;
        tracer.walk_begin(&WalkBeginEvent {
            walk_index,
            mode,
            start: node,
            rect,
        });

        let result = match handle.run(&self.graph, pending) {
            Ok(result) => result,
            Err(_) => {
                tracer.walk_skipped(&skipped(SkipReason::Detached));
                return WalkResult::empty(mode, node);
            }
        };

        #[cfg(feature = "trace-rich")]
        {
            let visits: Vec<NodeVisit> = result
                .iter()
                .map(|e| NodeVisit {
                    node_index: e.node.index(),
                    change: e.change,
                    need: e.need,
                })
                .collect();
            tracer.node_visits(walk_index, &visits);
        }

        tracer.walk_end(&WalkEndEvent {
            walk_index,
            mode,
            visited: u32::try_from(result.len()).unwrap_or(u32::MAX),
            deferred: u32::try_from(result.deferred_count()).unwrap_or(u32::MAX),
            dirty: result.dirty_rect(),
        });
        result
    }

    fn trace_transaction(&mut self, tx: &Transaction, action: TransactionAction, rect: Rect) {
        let mut tracer = Tracer::from_option(
            self.sink
                .as_deref_mut()
                .map(|s| s as &mut dyn TraceSink),
        );
        tracer.transaction(&TransactionEvent {
            node: tx.node(),
            revision: tx.memento().revision(),
            action,
            rect,
        });
    }
}
