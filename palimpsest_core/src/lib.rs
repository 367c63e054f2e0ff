// Copyright 2026 the Palimpsest Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Update propagation and tiled undo for layered raster documents.
//!
//! `palimpsest_core` provides the two subsystems underneath a layered,
//! tile-based image editor: a walker that decides which regions of which
//! nodes must be recomposited after an edit, and a copy-on-write tile store
//! whose mementos make every edit reversible.
//!
//! # Architecture
//!
//! ```text
//!   Document::begin_edit() ──► Transaction ──► TileStore (copy-on-write)
//!                                  │
//!                                  ▼
//!   Document::end_edit() ──► notify_dirty() ──► WalkerHandle::update()
//!                                                    │
//!                 ┌──────────────────────────────────┘
//!                 ▼
//!   WalkResult (bottom-up node, change, need) ──► external renderer
//! ```
//!
//! **[`node`]** — Struct-of-arrays node graph with generational handles.
//! Node kinds form a closed enum with a capability table; sibling
//! positions are recomputed eagerly on every topology change.
//!
//! **[`tile`]** — Tile buffers shared through `Arc`, the per-layer
//! [`TileStore`](tile::TileStore), and the [`Memento`](tile::Memento)
//! history used for rollback and rollforward.
//!
//! **[`transaction`]** — Binds one memento to one store and exposes the
//! undo/redo state machine to an external command stack.
//!
//! **[`walker`]** — The Update and `FullRefresh` traversals producing a
//! [`WalkResult`](walker::WalkResult), and the [`WalkLock`](walker::WalkLock)
//! that keeps walks exclusive.
//!
//! **[`document`]** — The facade external layers talk to.
//!
//! **[`dirty`]** — Dirty channels on the node graph via `understory_dirty`.
//!
//! **[`trace`]** — [`TraceSink`](trace::TraceSink) trait and event types for
//! walk and transaction instrumentation, with a zero-overhead
//! [`Tracer`](trace::Tracer) wrapper.
//!
//! # Crate features
//!
//! - `trace` (disabled by default): Enables `Tracer` method bodies (one branch
//!   per call site).
//! - `trace-rich` (disabled by default, implies `trace`): Gates per-node
//!   visit records.

#![cfg_attr(docsrs, feature(doc_auto_cfg))]

pub mod dirty;
pub mod document;
pub mod error;
pub mod node;
pub mod rect;
pub mod tile;
pub mod trace;
pub mod transaction;
pub mod walker;

pub use document::{Document, DocumentConfig};
pub use error::Error;
