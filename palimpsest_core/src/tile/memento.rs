// Copyright 2026 the Palimpsest Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Memento tokens and the per-revision history records behind them.

use core::fmt;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use super::buffer::{TileCoord, TileRef};

/// Process-unique identity of a [`TileStore`](super::TileStore).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StoreId(u64);

impl StoreId {
    pub(crate) fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the raw identifier.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

/// An opaque capture of a tile store's state.
///
/// Created by [`TileStore::get_memento`](super::TileStore::get_memento).
/// A memento is only a name for a revision; the tiles it needs for rollback
/// stay inside the store until
/// [`purge_history`](super::TileStore::purge_history) releases them.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Memento {
    pub(crate) store: StoreId,
    pub(crate) revision: u64,
    pub(crate) generation: u64,
}

impl Memento {
    /// Returns the store this memento was captured on.
    #[must_use]
    pub const fn store(&self) -> StoreId {
        self.store
    }

    /// Returns the revision number.
    #[must_use]
    pub const fn revision(&self) -> u64 {
        self.revision
    }

    /// Returns the store generation at capture time.
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }
}

impl fmt::Debug for Memento {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Memento(s{}:r{}@gen{})",
            self.store.0, self.revision, self.generation
        )
    }
}

/// History record for one memento.
#[derive(Debug)]
pub(crate) struct Revision {
    pub(crate) id: u64,
    pub(crate) generation: u64,
    /// Still accepting writes.
    pub(crate) open: bool,
    /// Tile values as they were before the revision's first write to each
    /// coordinate. `None` means the tile was absent.
    pub(crate) saved: BTreeMap<TileCoord, Option<TileRef>>,
    /// Tile values captured at rollback, re-applied by rollforward.
    pub(crate) redo: BTreeMap<TileCoord, Option<TileRef>>,
}

impl Revision {
    pub(crate) fn new(id: u64, generation: u64) -> Self {
        Self {
            id,
            generation,
            open: true,
            saved: BTreeMap::new(),
            redo: BTreeMap::new(),
        }
    }
}
