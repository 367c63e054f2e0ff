// Copyright 2026 the Palimpsest Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Copy-on-write tile storage with a linear revision history.

use std::collections::BTreeMap;
use std::sync::Arc;

use kurbo::Rect;
use parking_lot::Mutex;

use super::buffer::{
    Pixel, PixelBuffer, TILE_SIZE, TileBuffer, TileCoord, TileRef, tile_rect, tiles_covering,
};
use super::memento::{Memento, Revision, StoreId};
use crate::error::Error;
use crate::rect::RectExt;

/// A tile store shared between a document and the transactions editing it.
///
/// The mutex gives each store a single writer at a time; readers of
/// published tiles clone the [`TileRef`] and release the lock.
pub type SharedTileStore = Arc<Mutex<TileStore>>;

/// Sparse map of tiles for one layer or mask, plus its undo history.
///
/// # History model
///
/// Every [`get_memento`](Self::get_memento) opens a new *revision*. While a
/// revision is open, the first write to each tile saves the previous
/// [`TileRef`] in the revision. Saving is a reference-count bump: the old
/// buffer stays shared until a later write replaces it, so snapshots never
/// copy pixels eagerly.
///
/// Revisions form a stack. The bottom `applied` revisions are reflected in
/// the current tiles; the revisions above them were rolled back and can be
/// rolled forward in reverse order. Capturing a new memento discards that
/// redo branch.
#[derive(Debug)]
pub struct TileStore {
    id: StoreId,
    tile_size: u32,
    tiles: BTreeMap<TileCoord, TileRef>,
    generation: u64,
    revisions: Vec<Revision>,
    applied: usize,
    next_revision: u64,
}

impl Default for TileStore {
    fn default() -> Self {
        Self::new(TILE_SIZE)
    }
}

impl TileStore {
    /// Creates an empty store with the given tile edge length.
    ///
    /// # Panics
    ///
    /// Panics if `tile_size` is zero.
    #[must_use]
    pub fn new(tile_size: u32) -> Self {
        assert!(tile_size > 0, "tile size must be non-zero");
        Self {
            id: StoreId::next(),
            tile_size,
            tiles: BTreeMap::new(),
            generation: 0,
            revisions: Vec::new(),
            applied: 0,
            next_revision: 1,
        }
    }

    /// Wraps the store for sharing with transactions.
    #[must_use]
    pub fn into_shared(self) -> SharedTileStore {
        Arc::new(Mutex::new(self))
    }

    /// Returns the identity of this store.
    #[must_use]
    pub fn id(&self) -> StoreId {
        self.id
    }

    /// Returns the tile edge length in pixels.
    #[must_use]
    pub fn tile_size(&self) -> u32 {
        self.tile_size
    }

    /// Returns the generation, bumped on every commit, rollback, and
    /// rollforward.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Returns the number of revisions still held (applied and redoable).
    #[must_use]
    pub fn history_len(&self) -> usize {
        self.revisions.len()
    }

    /// Returns the number of tiles currently present.
    #[must_use]
    pub fn tile_count(&self) -> usize {
        self.tiles.len()
    }

    // -- Reading --

    /// Returns the tile at `coord`; `None` means fully transparent.
    #[must_use]
    pub fn read_tile(&self, coord: TileCoord) -> Option<TileRef> {
        self.tiles.get(&coord).cloned()
    }

    /// Copies the pixels inside `rect` out of the tiles.
    ///
    /// Pixels outside any present tile read as transparent.
    #[must_use]
    pub fn read_pixels(&self, rect: Rect) -> PixelBuffer {
        let (x0, y0, x1, y1) = pixel_bounds(rect);
        let mut out = PixelBuffer::new(rect, span(x0, x1), span(y0, y1));
        for coord in tiles_covering(rect, self.tile_size) {
            let Some(tile) = self.tiles.get(&coord) else {
                continue;
            };
            let (tx0, ty0) = self.tile_origin(coord);
            let area = tile_rect(coord, self.tile_size);
            let (cx0, cy0, cx1, cy1) = pixel_bounds(rect.clamped_to(area));
            for y in cy0..cy1 {
                for x in cx0..cx1 {
                    let p = tile.pixel(span(tx0, x), span(ty0, y));
                    out.set(span(x0, x), span(y0, y), p);
                }
            }
        }
        out
    }

    // -- Writing --

    /// Replaces the tile at `coord` with the producer's output.
    ///
    /// The producer sees the current tile, if any.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoActiveTransaction`] if no revision is open.
    ///
    /// # Panics
    ///
    /// Panics if the producer returns a tile of a different size than the
    /// store's, leaving the store unchanged.
    pub fn write_tile(
        &mut self,
        coord: TileCoord,
        producer: impl FnOnce(Option<&TileBuffer>) -> TileBuffer,
    ) -> Result<(), Error> {
        self.ensure_open()?;
        let current = self.tiles.get(&coord);
        let next = producer(current.map(Arc::as_ref));
        assert_eq!(
            next.size(),
            self.tile_size,
            "producer returned a tile of the wrong size"
        );
        self.revisions[self.applied - 1]
            .saved
            .entry(coord)
            .or_insert_with(|| current.cloned());
        self.tiles.insert(coord, Arc::new(next));
        Ok(())
    }

    /// Returns a mutable view of the tile at `coord`, creating a
    /// transparent one if absent.
    ///
    /// The buffer is cloned only when a memento still shares it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoActiveTransaction`] if no revision is open.
    pub fn tile_mut(&mut self, coord: TileCoord) -> Result<&mut TileBuffer, Error> {
        self.ensure_open()?;
        let current = self.tiles.get(&coord);
        self.revisions[self.applied - 1]
            .saved
            .entry(coord)
            .or_insert_with(|| current.cloned());
        let size = self.tile_size;
        let tile = self
            .tiles
            .entry(coord)
            .or_insert_with(|| Arc::new(TileBuffer::new(size)));
        Ok(Arc::make_mut(tile))
    }

    /// Sets every pixel inside `rect` and returns the tile-aligned rect
    /// that was touched.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoActiveTransaction`] if no revision is open.
    pub fn fill_rect(&mut self, rect: Rect, pixel: Pixel) -> Result<Rect, Error> {
        self.ensure_open()?;
        let mut touched = Rect::ZERO;
        for coord in tiles_covering(rect, self.tile_size) {
            let (tx0, ty0) = self.tile_origin(coord);
            let area = tile_rect(coord, self.tile_size);
            let (cx0, cy0, cx1, cy1) = pixel_bounds(rect.clamped_to(area));
            let tile = self.tile_mut(coord)?;
            for y in cy0..cy1 {
                for x in cx0..cx1 {
                    tile.set_pixel(span(tx0, x), span(ty0, y), pixel);
                }
            }
            touched = touched.union_nonempty(area);
        }
        Ok(touched)
    }

    // -- History --

    /// Captures the current state and opens a new revision.
    ///
    /// Any open revision is sealed and the redo branch is discarded.
    pub fn get_memento(&mut self) -> Memento {
        self.seal();
        self.revisions.truncate(self.applied);

        let id = self.next_revision;
        self.next_revision += 1;
        self.revisions.push(Revision::new(id, self.generation));
        self.applied += 1;

        Memento {
            store: self.id,
            revision: id,
            generation: self.generation,
        }
    }

    /// Returns the memento of the revision currently accepting writes.
    #[must_use]
    pub fn open_memento(&self) -> Option<Memento> {
        let rev = self.top()?;
        rev.open.then_some(Memento {
            store: self.id,
            revision: rev.id,
            generation: rev.generation,
        })
    }

    /// Seals the open revision, if any, and bumps the generation.
    pub fn commit(&mut self) {
        self.seal();
        self.generation += 1;
    }

    /// Returns whether `m` is the revision a rollback would undo.
    #[must_use]
    pub fn can_rollback(&self, m: &Memento) -> bool {
        m.store == self.id && self.top().is_some_and(|r| is_revision(r, m))
    }

    /// Returns whether `m` is the revision a rollforward would redo.
    #[must_use]
    pub fn can_rollforward(&self, m: &Memento) -> bool {
        m.store == self.id
            && self
                .revisions
                .get(self.applied)
                .is_some_and(|r| is_revision(r, m))
    }

    /// Restores the tiles replaced since `m` was captured.
    ///
    /// An open revision is sealed first. Returns the union of the restored
    /// tiles' rectangles.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StaleMemento`] if `m` is not the most recent applied
    /// revision of this store.
    pub fn rollback(&mut self, m: &Memento) -> Result<Rect, Error> {
        if !self.can_rollback(m) {
            return Err(Error::StaleMemento {
                revision: m.revision,
            });
        }
        let size = self.tile_size;
        let rev = &mut self.revisions[self.applied - 1];
        rev.open = false;
        rev.redo.clear();

        let mut rect = Rect::ZERO;
        for (&coord, old) in &rev.saved {
            let current = restore(&mut self.tiles, coord, old.clone());
            rev.redo.insert(coord, current);
            rect = rect.union_nonempty(tile_rect(coord, size));
        }

        self.applied -= 1;
        self.generation += 1;
        Ok(rect)
    }

    /// Re-applies the tiles a matching [`rollback`](Self::rollback) restored.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StaleMemento`] if `m` is not the most recently rolled
    /// back revision of this store.
    pub fn rollforward(&mut self, m: &Memento) -> Result<Rect, Error> {
        if !self.can_rollforward(m) {
            return Err(Error::StaleMemento {
                revision: m.revision,
            });
        }
        let size = self.tile_size;
        let rev = &mut self.revisions[self.applied];

        let mut rect = Rect::ZERO;
        for (coord, tile) in core::mem::take(&mut rev.redo) {
            restore(&mut self.tiles, coord, tile);
            rect = rect.union_nonempty(tile_rect(coord, size));
        }

        self.applied += 1;
        self.generation += 1;
        Ok(rect)
    }

    /// Releases the history held for `m`.
    ///
    /// Calling it again, or with a memento of another store, does nothing.
    ///
    /// - An applied revision is folded into the one below it, which keeps
    ///   only the saved tiles that revision does not already hold. The
    ///   bottom revision's saved tiles are released outright.
    /// - A rolled-back revision can no longer be rolled forward, and neither
    ///   can any revision rolled back before it, so the redo branch is cut
    ///   at that point.
    pub fn purge_history(&mut self, m: &Memento) {
        if m.store != self.id {
            return;
        }
        let Some(i) = self.revisions.iter().position(|r| is_revision(r, m)) else {
            return;
        };

        if i >= self.applied {
            self.revisions.truncate(i);
            return;
        }

        let rev = self.revisions.remove(i);
        self.applied -= 1;
        if let Some(below) = i.checked_sub(1).map(|b| &mut self.revisions[b]) {
            for (coord, old) in rev.saved {
                below.saved.entry(coord).or_insert(old);
            }
        }
    }

    // -- Internal helpers --

    fn top(&self) -> Option<&Revision> {
        self.applied.checked_sub(1).map(|i| &self.revisions[i])
    }

    fn seal(&mut self) {
        if let Some(i) = self.applied.checked_sub(1) {
            self.revisions[i].open = false;
        }
    }

    fn ensure_open(&self) -> Result<(), Error> {
        let open = self.top().is_some_and(|r| r.open);
        debug_assert!(open, "tile write without an active transaction");
        if open {
            Ok(())
        } else {
            Err(Error::NoActiveTransaction)
        }
    }

    fn tile_origin(&self, coord: TileCoord) -> (i64, i64) {
        let s = i64::from(self.tile_size);
        (i64::from(coord.x) * s, i64::from(coord.y) * s)
    }
}

fn is_revision(rev: &Revision, m: &Memento) -> bool {
    rev.id == m.revision && rev.generation == m.generation
}

/// Puts `tile` at `coord` (removing it for `None`) and returns what was there.
fn restore(
    tiles: &mut BTreeMap<TileCoord, TileRef>,
    coord: TileCoord,
    tile: Option<TileRef>,
) -> Option<TileRef> {
    match tile {
        Some(t) => tiles.insert(coord, t),
        None => tiles.remove(&coord),
    }
}

/// Integral pixel bounds of a rect, as half-open ranges.
#[expect(
    clippy::cast_possible_truncation,
    reason = "pixel rects hold integral coordinates well inside i64"
)]
fn pixel_bounds(rect: Rect) -> (i64, i64, i64, i64) {
    if rect.is_empty_area() {
        return (0, 0, 0, 0);
    }
    (
        rect.x0.floor() as i64,
        rect.y0.floor() as i64,
        rect.x1.ceil() as i64,
        rect.y1.ceil() as i64,
    )
}

/// Distance from `from` to `to`, for coordinates known to be ordered and
/// close together.
#[expect(
    clippy::cast_possible_truncation,
    reason = "distances are bounded by a document or tile edge"
)]
fn span(from: i64, to: i64) -> u32 {
    (to - from).max(0) as u32
}
