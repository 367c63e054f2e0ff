// Copyright 2026 the Palimpsest Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Undoable edits to one tile store.
//!
//! A [`Transaction`] captures a [`Memento`] when it begins and owns the right
//! to undo and redo it. External command stacks hold transactions; dropping
//! one (for example when the command falls off the end of the history)
//! purges its memento.
//!
//! ```text
//!            finish()               undo()
//!   Open ──────────────► Finished ◄────────► Undone
//!     │                                 redo()  ▲
//!     └─────────────────── undo() ──────────────┘
//! ```

use kurbo::Rect;
use parking_lot::MutexGuard;

use crate::error::Error;
use crate::node::NodeId;
use crate::tile::{Memento, Pixel, SharedTileStore, TileBuffer, TileCoord, TileStore};

/// Where a [`Transaction`] is in its life.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TransactionState {
    /// Accepting writes.
    Open,
    /// Committed; the edit is applied.
    Finished,
    /// Rolled back; the edit is not applied.
    Undone,
}

/// One memento bound to one tile store and the node that owns it.
#[derive(Debug)]
pub struct Transaction {
    node: NodeId,
    store: SharedTileStore,
    memento: Memento,
    state: TransactionState,
}

impl Transaction {
    /// Captures a memento on `store` and opens the transaction.
    ///
    /// Any transaction still open on the same store stops accepting writes.
    #[must_use]
    pub fn begin(node: NodeId, store: SharedTileStore) -> Self {
        let memento = store.lock().get_memento();
        Self {
            node,
            store,
            memento,
            state: TransactionState::Open,
        }
    }

    /// Returns the node whose pixels this transaction edits.
    #[must_use]
    pub fn node(&self) -> NodeId {
        self.node
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> TransactionState {
        self.state
    }

    /// Returns the memento captured at [`begin`](Self::begin).
    #[must_use]
    pub fn memento(&self) -> Memento {
        self.memento
    }

    /// Returns the target store.
    #[must_use]
    pub fn store(&self) -> &SharedTileStore {
        &self.store
    }

    /// Replaces a tile with the producer's output.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoActiveTransaction`] unless this transaction is open
    /// and its revision is the one the store is recording.
    pub fn write_tile(
        &mut self,
        coord: TileCoord,
        producer: impl FnOnce(Option<&TileBuffer>) -> TileBuffer,
    ) -> Result<(), Error> {
        self.writable_store()?.write_tile(coord, producer)
    }

    /// Mutates a tile in place, creating it if absent.
    ///
    /// # Errors
    ///
    /// Same as [`write_tile`](Self::write_tile).
    pub fn edit_tile<R>(
        &mut self,
        coord: TileCoord,
        f: impl FnOnce(&mut TileBuffer) -> R,
    ) -> Result<R, Error> {
        let mut store = self.writable_store()?;
        Ok(f(store.tile_mut(coord)?))
    }

    /// Sets every pixel inside `rect`; returns the touched tile-aligned rect.
    ///
    /// # Errors
    ///
    /// Same as [`write_tile`](Self::write_tile).
    pub fn fill_rect(&mut self, rect: Rect, pixel: Pixel) -> Result<Rect, Error> {
        self.writable_store()?.fill_rect(rect, pixel)
    }

    /// Commits the writes. Does nothing unless the transaction is open.
    pub fn finish(&mut self) {
        if self.state == TransactionState::Open {
            self.store.lock().commit();
            self.state = TransactionState::Finished;
        }
    }

    /// Rolls the store back to the memento and returns the restored rect.
    ///
    /// An open transaction is sealed first. Undoing an undone transaction
    /// returns an empty rect.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StaleMemento`] if a later edit of the same store is
    /// still applied.
    pub fn undo(&mut self) -> Result<Rect, Error> {
        if self.state == TransactionState::Undone {
            return Ok(Rect::ZERO);
        }
        let rect = self.store.lock().rollback(&self.memento)?;
        self.state = TransactionState::Undone;
        Ok(rect)
    }

    /// Re-applies an undone transaction and returns the affected rect.
    ///
    /// Command stacks redo every command as it is pushed; that first redo
    /// finds the transaction already applied and returns an empty rect.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StaleMemento`] if the store's redo branch no longer
    /// starts at this transaction.
    pub fn redo(&mut self) -> Result<Rect, Error> {
        if self.state != TransactionState::Undone {
            return Ok(Rect::ZERO);
        }
        let rect = self.store.lock().rollforward(&self.memento)?;
        self.state = TransactionState::Finished;
        Ok(rect)
    }

    /// Locks the store if this transaction's revision is the open one.
    ///
    /// The guard is held across the write, so no other transaction can
    /// begin on the store in between.
    fn writable_store(&self) -> Result<MutexGuard<'_, TileStore>, Error> {
        let store = self.store.lock();
        if self.state == TransactionState::Open && store.open_memento() == Some(self.memento) {
            Ok(store)
        } else {
            Err(Error::NoActiveTransaction)
        }
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        self.store.lock().purge_history(&self.memento);
    }
}
