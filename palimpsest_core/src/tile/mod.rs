// Copyright 2026 the Palimpsest Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tiled pixel storage and its undo history.
//!
//! Pixel data of a layer or mask lives in a [`TileStore`]: a sparse map from
//! [`TileCoord`] to shared, immutable-once-published [`TileBuffer`]s. An
//! absent tile is fully transparent.
//!
//! Undo works on tile identity rather than pixels. A [`Memento`] names a
//! revision of the store; the revision remembers which [`TileRef`] each
//! written coordinate held before, and rolling back swaps those references
//! back in. A snapshot therefore costs one reference-count bump per touched
//! tile, and [`TileStore::tile_mut`] only copies a buffer when a memento
//! still shares it.

mod buffer;
mod memento;
mod store;

pub use buffer::{
    Pixel, PixelBuffer, TILE_SIZE, TRANSPARENT, TileBuffer, TileCoord, TileRef, tile_rect,
    tiles_covering,
};
pub use memento::{Memento, StoreId};
pub use store::{SharedTileStore, TileStore};
