// Copyright 2026 the Palimpsest Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tile buffers, tile coordinates, and pixel read-back.

use std::sync::Arc;

use kurbo::Rect;

use crate::rect::RectExt;

/// Default tile edge length, in pixels.
pub const TILE_SIZE: u32 = 64;

/// One premultiplied RGBA8 pixel.
pub type Pixel = [u8; 4];

/// Fully transparent pixel; the value of every pixel in an absent tile.
pub const TRANSPARENT: Pixel = [0; 4];

/// A square block of pixels.
///
/// Buffers are shared through [`TileRef`]. Once a buffer is published to a
/// [`TileStore`](super::TileStore) it is only ever mutated through
/// [`Arc::make_mut`], which clones it first if a memento still holds it.
#[derive(Clone, PartialEq, Eq)]
pub struct TileBuffer {
    size: u32,
    pixels: Box<[Pixel]>,
}

/// A shared, reference-counted tile.
pub type TileRef = Arc<TileBuffer>;

impl TileBuffer {
    /// Creates a fully transparent tile of `size × size` pixels.
    #[must_use]
    pub fn new(size: u32) -> Self {
        Self::filled(size, TRANSPARENT)
    }

    /// Creates a tile with every pixel set to `pixel`.
    #[must_use]
    pub fn filled(size: u32, pixel: Pixel) -> Self {
        let n = size as usize * size as usize;
        Self {
            size,
            pixels: vec![pixel; n].into_boxed_slice(),
        }
    }

    /// Returns the edge length in pixels.
    #[must_use]
    pub fn size(&self) -> u32 {
        self.size
    }

    /// Returns the pixel at tile-local `(x, y)`.
    ///
    /// # Panics
    ///
    /// Panics if the coordinate lies outside the tile.
    #[must_use]
    pub fn pixel(&self, x: u32, y: u32) -> Pixel {
        self.pixels[self.offset(x, y)]
    }

    /// Sets the pixel at tile-local `(x, y)`.
    ///
    /// # Panics
    ///
    /// Panics if the coordinate lies outside the tile.
    pub fn set_pixel(&mut self, x: u32, y: u32, pixel: Pixel) {
        let i = self.offset(x, y);
        self.pixels[i] = pixel;
    }

    /// Sets every pixel.
    pub fn fill(&mut self, pixel: Pixel) {
        self.pixels.fill(pixel);
    }

    /// Returns the raw pixel slice, row-major.
    #[must_use]
    pub fn pixels(&self) -> &[Pixel] {
        &self.pixels
    }

    fn offset(&self, x: u32, y: u32) -> usize {
        assert!(
            x < self.size && y < self.size,
            "pixel ({x}, {y}) outside {0}x{0} tile",
            self.size
        );
        y as usize * self.size as usize + x as usize
    }
}

impl core::fmt::Debug for TileBuffer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TileBuffer")
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}

/// Integer tile address; tile `(x, y)` covers pixels
/// `[x·size, (x+1)·size) × [y·size, (y+1)·size)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TileCoord {
    /// Column.
    pub x: i32,
    /// Row.
    pub y: i32,
}

impl TileCoord {
    /// Creates a tile coordinate.
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Returns the pixel rectangle covered by a tile.
#[must_use]
pub fn tile_rect(coord: TileCoord, size: u32) -> Rect {
    let s = f64::from(size);
    let x0 = f64::from(coord.x) * s;
    let y0 = f64::from(coord.y) * s;
    Rect::new(x0, y0, x0 + s, y0 + s)
}

/// Returns every tile coordinate that intersects `rect`, row by row.
#[must_use]
pub fn tiles_covering(rect: Rect, size: u32) -> Vec<TileCoord> {
    if rect.is_empty_area() {
        return Vec::new();
    }
    let s = f64::from(size);
    #[expect(
        clippy::cast_possible_truncation,
        reason = "pixel coordinates divided by the tile size fit in i32"
    )]
    let (tx0, ty0, tx1, ty1) = (
        (rect.x0 / s).floor() as i32,
        (rect.y0 / s).floor() as i32,
        (rect.x1 / s).ceil() as i32,
        (rect.y1 / s).ceil() as i32,
    );
    let mut out = Vec::new();
    for y in ty0..ty1 {
        for x in tx0..tx1 {
            out.push(TileCoord::new(x, y));
        }
    }
    out
}

/// A copy of the pixels inside a rectangle, assembled from tiles.
///
/// Pixels of absent tiles read as [`TRANSPARENT`].
#[derive(Clone, PartialEq)]
pub struct PixelBuffer {
    rect: Rect,
    width: u32,
    height: u32,
    pixels: Vec<Pixel>,
}

impl PixelBuffer {
    pub(crate) fn new(rect: Rect, width: u32, height: u32) -> Self {
        Self {
            rect,
            width,
            height,
            pixels: vec![TRANSPARENT; width as usize * height as usize],
        }
    }

    pub(crate) fn set(&mut self, x: u32, y: u32, pixel: Pixel) {
        let i = y as usize * self.width as usize + x as usize;
        self.pixels[i] = pixel;
    }

    /// Returns the rectangle the buffer was read from.
    #[must_use]
    pub fn rect(&self) -> Rect {
        self.rect
    }

    /// Returns the width in pixels.
    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Returns the height in pixels.
    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Returns the pixel at buffer-local `(x, y)`, or `None` outside the
    /// buffer.
    #[must_use]
    pub fn get(&self, x: u32, y: u32) -> Option<Pixel> {
        (x < self.width && y < self.height)
            .then(|| self.pixels[y as usize * self.width as usize + x as usize])
    }

    /// Returns the raw pixels, row-major.
    #[must_use]
    pub fn pixels(&self) -> &[Pixel] {
        &self.pixels
    }
}

impl core::fmt::Debug for PixelBuffer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PixelBuffer")
            .field("rect", &self.rect)
            .field("width", &self.width)
            .field("height", &self.height)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tile_rect_covers_one_tile() {
        let r = tile_rect(TileCoord::new(2, 3), 64);
        assert_eq!(r, Rect::new(128.0, 192.0, 192.0, 256.0));
    }

    #[test]
    fn covering_uses_floor_and_ceil() {
        let tiles = tiles_covering(Rect::new(-1.0, 0.0, 65.0, 10.0), 64);
        assert_eq!(
            tiles,
            vec![
                TileCoord::new(-1, 0),
                TileCoord::new(0, 0),
                TileCoord::new(1, 0)
            ]
        );
        assert!(tiles_covering(Rect::ZERO, 64).is_empty());
    }

    #[test]
    fn aligned_rect_does_not_spill() {
        let tiles = tiles_covering(Rect::new(64.0, 64.0, 128.0, 128.0), 64);
        assert_eq!(tiles, vec![TileCoord::new(1, 1)]);
    }

    #[test]
    fn pixel_access() {
        let mut t = TileBuffer::new(4);
        t.set_pixel(1, 2, [9, 8, 7, 6]);
        assert_eq!(t.pixel(1, 2), [9, 8, 7, 6]);
        assert_eq!(t.pixel(2, 1), TRANSPARENT);
    }

    #[test]
    #[should_panic(expected = "outside 4x4 tile")]
    fn out_of_range_pixel_panics() {
        let t = TileBuffer::new(4);
        let _ = t.pixel(4, 0);
    }
}
