// Copyright 2026 the Palimpsest Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Pixel-rectangle helpers on top of [`kurbo::Rect`].
//!
//! All rectangles handled by the walker and the tile store hold integral
//! pixel coordinates stored as `f64`. An empty rectangle is anything with
//! non-positive width or height; helpers normalize empty results to
//! [`Rect::ZERO`] so that unions never drag in a stray origin.

use kurbo::Rect;

/// Extension methods for pixel-space rectangles.
pub trait RectExt: Sized {
    /// Returns `true` if the rectangle covers no pixels.
    fn is_empty_area(&self) -> bool;

    /// Grows the rectangle by `margin` pixels on every side.
    ///
    /// Empty rectangles stay empty.
    #[must_use]
    fn grown_by(self, margin: u32) -> Self;

    /// Intersects with `bounds`, normalizing an empty result to
    /// [`Rect::ZERO`].
    #[must_use]
    fn clamped_to(self, bounds: Self) -> Self;

    /// Union that ignores empty operands.
    #[must_use]
    fn union_nonempty(self, other: Self) -> Self;

    /// Returns `true` if `other` lies entirely inside `self`.
    ///
    /// An empty `other` is contained in everything.
    fn contains_rect(&self, other: &Self) -> bool;
}

impl RectExt for Rect {
    fn is_empty_area(&self) -> bool {
        !(self.x1 > self.x0 && self.y1 > self.y0)
    }

    fn grown_by(self, margin: u32) -> Self {
        if self.is_empty_area() {
            return Self::ZERO;
        }
        let m = f64::from(margin);
        Self::new(self.x0 - m, self.y0 - m, self.x1 + m, self.y1 + m)
    }

    fn clamped_to(self, bounds: Self) -> Self {
        let r = Self::new(
            self.x0.max(bounds.x0),
            self.y0.max(bounds.y0),
            self.x1.min(bounds.x1),
            self.y1.min(bounds.y1),
        );
        if r.is_empty_area() { Self::ZERO } else { r }
    }

    fn union_nonempty(self, other: Self) -> Self {
        match (self.is_empty_area(), other.is_empty_area()) {
            (true, true) => Self::ZERO,
            (true, false) => other,
            (false, true) => self,
            (false, false) => self.union(other),
        }
    }

    fn contains_rect(&self, other: &Self) -> bool {
        other.is_empty_area()
            || (other.x0 >= self.x0
                && other.y0 >= self.y0
                && other.x1 <= self.x1
                && other.y1 <= self.y1)
    }
}

/// Builds a rectangle from an origin and a size, in pixels.
#[must_use]
pub fn pixel_rect(x: i32, y: i32, width: u32, height: u32) -> Rect {
    let x0 = f64::from(x);
    let y0 = f64::from(y);
    Rect::new(x0, y0, x0 + f64::from(width), y0 + f64::from(height))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grow_and_clamp_matches_filter_margin() {
        let r = pixel_rect(0, 0, 4, 4).grown_by(2);
        assert_eq!(r, Rect::new(-2.0, -2.0, 6.0, 6.0));
        let clamped = r.clamped_to(pixel_rect(0, 0, 8, 8));
        assert_eq!(clamped, Rect::new(0.0, 0.0, 6.0, 6.0));
    }

    #[test]
    fn empty_rect_does_not_grow() {
        assert_eq!(Rect::ZERO.grown_by(5), Rect::ZERO);
        let degenerate = Rect::new(3.0, 3.0, 3.0, 9.0);
        assert!(degenerate.is_empty_area());
        assert_eq!(degenerate.grown_by(1), Rect::ZERO);
    }

    #[test]
    fn disjoint_clamp_is_zero() {
        let r = pixel_rect(20, 20, 4, 4).clamped_to(pixel_rect(0, 0, 8, 8));
        assert_eq!(r, Rect::ZERO);
    }

    #[test]
    fn union_ignores_empty_operands() {
        let a = pixel_rect(10, 10, 2, 2);
        assert_eq!(a.union_nonempty(Rect::ZERO), a);
        assert_eq!(Rect::ZERO.union_nonempty(a), a);
        assert_eq!(
            a.union_nonempty(pixel_rect(0, 0, 1, 1)),
            Rect::new(0.0, 0.0, 12.0, 12.0)
        );
    }

    #[test]
    fn containment() {
        let outer = pixel_rect(0, 0, 10, 10);
        assert!(RectExt::contains_rect(&outer, &pixel_rect(2, 2, 3, 3)));
        assert!(RectExt::contains_rect(&outer, &Rect::ZERO));
        assert!(!RectExt::contains_rect(&outer, &pixel_rect(8, 8, 3, 3)));
    }
}
