//! Pixel geometry for caption layout.
//!
//! Coordinates are absolute output-frame pixels: `(0, 0)` is the top-left
//! corner, x grows right and y grows down.

use serde::{Deserialize, Serialize};

/// Frame dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameSize {
    pub width: u32,
    pub height: u32,
}

impl FrameSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// The rectangle covering the whole frame.
    pub fn bounds(&self) -> Rect {
        Rect::new(0, 0, self.width, self.height)
    }
}

/// An axis-aligned rectangle in frame pixels.
///
/// Edges are half-open: a rectangle covers `x..x + w` and `y..y + h`, so two
/// rectangles that merely touch do not intersect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    /// Left edge.
    pub x: i32,
    /// Top edge.
    pub y: i32,
    /// Width.
    pub w: u32,
    /// Height.
    pub h: u32,
}

impl Rect {
    pub fn new(x: i32, y: i32, w: u32, h: u32) -> Self {
        Self { x, y, w, h }
    }

    /// Right edge (exclusive).
    pub fn right(&self) -> i64 {
        self.x as i64 + self.w as i64
    }

    /// Bottom edge (exclusive).
    pub fn bottom(&self) -> i64 {
        self.y as i64 + self.h as i64
    }

    pub fn is_empty(&self) -> bool {
        self.w == 0 || self.h == 0
    }

    /// Whether the two rectangles share at least one pixel.
    pub fn intersects(&self, other: &Rect) -> bool {
        if self.is_empty() || other.is_empty() {
            return false;
        }
        (self.x as i64) < other.right()
            && (other.x as i64) < self.right()
            && (self.y as i64) < other.bottom()
            && (other.y as i64) < self.bottom()
    }

    /// Smallest rectangle containing both.
    pub fn union(&self, other: &Rect) -> Rect {
        if self.is_empty() {
            return *other;
        }
        if other.is_empty() {
            return *self;
        }
        let left = (self.x as i64).min(other.x as i64);
        let top = (self.y as i64).min(other.y as i64);
        let right = self.right().max(other.right());
        let bottom = self.bottom().max(other.bottom());
        Rect::new(
            left as i32,
            top as i32,
            (right - left) as u32,
            (bottom - top) as u32,
        )
    }

    /// Grow the rectangle by `left`/`top`/`right`/`bottom` pixels, saturating
    /// at the coordinate limits.
    pub fn expand(&self, left: u32, top: u32, right: u32, bottom: u32) -> Rect {
        let x = (self.x as i64 - left as i64).max(i32::MIN as i64);
        let y = (self.y as i64 - top as i64).max(i32::MIN as i64);
        Rect::new(
            x as i32,
            y as i32,
            self.w.saturating_add(left).saturating_add(right),
            self.h.saturating_add(top).saturating_add(bottom),
        )
    }

    /// Whether `other` lies completely inside this rectangle.
    pub fn contains_rect(&self, other: &Rect) -> bool {
        other.x as i64 >= self.x as i64
            && other.y as i64 >= self.y as i64
            && other.right() <= self.right()
            && other.bottom() <= self.bottom()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_touching_rects_do_not_intersect() {
        let a = Rect::new(0, 0, 10, 10);
        let b = Rect::new(10, 0, 10, 10);
        let c = Rect::new(9, 9, 5, 5);
        assert!(!a.intersects(&b));
        assert!(a.intersects(&c));
        assert!(c.intersects(&a));
    }

    #[test]
    fn test_empty_rect_never_intersects() {
        let a = Rect::new(0, 0, 10, 10);
        let empty = Rect::new(5, 5, 0, 3);
        assert!(!a.intersects(&empty));
        assert_eq!(a.union(&empty), a);
    }

    #[test]
    fn test_union_and_expand() {
        let a = Rect::new(0, 0, 10, 10);
        let b = Rect::new(20, -5, 5, 5);
        assert_eq!(a.union(&b), Rect::new(0, -5, 25, 15));
        assert_eq!(a.expand(2, 3, 4, 5), Rect::new(-2, -3, 16, 18));
    }

    #[test]
    fn test_expand_saturates() {
        let a = Rect::new(-10, 0, 10, 10);
        let grown = a.expand(u32::MAX, 0, u32::MAX, 0);
        assert_eq!(grown.x, i32::MIN);
        assert_eq!(grown.w, u32::MAX);
        assert_eq!(grown.h, 10);
    }

    #[test]
    fn test_frame_bounds_contains() {
        let frame = FrameSize::new(1920, 1080);
        assert!(frame.bounds().contains_rect(&Rect::new(100, 100, 200, 50)));
        assert!(!frame.bounds().contains_rect(&Rect::new(1900, 100, 200, 50)));
    }
}
