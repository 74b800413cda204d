//! Pixel-space rectangles shared by every pipeline stage.

use serde::{Deserialize, Serialize};

/// Axis-aligned rectangle in page pixel space.
///
/// `right` and `bottom` are exclusive, so `width()` is `right - left`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Rect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Rect {
    pub const fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    /// Build from an origin and a size.
    pub fn from_xywh(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self::new(x, y, x + width, y + height)
    }

    pub fn width(&self) -> i32 {
        (self.right - self.left).max(0)
    }

    pub fn height(&self) -> i32 {
        (self.bottom - self.top).max(0)
    }

    pub fn area(&self) -> i64 {
        self.width() as i64 * self.height() as i64
    }

    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }

    pub fn center_x(&self) -> i32 {
        self.left + self.width() / 2
    }

    pub fn center_y(&self) -> i32 {
        self.top + self.height() / 2
    }

    /// Smallest rectangle covering both.
    pub fn union(&self, other: &Rect) -> Rect {
        Rect::new(
            self.left.min(other.left),
            self.top.min(other.top),
            self.right.max(other.right),
            self.bottom.max(other.bottom),
        )
    }

    /// Union over an iterator of rectangles, `None` when empty.
    pub fn union_all<'a>(rects: impl IntoIterator<Item = &'a Rect>) -> Option<Rect> {
        rects.into_iter().fold(None, |acc: Option<Rect>, r| {
            Some(match acc {
                Some(a) => a.union(r),
                None => *r,
            })
        })
    }

    pub fn translate(&self, dx: i32, dy: i32) -> Rect {
        Rect::new(self.left + dx, self.top + dy, self.right + dx, self.bottom + dy)
    }

    /// Clamp into `[0, width] x [0, height]`.
    pub fn clamp_to(&self, width: u32, height: u32) -> Rect {
        let w = width as i32;
        let h = height as i32;
        Rect::new(
            self.left.clamp(0, w),
            self.top.clamp(0, h),
            self.right.clamp(0, w),
            self.bottom.clamp(0, h),
        )
    }

    pub fn contains_point(&self, x: i32, y: i32) -> bool {
        x >= self.left && x < self.right && y >= self.top && y < self.bottom
    }

    pub fn intersects(&self, other: &Rect) -> bool {
        self.left < other.right
            && other.left < self.right
            && self.top < other.bottom
            && other.top < self.bottom
    }
}

impl std::fmt::Display for Rect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{},{} -> {},{}]",
            self.left, self.top, self.right, self.bottom
        )
    }
}
