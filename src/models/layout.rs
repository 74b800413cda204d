//! Page layout description produced by the layout analyzer.

use serde::{Deserialize, Serialize};

use super::geometry::Rect;

/// Horizontal extent of one text column. `end_x` is exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnBoundary {
    pub start_x: i32,
    pub end_x: i32,
    pub column_index: usize,
}

impl ColumnBoundary {
    pub fn width(&self) -> i32 {
        (self.end_x - self.start_x).max(0)
    }

    /// Whether `[left, right)` fits inside this column, allowing `tolerance`
    /// pixels of overhang on either side.
    pub fn contains_span(&self, left: i32, right: i32, tolerance: i32) -> bool {
        left >= self.start_x - tolerance && right <= self.end_x + tolerance
    }

    /// The column as a full-height page region.
    pub fn region(&self, page_height: u32) -> Rect {
        Rect::new(self.start_x, 0, self.end_x, page_height as i32)
    }
}

/// Vertical whitespace band between two text blocks of one column.
///
/// `y` is the bottom of the block above; `y + height` is the top of the block
/// below.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HorizontalGap {
    pub y: i32,
    pub height: i32,
    pub column_index: usize,
}

impl HorizontalGap {
    pub fn top_edge(&self) -> i32 {
        self.y
    }

    pub fn bottom_edge(&self) -> i32 {
        self.y + self.height
    }
}

/// Connected text region found by contour extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextBlock {
    pub bounds: Rect,
    pub column_index: usize,
    /// Estimated number of text lines inside the block.
    pub line_count: u32,
}

/// Everything the boundary inferencer needs to know about page geometry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutInfo {
    pub page_width: u32,
    pub page_height: u32,
    pub column_count: usize,
    pub columns: Vec<ColumnBoundary>,
    pub gaps: Vec<HorizontalGap>,
    #[serde(default)]
    pub blocks: Vec<TextBlock>,
    /// Bottom edge of the header band (0 when no header was found).
    pub header_height: i32,
    /// Top edge of the footer band (page height when no footer was found).
    pub footer_start: i32,
}

impl LayoutInfo {
    /// Fallback layout: one column spanning the whole page, no gaps.
    pub fn empty(page_width: u32, page_height: u32) -> Self {
        Self {
            page_width,
            page_height,
            column_count: 1,
            columns: vec![ColumnBoundary {
                start_x: 0,
                end_x: page_width as i32,
                column_index: 0,
            }],
            gaps: Vec::new(),
            blocks: Vec::new(),
            header_height: 0,
            footer_start: page_height as i32,
        }
    }

    pub fn column(&self, column_index: usize) -> Option<&ColumnBoundary> {
        self.columns.iter().find(|c| c.column_index == column_index)
    }

    pub fn gaps_in_column(&self, column_index: usize) -> impl Iterator<Item = &HorizontalGap> {
        self.gaps
            .iter()
            .filter(move |g| g.column_index == column_index)
    }

    /// Whether header/footer extents contradict each other.
    pub fn is_degenerate(&self) -> bool {
        self.footer_start <= self.header_height
    }

    /// Usable vertical extent `(top, bottom)`, substituting the full page
    /// when the header/footer extents are degenerate.
    pub fn content_extent(&self) -> (i32, i32) {
        if self.is_degenerate() {
            (0, self.page_height as i32)
        } else {
            (self.header_height, self.footer_start)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_layout_spans_page() {
        let layout = LayoutInfo::empty(900, 1400);
        assert_eq!(layout.column_count, 1);
        assert_eq!(layout.columns[0].start_x, 0);
        assert_eq!(layout.columns[0].end_x, 900);
        assert!(layout.gaps.is_empty());
        assert_eq!(layout.content_extent(), (0, 1400));
    }

    #[test]
    fn test_degenerate_extent_falls_back_to_page() {
        let mut layout = LayoutInfo::empty(900, 1400);
        layout.header_height = 600;
        layout.footer_start = 500;
        assert!(layout.is_degenerate());
        assert_eq!(layout.content_extent(), (0, 1400));
    }

    #[test]
    fn test_contains_span_tolerance() {
        let col = ColumnBoundary {
            start_x: 100,
            end_x: 400,
            column_index: 0,
        };
        assert!(col.contains_span(85, 410, 20));
        assert!(!col.contains_span(70, 300, 20));
    }
}
