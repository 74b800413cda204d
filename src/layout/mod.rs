//! Page layout analysis: columns, whitespace gaps and header/footer bands
//! derived from a binarized page image.
//!
//! The analyzer never fails. Any page it cannot process (inconsistent
//! buffer, zero-sized image) yields [`LayoutInfo::empty`], a single column
//! spanning the page with no gaps.

mod binarize;
mod columns;

pub use binarize::{adaptive_threshold_inv, close_horizontal, dilate_horizontal, erode_horizontal};
pub use columns::{
    assign_blocks, detect_columns, estimated_line_height, filter_text_boxes, find_gaps,
    header_footer, occupancy_profile, COLUMN_TOLERANCE_PX,
};

use image::GrayImage;
use imageproc::contours::{find_contours, BorderType};
use imageproc::distance_transform::Norm;
use imageproc::morphology;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::models::{LayoutInfo, PageImage, Rect};

/// Tuning for the binarization stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Adaptive threshold window (forced odd).
    pub block_size: u32,
    /// Constant subtracted from the local mean.
    pub threshold_offset: f64,
    /// Horizontal closing kernel as a share of page width.
    pub close_kernel_ratio: f64,
    /// Chebyshev radius of the final dilation.
    pub dilate_radius: u8,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            block_size: 25,
            threshold_offset: 10.0,
            close_kernel_ratio: 0.06,
            dilate_radius: 1,
        }
    }
}

/// Derives [`LayoutInfo`] from page pixels.
#[derive(Debug, Clone, Default)]
pub struct LayoutAnalyzer {
    config: LayoutConfig,
}

impl LayoutAnalyzer {
    pub fn new(config: LayoutConfig) -> Self {
        Self { config }
    }

    /// Analyze a page, falling back to the empty layout when the image is
    /// unusable.
    pub fn analyze(&self, page: &PageImage) -> LayoutInfo {
        let Some(gray) = page.to_gray() else {
            warn!(
                "Page buffer unusable ({}x{}), using single-column fallback layout",
                page.width(),
                page.height()
            );
            return LayoutInfo::empty(page.width(), page.height());
        };
        self.analyze_gray(&gray, page.dpi())
    }

    /// Analyze an already-grayscale page.
    pub fn analyze_gray(&self, gray: &GrayImage, dpi: u32) -> LayoutInfo {
        let (width, height) = gray.dimensions();
        if width == 0 || height == 0 {
            warn!("Empty page image, using fallback layout");
            return LayoutInfo::empty(width, height);
        }

        let boxes = self.text_boxes(gray);
        let kept = filter_text_boxes(boxes, width, height);
        let columns = detect_columns(&kept, width);
        let blocks = assign_blocks(&kept, &columns, dpi);
        let gaps = find_gaps(&blocks, &columns, dpi);
        let (header_height, footer_start) = header_footer(&kept, height);

        debug!(
            "Layout: {} boxes, {} columns, {} gaps, header={} footer={}",
            kept.len(),
            columns.len(),
            gaps.len(),
            header_height,
            footer_start
        );

        LayoutInfo {
            page_width: width,
            page_height: height,
            column_count: columns.len(),
            columns,
            gaps,
            blocks,
            header_height,
            footer_start,
        }
    }

    /// Bounding boxes of the external contours of the text mask.
    fn text_boxes(&self, gray: &GrayImage) -> Vec<Rect> {
        let block_size = self.config.block_size | 1;
        let binary = adaptive_threshold_inv(gray, block_size, self.config.threshold_offset);

        let kernel = ((gray.width() as f64 * self.config.close_kernel_ratio).round() as u32).max(1);
        let closed = close_horizontal(&binary, kernel);
        let mask = if self.config.dilate_radius > 0 {
            morphology::dilate(&closed, Norm::LInf, self.config.dilate_radius)
        } else {
            closed
        };

        find_contours::<i32>(&mask)
            .into_iter()
            .filter(|c| c.border_type == BorderType::Outer && c.parent.is_none())
            .filter_map(|c| {
                let xs = c.points.iter().map(|p| p.x);
                let ys = c.points.iter().map(|p| p.y);
                let left = xs.clone().min()?;
                let right = xs.max()?;
                let top = ys.clone().min()?;
                let bottom = ys.max()?;
                Some(Rect::new(left, top, right + 1, bottom + 1))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PixelFormat;
    use image::{DynamicImage, Luma};
    use imageproc::drawing::draw_filled_rect_mut;
    use imageproc::rect::Rect as DrawRect;

    fn page_with_bars(width: u32, height: u32, bars: &[(i32, i32, u32, u32)]) -> PageImage {
        let mut gray = GrayImage::from_pixel(width, height, Luma([255]));
        for &(x, y, w, h) in bars {
            draw_filled_rect_mut(&mut gray, DrawRect::at(x, y).of_size(w, h), Luma([0]));
        }
        PageImage::from_dynamic(DynamicImage::ImageLuma8(gray), 150)
    }

    #[test]
    fn test_corrupt_buffer_falls_back_to_full_page() {
        let page = PageImage::from_raw(vec![1, 2, 3], 900, 1400, 150, PixelFormat::Rgb8);
        let layout = LayoutAnalyzer::default().analyze(&page);
        assert_eq!(layout.column_count, 1);
        assert_eq!(layout.columns[0].start_x, 0);
        assert_eq!(layout.columns[0].end_x, 900);
        assert!(layout.gaps.is_empty());
    }

    #[test]
    fn test_two_column_page_from_pixels() {
        let mut bars = Vec::new();
        for i in 0..10 {
            let y = 200 + i * 50;
            bars.push((50, y, 200, 14));
            bars.push((650, y, 200, 14));
        }
        let page = page_with_bars(900, 1400, &bars);
        let layout = LayoutAnalyzer::default().analyze(&page);
        assert_eq!(layout.column_count, 2);
        assert!(layout.columns[0].end_x <= layout.columns[1].start_x);
    }

    #[test]
    fn test_blank_page_is_single_column_without_gaps() {
        let page = page_with_bars(600, 800, &[]);
        let layout = LayoutAnalyzer::default().analyze(&page);
        assert_eq!(layout.column_count, 1);
        assert!(layout.gaps.is_empty());
        assert!(layout.blocks.is_empty());
    }

    #[test]
    fn test_gap_between_text_groups() {
        let bars = [
            (60, 200, 700, 14),
            (60, 230, 700, 14),
            (60, 420, 700, 14),
            (60, 450, 700, 14),
        ];
        let page = page_with_bars(900, 1400, &bars);
        let layout = LayoutAnalyzer::default().analyze(&page);
        assert_eq!(layout.column_count, 1);
        assert!(layout
            .gaps
            .iter()
            .any(|g| g.top_edge() < 260 && g.bottom_edge() > 410));
    }
}
