//! Geometry over extracted text boxes: filtering, column detection, gap
//! detection and header/footer extents.

use tracing::debug;

use crate::models::{ColumnBoundary, HorizontalGap, Rect, TextBlock};

/// Number of vertical slices used for the occupancy profile.
const SLICES: usize = 100;
/// Central band (in slices) searched for a column gutter.
const CENTRAL_BAND: std::ops::Range<usize> = 30..70;
/// Band average must fall below this share of the page average.
const GUTTER_RATIO: f64 = 0.4;
/// Single-column margin on each side, as a share of page width.
const SINGLE_COLUMN_MARGIN: f64 = 0.04;
/// Overhang allowed when assigning a box to a column.
pub const COLUMN_TOLERANCE_PX: i32 = 20;
/// Header and footer bands, as a share of page height.
const HEADER_FOOTER_BAND: f64 = 0.08;

/// Keep only boxes shaped like text blocks.
///
/// Width must lie in `[5%, 98%]` of the page width and height in
/// `[8px, 30%]` of the page height; this drops page borders and specks.
pub fn filter_text_boxes(boxes: Vec<Rect>, page_width: u32, page_height: u32) -> Vec<Rect> {
    let min_w = page_width as f64 * 0.05;
    let max_w = page_width as f64 * 0.98;
    let max_h = page_height as f64 * 0.30;
    boxes
        .into_iter()
        .filter(|b| {
            let w = b.width() as f64;
            let h = b.height() as f64;
            w >= min_w && w <= max_w && h >= 8.0 && h <= max_h
        })
        .collect()
}

fn slice_of(x: i32, page_width: u32) -> usize {
    let x = x.max(0) as i64;
    ((x * SLICES as i64 / page_width.max(1) as i64) as usize).min(SLICES - 1)
}

/// Per-slice count of boxes covering each of the 100 vertical slices.
pub fn occupancy_profile(boxes: &[Rect], page_width: u32) -> [u32; SLICES] {
    let mut occupancy = [0u32; SLICES];
    for b in boxes.iter().filter(|b| !b.is_empty()) {
        let first = slice_of(b.left, page_width);
        let last = slice_of(b.right - 1, page_width);
        for slot in occupancy.iter_mut().take(last + 1).skip(first) {
            *slot += 1;
        }
    }
    occupancy
}

/// Decide between one and two columns from the occupancy profile.
///
/// Two columns are declared when the central band reaches zero occupancy and
/// its mean stays under 40% of the page mean; the split sits on the
/// minimum-occupancy slice of the band closest to the page centre.
pub fn detect_columns(boxes: &[Rect], page_width: u32) -> Vec<ColumnBoundary> {
    let occupancy = occupancy_profile(boxes, page_width);
    let page_avg = occupancy.iter().sum::<u32>() as f64 / SLICES as f64;
    let band = &occupancy[CENTRAL_BAND];
    let band_min = band.iter().copied().min().unwrap_or(0);
    let band_avg = band.iter().sum::<u32>() as f64 / band.len() as f64;

    if page_avg > 0.0 && band_min == 0 && band_avg < GUTTER_RATIO * page_avg {
        let centre = SLICES / 2;
        let gutter = CENTRAL_BAND
            .filter(|&s| occupancy[s] == band_min)
            .min_by_key(|&s| s.abs_diff(centre))
            .unwrap_or(centre);
        let split = ((gutter as f64 + 0.5) * page_width as f64 / SLICES as f64).round() as i32;
        debug!(
            "Two columns detected: gutter slice {} (split at x={}), band avg {:.2} vs page avg {:.2}",
            gutter, split, band_avg, page_avg
        );
        return vec![
            ColumnBoundary {
                start_x: 0,
                end_x: split,
                column_index: 0,
            },
            ColumnBoundary {
                start_x: split,
                end_x: page_width as i32,
                column_index: 1,
            },
        ];
    }

    let margin = (page_width as f64 * SINGLE_COLUMN_MARGIN).round() as i32;
    vec![ColumnBoundary {
        start_x: margin,
        end_x: page_width as i32 - margin,
        column_index: 0,
    }]
}

/// Typical line pitch at the given resolution: 12pt text with 1.2 leading.
pub fn estimated_line_height(dpi: u32) -> f64 {
    (dpi.max(1) as f64 * 12.0 / 72.0 * 1.2).max(1.0)
}

/// Assign each box to the column containing it; boxes that straddle
/// columns are left out.
pub fn assign_blocks(boxes: &[Rect], columns: &[ColumnBoundary], dpi: u32) -> Vec<TextBlock> {
    let line_height = estimated_line_height(dpi);
    boxes
        .iter()
        .filter_map(|b| {
            let column = columns
                .iter()
                .find(|c| c.contains_span(b.left, b.right, COLUMN_TOLERANCE_PX));
            if column.is_none() {
                debug!("Box {} spans columns, skipping", b);
            }
            column.map(|c| TextBlock {
                bounds: *b,
                column_index: c.column_index,
                line_count: ((b.height() as f64 / line_height).round() as u32).max(1),
            })
        })
        .collect()
}

/// Whitespace bands of at least 5% of the DPI between consecutive blocks of
/// each column.
pub fn find_gaps(blocks: &[TextBlock], columns: &[ColumnBoundary], dpi: u32) -> Vec<HorizontalGap> {
    let min_gap = ((dpi as f64 * 0.05).round() as i32).max(1);
    let mut gaps = Vec::new();

    for column in columns {
        let mut in_column: Vec<&Rect> = blocks
            .iter()
            .filter(|b| b.column_index == column.column_index)
            .map(|b| &b.bounds)
            .collect();
        in_column.sort_by_key(|r| (r.top, r.left));

        let Some(first) = in_column.first() else {
            continue;
        };
        let mut running_bottom = first.bottom;
        for block in in_column.iter().skip(1) {
            let height = block.top - running_bottom;
            if height >= min_gap {
                gaps.push(HorizontalGap {
                    y: running_bottom,
                    height,
                    column_index: column.column_index,
                });
            }
            running_bottom = running_bottom.max(block.bottom);
        }
    }
    gaps
}

/// `(header_height, footer_start)` from blocks lying entirely inside the top
/// and bottom 8% bands.
pub fn header_footer(boxes: &[Rect], page_height: u32) -> (i32, i32) {
    let band = page_height as f64 * HEADER_FOOTER_BAND;
    let header_limit = band.round() as i32;
    let footer_limit = (page_height as f64 - band).round() as i32;

    let header = boxes
        .iter()
        .filter(|b| b.bottom <= header_limit)
        .map(|b| b.bottom)
        .max()
        .unwrap_or(0);
    let footer = boxes
        .iter()
        .filter(|b| b.top >= footer_limit)
        .map(|b| b.top)
        .min()
        .unwrap_or(page_height as i32);
    (header, footer)
}
