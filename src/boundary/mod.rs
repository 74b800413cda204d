//! Question boundary inference.
//!
//! Combines the layout of a page with the question starts and option blocks
//! found in each column's lines to produce one region per question.

mod scoring;

pub use scoring::{boundary_confidence, has_image, has_table, mean_confidence, option_term, snap_edge};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::models::{LayoutInfo, QuestionBoundaryResult, QuestionStart, Rect, TextLine};
use crate::patterns::{extract_options, find_question_starts, MatcherConfig};

/// Pixel margins added around each inferred region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Padding {
    pub top: i32,
    pub bottom: i32,
    pub left: i32,
    pub right: i32,
}

impl Default for Padding {
    fn default() -> Self {
        Self {
            top: 10,
            bottom: 10,
            left: 10,
            right: 10,
        }
    }
}

/// Geometry settings for boundary inference.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BoundaryConfig {
    /// Regions shorter than this are discarded.
    pub min_question_height: i32,
    /// Regions taller than this are cut at `top + max_question_height`.
    pub max_question_height: i32,
    pub padding: Padding,
    /// Distance within which a region edge snaps to a whitespace gap.
    pub gap_snap_tolerance: i32,
    /// Vertical gap between lines that marks an embedded figure.
    pub image_gap_threshold: i32,
    /// Source regions narrower than this share of the page are used as the
    /// horizontal extent directly.
    pub region_width_ratio: f64,
}

impl Default for BoundaryConfig {
    fn default() -> Self {
        Self {
            min_question_height: 40,
            max_question_height: 2000,
            padding: Padding::default(),
            gap_snap_tolerance: 30,
            image_gap_threshold: 60,
            region_width_ratio: 0.85,
        }
    }
}

/// Recognized lines of one column.
#[derive(Debug, Clone)]
pub struct ColumnLines {
    pub column_index: usize,
    /// Page region the lines were recognized in.
    pub region: Rect,
    /// Lines in reading order.
    pub lines: Vec<TextLine>,
    /// Starts already known to the caller (anchored vision results); when
    /// absent, starts are detected from the line text.
    pub anchored_starts: Option<Vec<QuestionStart>>,
}

impl ColumnLines {
    pub fn new(column_index: usize, region: Rect, lines: Vec<TextLine>) -> Self {
        Self {
            column_index,
            region,
            lines,
            anchored_starts: None,
        }
    }
}

/// Turns per-column lines plus page layout into question regions.
#[derive(Debug, Clone, Default)]
pub struct BoundaryInferencer {
    config: BoundaryConfig,
    matcher: MatcherConfig,
}

impl BoundaryInferencer {
    pub fn new(config: BoundaryConfig, matcher: MatcherConfig) -> Self {
        Self { config, matcher }
    }

    pub fn config(&self) -> &BoundaryConfig {
        &self.config
    }

    /// Infer regions for every column, ordered by column then top edge.
    pub fn infer(&self, columns: &[ColumnLines], layout: &LayoutInfo) -> Vec<QuestionBoundaryResult> {
        let mut results: Vec<QuestionBoundaryResult> = columns
            .iter()
            .flat_map(|column| self.infer_column(column, layout))
            .collect();
        results.sort_by_key(|r| (r.column_index, r.bounding_box.top));
        results
    }

    fn infer_column(&self, column: &ColumnLines, layout: &LayoutInfo) -> Vec<QuestionBoundaryResult> {
        let lines = &column.lines;
        let starts = match &column.anchored_starts {
            Some(starts) => starts.clone(),
            None => find_question_starts(lines, &self.matcher),
        };
        debug!(
            "Column {}: {} lines, {} question starts",
            column.column_index,
            lines.len(),
            starts.len()
        );

        starts
            .iter()
            .enumerate()
            .filter_map(|(i, start)| {
                let end = starts
                    .get(i + 1)
                    .map(|next| next.line_index)
                    .unwrap_or(lines.len());
                self.infer_question(column, start, end, layout)
            })
            .collect()
    }

    fn infer_question(
        &self,
        column: &ColumnLines,
        start: &QuestionStart,
        end: usize,
        layout: &LayoutInfo,
    ) -> Option<QuestionBoundaryResult> {
        let lines = &column.lines;
        let end = end.min(lines.len());
        if start.line_index >= end {
            return None;
        }
        let (_, content_bottom) = layout.content_extent();
        let next_top = lines.get(end).map(|l| l.top());

        let block = extract_options(lines, start.line_index, end);
        let option_block = (!block.is_empty()).then_some(block);

        // Complete blocks end at their last option; otherwise everything up
        // to the next start that is above the footer belongs to the question.
        let segment: Vec<TextLine> = match option_block.as_ref() {
            Some(b) if b.is_complete() => {
                let last = b.last_line_index().unwrap_or(start.line_index);
                lines[start.line_index..=last.min(end - 1)].to_vec()
            }
            _ => lines[start.line_index..end]
                .iter()
                .enumerate()
                .filter(|(offset, l)| *offset == 0 || l.top() < content_bottom)
                .map(|(_, l)| l.clone())
                .collect(),
        };

        let top = start.source_line.top();
        let bottom = match option_block.as_ref().filter(|b| b.is_complete()) {
            Some(b) => b.bottom().unwrap_or(start.source_line.bottom()),
            None => next_top
                .and_then(|next| {
                    segment
                        .iter()
                        .filter(|l| l.bottom() < next)
                        .map(|l| l.bottom())
                        .max()
                })
                .or_else(|| segment.last().map(|l| l.bottom()))
                .unwrap_or(start.source_line.bottom()),
        };

        let gap_edges: Vec<i32> = layout
            .gaps_in_column(column.column_index)
            .flat_map(|g| [g.top_edge(), g.bottom_edge()])
            .collect();
        let tolerance = self.config.gap_snap_tolerance;
        let top = snap_edge(top, gap_edges.iter().copied().filter(|&e| e <= top), tolerance);
        let bottom = snap_edge(
            bottom,
            gap_edges.iter().copied().filter(|&e| e >= bottom),
            tolerance,
        );

        let page_h = layout.page_height as i32;
        let pad = self.config.padding;
        let top = (top - pad.top.max(0)).clamp(0, page_h);
        let mut bottom = (bottom + pad.bottom.max(0)).clamp(0, page_h);
        if bottom - top > self.config.max_question_height {
            bottom = top + self.config.max_question_height;
        }
        if bottom - top < self.config.min_question_height {
            debug!(
                "Question {} discarded: height {} below minimum",
                start.question_number,
                bottom - top
            );
            return None;
        }

        let (left, right) = self.horizontal_extent(column, &segment, layout);
        let bounding_box = Rect::new(left, top, right, bottom).clamp_to(layout.page_width, layout.page_height);
        if bounding_box.is_empty() {
            return None;
        }

        let option_line_indices: Vec<usize> = option_block
            .as_ref()
            .map(|b| b.options.iter().map(|o| o.source_line.index).collect())
            .unwrap_or_default();
        let stem_lines: Vec<TextLine> = segment
            .iter()
            .filter(|l| !option_line_indices.contains(&l.index))
            .cloned()
            .collect();

        let confidence = boundary_confidence(start.pattern, option_block.as_ref(), &segment);
        Some(QuestionBoundaryResult {
            question_number: start.question_number,
            bounding_box,
            has_image: has_image(&segment, self.config.image_gap_threshold),
            has_table: has_table(&stem_lines),
            source_lines: segment,
            option_block,
            confidence,
            column_index: column.column_index,
        })
    }

    /// Left/right edges: the source region when the caller already split the
    /// page, else the padded column boundary.
    fn horizontal_extent(&self, column: &ColumnLines, segment: &[TextLine], layout: &LayoutInfo) -> (i32, i32) {
        let page_w = layout.page_width as i32;
        let narrow = (column.region.width() as f64) < self.config.region_width_ratio * page_w as f64;
        if narrow && !column.region.is_empty() {
            return (column.region.left.clamp(0, page_w), column.region.right.clamp(0, page_w));
        }

        let pad = self.config.padding;
        let (left, right) = match layout.column(column.column_index) {
            Some(c) => (c.start_x, c.end_x),
            None => Rect::union_all(segment.iter().map(|l| &l.bounding_box))
                .map(|r| (r.left, r.right))
                .unwrap_or((0, page_w)),
        };
        (
            (left - pad.left.max(0)).clamp(0, page_w),
            (right + pad.right.max(0)).clamp(0, page_w),
        )
    }
}
