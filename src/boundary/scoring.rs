//! Confidence scoring, gap snapping and content heuristics for inferred
//! question regions.

use std::sync::LazyLock;

use regex::Regex;

use crate::models::{OptionBlock, PatternKind, TextLine};

static SPACE_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r" {3,}").unwrap());

/// Score contribution of option completeness.
pub fn option_term(block: Option<&OptionBlock>) -> f32 {
    match block.map(|b| b.required_present()).unwrap_or(0) {
        4 => 0.40,
        3 => 0.25,
        2 => 0.15,
        _ => 0.05,
    }
}

/// Mean recognition confidence, 0 for no lines.
pub fn mean_confidence(lines: &[TextLine]) -> f32 {
    if lines.is_empty() {
        return 0.0;
    }
    lines.iter().map(|l| l.confidence).sum::<f32>() / lines.len() as f32
}

/// Boundary confidence: pattern reliability + option completeness + a fifth
/// of the mean recognition confidence, clamped to `[0, 1]`.
pub fn boundary_confidence(pattern: PatternKind, block: Option<&OptionBlock>, lines: &[TextLine]) -> f32 {
    (pattern.reliability() + option_term(block) + 0.2 * mean_confidence(lines)).clamp(0.0, 1.0)
}

/// Snap `value` to the nearest edge within `tolerance` pixels (inclusive).
pub fn snap_edge(value: i32, edges: impl IntoIterator<Item = i32>, tolerance: i32) -> i32 {
    edges
        .into_iter()
        .filter(|e| (e - value).abs() <= tolerance)
        .min_by_key(|e| (e - value).abs())
        .unwrap_or(value)
}

/// Whether consecutive lines leave a vertical gap larger than `threshold`,
/// which usually means a figure sits between them.
pub fn has_image(lines: &[TextLine], threshold: i32) -> bool {
    let mut sorted: Vec<&TextLine> = lines.iter().collect();
    sorted.sort_by_key(|l| l.top());
    sorted
        .windows(2)
        .any(|w| w[1].top() - w[0].bottom() > threshold)
}

/// Table heuristic: pipes on two lines, two tabs, or three wide space runs.
pub fn has_table(lines: &[TextLine]) -> bool {
    let pipe_lines = lines.iter().filter(|l| l.text.contains('|')).count();
    if pipe_lines >= 2 {
        return true;
    }
    let tabs: usize = lines.iter().map(|l| l.text.matches('\t').count()).sum();
    if tabs >= 2 {
        return true;
    }
    let runs: usize = lines
        .iter()
        .map(|l| SPACE_RUN.find_iter(&l.text).count())
        .sum();
    runs >= 3
}
