//! Answer-option extraction following a question start.

use std::ops::ControlFlow;
use std::sync::LazyLock;

use regex::Regex;

use crate::models::{OptionBlock, OptionLabel, OptionMatch, Rect, TextLine};

use super::matcher::is_question_start;

/// Options collected before the scan stops and only an `E)` is looked for.
const MAX_SCANNED_OPTIONS: usize = 4;

/// Option labels: `A)`, `A.`, `A:`, `(A)` and lowercase `a)`.
static LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|\s)\(?(?:([A-E])\s*([).:])|([a-e])(\)))").unwrap()
});

#[derive(Debug, Clone, Copy)]
struct LabelHit {
    label: OptionLabel,
    lowercase: bool,
    delimiter: char,
    /// Byte offset where the label starts (after any leading whitespace).
    start: usize,
    /// Byte offset just past the delimiter.
    end: usize,
}

fn label_hits(text: &str) -> Vec<LabelHit> {
    LABEL
        .captures_iter(text)
        .filter_map(|caps| {
            let (letter, delim) = match (caps.get(1), caps.get(2), caps.get(3), caps.get(4)) {
                (Some(l), Some(d), _, _) | (_, _, Some(l), Some(d)) => (l, d),
                _ => return None,
            };
            let ch = letter.as_str().chars().next()?;
            let whole = caps.get(0)?;
            let start = whole.start() + (whole.as_str().len() - whole.as_str().trim_start().len());
            Some(LabelHit {
                label: OptionLabel::from_char(ch)?,
                lowercase: ch.is_ascii_lowercase(),
                delimiter: delim.as_str().chars().next()?,
                start,
                end: delim.end(),
            })
        })
        .collect()
}

fn next_label(label: OptionLabel) -> Option<OptionLabel> {
    match label {
        OptionLabel::A => Some(OptionLabel::B),
        OptionLabel::B => Some(OptionLabel::C),
        OptionLabel::C => Some(OptionLabel::D),
        OptionLabel::D => Some(OptionLabel::E),
        OptionLabel::E => None,
    }
}

/// Parse the labeled options on one line.
///
/// The first label must open the line. Further labels count as inline
/// options only when they continue the letter sequence with the same
/// delimiter and case; anything else stays part of the option text.
pub fn parse_option_line(line: &TextLine, line_index: usize) -> Vec<OptionMatch> {
    let text = line.text.as_str();
    let hits = label_hits(text);
    let Some(first) = hits.first().copied() else {
        return Vec::new();
    };
    if !text[..first.start].trim().is_empty() {
        return Vec::new();
    }

    let mut chain = vec![first];
    for hit in hits.iter().skip(1) {
        let Some(prev) = chain.last() else { break };
        if Some(hit.label) == next_label(prev.label)
            && hit.delimiter == prev.delimiter
            && hit.lowercase == prev.lowercase
        {
            chain.push(*hit);
        }
    }

    let total_chars = text.chars().count().max(1) as i64;
    let char_offset = |byte: usize| text[..byte].chars().count() as i64;
    let bbox = line.bounding_box;
    let x_at = |byte: usize| bbox.left + (bbox.width() as i64 * char_offset(byte) / total_chars) as i32;

    chain
        .iter()
        .enumerate()
        .map(|(i, hit)| {
            let text_end = chain.get(i + 1).map(|h| h.start).unwrap_or(text.len());
            let (left, right) = if chain.len() == 1 {
                (bbox.left, bbox.right)
            } else {
                let right = if i + 1 == chain.len() { bbox.right } else { x_at(text_end) };
                (x_at(hit.start), right)
            };
            let option_box = Rect::new(left, bbox.top, right.max(left + 1), bbox.bottom);
            OptionMatch {
                label: hit.label,
                text: text[hit.end..text_end].trim().to_string(),
                source_line: line.clone(),
                bounding_box: option_box,
                last_line_index: line_index,
            }
        })
        .collect()
}

#[derive(Debug, Default)]
struct ScanState {
    options: Vec<OptionMatch>,
    /// Index of the last line consumed by the scan.
    last_index: Option<usize>,
}

impl ScanState {
    fn has(&self, label: OptionLabel) -> bool {
        self.options.iter().any(|o| o.label == label)
    }

    fn extend_last(&mut self, line: &TextLine, index: usize) {
        if let Some(last) = self.options.last_mut() {
            let trimmed = line.text.trim();
            if !trimmed.is_empty() {
                if !last.text.is_empty() {
                    last.text.push(' ');
                }
                last.text.push_str(trimmed);
            }
            last.bounding_box = last.bounding_box.union(&line.bounding_box);
            last.last_line_index = index;
        }
    }
}

fn scan_line(
    mut state: ScanState,
    (index, line): (usize, &TextLine),
) -> ControlFlow<ScanState, ScanState> {
    let parsed = parse_option_line(line, index);
    if !parsed.is_empty() {
        if parsed.iter().any(|o| state.has(o.label)) {
            // A repeated label belongs to a question whose start was missed.
            return ControlFlow::Break(state);
        }
        state.options.extend(parsed);
        state.last_index = Some(index);
        if state.options.len() >= MAX_SCANNED_OPTIONS {
            return ControlFlow::Break(state);
        }
        return ControlFlow::Continue(state);
    }

    // Numbered lines before the first label are stem text, such as statement
    // items; `end_index` already bounds the scan at the next accepted start.
    if is_question_start(&line.text) && !state.options.is_empty() {
        return ControlFlow::Break(state);
    }

    if !state.options.is_empty() {
        state.extend_last(line, index);
        state.last_index = Some(index);
    }
    ControlFlow::Continue(state)
}

/// Collect the option block of the question starting at `start_index`.
///
/// Lines in `(start_index, end_index)` are scanned; stem lines before the
/// first label are skipped and unlabeled lines after a label are treated as
/// wrapped continuation text. Once a label has been seen, the scan stops at a
/// new question start or after four options, after which a directly
/// following `E)` line is still taken.
pub fn extract_options(lines: &[TextLine], start_index: usize, end_index: usize) -> OptionBlock {
    let end = end_index.min(lines.len());
    if start_index + 1 >= end {
        return OptionBlock::default();
    }

    let outcome = lines[start_index + 1..end]
        .iter()
        .enumerate()
        .map(|(offset, line)| (start_index + 1 + offset, line))
        .try_fold(ScanState::default(), scan_line);
    let mut state = match outcome {
        ControlFlow::Break(state) | ControlFlow::Continue(state) => state,
    };

    if state.options.len() >= MAX_SCANNED_OPTIONS && !state.has(OptionLabel::E) {
        let peek = state.last_index.map(|i| i + 1).filter(|&i| i < end);
        if let Some(i) = peek {
            let parsed = parse_option_line(&lines[i], i);
            if let [only] = parsed.as_slice() {
                if only.label == OptionLabel::E {
                    state.options.extend(parsed);
                }
            }
        }
    }

    OptionBlock {
        options: state.options,
    }
}
