//! Confidence-weighted merging of two recognizers' lines.

use std::collections::BTreeMap;

use crate::models::TextLine;

/// Merge two line sets by ordinal index, keeping the higher-confidence line
/// of each pair. Lines present in only one set are kept; ties go to
/// `primary`. Output is ordered by index.
pub fn merge_by_confidence(primary: Vec<TextLine>, secondary: Vec<TextLine>) -> Vec<TextLine> {
    let mut merged: BTreeMap<usize, TextLine> = BTreeMap::new();
    for line in primary {
        merged.entry(line.index).or_insert(line);
    }
    for line in secondary {
        match merged.get(&line.index) {
            Some(existing) if existing.confidence >= line.confidence => {}
            _ => {
                merged.insert(line.index, line);
            }
        }
    }
    merged.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Rect;

    fn line(text: &str, index: usize, confidence: f32) -> TextLine {
        let top = 100 + index as i32 * 30;
        TextLine::new(text, Rect::new(0, top, 100, top + 20), confidence, index)
    }

    #[test]
    fn test_higher_confidence_wins_per_index() {
        let merged = merge_by_confidence(
            vec![line("1. Soru", 0, 0.9), line("A) bjr", 1, 0.4)],
            vec![line("1. S0ru", 0, 0.6), line("A) bir", 1, 0.8)],
        );
        let texts: Vec<&str> = merged.iter().map(|l| l.text.as_str()).collect();
        assert_eq!(texts, vec!["1. Soru", "A) bir"]);
    }

    #[test]
    fn test_unmatched_lines_kept_in_index_order() {
        let merged = merge_by_confidence(
            vec![line("a", 0, 0.9)],
            vec![line("c", 2, 0.5), line("b", 1, 0.5)],
        );
        let indices: Vec<usize> = merged.iter().map(|l| l.index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
    }

    #[test]
    fn test_tie_keeps_primary() {
        let merged = merge_by_confidence(vec![line("p", 0, 0.7)], vec![line("s", 0, 0.7)]);
        assert_eq!(merged[0].text, "p");
    }
}
