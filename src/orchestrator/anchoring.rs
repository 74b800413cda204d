//! Anchoring vision-engine descriptions to on-device line positions.
//!
//! Vision engines describe questions without coordinates. Each description
//! is matched against the on-device lines of the same page by fuzzy text
//! comparison; the matched line fixes where the question starts. Questions
//! that match nothing are given an even virtual slice of the page.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::boundary::ColumnLines;
use crate::models::{OptionLabel, PatternKind, QuestionStart, Rect, TextLine};
use crate::utils::{char_prefix, common_prefix_len, matching_key};
use crate::vision::VisionQuestion;

/// Leading question number (`12.`, `12)`, `Soru 12`).
static NUMBER_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(?:soru\s*[:.\-]?\s*\d{1,3}|\d{1,3}\s*[.)])\s*").unwrap()
});

/// Leading option label (`A)`, `(B)`, `c)`).
static OPTION_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*\(?[A-Ea-e]\s*[).:]\s*").unwrap());

/// Fuzzy matching thresholds. These are heuristics and should be
/// recalibrated against labeled pages.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnchoringConfig {
    /// Characters of normalized prefix that must be contained in the other
    /// text for a strong match.
    pub min_containment_chars: usize,
    /// Common-prefix length accepted as a weak match.
    pub min_common_prefix: usize,
    /// Longest prefix compared for containment.
    pub max_key_chars: usize,
}

impl Default for AnchoringConfig {
    fn default() -> Self {
        Self {
            min_containment_chars: 15,
            min_common_prefix: 5,
            max_key_chars: 40,
        }
    }
}

/// Where a described question was found on the page.
#[derive(Debug, Clone, PartialEq)]
pub struct Anchor {
    pub line: TextLine,
    /// Set when the stem matched nothing and an option line was used.
    pub via_option: Option<OptionLabel>,
}

/// Matching key of a recognized line with its number or label marker removed.
fn line_key(text: &str) -> String {
    let stripped = NUMBER_MARKER
        .find(text)
        .or_else(|| OPTION_MARKER.find(text))
        .map(|m| &text[m.end()..])
        .unwrap_or(text);
    matching_key(stripped)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Strength {
    Weak(usize),
    Strong,
}

fn match_strength(query: &str, candidate: &str, config: &AnchoringConfig) -> Option<Strength> {
    if query.is_empty() || candidate.is_empty() {
        return None;
    }
    let k = query
        .chars()
        .count()
        .min(candidate.chars().count())
        .min(config.max_key_chars);
    if k >= config.min_containment_chars {
        let q = char_prefix(query, k);
        let c = char_prefix(candidate, k);
        if candidate.contains(q) || query.contains(c) {
            return Some(Strength::Strong);
        }
    }
    let common = common_prefix_len(query, candidate);
    (common >= config.min_common_prefix).then_some(Strength::Weak(common))
}

/// Best unused line for `text`: the first strong match in reading order,
/// else the longest weak match.
fn find_line(text: &str, keys: &[String], used: &[bool], config: &AnchoringConfig) -> Option<usize> {
    let query = matching_key(text);
    let mut best: Option<(Strength, usize)> = None;
    for (i, key) in keys.iter().enumerate() {
        if used[i] {
            continue;
        }
        let Some(strength) = match_strength(&query, key, config) else {
            continue;
        };
        if strength == Strength::Strong {
            return Some(i);
        }
        if best.map_or(true, |(b, _)| strength > b) {
            best = Some((strength, i));
        }
    }
    best.map(|(_, i)| i)
}

/// Anchor each described question to an on-device line.
///
/// The stem text is tried first, then each option text. A line anchors at
/// most one question.
pub fn anchor_questions(
    questions: &[VisionQuestion],
    lines: &[TextLine],
    config: &AnchoringConfig,
) -> Vec<Option<Anchor>> {
    let keys: Vec<String> = lines.iter().map(|l| line_key(&l.text)).collect();
    let mut used = vec![false; lines.len()];

    questions
        .iter()
        .map(|q| {
            let by_stem = find_line(&q.text, &keys, &used, config).map(|i| (i, None));
            let found = by_stem.or_else(|| {
                q.labeled_options().iter().find_map(|(label, text)| {
                    find_line(text, &keys, &used, config).map(|i| (i, Some(*label)))
                })
            });
            match found {
                Some((i, via_option)) => {
                    used[i] = true;
                    debug!(
                        "Question {} anchored to line {} '{}'{}",
                        q.number,
                        i,
                        lines[i].text,
                        via_option
                            .map(|l| format!(" via option {}", l.as_char()))
                            .unwrap_or_default()
                    );
                    Some(Anchor {
                        line: lines[i].clone(),
                        via_option,
                    })
                }
                None => {
                    debug!("Question {} could not be anchored", q.number);
                    None
                }
            }
        })
        .collect()
}

struct Header {
    question: usize,
    column: usize,
    y: i32,
}

/// Header position for each question: the anchor line top, or an even
/// slice of the region for unanchored questions. An option anchor sits
/// below the stem, so its header is raised by two line heights.
fn header_positions(anchors: &[Option<Anchor>], region: Rect) -> Vec<(Option<i32>, i32)> {
    let n = anchors.len().max(1) as i64;
    anchors
        .iter()
        .enumerate()
        .map(|(i, anchor)| match anchor {
            Some(a) => {
                let line = &a.line.bounding_box;
                let y = match a.via_option {
                    Some(_) => line.top - 2 * line.height(),
                    None => line.top,
                };
                (Some(line.left), y.clamp(region.top, (region.bottom - 1).max(region.top)))
            }
            None => (None, region.top + (region.height() as i64 * i as i64 / n) as i32),
        })
        .collect()
}

/// Build per-column synthesized lines for the described questions.
///
/// Two columns are used when any anchored header lies in the right half of
/// the region. Unanchored questions follow the column of the preceding
/// anchored one. Within a column, each question's slice runs from its header
/// to the next header (or the region bottom) and is split into a two-unit
/// stem line plus one unit per option.
pub fn build_columns(questions: &[VisionQuestion], anchors: &[Option<Anchor>], region: Rect) -> Vec<ColumnLines> {
    let positions = header_positions(anchors, region);
    let mid = region.left + region.width() / 2;
    let two_columns = positions.iter().any(|(x, _)| x.is_some_and(|x| x >= mid));

    let mut last_column = 0;
    let headers: Vec<Header> = positions
        .iter()
        .enumerate()
        .map(|(i, (x, y))| {
            let column = match x {
                Some(x) if two_columns => usize::from(*x >= mid),
                Some(_) => 0,
                None => last_column,
            };
            last_column = column;
            Header { question: i, column, y: *y }
        })
        .collect();

    let column_regions = if two_columns {
        vec![
            Rect::new(region.left, region.top, mid, region.bottom),
            Rect::new(mid, region.top, region.right, region.bottom),
        ]
    } else {
        vec![region]
    };

    column_regions
        .into_iter()
        .enumerate()
        .filter_map(|(column_index, column_region)| {
            let mut in_column: Vec<&Header> =
                headers.iter().filter(|h| h.column == column_index).collect();
            if in_column.is_empty() {
                return None;
            }
            in_column.sort_by_key(|h| (h.y, h.question));
            Some(synthesize_column(questions, &in_column, column_index, column_region))
        })
        .collect()
}

fn synthesize_column(
    questions: &[VisionQuestion],
    headers: &[&Header],
    column_index: usize,
    region: Rect,
) -> ColumnLines {
    let mut lines: Vec<TextLine> = Vec::new();
    let mut starts: Vec<QuestionStart> = Vec::new();

    for (j, header) in headers.iter().enumerate() {
        let question = &questions[header.question];
        let top = header.y;
        let bottom = headers
            .get(j + 1)
            .map(|next| next.y)
            .unwrap_or(region.bottom)
            .max(top + 1);
        let options = question.labeled_options();
        let units = 2 + options.len() as i64;
        let span = (bottom - top) as i64;
        let edge = |u: i64| top + (span * u / units) as i32;
        let make_box = |from: i64, to: i64| {
            let y0 = edge(from);
            Rect::new(region.left, y0, region.right, edge(to).max(y0 + 1))
        };
        let confidence = question.confidence;

        let stem = TextLine::new(
            format!("{}. {}", question.number, flatten(&question.text)),
            make_box(0, 2),
            confidence,
            lines.len(),
        );
        starts.push(QuestionStart {
            line_index: stem.index,
            question_number: question.number,
            source_line: stem.clone(),
            pattern: PatternKind::External,
        });
        lines.push(stem);

        for (k, (label, text)) in options.iter().enumerate() {
            let unit = 2 + k as i64;
            lines.push(TextLine::new(
                format!("{}) {}", label.as_char(), flatten(text)),
                make_box(unit, unit + 1),
                confidence,
                lines.len(),
            ));
        }
    }

    ColumnLines {
        column_index,
        region,
        lines,
        anchored_starts: Some(starts),
    }
}

fn flatten(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn question(number: u32, text: &str, options: &[(&str, &str)]) -> VisionQuestion {
        VisionQuestion {
            number,
            text: text.to_string(),
            options: options
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<BTreeMap<_, _>>(),
            confidence: 0.9,
        }
    }

    fn line(text: &str, left: i32, top: i32, index: usize) -> TextLine {
        TextLine::new(text, Rect::new(left, top, left + 380, top + 24), 0.8, index)
    }

    const ABCD: [(&str, &str); 4] = [("A", "bir"), ("B", "iki"), ("C", "uc"), ("D", "dort")];

    #[test]
    fn test_strong_anchor_ignores_accents_and_marker() {
        let lines = vec![
            line("Metin", 50, 100, 0),
            line("5. ASAGIDAKILERDEN hangisi dogrudur", 50, 400, 1),
        ];
        let questions = vec![question(5, "Aşağıdakilerden hangisi doğrudur?", &ABCD)];
        let anchors = anchor_questions(&questions, &lines, &AnchoringConfig::default());
        let anchor = anchors[0].as_ref().unwrap();
        assert_eq!(anchor.line.top(), 400);
        assert_eq!(anchor.via_option, None);
    }

    #[test]
    fn test_weak_anchor_needs_common_prefix() {
        let lines = vec![line("Kareko", 50, 100, 0), line("zzz", 50, 200, 1)];
        let config = AnchoringConfig::default();
        let anchors = anchor_questions(&[question(1, "Karekök ifadesi", &[])], &lines, &config);
        assert_eq!(anchors[0].as_ref().unwrap().line.index, 0);
        let none = anchor_questions(&[question(1, "Kar", &[])], &lines, &config);
        assert!(none[0].is_none());
    }

    #[test]
    fn test_line_used_once() {
        let lines = vec![line("1. Bir dik ucgenin alani nasil bulunur", 50, 100, 0)];
        let questions = vec![
            question(1, "Bir dik üçgenin alanı nasıl bulunur", &[]),
            question(2, "Bir dik üçgenin alanı nasıl bulunur", &[]),
        ];
        let anchors = anchor_questions(&questions, &lines, &AnchoringConfig::default());
        assert!(anchors[0].is_some());
        assert!(anchors[1].is_none());
    }

    #[test]
    fn test_option_fallback_anchor() {
        let lines = vec![line("B) Osmanli Devleti kurulmustur", 50, 600, 0)];
        let questions = vec![question(
            4,
            "okunamayan kok",
            &[("A", "Selcuklu Devleti yikilmistir"), ("B", "Osmanlı Devleti kurulmuştur")],
        )];
        let anchors = anchor_questions(&questions, &lines, &AnchoringConfig::default());
        let anchor = anchors[0].as_ref().unwrap();
        assert_eq!(anchor.via_option, Some(OptionLabel::B));

        let columns = build_columns(&questions, &anchors, Rect::new(0, 0, 900, 1400));
        assert_eq!(columns[0].lines[0].top(), 600 - 48);
    }

    #[test]
    fn test_unanchored_questions_slice_region_evenly() {
        let questions = vec![
            question(1, "x", &ABCD),
            question(2, "y", &ABCD),
            question(3, "z", &ABCD),
        ];
        let anchors = vec![None, None, None];
        let columns = build_columns(&questions, &anchors, Rect::new(0, 0, 900, 1400));
        assert_eq!(columns.len(), 1);
        let starts = columns[0].anchored_starts.as_ref().unwrap();
        let tops: Vec<i32> = starts.iter().map(|s| s.source_line.top()).collect();
        assert_eq!(tops, vec![0, 466, 933]);
        assert_eq!(columns[0].lines.len(), 15);
        assert_eq!(columns[0].lines.last().unwrap().bottom(), 1400);
        assert_eq!(columns[0].lines[1].text, "A) bir");
    }

    #[test]
    fn test_right_half_anchor_splits_columns() {
        let lines = vec![
            line("1. Birinci sorunun uzun koku burada", 40, 100, 0),
            line("2. Ikinci sorunun uzun koku burada", 500, 100, 1),
        ];
        let questions = vec![
            question(1, "Birinci sorunun uzun kökü burada", &ABCD),
            question(2, "İkinci sorunun uzun kökü burada", &ABCD),
            question(3, "okunamadi", &ABCD),
        ];
        let anchors = anchor_questions(&questions, &lines, &AnchoringConfig::default());
        let columns = build_columns(&questions, &anchors, Rect::new(0, 0, 900, 1400));
        assert_eq!(columns.len(), 2);
        assert_eq!(columns[0].region, Rect::new(0, 0, 450, 1400));
        assert_eq!(columns[1].region, Rect::new(450, 0, 900, 1400));
        let right: Vec<u32> = columns[1]
            .anchored_starts
            .as_ref()
            .unwrap()
            .iter()
            .map(|s| s.question_number)
            .collect();
        assert_eq!(right, vec![2, 3]);
    }
}
