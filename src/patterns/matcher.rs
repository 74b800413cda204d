//! Question-start detection over recognized lines.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::models::{PatternKind, QuestionStart, TextLine};
use crate::utils::turkish_lowercase;

/// A numbering convention: regex with the number in group 1, the pattern it
/// reports, and the accepted number range.
struct StartPattern {
    regex: Regex,
    kind: PatternKind,
    max_number: u32,
}

/// Numbering conventions in priority order; the first match wins.
static START_PATTERNS: LazyLock<Vec<StartPattern>> = LazyLock::new(|| {
    vec![
        // 1. / 01. / 112.
        StartPattern {
            regex: Regex::new(r"^\s*(1[0-4][0-9]|150|0?[1-9][0-9]?)\.\s+\S").unwrap(),
            kind: PatternKind::NumberedDot,
            max_number: 150,
        },
        // 07. with nothing readable after it
        StartPattern {
            regex: Regex::new(r"^\s*(0\d)\.\s+").unwrap(),
            kind: PatternKind::ZeroPadded,
            max_number: 99,
        },
        // Soru 4 / Soru: 4 / soru-4
        StartPattern {
            regex: Regex::new(r"(?i)^\s*soru\s*[:.\-]?\s*(\d{1,3})\b").unwrap(),
            kind: PatternKind::SoruLabel,
            max_number: 150,
        },
        // SORU 4 banner, anywhere on the line
        StartPattern {
            regex: Regex::new(r"\bSORU\s*[:.\-]?\s*(\d{1,3})\b").unwrap(),
            kind: PatternKind::SoruBanner,
            max_number: 150,
        },
        // 4) ...
        StartPattern {
            regex: Regex::new(r"^\s*(1[0-4][0-9]|150|0?[1-9][0-9]?)\)\s+\S").unwrap(),
            kind: PatternKind::NumberedParen,
            max_number: 150,
        },
    ]
});

/// Phrases that introduce a list of statements inside a question stem.
const STEM_CUES: &[&str] = &[
    "aşağıdaki",
    "yukarıdaki",
    "verilmiştir",
    "verilen",
    "ifadeler",
    "öncüller",
    "yargılar",
    "bilgiler",
    "durumlar",
    "şunlardır",
    "şöyledir",
];

/// Tuning for sequence validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatcherConfig {
    /// Largest forward jump accepted between consecutive questions.
    pub max_forward_skip: u32,
    /// Largest number a section restart may begin at.
    pub max_restart_number: u32,
    /// Lines inspected before and after a `1.` when checking for statement
    /// lists.
    pub statement_window: usize,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            max_forward_skip: 5,
            max_restart_number: 5,
            statement_window: 3,
        }
    }
}

/// Match a line against the numbering table.
///
/// Returns the question number and the pattern that matched. A pattern whose
/// number falls outside its range does not stop lower-priority patterns from
/// being tried.
pub fn detect_start(text: &str) -> Option<(u32, PatternKind)> {
    START_PATTERNS.iter().find_map(|p| {
        let caps = p.regex.captures(text)?;
        let number: u32 = caps.get(1)?.as_str().parse().ok()?;
        (1..=p.max_number)
            .contains(&number)
            .then_some((number, p.kind))
    })
}

/// Whether a line looks like the start of any question.
pub fn is_question_start(text: &str) -> bool {
    detect_start(text).is_some()
}

/// Find accepted question starts in the lines of one column.
///
/// Candidates must keep the numbering plausible: the first is always taken,
/// later ones must advance by 1 to `max_forward_skip`, or restart a section
/// at a number no larger than `max_restart_number`. Rejected candidates do
/// not move the sequence forward.
pub fn find_question_starts(lines: &[TextLine], config: &MatcherConfig) -> Vec<QuestionStart> {
    let mut starts: Vec<QuestionStart> = Vec::new();
    let mut last_number = 0u32;
    let mut highest_number = 0u32;

    for (i, line) in lines.iter().enumerate() {
        let Some((number, kind)) = detect_start(&line.text) else {
            continue;
        };

        if number == 1
            && kind.is_bare_number()
            && is_statement_item(lines, i, highest_number, config)
        {
            debug!("Line {} '{}' looks like a statement item, skipping", i, line.text);
            continue;
        }

        if !starts.is_empty() && !accepts(last_number, number, config) {
            debug!(
                "Rejecting question {} after {} (line {}): implausible sequence",
                number, last_number, i
            );
            continue;
        }

        last_number = number;
        highest_number = highest_number.max(number);
        starts.push(QuestionStart {
            line_index: i,
            question_number: number,
            source_line: line.clone(),
            pattern: kind,
        });
    }

    starts
}

fn accepts(last: u32, candidate: u32, config: &MatcherConfig) -> bool {
    let delta = candidate as i64 - last as i64;
    if delta > 0 {
        delta <= config.max_forward_skip as i64
    } else if delta < 0 {
        (1..=config.max_restart_number).contains(&candidate)
    } else {
        false
    }
}

/// A `1.` that is really the first item of a Roman-numeral statement list.
fn is_statement_item(
    lines: &[TextLine],
    index: usize,
    highest_number: u32,
    config: &MatcherConfig,
) -> bool {
    if highest_number >= 2 {
        return true;
    }

    let window = config.statement_window;
    let small_numbers_after = lines
        .iter()
        .skip(index + 1)
        .take(window)
        .filter(|l| {
            matches!(
                detect_start(&l.text),
                Some((n, kind)) if (2..=5).contains(&n) && kind.is_bare_number()
            )
        })
        .count();
    if small_numbers_after >= 2 {
        return true;
    }

    let from = index.saturating_sub(window);
    lines[from..index].iter().any(|l| {
        let lower = turkish_lowercase(&l.text);
        STEM_CUES.iter().any(|cue| lower.contains(cue))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Rect;

    fn lines(texts: &[&str]) -> Vec<TextLine> {
        texts
            .iter()
            .enumerate()
            .map(|(i, t)| {
                let top = 100 + i as i32 * 30;
                TextLine::new(*t, Rect::new(50, top, 800, top + 24), 0.95, i)
            })
            .collect()
    }

    fn numbers(starts: &[QuestionStart]) -> Vec<u32> {
        starts.iter().map(|s| s.question_number).collect()
    }

    fn exam(count: u32) -> Vec<String> {
        let mut texts = Vec::new();
        for n in 1..=count {
            texts.push(format!("{}. Soru metni {}", n, n));
            for label in ["A", "B", "C", "D"] {
                texts.push(format!("{}) secenek", label));
            }
        }
        texts
    }

    #[test]
    fn test_pattern_priority() {
        assert_eq!(detect_start("12. Hangisi"), Some((12, PatternKind::NumberedDot)));
        assert_eq!(detect_start("  07. "), Some((7, PatternKind::ZeroPadded)));
        assert_eq!(detect_start("Soru: 14"), Some((14, PatternKind::SoruLabel)));
        assert_eq!(detect_start("soru 3 (10 puan)"), Some((3, PatternKind::SoruLabel)));
        assert_eq!(detect_start("TEST 2 - SORU 9"), Some((9, PatternKind::SoruBanner)));
        assert_eq!(detect_start("4) Buna gore"), Some((4, PatternKind::NumberedParen)));
        assert_eq!(detect_start("145. Son soru"), Some((145, PatternKind::NumberedDot)));
    }

    #[test]
    fn test_non_starts() {
        assert_eq!(detect_start("A) 12"), None);
        assert_eq!(detect_start("1.5 kg un"), None);
        assert_eq!(detect_start("Soru"), None);
        assert_eq!(detect_start("0. sifir"), None);
        assert_eq!(detect_start("151. fazla"), None);
    }

    #[test]
    fn test_monotonic_acceptance() {
        let texts = exam(12);
        let refs: Vec<&str> = texts.iter().map(|s| s.as_str()).collect();
        let starts = find_question_starts(&lines(&refs), &MatcherConfig::default());
        assert_eq!(numbers(&starts), (1..=12).collect::<Vec<_>>());
        assert!(starts.windows(2).all(|w| w[0].line_index < w[1].line_index));
    }

    #[test]
    fn test_noise_jump_rejected() {
        let l = lines(&["3. Soru", "A) x", "9. gurultu", "4. Soru", "A) y"]);
        let starts = find_question_starts(&l, &MatcherConfig::default());
        assert_eq!(numbers(&starts), vec![3, 4]);
    }

    #[test]
    fn test_rejected_candidate_does_not_advance_sequence() {
        let l = lines(&["1. Soru", "20. gurultu", "2. Soru"]);
        let starts = find_question_starts(&l, &MatcherConfig::default());
        assert_eq!(numbers(&starts), vec![1, 2]);
    }

    #[test]
    fn test_section_restart_accepted() {
        let l = lines(&["18. Soru", "19. Soru", "Soru 1", "Soru 2"]);
        let starts = find_question_starts(&l, &MatcherConfig::default());
        assert_eq!(numbers(&starts), vec![18, 19, 1, 2]);
    }

    #[test]
    fn test_large_backward_jump_rejected() {
        let l = lines(&["18. Soru", "12. Soru"]);
        let starts = find_question_starts(&l, &MatcherConfig::default());
        assert_eq!(numbers(&starts), vec![18]);
    }

    #[test]
    fn test_duplicate_number_rejected() {
        let l = lines(&["5. Soru", "5. Soru tekrar"]);
        let starts = find_question_starts(&l, &MatcherConfig::default());
        assert_eq!(numbers(&starts), vec![5]);
    }

    #[test]
    fn test_roman_numeral_one_after_question_two() {
        let l = lines(&["2. Soru koku", "1. birinci ifade", "A) x", "3. Soru"]);
        let starts = find_question_starts(&l, &MatcherConfig::default());
        assert_eq!(numbers(&starts), vec![2, 3]);
    }

    #[test]
    fn test_statement_list_followed_by_small_numbers() {
        let l = lines(&["1. birinci ifade", "2. ikinci ifade", "3. ucuncu ifade"]);
        let starts = find_question_starts(&l, &MatcherConfig::default());
        assert!(starts.iter().all(|s| s.question_number != 1));
    }

    #[test]
    fn test_statement_list_after_stem_cue() {
        let l = lines(&["Aşağıdaki bilgiler verilmiştir.", "1. Su kaynar."]);
        let starts = find_question_starts(&l, &MatcherConfig::default());
        assert!(starts.is_empty());
    }

    #[test]
    fn test_soru_one_not_treated_as_statement() {
        let l = lines(&["7. Soru", "Soru 1"]);
        let starts = find_question_starts(&l, &MatcherConfig::default());
        assert_eq!(numbers(&starts), vec![7, 1]);
    }
}
