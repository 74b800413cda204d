//! Question-level entities: detected starts, option blocks, boundaries and
//! the assembled question.

use serde::{Deserialize, Serialize};

use super::geometry::Rect;
use super::text_line::TextLine;

/// Which numbering convention produced a question start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternKind {
    /// `1. ...` / `01. ...`
    NumberedDot,
    /// `05. ...` with mandatory leading zero.
    ZeroPadded,
    /// `Soru 3` / `Soru: 3` at the start of a line.
    SoruLabel,
    /// `SORU 3` banner anywhere on the line.
    SoruBanner,
    /// `3) ...`
    NumberedParen,
    /// Start supplied by an external description engine rather than a regex.
    External,
}

impl PatternKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PatternKind::NumberedDot => "numbered_dot",
            PatternKind::ZeroPadded => "zero_padded",
            PatternKind::SoruLabel => "soru_label",
            PatternKind::SoruBanner => "soru_banner",
            PatternKind::NumberedParen => "numbered_paren",
            PatternKind::External => "external",
        }
    }

    /// Contribution of the pattern to the boundary confidence score.
    pub fn reliability(&self) -> f32 {
        match self {
            PatternKind::NumberedDot => 0.40,
            PatternKind::ZeroPadded => 0.35,
            PatternKind::External => 0.35,
            PatternKind::SoruLabel => 0.30,
            PatternKind::SoruBanner => 0.25,
            PatternKind::NumberedParen => 0.20,
        }
    }

    /// Plain numeric markers are the ones statement lists ("I.", "II.")
    /// get misread as.
    pub fn is_bare_number(&self) -> bool {
        matches!(
            self,
            PatternKind::NumberedDot | PatternKind::ZeroPadded | PatternKind::NumberedParen
        )
    }
}

impl std::fmt::Display for PatternKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A line accepted as the beginning of a question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionStart {
    pub line_index: usize,
    pub question_number: u32,
    pub source_line: TextLine,
    pub pattern: PatternKind,
}

/// Answer choice label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum OptionLabel {
    A,
    B,
    C,
    D,
    E,
}

impl OptionLabel {
    pub const REQUIRED: [OptionLabel; 4] =
        [OptionLabel::A, OptionLabel::B, OptionLabel::C, OptionLabel::D];

    pub fn from_char(c: char) -> Option<Self> {
        match c.to_ascii_uppercase() {
            'A' => Some(OptionLabel::A),
            'B' => Some(OptionLabel::B),
            'C' => Some(OptionLabel::C),
            'D' => Some(OptionLabel::D),
            'E' => Some(OptionLabel::E),
            _ => None,
        }
    }

    pub fn as_char(&self) -> char {
        match self {
            OptionLabel::A => 'A',
            OptionLabel::B => 'B',
            OptionLabel::C => 'C',
            OptionLabel::D => 'D',
            OptionLabel::E => 'E',
        }
    }
}

/// One labeled answer choice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionMatch {
    pub label: OptionLabel,
    pub text: String,
    /// Line carrying the label.
    pub source_line: TextLine,
    /// Label line plus any wrapped continuation lines.
    pub bounding_box: Rect,
    /// Index of the last line that contributed to this option.
    pub last_line_index: usize,
}

/// Answer choices collected after a question start.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OptionBlock {
    pub options: Vec<OptionMatch>,
}

impl OptionBlock {
    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }

    pub fn has(&self, label: OptionLabel) -> bool {
        self.options.iter().any(|o| o.label == label)
    }

    /// Number of distinct labels among A-D.
    pub fn required_present(&self) -> usize {
        OptionLabel::REQUIRED
            .iter()
            .filter(|l| self.has(**l))
            .count()
    }

    /// Complete iff A, B, C and D are all present.
    pub fn is_complete(&self) -> bool {
        self.required_present() == OptionLabel::REQUIRED.len()
    }

    /// Bottom edge of the lowest option (including continuation lines).
    pub fn bottom(&self) -> Option<i32> {
        self.options.iter().map(|o| o.bounding_box.bottom).max()
    }

    pub fn last_line_index(&self) -> Option<usize> {
        self.options.iter().map(|o| o.last_line_index).max()
    }
}

/// Inferred region of one question on one page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionBoundaryResult {
    pub question_number: u32,
    pub bounding_box: Rect,
    pub source_lines: Vec<TextLine>,
    pub option_block: Option<OptionBlock>,
    pub confidence: f32,
    pub column_index: usize,
    pub has_image: bool,
    pub has_table: bool,
}

/// School subject inferred from the question body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Subject {
    Mathematics,
    Science,
    Language,
    SocialStudies,
    ForeignLanguage,
    Religion,
    Unknown,
}

impl Subject {
    pub fn as_str(&self) -> &'static str {
        match self {
            Subject::Mathematics => "mathematics",
            Subject::Science => "science",
            Subject::Language => "language",
            Subject::SocialStudies => "social_studies",
            Subject::ForeignLanguage => "foreign_language",
            Subject::Religion => "religion",
            Subject::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for Subject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Region of a single answer choice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionRegion {
    pub label: OptionLabel,
    pub text: String,
    pub bounding_box: Rect,
}

/// A fully assembled question, owned by the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub number: u32,
    pub body: String,
    pub bounding_box: Rect,
    pub options: Vec<OptionRegion>,
    pub confidence: f32,
    pub column_index: usize,
    pub subject: Subject,
    pub has_math_formula: bool,
    pub has_image: bool,
    pub has_table: bool,
}
