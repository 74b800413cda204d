//! Final question assembly: confidence filtering, body text, option regions,
//! subject classification and math detection.

use serde::{Deserialize, Serialize};

use crate::models::{OptionRegion, Question, QuestionBoundaryResult, Subject};
use crate::utils::matching_key;

/// Keyword tables in tie-break order. Keywords are matching keys (folded,
/// lowercase, no spaces). Keywords of at least [`MIN_PREFIX_KEYWORD_CHARS`]
/// characters also match inflected words that start with them; shorter ones
/// only match whole words.
const SUBJECT_KEYWORDS: &[(Subject, &[&str])] = &[
    (
        Subject::Mathematics,
        &[
            "sayi", "denklem", "fonksiyon", "ucgen", "kare", "carpim", "toplam", "kesir",
            "oran", "olasilik", "integral", "turev", "aci", "alan", "cevre", "logaritma",
            "polinom", "kume", "esitsizlik", "basamak", "bolen", "katsayi",
        ],
    ),
    (
        Subject::Science,
        &[
            "hucre", "enerji", "kuvvet", "atom", "molekul", "element", "tepkime", "elektrik",
            "isik", "hareket", "canli", "bitki", "hayvan", "dna", "gen", "basinc", "sicaklik",
            "madde", "kimyasal", "organizma", "ekosistem", "mikroskop",
        ],
    ),
    (
        Subject::Language,
        &[
            "cumle", "sozcuk", "kelime", "paragraf", "anlatim", "yazim", "noktalama", "fiil",
            "isim", "sifat", "zarf", "yuklem", "ozne", "metin", "siir", "deyim", "atasozu",
            "ekler", "anlam",
        ],
    ),
    (
        Subject::SocialStudies,
        &[
            "tarih", "cografya", "osmanli", "cumhuriyet", "ataturk", "savas", "devlet",
            "iklim", "nufus", "harita", "ekonomi", "anayasa", "demokrasi", "medeniyet",
            "selcuklu", "inkilap", "kurtulus", "antlasma",
        ],
    ),
    (
        Subject::ForeignLanguage,
        &[
            "the", "which", "what", "choose", "complete", "sentence", "dialogue", "word",
            "meaning", "answer", "following", "english", "passage",
        ],
    ),
    (
        Subject::Religion,
        &[
            "allah", "peygamber", "kuran", "ibadet", "namaz", "oruc", "zekat", "hac", "ahlak",
            "iman", "dua", "ayet", "hadis", "melek", "kutsal",
        ],
    ),
];

/// Shortest keyword allowed to match as a word prefix.
const MIN_PREFIX_KEYWORD_CHARS: usize = 5;

/// Characters and sequences counted as math indicators.
const MATH_INDICATORS: &[&str] = &[
    "=", "+", "√", "²", "³", "∫", "π", "≤", "≥", "÷", "×", "^", "∑", "°",
];

/// Assembly settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AssemblerConfig {
    /// Boundaries below this confidence are dropped.
    pub min_confidence: f32,
}

impl Default for AssemblerConfig {
    fn default() -> Self {
        Self { min_confidence: 0.3 }
    }
}

/// Maps boundary results to [`Question`]s.
#[derive(Debug, Clone, Default)]
pub struct QuestionAssembler {
    config: AssemblerConfig,
}

impl QuestionAssembler {
    pub fn new(config: AssemblerConfig) -> Self {
        Self { config }
    }

    pub fn assemble(&self, boundaries: &[QuestionBoundaryResult]) -> Vec<Question> {
        boundaries
            .iter()
            .filter(|b| b.confidence >= self.config.min_confidence)
            .map(assemble_one)
            .collect()
    }
}

fn assemble_one(boundary: &QuestionBoundaryResult) -> Question {
    let body = boundary
        .source_lines
        .iter()
        .map(|l| l.text.trim())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join("\n");

    let options = boundary
        .option_block
        .as_ref()
        .map(|block| {
            block
                .options
                .iter()
                .map(|o| OptionRegion {
                    label: o.label,
                    text: o.text.clone(),
                    bounding_box: o.bounding_box,
                })
                .collect()
        })
        .unwrap_or_default();

    Question {
        number: boundary.question_number,
        subject: classify_subject(&body),
        has_math_formula: has_math_formula(&body),
        body,
        bounding_box: boundary.bounding_box,
        options,
        confidence: boundary.confidence,
        column_index: boundary.column_index,
        has_image: boundary.has_image,
        has_table: boundary.has_table,
    }
}

/// Subject with the most keyword hits; ties go to the earlier table, no hits
/// to [`Subject::Unknown`].
pub fn classify_subject(text: &str) -> Subject {
    let words: Vec<String> = text
        .split(|c: char| !c.is_alphanumeric())
        .map(matching_key)
        .filter(|w| !w.is_empty())
        .collect();

    let mut best = (Subject::Unknown, 0usize);
    for (subject, keywords) in SUBJECT_KEYWORDS {
        let hits = words
            .iter()
            .filter(|w| keywords.iter().any(|k| keyword_matches(w, k)))
            .count();
        if hits > best.1 {
            best = (*subject, hits);
        }
    }
    best.0
}

fn keyword_matches(word: &str, keyword: &str) -> bool {
    if keyword.len() >= MIN_PREFIX_KEYWORD_CHARS {
        word.starts_with(keyword)
    } else {
        word == keyword
    }
}

/// At least two distinct math indicators.
pub fn has_math_formula(text: &str) -> bool {
    MATH_INDICATORS
        .iter()
        .filter(|ind| text.contains(*ind))
        .count()
        >= 2
}
