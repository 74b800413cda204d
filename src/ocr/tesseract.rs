//! Tesseract recognizer.
//!
//! Runs Tesseract via command-line with TSV output and groups the word rows
//! into lines.

use std::collections::HashMap;
use std::path::Path;
use std::process::Command;

use image::DynamicImage;
use tempfile::TempDir;

use super::backend::{OcrConfig, OcrError, RecognizerKind, TextRecognizer};
use super::utils::check_binary;
use crate::models::{Rect, TextLine};

/// Tesseract recognizer with a fixed page-segmentation mode.
pub struct TesseractRecognizer {
    config: OcrConfig,
    kind: RecognizerKind,
}

impl TesseractRecognizer {
    /// Block mode: the region is one column of text.
    pub fn new(config: OcrConfig) -> Self {
        Self {
            config,
            kind: RecognizerKind::Tesseract,
        }
    }

    /// Sparse mode: find as much scattered text as possible.
    pub fn sparse(config: OcrConfig) -> Self {
        Self {
            config,
            kind: RecognizerKind::TesseractSparse,
        }
    }

    fn page_segmentation_mode(&self) -> &'static str {
        match self.kind {
            RecognizerKind::TesseractSparse => "11",
            _ => "4",
        }
    }

    /// Run Tesseract on an image file, returning the TSV output.
    fn run_tesseract(&self, image_path: &Path) -> Result<String, OcrError> {
        let output = Command::new("tesseract")
            .arg(image_path)
            .arg("stdout")
            .args(["-l", &self.config.language])
            .args(["--psm", self.page_segmentation_mode()])
            .arg("tsv")
            .output();

        match output {
            Ok(output) => {
                if output.status.success() {
                    Ok(String::from_utf8_lossy(&output.stdout).to_string())
                } else {
                    let stderr = String::from_utf8_lossy(&output.stderr);
                    Err(OcrError::OcrFailed(format!("tesseract failed: {}", stderr)))
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(OcrError::BackendNotAvailable(
                    "tesseract not found (install tesseract-ocr)".to_string(),
                ))
            }
            Err(e) => Err(OcrError::Io(e)),
        }
    }
}

impl TextRecognizer for TesseractRecognizer {
    fn kind(&self) -> RecognizerKind {
        self.kind
    }

    fn is_available(&self) -> bool {
        check_binary("tesseract")
    }

    fn availability_hint(&self) -> String {
        if !check_binary("tesseract") {
            "Install tesseract-ocr with Turkish data (apt install tesseract-ocr tesseract-ocr-tur)"
                .to_string()
        } else {
            format!(
                "Tesseract is available (language: {}, psm {})",
                self.config.language,
                self.page_segmentation_mode()
            )
        }
    }

    fn run_recognition(&self, image: &DynamicImage) -> Result<Vec<TextLine>, OcrError> {
        let temp_dir = TempDir::new()?;
        let image_path = temp_dir.path().join("region.png");
        image
            .save(&image_path)
            .map_err(|e| OcrError::ImageError(e.to_string()))?;
        let tsv = self.run_tesseract(&image_path)?;
        Ok(parse_tsv(&tsv))
    }
}

#[derive(Default)]
struct LineAccumulator {
    words: Vec<String>,
    bounds: Option<Rect>,
    confidence_sum: f32,
    confidence_count: u32,
}

/// Group Tesseract TSV word rows into lines.
///
/// Words are grouped by (block, paragraph, line); each line's box is the
/// union of its word boxes and its confidence the mean word confidence
/// scaled to `[0, 1]`.
pub fn parse_tsv(tsv: &str) -> Vec<TextLine> {
    let mut order: Vec<(u32, u32, u32)> = Vec::new();
    let mut grouped: HashMap<(u32, u32, u32), LineAccumulator> = HashMap::new();

    for row in tsv.lines().skip(1) {
        let fields: Vec<&str> = row.split('\t').collect();
        if fields.len() < 12 || fields[0] != "5" {
            continue;
        }
        let text = fields[11].trim();
        if text.is_empty() {
            continue;
        }
        let number = |i: usize| fields[i].trim().parse::<i64>().ok();
        let (Some(block), Some(par), Some(line)) = (number(2), number(3), number(4)) else {
            continue;
        };
        let (Some(left), Some(top), Some(width), Some(height)) =
            (number(6), number(7), number(8), number(9))
        else {
            continue;
        };
        let confidence = fields[10].trim().parse::<f32>().unwrap_or(-1.0);

        let key = (block as u32, par as u32, line as u32);
        let entry = grouped.entry(key).or_insert_with(|| {
            order.push(key);
            LineAccumulator::default()
        });
        let word_box = Rect::from_xywh(left as i32, top as i32, width as i32, height as i32);
        entry.bounds = Some(match entry.bounds {
            Some(b) => b.union(&word_box),
            None => word_box,
        });
        entry.words.push(text.to_string());
        if confidence >= 0.0 {
            entry.confidence_sum += confidence;
            entry.confidence_count += 1;
        }
    }

    order
        .iter()
        .filter_map(|key| grouped.remove(key))
        .filter_map(|acc| {
            let bounds = acc.bounds?;
            let confidence = if acc.confidence_count > 0 {
                acc.confidence_sum / acc.confidence_count as f32 / 100.0
            } else {
                0.0
            };
            Some((acc.words.join(" "), bounds, confidence))
        })
        .enumerate()
        .map(|(i, (text, bounds, confidence))| TextLine::new(text, bounds, confidence, i))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str =
        "level\tpage_num\tblock_num\tpar_num\tline_num\tword_num\tleft\ttop\twidth\theight\tconf\ttext";

    fn row(block: u32, line: u32, word: u32, x: i32, y: i32, conf: f32, text: &str) -> String {
        format!("5\t1\t{block}\t1\t{line}\t{word}\t{x}\t{y}\t40\t20\t{conf}\t{text}")
    }

    #[test]
    fn test_words_grouped_into_lines() {
        let tsv = [
            HEADER.to_string(),
            "1\t1\t0\t0\t0\t0\t0\t0\t900\t1400\t-1\t".to_string(),
            row(1, 1, 1, 50, 100, 90.0, "1."),
            row(1, 1, 2, 95, 102, 80.0, "Soruya"),
            row(1, 2, 1, 50, 140, 70.0, "A)"),
            row(1, 2, 2, 95, 140, 50.0, "bir"),
        ]
        .join("\n");
        let lines = parse_tsv(&tsv);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].text, "1. Soruya");
        assert_eq!(lines[0].bounding_box, Rect::new(50, 100, 135, 122));
        assert!((lines[0].confidence - 0.85).abs() < 1e-4);
        assert_eq!(lines[1].index, 1);
        assert!((lines[1].confidence - 0.60).abs() < 1e-4);
    }

    #[test]
    fn test_blank_words_and_garbage_rows_skipped() {
        let tsv = [
            HEADER.to_string(),
            row(1, 1, 1, 50, 100, 95.0, " "),
            "5\tbroken".to_string(),
            row(2, 1, 1, 50, 300, 95.0, "2."),
        ]
        .join("\n");
        let lines = parse_tsv(&tsv);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].text, "2.");
    }

    #[test]
    fn test_empty_output() {
        assert!(parse_tsv("").is_empty());
        assert!(parse_tsv(HEADER).is_empty());
    }
}
