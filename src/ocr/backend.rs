//! On-device text recognizer abstraction.
//!
//! Every recognizer produces [`TextLine`]s in the coordinate space of the
//! image it was given. [`TextRecognizer::recognize`] handles cropping a page
//! region, translating the result back into page space and degrading any
//! failure to an empty line set.

use std::path::PathBuf;

use image::DynamicImage;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::models::{reading_order, PageImage, Rect, TextLine};

/// Errors from on-device recognizers.
#[derive(Debug, Error)]
pub enum OcrError {
    #[error("Backend not available: {0}")]
    BackendNotAvailable(String),

    #[error("OCR failed: {0}")]
    OcrFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    ImageError(String),
}

/// Available on-device recognizer kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RecognizerKind {
    /// Tesseract, treating the region as one column of text.
    Tesseract,
    /// Tesseract in sparse-text mode; finds scattered text the block mode
    /// misses.
    TesseractSparse,
    /// Lines produced ahead of time by an external tool.
    Precomputed,
}

impl RecognizerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecognizerKind::Tesseract => "tesseract",
            RecognizerKind::TesseractSparse => "tesseract-sparse",
            RecognizerKind::Precomputed => "precomputed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "tesseract" => Some(RecognizerKind::Tesseract),
            "tesseract-sparse" | "tesseract_sparse" | "sparse" => {
                Some(RecognizerKind::TesseractSparse)
            }
            "precomputed" | "lines" => Some(RecognizerKind::Precomputed),
            _ => None,
        }
    }
}

impl std::fmt::Display for RecognizerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Settings shared by on-device recognizers.
#[derive(Debug, Clone)]
pub struct OcrConfig {
    /// Tesseract language (e.g., "tur", "tur+eng").
    pub language: String,
    /// Lines file for the precomputed recognizer.
    pub lines_path: Option<PathBuf>,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            language: "tur".to_string(),
            lines_path: None,
        }
    }
}

/// Trait for on-device text recognizers.
pub trait TextRecognizer: Send + Sync {
    /// Get the recognizer kind.
    fn kind(&self) -> RecognizerKind;

    /// Check if this recognizer can run (binaries installed, input present).
    fn is_available(&self) -> bool;

    /// Get a description of what's needed to make this recognizer available.
    fn availability_hint(&self) -> String;

    /// Recognize the lines of an image, in that image's coordinates.
    fn run_recognition(&self, image: &DynamicImage) -> Result<Vec<TextLine>, OcrError>;

    /// Recognize a page region, returning lines in page coordinates.
    fn recognize_region(&self, page: &PageImage, region: Rect) -> Result<Vec<TextLine>, OcrError> {
        let region = region.clamp_to(page.width(), page.height());
        if region.is_empty() {
            return Ok(Vec::new());
        }
        let image = page.to_dynamic().ok_or_else(|| {
            OcrError::ImageError(format!(
                "page buffer does not match {}x{}",
                page.width(),
                page.height()
            ))
        })?;
        let crop = image.crop_imm(
            region.left as u32,
            region.top as u32,
            region.width() as u32,
            region.height() as u32,
        );
        let lines = self.run_recognition(&crop)?;
        Ok(lines
            .iter()
            .map(|l| l.translated(region.left, region.top))
            .collect())
    }

    /// Recognize one column region of a page.
    ///
    /// Never fails: a recognizer error is logged and yields no lines, which
    /// lets the caller fall back to another engine.
    fn recognize(&self, page: &PageImage, column_index: usize, region: Rect) -> Vec<TextLine> {
        match self.recognize_region(page, region) {
            Ok(lines) => {
                debug!(
                    "{}: {} lines in column {} {}",
                    self.kind(),
                    lines.len(),
                    column_index,
                    region
                );
                reading_order(lines)
            }
            Err(e) => {
                warn!(
                    "{} failed on column {} {}: {}",
                    self.kind(),
                    column_index,
                    region,
                    e
                );
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PixelFormat;

    struct FixedRecognizer {
        result: Result<Vec<TextLine>, String>,
    }

    impl TextRecognizer for FixedRecognizer {
        fn kind(&self) -> RecognizerKind {
            RecognizerKind::Tesseract
        }

        fn is_available(&self) -> bool {
            true
        }

        fn availability_hint(&self) -> String {
            String::new()
        }

        fn run_recognition(&self, _image: &DynamicImage) -> Result<Vec<TextLine>, OcrError> {
            self.result.clone().map_err(OcrError::OcrFailed)
        }
    }

    fn blank_page() -> PageImage {
        PageImage::from_raw(vec![255; 200 * 100], 200, 100, 150, PixelFormat::Gray8)
    }

    #[test]
    fn test_recognize_translates_into_page_space() {
        let recognizer = FixedRecognizer {
            result: Ok(vec![TextLine::new("1. Soru", Rect::new(5, 10, 60, 30), 0.9, 0)]),
        };
        let lines = recognizer.recognize(&blank_page(), 1, Rect::new(100, 20, 200, 100));
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].bounding_box, Rect::new(105, 30, 160, 50));
    }

    #[test]
    fn test_recognize_degrades_errors_to_empty() {
        let recognizer = FixedRecognizer {
            result: Err("boom".to_string()),
        };
        assert!(recognizer
            .recognize(&blank_page(), 0, Rect::new(0, 0, 200, 100))
            .is_empty());
    }

    #[test]
    fn test_corrupt_page_yields_no_lines() {
        let recognizer = FixedRecognizer { result: Ok(Vec::new()) };
        let page = PageImage::from_raw(vec![0; 3], 200, 100, 150, PixelFormat::Rgb8);
        assert!(recognizer.recognize_region(&page, Rect::new(0, 0, 200, 100)).is_err());
        assert!(recognizer.recognize(&page, 0, Rect::new(0, 0, 200, 100)).is_empty());
    }

    #[test]
    fn test_kind_names() {
        assert_eq!(RecognizerKind::from_str("Tesseract-Sparse"), Some(RecognizerKind::TesseractSparse));
        assert_eq!(RecognizerKind::TesseractSparse.to_string(), "tesseract-sparse");
        assert_eq!(RecognizerKind::from_str("paddle"), None);
    }
}
