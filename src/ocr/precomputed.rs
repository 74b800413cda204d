//! Recognizer backed by lines produced ahead of time.
//!
//! The lines file is a JSON array of `TextLine` objects in page pixel
//! coordinates, as written by an external recognition tool.

use std::path::Path;

use image::DynamicImage;

use super::backend::{OcrError, RecognizerKind, TextRecognizer};
use crate::models::{PageImage, Rect, TextLine};

/// Serves a fixed set of page-space lines.
pub struct PrecomputedRecognizer {
    lines: Vec<TextLine>,
}

impl PrecomputedRecognizer {
    pub fn new(lines: Vec<TextLine>) -> Self {
        Self { lines }
    }

    /// Load lines from a JSON file.
    pub fn from_path(path: &Path) -> Result<Self, OcrError> {
        let content = std::fs::read_to_string(path)?;
        let lines: Vec<TextLine> = serde_json::from_str(&content).map_err(|e| {
            OcrError::OcrFailed(format!("invalid lines file {}: {}", path.display(), e))
        })?;
        Ok(Self::new(lines))
    }

    pub fn lines(&self) -> &[TextLine] {
        &self.lines
    }
}

impl TextRecognizer for PrecomputedRecognizer {
    fn kind(&self) -> RecognizerKind {
        RecognizerKind::Precomputed
    }

    fn is_available(&self) -> bool {
        true
    }

    fn availability_hint(&self) -> String {
        format!("{} precomputed lines loaded", self.lines.len())
    }

    fn run_recognition(&self, _image: &DynamicImage) -> Result<Vec<TextLine>, OcrError> {
        Ok(self.lines.clone())
    }

    /// Lines whose centre falls inside the region; already in page space.
    fn recognize_region(&self, _page: &PageImage, region: Rect) -> Result<Vec<TextLine>, OcrError> {
        Ok(self
            .lines
            .iter()
            .filter(|l| {
                region.contains_point(l.bounding_box.center_x(), l.bounding_box.center_y())
            })
            .cloned()
            .collect())
    }
}
