//! Normalized recognition output.

use serde::{Deserialize, Serialize};

use super::geometry::Rect;

/// One recognized line of text, in full-page pixel coordinates.
///
/// Every recognition backend is normalized to this shape before anything
/// downstream looks at it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextLine {
    pub text: String,
    pub bounding_box: Rect,
    /// Recognition confidence in `[0, 1]`.
    #[serde(default = "default_confidence")]
    pub confidence: f32,
    /// Ordinal within the source that produced the line.
    #[serde(default)]
    pub index: usize,
}

fn default_confidence() -> f32 {
    1.0
}

impl TextLine {
    pub fn new(text: impl Into<String>, bounding_box: Rect, confidence: f32, index: usize) -> Self {
        Self {
            text: text.into(),
            bounding_box,
            confidence: confidence.clamp(0.0, 1.0),
            index,
        }
    }

    pub fn top(&self) -> i32 {
        self.bounding_box.top
    }

    pub fn bottom(&self) -> i32 {
        self.bounding_box.bottom
    }

    /// Copy of this line shifted by a region offset.
    pub fn translated(&self, dx: i32, dy: i32) -> TextLine {
        TextLine {
            bounding_box: self.bounding_box.translate(dx, dy),
            ..self.clone()
        }
    }

    pub fn with_index(mut self, index: usize) -> TextLine {
        self.index = index;
        self
    }
}

/// Sort lines in reading order (top, then left) and renumber them.
pub fn reading_order(mut lines: Vec<TextLine>) -> Vec<TextLine> {
    lines.sort_by_key(|l| (l.bounding_box.top, l.bounding_box.left));
    lines
        .into_iter()
        .enumerate()
        .map(|(i, l)| l.with_index(i))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confidence_is_clamped() {
        let line = TextLine::new("x", Rect::new(0, 0, 1, 1), 1.7, 0);
        assert_eq!(line.confidence, 1.0);
    }

    #[test]
    fn test_reading_order_renumbers() {
        let lines = vec![
            TextLine::new("second", Rect::new(0, 50, 10, 60), 0.9, 7),
            TextLine::new("first", Rect::new(0, 10, 10, 20), 0.9, 3),
        ];
        let ordered = reading_order(lines);
        assert_eq!(ordered[0].text, "first");
        assert_eq!(ordered[0].index, 0);
        assert_eq!(ordered[1].index, 1);
    }

    #[test]
    fn test_deserialize_defaults() {
        let line: TextLine = serde_json::from_str(
            r#"{"text":"1. Soru","bounding_box":{"left":0,"top":0,"right":10,"bottom":10}}"#,
        )
        .unwrap();
        assert_eq!(line.confidence, 1.0);
        assert_eq!(line.index, 0);
    }
}
