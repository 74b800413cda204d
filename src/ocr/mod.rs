//! On-device text recognition.
//!
//! Recognizers turn a page region into [`TextLine`](crate::models::TextLine)s
//! in page coordinates:
//!
//! - **Tesseract**: command-line OCR in block mode (primary) or sparse mode
//!   (secondary)
//! - **Precomputed**: lines supplied as JSON by an external tool
//!
//! Recognizer failures never escape `recognize`; they are logged and yield
//! an empty line set.

mod backend;
mod precomputed;
mod tesseract;
mod utils;

use std::sync::Arc;

use tracing::warn;

pub use backend::{OcrConfig, OcrError, RecognizerKind, TextRecognizer};
pub use precomputed::PrecomputedRecognizer;
pub use tesseract::{parse_tsv, TesseractRecognizer};
pub use utils::check_binary;

/// Create a recognizer by kind.
///
/// The precomputed recognizer needs `lines_path`; `None` is returned when it
/// is missing or unreadable.
pub fn create_recognizer(kind: RecognizerKind, config: &OcrConfig) -> Option<Arc<dyn TextRecognizer>> {
    match kind {
        RecognizerKind::Tesseract => Some(Arc::new(TesseractRecognizer::new(config.clone()))),
        RecognizerKind::TesseractSparse => {
            Some(Arc::new(TesseractRecognizer::sparse(config.clone())))
        }
        RecognizerKind::Precomputed => {
            let path = config.lines_path.as_ref()?;
            match PrecomputedRecognizer::from_path(path) {
                Ok(recognizer) => Some(Arc::new(recognizer)),
                Err(e) => {
                    warn!("Precomputed recognizer unavailable: {}", e);
                    None
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precomputed_requires_lines_path() {
        assert!(create_recognizer(RecognizerKind::Precomputed, &OcrConfig::default()).is_none());
    }

    #[test]
    fn test_tesseract_kinds() {
        let config = OcrConfig::default();
        let primary = create_recognizer(RecognizerKind::Tesseract, &config).unwrap();
        let secondary = create_recognizer(RecognizerKind::TesseractSparse, &config).unwrap();
        assert_eq!(primary.kind(), RecognizerKind::Tesseract);
        assert_eq!(secondary.kind(), RecognizerKind::TesseractSparse);
    }
}
