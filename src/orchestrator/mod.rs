//! Per-page choice and combination of recognition sources.
//!
//! Three exclusive modes:
//!
//! - **OnDevice**: primary recognizer, secondary as fallback for any column
//!   the primary returns nothing for
//! - **ConfidenceMerge**: both recognizers, merged line by line
//! - **Vision**: one cloud call per page, anchored to on-device lines

mod anchoring;
mod merge;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

pub use anchoring::{anchor_questions, build_columns, Anchor, AnchoringConfig};
pub use merge::merge_by_confidence;

use crate::boundary::ColumnLines;
use crate::models::{LayoutInfo, PageImage, Rect, TextLine};
use crate::ocr::TextRecognizer;
use crate::vision::{VisionEngine, VisionError};

/// How a page's lines are obtained.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecognitionMode {
    #[default]
    OnDevice,
    ConfidenceMerge,
    Vision,
}

impl RecognitionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecognitionMode::OnDevice => "on_device",
            RecognitionMode::ConfidenceMerge => "confidence_merge",
            RecognitionMode::Vision => "vision",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "on_device" | "ondevice" | "ocr" => Some(RecognitionMode::OnDevice),
            "confidence_merge" | "merge" => Some(RecognitionMode::ConfidenceMerge),
            "vision" | "cloud" => Some(RecognitionMode::Vision),
            _ => None,
        }
    }
}

impl std::fmt::Display for RecognitionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Chooses and merges recognition results for a page.
///
/// Cheap to clone; engines are shared.
#[derive(Clone, Default)]
pub struct Orchestrator {
    mode: RecognitionMode,
    primary: Option<Arc<dyn TextRecognizer>>,
    secondary: Option<Arc<dyn TextRecognizer>>,
    vision: Option<Arc<dyn VisionEngine>>,
    anchoring: AnchoringConfig,
    surface_errors: bool,
}

impl Orchestrator {
    pub fn new(mode: RecognitionMode) -> Self {
        Self {
            mode,
            surface_errors: true,
            ..Default::default()
        }
    }

    pub fn with_primary(mut self, recognizer: Arc<dyn TextRecognizer>) -> Self {
        self.primary = Some(recognizer);
        self
    }

    pub fn with_secondary(mut self, recognizer: Arc<dyn TextRecognizer>) -> Self {
        self.secondary = Some(recognizer);
        self
    }

    pub fn with_vision(mut self, engine: Arc<dyn VisionEngine>) -> Self {
        self.vision = Some(engine);
        self
    }

    pub fn with_anchoring(mut self, anchoring: AnchoringConfig) -> Self {
        self.anchoring = anchoring;
        self
    }

    /// Whether vision failures are returned (`true`) or logged and replaced
    /// by on-device results (`false`).
    pub fn surface_errors(mut self, surface: bool) -> Self {
        self.surface_errors = surface;
        self
    }

    pub fn mode(&self) -> RecognitionMode {
        self.mode
    }

    /// On-device lines of one column region.
    pub fn recognize_column(&self, page: &PageImage, column_index: usize, region: Rect) -> Vec<TextLine> {
        let primary = self
            .primary
            .as_ref()
            .map(|r| r.recognize(page, column_index, region));

        if self.mode == RecognitionMode::ConfidenceMerge {
            if let (Some(primary), Some(secondary)) = (&primary, &self.secondary) {
                let secondary = secondary.recognize(page, column_index, region);
                debug!(
                    "Merging {} + {} lines in column {}",
                    primary.len(),
                    secondary.len(),
                    column_index
                );
                return merge_by_confidence(primary.clone(), secondary);
            }
        }

        match (primary, &self.secondary) {
            (Some(lines), _) if !lines.is_empty() => lines,
            (primary, Some(secondary)) => {
                if let Some(kind) = self.primary.as_ref().map(|r| r.kind()) {
                    info!(
                        "{} found nothing in column {}, falling back to {}",
                        kind,
                        column_index,
                        secondary.kind()
                    );
                }
                let fallback = secondary.recognize(page, column_index, region);
                if fallback.is_empty() {
                    primary.unwrap_or_default()
                } else {
                    fallback
                }
            }
            (primary, None) => primary.unwrap_or_default(),
        }
    }

    /// On-device lines for every layout column.
    pub fn recognize_columns(&self, page: &PageImage, layout: &LayoutInfo) -> Vec<ColumnLines> {
        layout
            .columns
            .iter()
            .map(|column| {
                let region = column.region(page.height());
                let lines = self.recognize_column(page, column.column_index, region);
                ColumnLines::new(column.column_index, region, lines)
            })
            .collect()
    }

    /// Collect the per-column lines the boundary inferencer works from.
    ///
    /// On-device recognition runs on the blocking pool. In vision mode the
    /// page is described once and the description is anchored to the
    /// on-device lines. Only vision failures can surface here.
    pub async fn collect(
        &self,
        page: Arc<PageImage>,
        layout: Arc<LayoutInfo>,
    ) -> Result<Vec<ColumnLines>, VisionError> {
        let on_device = {
            let this = self.clone();
            let page = page.clone();
            let layout = layout.clone();
            match tokio::task::spawn_blocking(move || this.recognize_columns(&page, &layout)).await {
                Ok(columns) => columns,
                Err(e) => {
                    warn!("On-device recognition task failed: {}", e);
                    Vec::new()
                }
            }
        };

        if self.mode != RecognitionMode::Vision {
            return Ok(on_device);
        }

        match self.describe(&page, &layout, &on_device).await {
            Ok(columns) => Ok(columns),
            Err(e) if self.surface_errors => Err(e),
            Err(e) => {
                warn!("Vision engine skipped, using on-device lines: {}", e);
                Ok(on_device)
            }
        }
    }

    async fn describe(
        &self,
        page: &PageImage,
        layout: &LayoutInfo,
        on_device: &[ColumnLines],
    ) -> Result<Vec<ColumnLines>, VisionError> {
        let engine = self
            .vision
            .as_ref()
            .ok_or_else(|| VisionError::NotConfigured("no vision engine configured".to_string()))?;
        let questions = engine.describe_page(page).await?;
        if questions.is_empty() {
            info!("{} reported no questions on page", engine.kind());
            return Ok(Vec::new());
        }

        let lines: Vec<TextLine> = on_device.iter().flat_map(|c| c.lines.iter().cloned()).collect();
        let anchors = anchor_questions(&questions, &lines, &self.anchoring);
        let anchored = anchors.iter().filter(|a| a.is_some()).count();
        info!(
            "{}: {} questions described, {} anchored to on-device lines",
            engine.kind(),
            questions.len(),
            anchored
        );
        Ok(build_columns(&questions, &anchors, content_region(layout)))
    }
}

/// Page area the layout considers content: column span by content extent.
fn content_region(layout: &LayoutInfo) -> Rect {
    let left = layout.columns.iter().map(|c| c.start_x).min().unwrap_or(0);
    let right = layout
        .columns
        .iter()
        .map(|c| c.end_x)
        .max()
        .unwrap_or(layout.page_width as i32);
    let (top, bottom) = layout.content_extent();
    Rect::new(left, top, right, bottom)
}
