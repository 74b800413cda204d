//! Page segmentation pipeline and multi-page runner.
//!
//! One page flows strictly downward: layout analysis, recognition,
//! boundary inference, assembly. Pages share no mutable state, so the
//! runner processes several at once and reports progress as
//! [`SegmentEvent`]s.

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::assembler::QuestionAssembler;
use crate::boundary::{BoundaryInferencer, ColumnLines};
use crate::config::SegmentationConfig;
use crate::layout::LayoutAnalyzer;
use crate::models::{LayoutInfo, PageImage, Question, QuestionBoundaryResult};
use crate::orchestrator::Orchestrator;
use crate::patterns::{detect_publisher, PublisherFormat};
use crate::render::{PageSource, RenderError};
use crate::vision::VisionError;

/// Why a page produced no result.
#[derive(Debug, Error)]
pub enum SegmentError {
    #[error("Render error: {0}")]
    Render(#[from] RenderError),

    #[error("Vision error: {0}")]
    Vision(#[from] VisionError),

    #[error("Page task failed: {0}")]
    Task(String),
}

/// A failure tied to the page it happened on.
#[derive(Debug, Error)]
#[error("Page {page}: {cause}")]
pub struct PageError {
    pub page: u32,
    pub cause: SegmentError,
}

impl PageError {
    fn new(page: u32, cause: impl Into<SegmentError>) -> Self {
        Self {
            page,
            cause: cause.into(),
        }
    }
}

/// Everything extracted from one page.
#[derive(Debug, Clone, Serialize)]
pub struct PageResult {
    pub page: u32,
    pub publisher: PublisherFormat,
    pub column_count: usize,
    pub boundaries: Vec<QuestionBoundaryResult>,
    pub questions: Vec<Question>,
}

/// Progress of a multi-page run.
#[derive(Debug)]
pub enum SegmentEvent {
    Started { total_pages: u32 },
    PageStarted { page: u32 },
    PageCompleted(PageResult),
    PageFailed(PageError),
    PageCancelled { page: u32 },
    Finished(RunSummary),
}

/// Counts for a finished run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub total_pages: u32,
    pub succeeded: u32,
    pub failed: u32,
    /// In-flight pages aborted by cancellation.
    pub cancelled: u32,
    /// Pages never started because the run was cancelled.
    pub skipped: u32,
    pub questions: usize,
}

enum PageOutcome {
    Completed(usize),
    Failed,
    Cancelled,
}

/// Runs the full per-page pipeline.
#[derive(Clone)]
pub struct PageSegmenter {
    analyzer: LayoutAnalyzer,
    orchestrator: Orchestrator,
    inferencer: BoundaryInferencer,
    assembler: QuestionAssembler,
    publisher_override: Option<PublisherFormat>,
}

impl PageSegmenter {
    pub fn new(config: &SegmentationConfig, orchestrator: Orchestrator) -> Self {
        Self {
            analyzer: LayoutAnalyzer::new(config.layout.clone()),
            orchestrator: orchestrator.with_anchoring(config.anchoring.clone()),
            inferencer: BoundaryInferencer::new(config.boundary.clone(), config.matcher.clone()),
            assembler: QuestionAssembler::new(config.assembler()),
            publisher_override: config.publisher_format,
        }
    }

    /// Layout of a page, computed on the blocking pool.
    pub async fn analyze(&self, page: Arc<PageImage>) -> LayoutInfo {
        let analyzer = self.analyzer.clone();
        let (width, height) = (page.width(), page.height());
        match tokio::task::spawn_blocking(move || analyzer.analyze(&page)).await {
            Ok(layout) => layout,
            Err(e) => {
                warn!("Layout task failed ({}), using fallback layout", e);
                LayoutInfo::empty(width, height)
            }
        }
    }

    /// Segment one page. A page with no questions is a normal result.
    pub async fn segment_page(&self, page_number: u32, page: PageImage) -> Result<PageResult, PageError> {
        let page = Arc::new(page);
        let layout = Arc::new(self.analyze(page.clone()).await);
        debug!(
            "Page {}: {} column(s), {} gap(s)",
            page_number,
            layout.column_count,
            layout.gaps.len()
        );

        let columns = self
            .orchestrator
            .collect(page, layout.clone())
            .await
            .map_err(|e| PageError::new(page_number, e))?;

        let boundaries = self.inferencer.infer(&columns, &layout);
        let questions = self.assembler.assemble(&boundaries);
        let publisher = self
            .publisher_override
            .unwrap_or_else(|| detect_publisher(&page_text(&columns)));

        info!(
            "Page {}: {} boundaries, {} questions ({})",
            page_number,
            boundaries.len(),
            questions.len(),
            publisher
        );

        Ok(PageResult {
            page: page_number,
            publisher,
            column_count: layout.column_count,
            boundaries,
            questions,
        })
    }

    async fn process(&self, source: Arc<dyn PageSource>, page_number: u32) -> Result<PageResult, PageError> {
        let page = tokio::task::spawn_blocking(move || source.render(page_number))
            .await
            .map_err(|e| PageError::new(page_number, SegmentError::Task(e.to_string())))?
            .map_err(|e| PageError::new(page_number, e))?;
        self.segment_page(page_number, page).await
    }

    /// Segment every page of a source with up to `workers` pages in flight.
    ///
    /// Setting `cancel` to `true` stops scheduling new pages and aborts the
    /// ones in flight. Events already sent are complete results.
    pub async fn run(
        &self,
        source: Arc<dyn PageSource>,
        workers: usize,
        events: mpsc::Sender<SegmentEvent>,
        cancel: watch::Receiver<bool>,
    ) -> RunSummary {
        let total_pages = source.page_count();
        let _ = events.send(SegmentEvent::Started { total_pages }).await;

        let gate = cancel.clone();
        let outcomes: Vec<PageOutcome> = stream::iter(1..=total_pages)
            .take_while(move |_| {
                let cancelled = *gate.borrow();
                async move { !cancelled }
            })
            .map(|page_number| {
                let this = self.clone();
                let source = source.clone();
                let events = events.clone();
                let mut cancel = cancel.clone();
                async move {
                    let _ = events.send(SegmentEvent::PageStarted { page: page_number }).await;
                    let result = tokio::select! {
                        result = this.process(source, page_number) => Some(result),
                        _ = wait_cancelled(&mut cancel) => None,
                    };
                    match result {
                        Some(Ok(result)) => {
                            let count = result.questions.len();
                            let _ = events.send(SegmentEvent::PageCompleted(result)).await;
                            PageOutcome::Completed(count)
                        }
                        Some(Err(e)) => {
                            warn!("{}", e);
                            let _ = events.send(SegmentEvent::PageFailed(e)).await;
                            PageOutcome::Failed
                        }
                        None => {
                            debug!("Page {} cancelled", page_number);
                            let _ = events
                                .send(SegmentEvent::PageCancelled { page: page_number })
                                .await;
                            PageOutcome::Cancelled
                        }
                    }
                }
            })
            .buffer_unordered(workers.max(1))
            .collect()
            .await;

        let mut summary = RunSummary {
            total_pages,
            ..Default::default()
        };
        for outcome in &outcomes {
            match outcome {
                PageOutcome::Completed(n) => {
                    summary.succeeded += 1;
                    summary.questions += n;
                }
                PageOutcome::Failed => summary.failed += 1,
                PageOutcome::Cancelled => summary.cancelled += 1,
            }
        }
        summary.skipped = total_pages - outcomes.len() as u32;

        let _ = events.send(SegmentEvent::Finished(summary)).await;
        summary
    }
}

/// Resolves once the flag reads `true`; never resolves if the sender is gone.
async fn wait_cancelled(cancel: &mut watch::Receiver<bool>) {
    while !*cancel.borrow() {
        if cancel.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

fn page_text(columns: &[ColumnLines]) -> String {
    columns
        .iter()
        .flat_map(|c| c.lines.iter().map(|l| l.text.as_str()))
        .collect::<Vec<_>>()
        .join("\n")
}
