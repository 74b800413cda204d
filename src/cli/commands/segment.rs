//! Question segmentation command.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use console::style;
use serde_json::json;
use tokio::sync::{mpsc, watch};

use examcrop::config::Config;
use examcrop::models::Rect;
use examcrop::ocr::{create_recognizer, PrecomputedRecognizer, RecognizerKind, TextRecognizer};
use examcrop::orchestrator::{Orchestrator, RecognitionMode};
use examcrop::pipeline::{PageResult, PageSegmenter, SegmentEvent};
use examcrop::render::{ImageFiles, PageSource, PdfDocument};
use examcrop::vision::create_engine;

use crate::cli::helpers::{error, file_stem, page_progress, success, warning};

pub struct SegmentArgs {
    pub inputs: Vec<PathBuf>,
    pub pdf: bool,
    pub dpi: u32,
    pub mode: Option<String>,
    pub lines: Option<PathBuf>,
    pub workers: usize,
    pub raw: bool,
    pub crop_dir: Option<PathBuf>,
    pub output: Option<PathBuf>,
}

/// Segment pages and write the results as JSON.
pub async fn cmd_segment(config: Config, args: SegmentArgs) -> anyhow::Result<()> {
    let mode = match args.mode.as_deref() {
        Some(name) => RecognitionMode::from_str(name).ok_or_else(|| {
            anyhow::anyhow!(
                "Unknown recognition mode '{}'. Use on_device, confidence_merge or vision.",
                name
            )
        })?,
        None => config.segmentation.recognition_mode,
    };

    let orchestrator = build_orchestrator(&config, mode, &args)?;
    let source = open_source(&args)?;
    let segmenter = PageSegmenter::new(&config.segmentation, orchestrator);

    let (event_tx, mut event_rx) = mpsc::channel::<SegmentEvent>(100);
    let (cancel_tx, cancel_rx) = watch::channel(false);

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("{} Cancelling...", warning());
            let _ = cancel_tx.send(true);
        }
    });

    let show_progress = args.output.is_some();
    let event_handler = tokio::spawn(async move {
        let mut results: Vec<PageResult> = Vec::new();
        let mut progress = None;

        while let Some(event) = event_rx.recv().await {
            match event {
                SegmentEvent::Started { total_pages } => {
                    if show_progress {
                        let bar = page_progress(total_pages as u64);
                        bar.set_message("Segmenting pages...");
                        progress = Some(bar);
                    }
                }
                SegmentEvent::PageStarted { .. } => {}
                SegmentEvent::PageCompleted(result) => {
                    if let Some(ref bar) = progress {
                        bar.inc(1);
                    }
                    results.push(result);
                }
                SegmentEvent::PageFailed(e) => {
                    if let Some(ref bar) = progress {
                        bar.inc(1);
                    }
                    eprintln!("{} {}", error(), e);
                }
                SegmentEvent::PageCancelled { .. } => {
                    if let Some(ref bar) = progress {
                        bar.inc(1);
                    }
                }
                SegmentEvent::Finished(_) => {
                    if let Some(ref bar) = progress {
                        bar.finish_and_clear();
                    }
                }
            }
        }
        results
    });

    let summary = segmenter
        .run(source.clone(), args.workers, event_tx, cancel_rx)
        .await;
    let mut results = event_handler.await?;
    results.sort_by_key(|r| r.page);

    let document = if args.raw {
        json!(results
            .iter()
            .map(|r| json!({ "page": r.page, "boundaries": r.boundaries }))
            .collect::<Vec<_>>())
    } else {
        json!(results
            .iter()
            .map(|r| json!({
                "page": r.page,
                "publisher": r.publisher,
                "questions": r.questions,
            }))
            .collect::<Vec<_>>())
    };
    let rendered = serde_json::to_string_pretty(&document)?;
    match &args.output {
        Some(path) => tokio::fs::write(path, rendered).await?,
        None => println!("{}", rendered),
    }

    if let Some(dir) = &args.crop_dir {
        let stem = args
            .inputs
            .first()
            .map(|p| file_stem(p))
            .unwrap_or_else(|| "page".to_string());
        let dir = dir.clone();
        let written =
            tokio::task::spawn_blocking(move || write_crops(source.as_ref(), &results, &dir, &stem))
                .await??;
        eprintln!("{} Wrote {} crops", success(), written);
    }

    eprintln!(
        "{} {} of {} pages segmented, {} questions",
        success(),
        summary.succeeded,
        summary.total_pages,
        summary.questions
    );
    if summary.failed > 0 {
        eprintln!("  {} {} pages failed", warning(), summary.failed);
    }
    if summary.cancelled + summary.skipped > 0 {
        eprintln!(
            "  {} {} pages cancelled",
            style("→").dim(),
            summary.cancelled + summary.skipped
        );
    }
    Ok(())
}

fn build_orchestrator(config: &Config, mode: RecognitionMode, args: &SegmentArgs) -> anyhow::Result<Orchestrator> {
    let mut orchestrator = Orchestrator::new(mode);

    if let Some(path) = &args.lines {
        if args.pdf || args.inputs.len() != 1 {
            anyhow::bail!("--lines requires exactly one image input");
        }
        let recognizer = PrecomputedRecognizer::from_path(path)
            .map_err(|e| anyhow::anyhow!("Cannot load lines from {}: {}", path.display(), e))?;
        orchestrator = orchestrator.with_primary(Arc::new(recognizer));
    } else {
        let ocr_config = config.ocr.recognizer_config(None);
        if let Some(primary) = recognizer(config.ocr.primary, &ocr_config) {
            orchestrator = orchestrator.with_primary(primary);
        }
        if let Some(secondary) = config.ocr.secondary.and_then(|kind| recognizer(kind, &ocr_config)) {
            orchestrator = orchestrator.with_secondary(secondary);
        }
    }

    if mode == RecognitionMode::Vision {
        let engine = create_engine(&config.vision);
        if !engine.is_available() {
            anyhow::bail!("{}", engine.availability_hint());
        }
        orchestrator = orchestrator
            .with_vision(engine)
            .surface_errors(config.vision.surface_errors);
    }

    Ok(orchestrator)
}

fn recognizer(kind: RecognizerKind, config: &examcrop::ocr::OcrConfig) -> Option<Arc<dyn TextRecognizer>> {
    let recognizer = create_recognizer(kind, config)?;
    if !recognizer.is_available() {
        eprintln!("{} {}", warning(), recognizer.availability_hint());
        return None;
    }
    Some(recognizer)
}

fn open_source(args: &SegmentArgs) -> anyhow::Result<Arc<dyn PageSource>> {
    if args.pdf {
        let [path] = args.inputs.as_slice() else {
            anyhow::bail!("--pdf takes exactly one input file");
        };
        Ok(Arc::new(PdfDocument::open(path, args.dpi)?))
    } else {
        Ok(Arc::new(ImageFiles::new(args.inputs.clone()).with_dpi(args.dpi)))
    }
}

/// File name of one question crop. The ordinal is the question's position
/// on the page, so restarted numbering never reuses a name.
fn crop_file_name(stem: &str, page: u32, ordinal: usize, number: u32) -> String {
    format!("{}-p{:03}-{:02}-q{:03}.png", stem, page, ordinal + 1, number)
}

/// Save each question region as `<stem>-p<page>-<ordinal>-q<number>.png`.
fn write_crops(source: &dyn PageSource, results: &[PageResult], dir: &Path, stem: &str) -> anyhow::Result<usize> {
    std::fs::create_dir_all(dir)?;
    let mut written = 0;
    for result in results {
        let regions: Vec<(u32, Rect)> = result
            .questions
            .iter()
            .map(|q| (q.number, q.bounding_box))
            .collect();
        if regions.is_empty() {
            continue;
        }
        let page = source.render(result.page)?;
        let Some(image) = page.to_dynamic() else {
            eprintln!("{} Page {} buffer unusable, no crops", warning(), result.page);
            continue;
        };
        for (ordinal, (number, bounds)) in regions.into_iter().enumerate() {
            let bounds = bounds.clamp_to(page.width(), page.height());
            if bounds.is_empty() {
                continue;
            }
            let crop = image.crop_imm(
                bounds.left as u32,
                bounds.top as u32,
                bounds.width() as u32,
                bounds.height() as u32,
            );
            let path = dir.join(crop_file_name(stem, result.page, ordinal, number));
            crop.save(&path)?;
            written += 1;
        }
    }
    Ok(written)
}
