//! Backend availability listing.

use console::style;

use examcrop::config::Config;
use examcrop::ocr::{check_binary, create_recognizer, RecognizerKind};
use examcrop::vision::{create_engine, VisionConfig, VisionEngineKind};

use crate::cli::helpers::{error, success};

/// List on-device recognizers, vision engines and external tools.
pub async fn cmd_backends(config: &Config) -> anyhow::Result<()> {
    let ocr_config = config.ocr.recognizer_config(None);

    println!("{}", style("On-device recognizers").bold());
    for kind in [RecognizerKind::Tesseract, RecognizerKind::TesseractSparse] {
        if let Some(recognizer) = create_recognizer(kind, &ocr_config) {
            let icon = if recognizer.is_available() { success() } else { error() };
            println!("  {} {:<18} {}", icon, kind.as_str(), recognizer.availability_hint());
        }
    }
    println!(
        "  {} {:<18} {}",
        style("·").dim(),
        RecognizerKind::Precomputed.as_str(),
        "supply a lines file with --lines"
    );

    println!("{}", style("Vision engines").bold());
    for kind in [VisionEngineKind::Gemini, VisionEngineKind::Groq] {
        let engine = create_engine(&VisionConfig {
            engine: kind,
            model: (kind == config.vision.engine)
                .then(|| config.vision.model.clone())
                .flatten(),
            ..config.vision.clone()
        });
        let icon = if engine.is_available() { success() } else { error() };
        println!("  {} {:<18} {}", icon, kind.as_str(), engine.availability_hint());
    }

    println!("{}", style("Tools").bold());
    for tool in ["tesseract", "pdftoppm", "pdfinfo"] {
        let icon = if check_binary(tool) { success() } else { error() };
        println!("  {} {}", icon, tool);
    }
    Ok(())
}
