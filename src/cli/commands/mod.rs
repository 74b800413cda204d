//! CLI commands implementation.
//!
//! This module contains the CLI parser and dispatches to command-specific modules.

mod backends;
mod config_cmd;
mod layout_cmd;
mod segment;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use examcrop::config::Config;

#[derive(Parser)]
#[command(name = "examcrop")]
#[command(about = "Crop exam questions out of scanned pages")]
#[command(version)]
pub struct Cli {
    /// Config file path (overrides auto-discovery)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Detect and crop questions on page images or a PDF
    Segment {
        /// Page images, or one PDF with --pdf
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
        /// Treat the input as a PDF and render its pages
        #[arg(long)]
        pdf: bool,
        /// Rendering resolution (PDF) or assumed resolution (images)
        #[arg(long, default_value = "300")]
        dpi: u32,
        /// Recognition mode: on_device, confidence_merge or vision
        #[arg(short, long, env = "EXAMCROP_RECOGNITION_MODE")]
        mode: Option<String>,
        /// Precomputed lines (JSON array of text lines) for a single image
        #[arg(long)]
        lines: Option<PathBuf>,
        /// Number of pages processed at once
        #[arg(short, long, default_value = "2")]
        workers: usize,
        /// Print boundary results instead of assembled questions
        #[arg(long)]
        raw: bool,
        /// Write every question region as a PNG into this directory
        #[arg(long)]
        crop_dir: Option<PathBuf>,
        /// Write JSON results to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print the layout analysis of one page image as JSON
    Layout {
        /// Page image
        image: PathBuf,
        /// Assumed image resolution
        #[arg(long, default_value = "300")]
        dpi: u32,
    },

    /// List recognizers and vision engines with their availability
    Backends,

    /// Print the effective configuration as TOML
    Config,
}

pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::load_or_discover(cli.config.as_deref()).await;

    match cli.command {
        Commands::Segment {
            inputs,
            pdf,
            dpi,
            mode,
            lines,
            workers,
            raw,
            crop_dir,
            output,
        } => {
            segment::cmd_segment(
                config,
                segment::SegmentArgs {
                    inputs,
                    pdf,
                    dpi,
                    mode,
                    lines,
                    workers,
                    raw,
                    crop_dir,
                    output,
                },
            )
            .await
        }
        Commands::Layout { image, dpi } => layout_cmd::cmd_layout(&config, &image, dpi).await,
        Commands::Backends => backends::cmd_backends(&config).await,
        Commands::Config => config_cmd::cmd_config_show(&config).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_segment() {
        let cli = Cli::try_parse_from([
            "examcrop", "segment", "a.png", "b.png", "--workers", "4", "--raw", "-v",
        ])
        .unwrap();
        assert!(cli.verbose);
        match cli.command {
            Commands::Segment {
                inputs, workers, raw, ..
            } => {
                assert_eq!(inputs.len(), 2);
                assert_eq!(workers, 4);
                assert!(raw);
            }
            _ => panic!("expected segment"),
        }
    }

    #[test]
    fn test_segment_requires_input() {
        assert!(Cli::try_parse_from(["examcrop", "segment"]).is_err());
    }
}
