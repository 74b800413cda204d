//! examcrop - exam question segmentation.
//!
//! Finds every question (stem plus answer choices) on a scanned exam page
//! using text positions, layout geometry and numbering heuristics, so each
//! one can be cropped out on its own.
//!
//! Data flows strictly downward: page image, layout, recognized lines,
//! pattern matches, boundaries, assembled questions.

pub mod assembler;
pub mod boundary;
pub mod config;
pub mod layout;
pub mod models;
pub mod ocr;
pub mod orchestrator;
pub mod patterns;
pub mod pipeline;
pub mod render;
pub mod utils;
pub mod vision;

pub use assembler::{AssemblerConfig, QuestionAssembler};
pub use boundary::{BoundaryConfig, BoundaryInferencer, ColumnLines};
pub use config::{Config, SegmentationConfig};
pub use layout::{LayoutAnalyzer, LayoutConfig};
pub use orchestrator::{Orchestrator, RecognitionMode};
pub use pipeline::{PageError, PageResult, PageSegmenter, SegmentEvent};
