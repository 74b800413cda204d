//! Shared helper functions for CLI commands.

use std::path::Path;

use console::{style, StyledObject};
use indicatif::{ProgressBar, ProgressStyle};

/// Green check mark.
pub fn success() -> StyledObject<&'static str> {
    style("✓").green()
}

/// Red cross.
pub fn error() -> StyledObject<&'static str> {
    style("✗").red()
}

/// Yellow exclamation mark.
pub fn warning() -> StyledObject<&'static str> {
    style("!").yellow()
}

/// Progress bar in the house style.
pub fn page_progress(total: u64) -> ProgressBar {
    let progress = ProgressBar::new(total);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{spinner:.green} [{bar:30.cyan/blue}] {pos}/{len} {wide_msg}")
    {
        progress.set_style(style.progress_chars("█▓░"));
    }
    progress
}

/// File stem used to name crops, `page` when the path has none.
pub fn file_stem(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("page")
        .to_string()
}
