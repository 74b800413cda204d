//! Page rasterization: image files and PDFs rendered with poppler-utils.

use std::path::{Path, PathBuf};
use std::process::Command;

use tempfile::TempDir;
use thiserror::Error;
use tracing::debug;

use crate::models::PageImage;

/// Resolution assumed for plain image files.
pub const DEFAULT_IMAGE_DPI: u32 = 150;

/// Errors that can occur while producing a page image.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("External tool not found: {0}")]
    ToolNotFound(String),

    #[error("Rendering failed: {0}")]
    RenderFailed(String),

    #[error("Page {page} out of range (document has {count})")]
    PageOutOfRange { page: u32, count: u32 },

    #[error("Image decode error: {0}")]
    Decode(#[from] image::ImageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Check command status, returning appropriate error on failure.
fn check_cmd_status(
    result: std::io::Result<std::process::ExitStatus>,
    tool_name: &str,
    error_msg: &str,
) -> Result<(), RenderError> {
    match result {
        Ok(s) if s.success() => Ok(()),
        Ok(_) => Err(RenderError::RenderFailed(error_msg.to_string())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(RenderError::ToolNotFound(tool_name.to_string()))
        }
        Err(e) => Err(RenderError::Io(e)),
    }
}

/// A document whose pages can be rasterized one at a time. Pages are
/// numbered from 1.
pub trait PageSource: Send + Sync {
    fn page_count(&self) -> u32;

    fn render(&self, page: u32) -> Result<PageImage, RenderError>;
}

/// One page per image file.
pub struct ImageFiles {
    paths: Vec<PathBuf>,
    dpi: u32,
}

impl ImageFiles {
    pub fn new(paths: Vec<PathBuf>) -> Self {
        Self {
            paths,
            dpi: DEFAULT_IMAGE_DPI,
        }
    }

    pub fn with_dpi(mut self, dpi: u32) -> Self {
        self.dpi = dpi;
        self
    }
}

impl PageSource for ImageFiles {
    fn page_count(&self) -> u32 {
        self.paths.len() as u32
    }

    fn render(&self, page: u32) -> Result<PageImage, RenderError> {
        let path = page
            .checked_sub(1)
            .and_then(|i| self.paths.get(i as usize))
            .ok_or(RenderError::PageOutOfRange {
                page,
                count: self.page_count(),
            })?;
        debug!("Decoding page {} from {}", page, path.display());
        Ok(PageImage::open(path, self.dpi)?)
    }
}

/// A PDF rendered page by page with `pdftoppm`.
pub struct PdfDocument {
    path: PathBuf,
    dpi: u32,
    page_count: u32,
}

impl PdfDocument {
    /// Open a PDF, reading its page count with `pdfinfo`.
    pub fn open(path: &Path, dpi: u32) -> Result<Self, RenderError> {
        let page_count = pdf_page_count(path)?;
        debug!("{}: {} pages", path.display(), page_count);
        Ok(Self {
            path: path.to_path_buf(),
            dpi,
            page_count,
        })
    }
}

impl PageSource for PdfDocument {
    fn page_count(&self) -> u32 {
        self.page_count
    }

    fn render(&self, page: u32) -> Result<PageImage, RenderError> {
        if page == 0 || page > self.page_count {
            return Err(RenderError::PageOutOfRange {
                page,
                count: self.page_count,
            });
        }

        let temp_dir = TempDir::new()?;
        let output_prefix = temp_dir.path().join("page");
        let page_str = page.to_string();
        let dpi_str = self.dpi.to_string();

        let status = Command::new("pdftoppm")
            .args(["-png", "-r", &dpi_str, "-f", &page_str, "-l", &page_str])
            .arg(&self.path)
            .arg(&output_prefix)
            .status();
        check_cmd_status(
            status,
            "pdftoppm (install poppler-utils)",
            &format!("pdftoppm failed to convert page {}", page),
        )?;

        let image_path = find_page_image(temp_dir.path(), page).ok_or_else(|| {
            RenderError::RenderFailed(format!("No image generated for page {}", page))
        })?;
        Ok(PageImage::open(&image_path, self.dpi)?)
    }
}

/// Page count reported by `pdfinfo`.
pub fn pdf_page_count(path: &Path) -> Result<u32, RenderError> {
    let output = match Command::new("pdfinfo").arg(path).output() {
        Ok(output) => output,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(RenderError::ToolNotFound(
                "pdfinfo (install poppler-utils)".to_string(),
            ))
        }
        Err(e) => return Err(RenderError::Io(e)),
    };
    if !output.status.success() {
        return Err(RenderError::RenderFailed(format!(
            "pdfinfo failed: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }
    parse_page_count(&String::from_utf8_lossy(&output.stdout))
        .ok_or_else(|| RenderError::RenderFailed("pdfinfo reported no page count".to_string()))
}

fn parse_page_count(info: &str) -> Option<u32> {
    info.lines()
        .find(|line| line.starts_with("Pages:"))
        .and_then(|line| line.split_whitespace().nth(1))
        .and_then(|s| s.parse().ok())
}

/// Find the image file pdftoppm wrote for a page. The number is zero-padded
/// to the width of the document's page count.
fn find_page_image(dir: &Path, page: u32) -> Option<PathBuf> {
    [1, 2, 3, 4]
        .into_iter()
        .map(|digits| dir.join(format!("page-{:0width$}.png", page, width = digits)))
        .find(|path| path.exists())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_page_count() {
        let info = "Title:          Deneme\nPages:          12\nEncrypted:      no\n";
        assert_eq!(parse_page_count(info), Some(12));
        assert_eq!(parse_page_count("Title: x"), None);
    }

    #[test]
    fn test_find_page_image_padding() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("page-007.png"), b"").unwrap();
        assert_eq!(find_page_image(dir.path(), 7), Some(dir.path().join("page-007.png")));
        assert_eq!(find_page_image(dir.path(), 8), None);
    }

    #[test]
    fn test_image_files_pages_are_one_based() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("p.png");
        image::GrayImage::from_pixel(40, 30, image::Luma([255u8]))
            .save(&path)
            .unwrap();
        let source = ImageFiles::new(vec![path]).with_dpi(200);
        assert_eq!(source.page_count(), 1);
        let page = source.render(1).unwrap();
        assert_eq!((page.width(), page.height(), page.dpi()), (40, 30, 200));
        assert!(matches!(
            source.render(0),
            Err(RenderError::PageOutOfRange { page: 0, count: 1 })
        ));
        assert!(matches!(source.render(2), Err(RenderError::PageOutOfRange { .. })));
    }

    #[test]
    fn test_missing_image_is_decode_or_io_error() {
        let source = ImageFiles::new(vec![PathBuf::from("/nonexistent/page.png")]);
        assert!(source.render(1).is_err());
    }
}
