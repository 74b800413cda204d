//! Layout analysis command.

use std::path::Path;

use examcrop::config::Config;
use examcrop::layout::LayoutAnalyzer;
use examcrop::models::PageImage;

/// Print the layout of one page image.
pub async fn cmd_layout(config: &Config, image: &Path, dpi: u32) -> anyhow::Result<()> {
    if !image.exists() {
        anyhow::bail!("Image not found: {}", image.display());
    }
    let page = PageImage::open(image, dpi)?;
    let analyzer = LayoutAnalyzer::new(config.segmentation.layout.clone());
    let layout = tokio::task::spawn_blocking(move || analyzer.analyze(&page)).await?;
    println!("{}", serde_json::to_string_pretty(&layout)?);
    Ok(())
}
