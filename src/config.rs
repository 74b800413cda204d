//! Configuration management for examcrop using the prefer crate.
//!
//! Every field has a default, so an empty file (or no file at all) is a
//! valid configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::assembler::AssemblerConfig;
use crate::boundary::BoundaryConfig;
use crate::layout::LayoutConfig;
use crate::ocr::{OcrConfig, RecognizerKind};
use crate::orchestrator::{AnchoringConfig, RecognitionMode};
use crate::patterns::{MatcherConfig, PublisherFormat};
use crate::vision::VisionConfig;

/// Overrides `segmentation.recognition_mode`.
pub const ENV_RECOGNITION_MODE: &str = "EXAMCROP_RECOGNITION_MODE";
/// Overrides `vision.model`.
pub const ENV_VISION_MODEL: &str = "EXAMCROP_VISION_MODEL";

/// Settings of the per-page segmentation pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentationConfig {
    /// Question height limits, padding and snapping.
    #[serde(flatten)]
    pub boundary: BoundaryConfig,
    /// Questions scored below this are dropped at assembly.
    pub min_confidence: f32,
    pub recognition_mode: RecognitionMode,
    /// Forces a publisher instead of detecting it from page text.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publisher_format: Option<PublisherFormat>,
    pub layout: LayoutConfig,
    pub matcher: MatcherConfig,
    pub anchoring: AnchoringConfig,
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            boundary: BoundaryConfig::default(),
            min_confidence: AssemblerConfig::default().min_confidence,
            recognition_mode: RecognitionMode::default(),
            publisher_format: None,
            layout: LayoutConfig::default(),
            matcher: MatcherConfig::default(),
            anchoring: AnchoringConfig::default(),
        }
    }
}

impl SegmentationConfig {
    pub fn assembler(&self) -> AssemblerConfig {
        AssemblerConfig {
            min_confidence: self.min_confidence,
        }
    }
}

/// On-device recognizer selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrSettings {
    pub primary: RecognizerKind,
    /// Fallback (or merge partner) for the primary recognizer.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secondary: Option<RecognizerKind>,
    /// Tesseract language code.
    pub language: String,
}

impl Default for OcrSettings {
    fn default() -> Self {
        Self {
            primary: RecognizerKind::Tesseract,
            secondary: Some(RecognizerKind::TesseractSparse),
            language: OcrConfig::default().language,
        }
    }
}

impl OcrSettings {
    /// Recognizer settings, with an optional precomputed lines file.
    pub fn recognizer_config(&self, lines_path: Option<PathBuf>) -> OcrConfig {
        OcrConfig {
            language: self.language.clone(),
            lines_path,
        }
    }
}

/// Top-level configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub segmentation: SegmentationConfig,
    pub ocr: OcrSettings,
    pub vision: VisionConfig,
    /// File this configuration was read from.
    #[serde(skip)]
    pub source_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration using prefer crate for discovery.
    /// Automatically discovers examcrop config files in standard locations.
    pub async fn load() -> Self {
        match prefer::load("examcrop").await {
            Ok(pref_config) => {
                if let Some(path) = pref_config.source_path() {
                    match Self::load_from_path(path).await {
                        Ok(config) => config,
                        Err(e) => {
                            warn!("{}; using defaults", e);
                            Self::default_with_env()
                        }
                    }
                } else {
                    Self::default_with_env()
                }
            }
            Err(e) => {
                debug!("No config file found ({}), using defaults", e);
                Self::default_with_env()
            }
        }
    }

    /// Load from an explicit path, or discover one.
    pub async fn load_or_discover(path: Option<&Path>) -> Self {
        match path {
            Some(path) => match Self::load_from_path(path).await {
                Ok(config) => config,
                Err(e) => {
                    warn!("{}; using defaults", e);
                    Self::default_with_env()
                }
            },
            None => Self::load().await,
        }
    }

    /// Default config with environment variable overrides applied.
    pub fn default_with_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// Load configuration from a specific file path.
    /// Supports JSON, TOML and YAML based on file extension.
    pub async fn load_from_path(path: &Path) -> Result<Self, String> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| format!("Failed to read config file {}: {}", path.display(), e))?;

        let mut config = Self::parse(&contents, path)?;
        config.source_path = Some(path.to_path_buf());
        Ok(config.with_env_overrides())
    }

    fn parse(contents: &str, path: &Path) -> Result<Self, String> {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("json");
        match ext {
            "toml" => {
                toml::from_str(contents).map_err(|e| format!("Failed to parse TOML config: {}", e))
            }
            "yaml" | "yml" => serde_yaml::from_str(contents)
                .map_err(|e| format!("Failed to parse YAML config: {}", e)),
            _ => serde_json::from_str(contents)
                .map_err(|e| format!("Failed to parse JSON config: {}", e)),
        }
    }

    /// Apply `EXAMCROP_*` environment overrides.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(value) = lookup(ENV_RECOGNITION_MODE).filter(|v| !v.is_empty()) {
            match RecognitionMode::from_str(&value) {
                Some(mode) => self.segmentation.recognition_mode = mode,
                None => warn!("Ignoring unknown {}={}", ENV_RECOGNITION_MODE, value),
            }
        }
        if let Some(model) = lookup(ENV_VISION_MODEL).filter(|v| !v.is_empty()) {
            self.vision.model = Some(model);
        }
        self
    }

    /// Effective configuration as TOML.
    pub fn to_toml(&self) -> Result<String, String> {
        toml::to_string_pretty(self).map_err(|e| format!("Failed to serialize config: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(suffix: &str, contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[tokio::test]
    async fn test_load_toml() {
        let file = write_config(
            ".toml",
            r#"
[segmentation]
min_question_height = 60
min_confidence = 0.5
recognition_mode = "confidence_merge"
publisher_format = "palme"

[segmentation.padding]
top = 4
bottom = 4
left = 2
right = 2

[vision]
engine = "groq"
max_output_tokens = 4096
"#,
        );
        let config = Config::load_from_path(file.path()).await.unwrap();
        assert_eq!(config.segmentation.boundary.min_question_height, 60);
        assert_eq!(config.segmentation.boundary.padding.top, 4);
        assert_eq!(config.segmentation.boundary.max_question_height, 2000);
        assert_eq!(config.segmentation.min_confidence, 0.5);
        assert_eq!(config.segmentation.publisher_format, Some(PublisherFormat::Palme));
        assert_eq!(config.vision.max_output_tokens, 4096);
        assert_eq!(config.source_path.as_deref(), Some(file.path()));
    }

    #[tokio::test]
    async fn test_load_yaml_and_empty_json() {
        let yaml = write_config(".yaml", "ocr:\n  language: eng\n");
        let config = Config::load_from_path(yaml.path()).await.unwrap();
        assert_eq!(config.ocr.language, "eng");
        assert_eq!(config.ocr.primary, RecognizerKind::Tesseract);

        let json = write_config(".json", "{}");
        let config = Config::load_from_path(json.path()).await.unwrap();
        assert_eq!(config.segmentation.boundary.padding.left, 10);
    }

    #[tokio::test]
    async fn test_invalid_file_is_error() {
        let file = write_config(".toml", "segmentation = 3");
        assert!(Config::load_from_path(file.path()).await.is_err());
        assert!(Config::load_from_path(Path::new("/nonexistent/examcrop.toml"))
            .await
            .is_err());
    }

    #[test]
    fn test_env_overrides() {
        let config = Config::default().with_overrides(|key| match key {
            ENV_RECOGNITION_MODE => Some("vision".to_string()),
            ENV_VISION_MODEL => Some("gemini-2.0-flash".to_string()),
            _ => None,
        });
        assert_eq!(config.segmentation.recognition_mode, RecognitionMode::Vision);
        assert_eq!(config.vision.model.as_deref(), Some("gemini-2.0-flash"));

        let config = Config::default().with_overrides(|_| Some("bogus".to_string()));
        assert_eq!(config.segmentation.recognition_mode, RecognitionMode::OnDevice);
    }

    #[test]
    fn test_to_toml_round_trips() {
        let toml = Config::default().to_toml().unwrap();
        assert!(toml.contains("min_question_height"));
        let parsed: Config = toml::from_str(&toml).unwrap();
        assert_eq!(parsed.segmentation.boundary.min_question_height, 40);
    }
}
