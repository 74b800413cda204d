//! Cloud vision-description engines.
//!
//! An engine receives a whole page image and replies with a JSON description
//! of the questions on it, without pixel coordinates:
//!
//! ```json
//! { "questions": [ { "number": 1, "text": "...",
//!                    "options": {"A": "...", "B": "...", "C": "...", "D": "..."},
//!                    "confidence": 0.9 } ] }
//! ```
//!
//! - **Gemini**: Google Generative Language API (`GEMINI_API_KEY`)
//! - **Groq**: OpenAI-compatible chat completions (`GROQ_API_KEY`)
//!
//! Unlike on-device recognizers, engine failures are returned to the caller
//! as [`VisionError`].

mod api_backend;
mod gemini;
mod groq;

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{OptionLabel, PageImage};

pub use api_backend::{encode_page, extract_json_object, EncodedImage, VISION_PROMPT};
pub use gemini::GeminiEngine;
pub use groq::GroqEngine;

/// Errors from cloud vision engines.
#[derive(Debug, Error)]
pub enum VisionError {
    #[error("Vision engine not configured: {0}")]
    NotConfigured(String),

    #[error("{engine} rejected credentials: {message}")]
    Auth {
        engine: VisionEngineKind,
        message: String,
    },

    #[error("{engine} quota exceeded, retry after {retry_after_secs:?}s")]
    Quota {
        engine: VisionEngineKind,
        retry_after_secs: Option<u64>,
    },

    #[error("{engine} request timed out")]
    Timeout { engine: VisionEngineKind },

    #[error("Network error: {0}")]
    Network(String),

    #[error("{engine} API error ({status}): {body}")]
    Api {
        engine: VisionEngineKind,
        status: u16,
        body: String,
    },

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Image encoding failed: {0}")]
    Encode(String),
}

/// Available vision engines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VisionEngineKind {
    /// Google Gemini.
    #[default]
    Gemini,
    /// Groq (Llama 4 vision models).
    Groq,
}

impl VisionEngineKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            VisionEngineKind::Gemini => "gemini",
            VisionEngineKind::Groq => "groq",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "gemini" => Some(VisionEngineKind::Gemini),
            "groq" => Some(VisionEngineKind::Groq),
            _ => None,
        }
    }

    /// Model used when none is configured.
    pub fn default_model(&self) -> &'static str {
        match self {
            VisionEngineKind::Gemini => "gemini-1.5-flash",
            VisionEngineKind::Groq => "meta-llama/llama-4-scout-17b-16e-instruct",
        }
    }
}

impl std::fmt::Display for VisionEngineKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Settings shared by vision engines.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VisionConfig {
    pub engine: VisionEngineKind,
    /// Model identifier; the engine default when unset.
    pub model: Option<String>,
    pub max_output_tokens: u32,
    /// Pages are scaled down so neither side exceeds this many pixels.
    pub max_image_dimension: u32,
    pub connect_timeout_secs: u64,
    pub read_timeout_secs: u64,
    pub write_timeout_secs: u64,
    /// Return engine failures to the caller instead of skipping the page.
    pub surface_errors: bool,
    /// API base URL override (proxies, tests).
    pub base_url: Option<String>,
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            engine: VisionEngineKind::default(),
            model: None,
            max_output_tokens: 8192,
            max_image_dimension: 2048,
            connect_timeout_secs: 15,
            read_timeout_secs: 60,
            write_timeout_secs: 30,
            surface_errors: true,
            base_url: None,
        }
    }
}

impl VisionConfig {
    pub fn model_or_default(&self) -> String {
        self.model
            .clone()
            .unwrap_or_else(|| self.engine.default_model().to_string())
    }
}

/// One question as described by a vision engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisionQuestion {
    pub number: u32,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub options: BTreeMap<String, String>,
    #[serde(default = "default_confidence")]
    pub confidence: f32,
}

fn default_confidence() -> f32 {
    0.8
}

impl VisionQuestion {
    /// Non-empty options in label order.
    pub fn labeled_options(&self) -> Vec<(OptionLabel, &str)> {
        let mut options: Vec<(OptionLabel, &str)> = self
            .options
            .iter()
            .filter_map(|(key, text)| {
                let mut chars = key.trim().chars();
                let label = chars.next().and_then(OptionLabel::from_char)?;
                let text = text.trim();
                (chars.next().is_none() && !text.is_empty()).then_some((label, text))
            })
            .collect();
        options.sort_by_key(|(label, _)| *label);
        options
    }
}

#[derive(Debug, Deserialize)]
struct VisionResponse {
    #[serde(default)]
    questions: Vec<VisionQuestion>,
}

/// Parse the reply text of an engine.
///
/// The JSON object between the first `{` and the last `}` is decoded, which
/// strips code fences and commentary around it. An empty `questions` array
/// is a valid, empty page.
pub fn parse_questions(reply: &str) -> Result<Vec<VisionQuestion>, VisionError> {
    let json = extract_json_object(reply)
        .ok_or_else(|| VisionError::MalformedResponse("no JSON object in reply".to_string()))?;
    let response: VisionResponse = serde_json::from_str(json)
        .map_err(|e| VisionError::MalformedResponse(format!("invalid question JSON: {}", e)))?;
    Ok(response.questions)
}

/// Trait for cloud vision engines.
#[async_trait]
pub trait VisionEngine: Send + Sync {
    /// Get the engine kind.
    fn kind(&self) -> VisionEngineKind;

    /// Model identifier sent with each request.
    fn model(&self) -> &str;

    /// Check if credentials are present.
    fn is_available(&self) -> bool;

    /// Get a description of what's needed to make this engine available.
    fn availability_hint(&self) -> String;

    fn config(&self) -> &VisionConfig;

    /// Send an encoded page with the instruction prompt and return the text
    /// of the model's reply.
    async fn complete(&self, image: &EncodedImage, prompt: &str) -> Result<String, VisionError>;

    /// Describe every question on a page.
    async fn describe_page(&self, page: &PageImage) -> Result<Vec<VisionQuestion>, VisionError> {
        let image = encode_page(page, self.config().max_image_dimension)?;
        let reply = self.complete(&image, VISION_PROMPT).await?;
        parse_questions(&reply)
    }
}

/// Create the configured engine.
pub fn create_engine(config: &VisionConfig) -> Arc<dyn VisionEngine> {
    match config.engine {
        VisionEngineKind::Gemini => Arc::new(GeminiEngine::new(config.clone())),
        VisionEngineKind::Groq => Arc::new(GroqEngine::new(config.clone())),
    }
}
