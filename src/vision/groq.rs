//! Groq vision engine.
//!
//! Uses Groq's OpenAI-compatible API with Llama 4 vision models.
//! Requires GROQ_API_KEY environment variable.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::api_backend::{build_client, send, EncodedImage};
use super::{VisionConfig, VisionEngine, VisionEngineKind, VisionError};

const DEFAULT_BASE_URL: &str = "https://api.groq.com/openai";

/// Groq engine using the OpenAI-compatible chat completions API.
pub struct GroqEngine {
    config: VisionConfig,
    api_key: Option<String>,
    model: String,
}

#[derive(Debug, Serialize)]
struct GroqRequest {
    model: String,
    messages: Vec<GroqMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct GroqMessage {
    role: String,
    content: Vec<GroqContent>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type")]
enum GroqContent {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "image_url")]
    ImageUrl { image_url: GroqImageUrl },
}

#[derive(Debug, Serialize)]
struct GroqImageUrl {
    url: String,
}

#[derive(Debug, Deserialize)]
struct GroqResponse {
    choices: Option<Vec<GroqChoice>>,
    error: Option<GroqError>,
}

#[derive(Debug, Deserialize)]
struct GroqChoice {
    message: GroqResponseMessage,
}

#[derive(Debug, Deserialize)]
struct GroqResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GroqError {
    message: String,
}

impl GroqEngine {
    /// Create a Groq engine, reading the key from `GROQ_API_KEY`.
    pub fn new(config: VisionConfig) -> Self {
        let model = config
            .model
            .clone()
            .unwrap_or_else(|| VisionEngineKind::Groq.default_model().to_string());
        Self {
            config,
            api_key: std::env::var("GROQ_API_KEY").ok(),
            model,
        }
    }

    /// Set the API key.
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    fn endpoint(&self) -> String {
        let base = self
            .config
            .base_url
            .as_deref()
            .unwrap_or(DEFAULT_BASE_URL)
            .trim_end_matches('/');
        format!("{}/v1/chat/completions", base)
    }
}

#[async_trait]
impl VisionEngine for GroqEngine {
    fn kind(&self) -> VisionEngineKind {
        VisionEngineKind::Groq
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn is_available(&self) -> bool {
        self.api_key.is_some()
    }

    fn availability_hint(&self) -> String {
        if self.api_key.is_none() {
            "GROQ_API_KEY not set. Get an API key from https://console.groq.com/".to_string()
        } else {
            format!("Groq Vision is available (model: {})", self.model)
        }
    }

    fn config(&self) -> &VisionConfig {
        &self.config
    }

    async fn complete(&self, image: &EncodedImage, prompt: &str) -> Result<String, VisionError> {
        let api_key = self.api_key.as_ref().ok_or_else(|| {
            VisionError::NotConfigured(
                "GROQ_API_KEY not set. Get an API key from https://console.groq.com/".to_string(),
            )
        })?;

        let request = GroqRequest {
            model: self.model.clone(),
            messages: vec![GroqMessage {
                role: "user".to_string(),
                content: vec![
                    GroqContent::Text {
                        text: prompt.to_string(),
                    },
                    GroqContent::ImageUrl {
                        image_url: GroqImageUrl {
                            url: image.data_url(),
                        },
                    },
                ],
            }],
            max_tokens: self.config.max_output_tokens,
            temperature: 0.1,
        };

        let client = build_client(&self.config, VisionEngineKind::Groq)?;
        debug!(
            "Groq: sending {}x{} page to {}",
            image.width, image.height, self.model
        );
        let body = send(
            VisionEngineKind::Groq,
            client
                .post(self.endpoint())
                .bearer_auth(api_key)
                .json(&request),
        )
        .await?;

        let response: GroqResponse = serde_json::from_str(&body)
            .map_err(|e| VisionError::MalformedResponse(format!("Groq envelope: {}", e)))?;

        if let Some(error) = response.error {
            return Err(VisionError::MalformedResponse(format!(
                "Groq API error: {}",
                error.message
            )));
        }

        response
            .choices
            .and_then(|c| c.into_iter().next())
            .and_then(|c| c.message.content)
            .ok_or_else(|| VisionError::MalformedResponse("Groq returned no choices".to_string()))
    }
}
