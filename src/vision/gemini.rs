//! Google Gemini vision engine.
//!
//! Requires GEMINI_API_KEY environment variable.
//!
//! Free tier limits (Gemini 1.5 Flash):
//! - 15 requests per minute
//! - 1,500 requests per day

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::api_backend::{build_client, send, EncodedImage};
use super::{VisionConfig, VisionEngine, VisionEngineKind, VisionError};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Gemini engine using Google's Generative AI API.
pub struct GeminiEngine {
    config: VisionConfig,
    api_key: Option<String>,
    model: String,
}

#[derive(Debug, Serialize)]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(rename = "generationConfig")]
    generation_config: GeminiGenerationConfig,
}

#[derive(Debug, Serialize)]
struct GeminiContent {
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum GeminiPart {
    Text { text: String },
    InlineData { inline_data: GeminiInlineData },
}

#[derive(Debug, Serialize)]
struct GeminiInlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
struct GeminiGenerationConfig {
    temperature: f32,
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
    #[serde(rename = "responseMimeType")]
    response_mime_type: String,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    candidates: Option<Vec<GeminiCandidate>>,
    error: Option<GeminiError>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: GeminiResponseContent,
}

#[derive(Debug, Deserialize)]
struct GeminiResponseContent {
    #[serde(default)]
    parts: Vec<GeminiResponsePart>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponsePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiError {
    message: String,
}

impl GeminiEngine {
    /// Create a Gemini engine, reading the key from `GEMINI_API_KEY`.
    pub fn new(config: VisionConfig) -> Self {
        let model = config.model.clone().unwrap_or_else(|| {
            VisionEngineKind::Gemini.default_model().to_string()
        });
        Self {
            config,
            api_key: std::env::var("GEMINI_API_KEY").ok(),
            model,
        }
    }

    /// Set the API key.
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    fn endpoint(&self, api_key: &str) -> String {
        let base = self
            .config
            .base_url
            .as_deref()
            .unwrap_or(DEFAULT_BASE_URL)
            .trim_end_matches('/');
        format!(
            "{}/v1beta/models/{}:generateContent?key={}",
            base, self.model, api_key
        )
    }
}

#[async_trait]
impl VisionEngine for GeminiEngine {
    fn kind(&self) -> VisionEngineKind {
        VisionEngineKind::Gemini
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn is_available(&self) -> bool {
        self.api_key.is_some()
    }

    fn availability_hint(&self) -> String {
        if self.api_key.is_none() {
            "GEMINI_API_KEY not set. Get an API key from https://ai.google.dev/".to_string()
        } else {
            format!("Gemini Vision is available (model: {})", self.model)
        }
    }

    fn config(&self) -> &VisionConfig {
        &self.config
    }

    async fn complete(&self, image: &EncodedImage, prompt: &str) -> Result<String, VisionError> {
        let api_key = self.api_key.as_ref().ok_or_else(|| {
            VisionError::NotConfigured(
                "GEMINI_API_KEY not set. Get an API key from https://ai.google.dev/".to_string(),
            )
        })?;

        let request = GeminiRequest {
            contents: vec![GeminiContent {
                parts: vec![
                    GeminiPart::Text {
                        text: prompt.to_string(),
                    },
                    GeminiPart::InlineData {
                        inline_data: GeminiInlineData {
                            mime_type: image.mime_type.to_string(),
                            data: image.data.clone(),
                        },
                    },
                ],
            }],
            generation_config: GeminiGenerationConfig {
                temperature: 0.1,
                max_output_tokens: self.config.max_output_tokens,
                response_mime_type: "application/json".to_string(),
            },
        };

        let client = build_client(&self.config, VisionEngineKind::Gemini)?;
        debug!(
            "Gemini: sending {}x{} page to {}",
            image.width, image.height, self.model
        );
        let body = send(
            VisionEngineKind::Gemini,
            client.post(self.endpoint(api_key)).json(&request),
        )
        .await?;

        let response: GeminiResponse = serde_json::from_str(&body)
            .map_err(|e| VisionError::MalformedResponse(format!("Gemini envelope: {}", e)))?;

        if let Some(error) = response.error {
            return Err(VisionError::MalformedResponse(format!(
                "Gemini API error: {}",
                error.message
            )));
        }

        let text: String = response
            .candidates
            .and_then(|c| c.into_iter().next())
            .map(|c| {
                c.content
                    .parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .ok_or_else(|| VisionError::MalformedResponse("Gemini returned no candidates".to_string()))?;

        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_uses_base_url_override() {
        let config = VisionConfig {
            base_url: Some("http://127.0.0.1:9999/".to_string()),
            model: Some("gemini-test".to_string()),
            ..Default::default()
        };
        let engine = GeminiEngine::new(config).with_api_key("k");
        assert_eq!(
            engine.endpoint("k"),
            "http://127.0.0.1:9999/v1beta/models/gemini-test:generateContent?key=k"
        );
        assert!(engine.is_available());
    }

    #[test]
    fn test_request_shape() {
        let request = GeminiRequest {
            contents: vec![GeminiContent {
                parts: vec![GeminiPart::Text {
                    text: "p".to_string(),
                }],
            }],
            generation_config: GeminiGenerationConfig {
                temperature: 0.1,
                max_output_tokens: 100,
                response_mime_type: "application/json".to_string(),
            },
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["generationConfig"]["maxOutputTokens"], 100);
        assert_eq!(value["contents"][0]["parts"][0]["text"], "p");
    }
}
