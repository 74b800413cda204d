//! Shared infrastructure for cloud vision engines (Gemini, Groq).
//!
//! Provides page encoding, HTTP client construction and response status
//! classification.

use std::io::Cursor;
use std::time::Duration;

use base64::Engine;
use image::imageops::FilterType;
use image::ImageFormat;
use reqwest::{Client, RequestBuilder, StatusCode};
use tracing::debug;

use super::{VisionConfig, VisionEngineKind, VisionError};
use crate::models::PageImage;

/// Instruction sent with every page.
pub const VISION_PROMPT: &str = "Bu görüntü bir sınav sayfasıdır. Sayfadaki her soruyu bul ve yalnızca şu biçimde JSON döndür: \
{\"questions\": [{\"number\": <soru numarası>, \"text\": \"<soru kökü>\", \"options\": {\"A\": \"...\", \"B\": \"...\", \"C\": \"...\", \"D\": \"...\"}, \"confidence\": <0-1 arası>}]}. \
Metni sayfada göründüğü gibi yaz, E şıkkı varsa ekle. Açıklama ekleme. Sayfada soru yoksa boş bir questions dizisi döndür.";

/// A page encoded for transmission.
#[derive(Debug, Clone)]
pub struct EncodedImage {
    /// Base64 image bytes.
    pub data: String,
    pub mime_type: &'static str,
    pub width: u32,
    pub height: u32,
}

impl EncodedImage {
    /// `data:` URL form used by OpenAI-compatible APIs.
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.data)
    }
}

/// Scale a page so neither side exceeds `max_dimension`, then JPEG- and
/// base64-encode it. The scaled copy does not outlive this call.
pub fn encode_page(page: &PageImage, max_dimension: u32) -> Result<EncodedImage, VisionError> {
    let image = page.to_dynamic().ok_or_else(|| {
        VisionError::Encode(format!(
            "page buffer does not match {}x{}",
            page.width(),
            page.height()
        ))
    })?;

    let max_dimension = max_dimension.max(1);
    let image = if image.width() > max_dimension || image.height() > max_dimension {
        debug!(
            "Scaling page {}x{} down to fit {}px",
            image.width(),
            image.height(),
            max_dimension
        );
        image.resize(max_dimension, max_dimension, FilterType::Triangle)
    } else {
        image
    };
    let (width, height) = (image.width(), image.height());

    let mut bytes = Vec::new();
    image::DynamicImage::ImageRgb8(image.to_rgb8())
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Jpeg)
        .map_err(|e| VisionError::Encode(e.to_string()))?;

    Ok(EncodedImage {
        data: base64::engine::general_purpose::STANDARD.encode(&bytes),
        mime_type: "image/jpeg",
        width,
        height,
    })
}

/// The text between the first `{` and the last `}`, inclusive.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

/// Build an HTTP client with independent connect and read bounds; the total
/// request time is bounded by their sum plus the write allowance.
pub fn build_client(config: &VisionConfig, engine: VisionEngineKind) -> Result<Client, VisionError> {
    let connect = Duration::from_secs(config.connect_timeout_secs);
    let read = Duration::from_secs(config.read_timeout_secs);
    let write = Duration::from_secs(config.write_timeout_secs);
    Client::builder()
        .user_agent(concat!("examcrop/", env!("CARGO_PKG_VERSION")))
        .connect_timeout(connect)
        .read_timeout(read)
        .timeout(connect + read + write)
        .gzip(true)
        .build()
        .map_err(|e| VisionError::Network(format!("Failed to create HTTP client for {}: {}", engine, e)))
}

/// Map a non-success status to a typed error.
pub fn classify_status(
    engine: VisionEngineKind,
    status: StatusCode,
    retry_after: Option<&str>,
    body: String,
) -> VisionError {
    match status.as_u16() {
        401 | 403 => VisionError::Auth {
            engine,
            message: truncate(&body, 300),
        },
        429 => VisionError::Quota {
            engine,
            retry_after_secs: retry_after.and_then(|s| s.trim().parse::<u64>().ok()),
        },
        code => VisionError::Api {
            engine,
            status: code,
            body: truncate(&body, 1000),
        },
    }
}

/// Map a transport failure to a typed error.
pub fn classify_transport(engine: VisionEngineKind, error: reqwest::Error) -> VisionError {
    if error.is_timeout() {
        VisionError::Timeout { engine }
    } else {
        VisionError::Network(format!("{} request failed: {}", engine, error))
    }
}

/// Send a request and return the body of a successful response.
pub async fn send(engine: VisionEngineKind, request: RequestBuilder) -> Result<String, VisionError> {
    let response = request
        .send()
        .await
        .map_err(|e| classify_transport(engine, e))?;

    let status = response.status();
    if !status.is_success() {
        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());
        let body = response.text().await.unwrap_or_default();
        return Err(classify_status(engine, status, retry_after.as_deref(), body));
    }

    response
        .text()
        .await
        .map_err(|e| classify_transport(engine, e))
}

fn truncate(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}
