//! Vision engines against a local HTTP server.

use serde_json::json;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use examcrop::models::{PageImage, PixelFormat};
use examcrop::vision::{GeminiEngine, GroqEngine, VisionConfig, VisionEngine, VisionEngineKind, VisionError};

const QUESTIONS: &str = r#"{"questions":[{"number":7,"text":"Hangisi doğrudur?","options":{"A":"bir","B":"iki","C":"üç","D":"dört"},"confidence":0.92}]}"#;

fn page() -> PageImage {
    PageImage::from_raw(vec![230; 300 * 400], 300, 400, 150, PixelFormat::Gray8)
}

fn gemini(server: &MockServer) -> GeminiEngine {
    GeminiEngine::new(VisionConfig {
        base_url: Some(server.uri()),
        model: Some("gemini-test".to_string()),
        ..Default::default()
    })
    .with_api_key("test-key")
}

fn gemini_reply(text: &str) -> serde_json::Value {
    json!({ "candidates": [ { "content": { "parts": [ { "text": text } ] } } ] })
}

#[tokio::test]
async fn test_gemini_describes_page() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-test:generateContent"))
        .and(query_param("key", "test-key"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(gemini_reply(&format!("```json\n{}\n```", QUESTIONS))),
        )
        .expect(1)
        .mount(&server)
        .await;

    let questions = gemini(&server).describe_page(&page()).await.unwrap();
    assert_eq!(questions.len(), 1);
    assert_eq!(questions[0].number, 7);
    assert_eq!(questions[0].labeled_options().len(), 4);
}

#[tokio::test]
async fn test_gemini_quota_carries_retry_after() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "12"))
        .mount(&server)
        .await;

    let err = gemini(&server).describe_page(&page()).await.unwrap_err();
    assert!(matches!(
        err,
        VisionError::Quota {
            engine: VisionEngineKind::Gemini,
            retry_after_secs: Some(12)
        }
    ));
}

#[tokio::test]
async fn test_gemini_auth_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(403).set_body_string("API key not valid"))
        .mount(&server)
        .await;

    let err = gemini(&server).describe_page(&page()).await.unwrap_err();
    match err {
        VisionError::Auth { message, .. } => assert!(message.contains("API key")),
        other => panic!("expected auth error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_gemini_malformed_reply() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(gemini_reply("Üzgünüm, okuyamadım.")))
        .mount(&server)
        .await;

    let err = gemini(&server).describe_page(&page()).await.unwrap_err();
    assert!(matches!(err, VisionError::MalformedResponse(_)));
}

#[tokio::test]
async fn test_gemini_empty_page_is_valid() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(gemini_reply(r#"{"questions": []}"#)))
        .mount(&server)
        .await;

    let questions = gemini(&server).describe_page(&page()).await.unwrap();
    assert!(questions.is_empty());
}

#[tokio::test]
async fn test_groq_describes_page() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer groq-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [ { "message": { "role": "assistant", "content": QUESTIONS } } ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let engine = GroqEngine::new(VisionConfig {
        engine: VisionEngineKind::Groq,
        base_url: Some(server.uri()),
        ..Default::default()
    })
    .with_api_key("groq-key");
    let questions = engine.describe_page(&page()).await.unwrap();
    assert_eq!(questions[0].text, "Hangisi doğrudur?");
}

#[tokio::test]
async fn test_missing_key_is_not_configured() {
    let engine = GroqEngine::new(VisionConfig {
        base_url: Some("http://127.0.0.1:9".to_string()),
        ..Default::default()
    });
    if engine.is_available() {
        // GROQ_API_KEY is set in this environment.
        return;
    }
    let err = engine.describe_page(&page()).await.unwrap_err();
    assert!(matches!(err, VisionError::NotConfigured(_)));
}
