//! Gemini client for student work analysis.
//!
//! Each call to [`GeminiGateway::analyze`] makes exactly one request to
//! the `generateContent` endpoint. There are no retries; any failure is
//! reported once and the caller decides whether to try again.

use crate::gateway::payload::ImagePayload;
use crate::gateway::schema::{instruction, parse_analysis, response_schema};
use crate::models::Analysis;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Maximum number of bytes of an error body kept for diagnostics.
const MAX_ERROR_BODY_BYTES: usize = 8 * 1024;

/// Configuration for the gateway.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub base_url: String,
    pub model_name: String,
    pub api_key: String,
    pub temperature: f32,
    pub timeout_seconds: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            model_name: "gemini-2.5-flash".to_string(),
            api_key: String::new(),
            temperature: 0.2,
            timeout_seconds: 120,
        }
    }
}

/// Why an analysis failed.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Non-2xx reply. `body` is the message from Google's error envelope
    /// when there is one, otherwise the raw body, truncated.
    #[error("analysis service returned error: status={status} body={body}")]
    Upstream { status: StatusCode, body: String },

    #[error("invalid response envelope: {0}")]
    Envelope(String),

    #[error("no response text from analysis service")]
    EmptyResponse,

    #[error("response does not match the analysis schema: {0}")]
    Schema(#[from] serde_json::Error),
}

/// Something that can analyse an image of student work.
pub trait AnalysisService {
    fn analyze(
        &self,
        payload: &ImagePayload,
    ) -> impl Future<Output = Result<Analysis, GatewayError>> + Send;
}

/// `generateContent` request body.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Part {
    Inline {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
    Text {
        text: String,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: String,
    response_schema: Value,
    temperature: f32,
}

/// `generateContent` response envelope. Only the fields we read.
#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorEnvelope {
    error: ApiError,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default)]
    message: Option<String>,
}

/// Build the request body for one image.
pub fn build_request(payload: &ImagePayload, temperature: f32) -> GenerateContentRequest {
    GenerateContentRequest {
        contents: vec![Content {
            parts: vec![
                Part::Inline {
                    inline_data: InlineData {
                        mime_type: payload.mime_type().to_string(),
                        data: payload.data().to_string(),
                    },
                },
                Part::Text {
                    text: instruction().to_string(),
                },
            ],
        }],
        generation_config: GenerationConfig {
            response_mime_type: "application/json".to_string(),
            response_schema: response_schema(),
            temperature,
        },
    }
}

/// Concatenated text of the first candidate, if there is any.
fn response_text(response: GenerateContentResponse) -> Option<String> {
    let candidate = response.candidates.into_iter().next()?;

    if let Some(reason) = &candidate.finish_reason {
        debug!("Candidate finish reason: {}", reason);
    }

    let text: String = candidate
        .content?
        .parts
        .into_iter()
        .filter_map(|p| p.text)
        .collect();

    if text.trim().is_empty() {
        None
    } else {
        Some(text)
    }
}

/// Gateway to the Gemini `generateContent` API.
pub struct GeminiGateway {
    config: GatewayConfig,
    http_client: reqwest::Client,
}

impl GeminiGateway {
    /// Create a new gateway.
    pub fn new(config: GatewayConfig) -> Result<Self, GatewayError> {
        info!("Initializing analysis gateway with model {}", config.model_name);

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(concat!("gradelens/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            config,
            http_client,
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            self.config.model_name
        )
    }

    async fn to_upstream_error(response: reqwest::Response) -> GatewayError {
        let status = response.status();
        let raw = read_limited_text(response).await;

        let body = serde_json::from_str::<ApiErrorEnvelope>(&raw)
            .ok()
            .and_then(|e| e.error.message)
            .unwrap_or(raw);

        GatewayError::Upstream { status, body }
    }
}

impl AnalysisService for GeminiGateway {
    async fn analyze(&self, payload: &ImagePayload) -> Result<Analysis, GatewayError> {
        let request = build_request(payload, self.config.temperature);

        debug!(
            "Sending {} image ({} encoded bytes) to {}",
            payload.mime_type(),
            payload.data().len(),
            self.config.model_name
        );

        let response = self
            .http_client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    warn!("Request timed out after {}s", self.config.timeout_seconds);
                } else if e.is_connect() {
                    warn!("Cannot connect to {}", self.config.base_url);
                }
                GatewayError::Request(e)
            })?;

        if !response.status().is_success() {
            return Err(Self::to_upstream_error(response).await);
        }

        let body = response.text().await?;
        let envelope: GenerateContentResponse =
            serde_json::from_str(&body).map_err(|e| GatewayError::Envelope(e.to_string()))?;

        let text = response_text(envelope).ok_or(GatewayError::EmptyResponse)?;
        let analysis = parse_analysis(&text)?;

        info!(
            "Analysis complete: {} errors found",
            analysis.errors.len()
        );

        Ok(analysis)
    }
}

/// Read at most `MAX_ERROR_BODY_BYTES` of a response body, chunk by chunk.
async fn read_limited_text(mut response: reqwest::Response) -> String {
    let mut buf = Vec::new();

    loop {
        match response.chunk().await {
            Ok(Some(chunk)) => {
                let remaining = MAX_ERROR_BODY_BYTES - buf.len();
                buf.extend_from_slice(&chunk[..chunk.len().min(remaining)]);
                if buf.len() >= MAX_ERROR_BODY_BYTES {
                    break;
                }
            }
            Ok(None) => break,
            Err(e) => {
                warn!("Failed to read error body: {}", e);
                if buf.is_empty() {
                    return "<failed to read error body>".to_string();
                }
                break;
            }
        }
    }

    String::from_utf8_lossy(&buf).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ErrorCategory;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_payload() -> ImagePayload {
        ImagePayload::new(&[0xFF, 0xD8, 0xFF, 0xE0], "image/jpeg").unwrap()
    }

    fn test_gateway(server: &MockServer) -> GeminiGateway {
        GeminiGateway::new(GatewayConfig {
            base_url: server.uri(),
            model_name: "test-model".to_string(),
            api_key: "test-key".to_string(),
            temperature: 0.2,
            timeout_seconds: 5,
        })
        .unwrap()
    }

    fn text_response(text: &str) -> Value {
        json!({
            "candidates": [{
                "content": { "role": "model", "parts": [{ "text": text }] },
                "finishReason": "STOP"
            }]
        })
    }

    #[test]
    fn test_gateway_config_default() {
        let config = GatewayConfig::default();
        assert_eq!(config.model_name, "gemini-2.5-flash");
        assert!(config.base_url.starts_with("https://"));
    }

    #[test]
    fn test_build_request_shape() {
        let request = serde_json::to_value(build_request(&test_payload(), 0.2)).unwrap();

        let parts = &request["contents"][0]["parts"];
        assert_eq!(parts[0]["inlineData"]["mimeType"], "image/jpeg");
        assert_eq!(parts[0]["inlineData"]["data"], "/9j/4A==");
        assert_eq!(parts[1]["text"], instruction());
        assert_eq!(
            request["generationConfig"]["responseMimeType"],
            "application/json"
        );
        assert_eq!(request["generationConfig"]["responseSchema"], response_schema());
    }

    #[test]
    fn test_response_text_joins_parts() {
        let envelope: GenerateContentResponse = serde_json::from_value(json!({
            "candidates": [{ "content": { "parts": [{ "text": "{\"a\":" }, { "text": "1}" }] } }]
        }))
        .unwrap();
        assert_eq!(response_text(envelope).as_deref(), Some("{\"a\":1}"));

        let empty: GenerateContentResponse = serde_json::from_value(json!({})).unwrap();
        assert_eq!(response_text(empty), None);
    }

    #[tokio::test]
    async fn test_analyze_success() {
        let server = MockServer::start().await;
        let body = json!({
            "summary": "Mostly correct.",
            "errors": [{
                "originalText": "their going",
                "correction": "they're going",
                "category": "Grammar",
                "explanation": "Use the contraction of 'they are'."
            }]
        })
        .to_string();

        Mock::given(method("POST"))
            .and(path("/models/test-model:generateContent"))
            .and(header("x-goog-api-key", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(text_response(&body)))
            .expect(1)
            .mount(&server)
            .await;

        let analysis = test_gateway(&server).analyze(&test_payload()).await.unwrap();
        assert_eq!(analysis.summary, "Mostly correct.");
        assert_eq!(analysis.errors.len(), 1);
        assert_eq!(analysis.errors[0].original_text, "their going");
        assert_eq!(analysis.errors[0].category, ErrorCategory::Grammar);
    }

    #[tokio::test]
    async fn test_analyze_upstream_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_json(json!({
                "error": { "code": 500, "message": "internal", "status": "INTERNAL" }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let err = test_gateway(&server).analyze(&test_payload()).await.unwrap_err();
        match err {
            GatewayError::Upstream { status, body } => {
                assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
                assert_eq!(body, "internal");
            }
            other => panic!("expected upstream error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_analyze_empty_candidates() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "candidates": [] })))
            .mount(&server)
            .await;

        let err = test_gateway(&server).analyze(&test_payload()).await.unwrap_err();
        assert!(matches!(err, GatewayError::EmptyResponse));
    }

    #[tokio::test]
    async fn test_analyze_schema_violation() {
        let server = MockServer::start().await;
        let body = json!({
            "summary": "s",
            "errors": [{ "originalText": "a", "correction": "b", "category": "Style", "explanation": "e" }]
        })
        .to_string();

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(text_response(&body)))
            .mount(&server)
            .await;

        let err = test_gateway(&server).analyze(&test_payload()).await.unwrap_err();
        assert!(matches!(err, GatewayError::Schema(_)));
    }

    #[tokio::test]
    async fn test_analyze_malformed_envelope() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let err = test_gateway(&server).analyze(&test_payload()).await.unwrap_err();
        assert!(matches!(err, GatewayError::Envelope(_)));
    }

    #[tokio::test]
    async fn test_analyze_upstream_body_truncated() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("x".repeat(20_000)))
            .mount(&server)
            .await;

        let err = test_gateway(&server).analyze(&test_payload()).await.unwrap_err();
        match err {
            GatewayError::Upstream { status, body } => {
                assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
                assert_eq!(body.len(), MAX_ERROR_BODY_BYTES);
            }
            other => panic!("expected upstream error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_analyze_empty_text_part() {
        for text in ["", "  \n "] {
            let server = MockServer::start().await;

            Mock::given(method("POST"))
                .respond_with(ResponseTemplate::new(200).set_body_json(text_response(text)))
                .mount(&server)
                .await;

            let err = test_gateway(&server).analyze(&test_payload()).await.unwrap_err();
            assert!(matches!(err, GatewayError::EmptyResponse), "text {:?}", text);
        }
    }

    #[tokio::test]
    async fn test_analyze_blocked_candidate() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{ "finishReason": "SAFETY" }]
            })))
            .mount(&server)
            .await;

        let err = test_gateway(&server).analyze(&test_payload()).await.unwrap_err();
        assert!(matches!(err, GatewayError::EmptyResponse));
    }

    #[tokio::test]
    async fn test_analyze_connection_refused() {
        let gateway = GeminiGateway::new(GatewayConfig {
            base_url: "http://127.0.0.1:1".to_string(),
            api_key: "test-key".to_string(),
            timeout_seconds: 5,
            ..GatewayConfig::default()
        })
        .unwrap();

        let err = gateway.analyze(&test_payload()).await.unwrap_err();
        assert!(matches!(err, GatewayError::Request(_)));
    }
}
