//! Gemini API client.
//!
//! Every call is a single blocking request/response round trip: no retry,
//! no backoff, no client-side timeout. Failures are classified into a
//! [`GenerationOutcome`] so the pipeline can report them and move on.

use crate::gemini::types::{Content, GenerateContentRequest, GenerateContentResponse};
use crate::models::{GenerationOutcome, ModelSettings, PromptFeedback};
use anyhow::{Context, Result};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Header carrying the API key.
const API_KEY_HEADER: &str = "x-goog-api-key";

/// Errors from a single Gemini call.
#[derive(Debug, Error)]
pub enum GeminiError {
    #[error("Cannot connect to Gemini API at {0}")]
    Connect(String),

    #[error("Failed to send request: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Gemini API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Failed to parse Gemini response: {0}")]
    Decode(String),

    #[error("Empty response or safety block: {0}")]
    Blocked(PromptFeedback),
}

/// One generation request.
#[derive(Debug, Clone, Copy)]
pub struct GenerationRequest<'a> {
    pub prompt: &'a str,
    pub settings: &'a ModelSettings,
    /// Human-readable label, used for logging only.
    pub task: &'a str,
}

/// Something that can turn prompts into text.
#[allow(async_fn_in_trait)] // Single-threaded runtime; futures need not be Send
pub trait ContentGenerator {
    type Chat: ChatSession;

    /// Run one request and classify the result.
    async fn generate(&self, request: &GenerationRequest<'_>) -> GenerationOutcome;

    /// Open a conversation with an empty history.
    fn start_chat(&self, settings: &ModelSettings) -> Result<Self::Chat>;
}

/// A stateful conversation.
#[allow(async_fn_in_trait)]
pub trait ChatSession {
    /// Send one user message and return the reply text.
    async fn send_message(&mut self, text: &str) -> Result<String, GeminiError>;
}

/// HTTP client for the `generateContent` endpoint.
#[derive(Clone)]
pub struct GeminiClient {
    http_client: reqwest::Client,
    api_base: String,
    api_key: String,
}

impl std::fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiClient")
            .field("api_base", &self.api_base)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

impl GeminiClient {
    /// Create a client for the given API base URL.
    pub fn new(api_base: &str, api_key: String) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            http_client,
            api_base: api_base.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    fn endpoint(&self, model: &str) -> String {
        let model = model.strip_prefix("models/").unwrap_or(model);
        format!("{}/models/{}:generateContent", self.api_base, model)
    }

    /// Post a conversation and decode the response.
    async fn post(
        &self,
        contents: &[Content],
        settings: &ModelSettings,
    ) -> Result<GenerateContentResponse, GeminiError> {
        let url = self.endpoint(&settings.model);
        let request = GenerateContentRequest::new(contents, &settings.generation, &settings.safety);

        debug!("POST {} ({} turns)", url, contents.len());

        let response = self
            .http_client
            .post(&url)
            .header(API_KEY_HEADER, &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    GeminiError::Connect(self.api_base.clone())
                } else {
                    GeminiError::Request(e)
                }
            })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(GeminiError::Api { status, body });
        }

        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| GeminiError::Decode(e.to_string()))
    }
}

impl ContentGenerator for GeminiClient {
    type Chat = GeminiChat;

    async fn generate(&self, request: &GenerationRequest<'_>) -> GenerationOutcome {
        info!(
            "Generating {} with model {}",
            request.task, request.settings.model
        );

        let contents = [Content::user(request.prompt)];
        match self.post(&contents, request.settings).await {
            Ok(response) => response.into_outcome(),
            Err(e) => {
                warn!("Generation of {} failed: {}", request.task, e);
                GenerationOutcome::TransportError {
                    detail: format!("Error generating {}: {}", request.task, e),
                }
            }
        }
    }

    fn start_chat(&self, settings: &ModelSettings) -> Result<GeminiChat> {
        Ok(GeminiChat {
            client: self.clone(),
            settings: settings.clone(),
            history: Vec::new(),
        })
    }
}

/// Conversation state kept in process memory only.
#[derive(Debug)]
pub struct GeminiChat {
    client: GeminiClient,
    settings: ModelSettings,
    history: Vec<Content>,
}

#[cfg(test)]
impl GeminiChat {
    /// Turns exchanged so far.
    pub fn history(&self) -> &[Content] {
        &self.history
    }
}

impl ChatSession for GeminiChat {
    async fn send_message(&mut self, text: &str) -> Result<String, GeminiError> {
        self.history.push(Content::user(text));

        let result = match self.client.post(&self.history, &self.settings).await {
            Ok(response) => {
                let reply = response.text();
                if reply.is_empty() {
                    Err(GeminiError::Blocked(response.feedback()))
                } else {
                    Ok(reply)
                }
            }
            Err(e) => Err(e),
        };

        match result {
            Ok(reply) => {
                self.history.push(Content::model(&reply));
                Ok(reply)
            }
            Err(e) => {
                // Failed exchanges leave no trace in the history.
                self.history.pop();
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn settings(model: &str) -> ModelSettings {
        let mut generation = crate::config::GenerationParams::new();
        generation.insert("max_output_tokens".to_string(), json!(256));
        let mut safety = std::collections::BTreeMap::new();
        safety.insert("HARM_CATEGORY_HARASSMENT".to_string(), "BLOCK_NONE".to_string());
        ModelSettings {
            model: model.to_string(),
            generation,
            safety,
        }
    }

    fn text_response(text: &str) -> serde_json::Value {
        json!({
            "candidates": [{
                "content": {"role": "model", "parts": [{"text": text}]},
                "finishReason": "STOP"
            }]
        })
    }

    #[test]
    fn test_endpoint_strips_models_prefix() {
        let client = GeminiClient::new("http://localhost:1/v1beta/", "k".to_string()).unwrap();
        assert_eq!(
            client.endpoint("models/gemini-pro"),
            "http://localhost:1/v1beta/models/gemini-pro:generateContent"
        );
        assert_eq!(
            client.endpoint("gemini-pro"),
            "http://localhost:1/v1beta/models/gemini-pro:generateContent"
        );
    }

    #[test]
    fn test_debug_redacts_key() {
        let client = GeminiClient::new("http://localhost:1", "secret-key".to_string()).unwrap();
        assert!(!format!("{:?}", client).contains("secret-key"));
    }

    #[tokio::test]
    async fn test_generate_success() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/models/gemini-test:generateContent"))
            .and(header("x-goog-api-key", "k123"))
            .and(body_partial_json(json!({
                "contents": [{"role": "user", "parts": [{"text": "the prompt"}]}],
                "generationConfig": {"maxOutputTokens": 256},
                "safetySettings": [{"category": "HARM_CATEGORY_HARASSMENT", "threshold": "BLOCK_NONE"}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(text_response("# Report")))
            .mount(&server)
            .await;

        let client = GeminiClient::new(&server.uri(), "k123".to_string()).unwrap();
        let settings = settings("gemini-test");
        let outcome = client
            .generate(&GenerationRequest {
                prompt: "the prompt",
                settings: &settings,
                task: "CTI Report Part 1",
            })
            .await;

        assert_eq!(outcome.text(), Some("# Report"));
    }

    #[tokio::test]
    async fn test_generate_safety_block() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "promptFeedback": {"blockReason": "SAFETY"}
            })))
            .mount(&server)
            .await;

        let client = GeminiClient::new(&server.uri(), "k".to_string()).unwrap();
        let settings = settings("gemini-test");
        let outcome = client
            .generate(&GenerationRequest {
                prompt: "p",
                settings: &settings,
                task: "Mermaid Diagram",
            })
            .await;

        match outcome {
            GenerationOutcome::SafetyBlocked { feedback } => {
                assert_eq!(feedback.block_reason.as_deref(), Some("SAFETY"));
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_generate_http_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_string("input too long"))
            .mount(&server)
            .await;

        let client = GeminiClient::new(&server.uri(), "k".to_string()).unwrap();
        let settings = settings("gemini-test");
        let outcome = client
            .generate(&GenerationRequest {
                prompt: "p",
                settings: &settings,
                task: "CTI Report Part 2",
            })
            .await;

        match outcome {
            GenerationOutcome::TransportError { detail } => {
                assert!(detail.contains("CTI Report Part 2"));
                assert!(detail.contains("400"));
                assert!(detail.contains("input too long"));
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_generate_malformed_body() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let client = GeminiClient::new(&server.uri(), "k".to_string()).unwrap();
        let settings = settings("gemini-test");
        let outcome = client
            .generate(&GenerationRequest {
                prompt: "p",
                settings: &settings,
                task: "task",
            })
            .await;

        assert!(matches!(outcome, GenerationOutcome::TransportError { .. }));
    }

    #[tokio::test]
    async fn test_chat_keeps_history_of_successful_turns() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(body_partial_json(json!({
                "contents": [{"role": "user", "parts": [{"text": "first"}]}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(text_response("one")))
            .up_to_n_times(1)
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("unavailable"))
            .mount(&server)
            .await;

        let client = GeminiClient::new(&server.uri(), "k".to_string()).unwrap();
        let mut chat = client.start_chat(&settings("gemini-chat")).unwrap();

        assert_eq!(chat.send_message("first").await.unwrap(), "one");
        assert_eq!(chat.history().len(), 2);

        let err = chat.send_message("second").await.unwrap_err();
        assert!(matches!(err, GeminiError::Api { status: 500, .. }));
        assert_eq!(chat.history().len(), 2);
        assert_eq!(chat.history()[1], Content::model("one"));
    }
}
