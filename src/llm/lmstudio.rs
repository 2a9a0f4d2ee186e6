//! LM Studio (OpenAI-compatible) chat completions client.
//!
//! One request per call, no retries and no streaming.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::error::LlmError;
use super::{ChatMessage, LlmClient};
use crate::config::ModelConfig;
use crate::util::preview;

/// Client for an OpenAI-style `/v1/chat/completions` endpoint.
pub struct LmStudioClient {
    client: Client,
    base_url: String,
    default_model: String,
    health_timeout: Duration,
}

impl LmStudioClient {
    /// Create a client from model endpoint settings.
    pub fn new(config: &ModelConfig) -> Result<Self, LlmError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| LlmError::Unreachable(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            default_model: config.default_model.clone(),
            health_timeout: config.health_timeout,
        })
    }

    fn completions_url(&self) -> String {
        format!("{}/v1/chat/completions", self.base_url)
    }

    fn models_url(&self) -> String {
        format!("{}/v1/models", self.base_url)
    }
}

#[async_trait]
impl LlmClient for LmStudioClient {
    async fn chat_completion(
        &self,
        model: Option<&str>,
        messages: &[ChatMessage],
    ) -> Result<String, LlmError> {
        let model = model
            .filter(|m| !m.trim().is_empty())
            .unwrap_or(&self.default_model);
        let request = CompletionRequest { model, messages };
        let url = self.completions_url();

        let prompt_chars: usize = messages.iter().map(|m| m.content.chars().count()).sum();
        tracing::info!(
            "Sending completion request to {} (model={}, prompt_chars={})",
            url,
            model,
            prompt_chars
        );

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Model request to {} failed: {}", url, e);
                LlmError::from_transport(e)
            })?;

        let status = response.status();
        let body = response.text().await.map_err(LlmError::from_transport)?;

        if !status.is_success() {
            tracing::error!(
                "Model endpoint returned HTTP {}: {}",
                status.as_u16(),
                preview(&body, 500)
            );
            return Err(LlmError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: CompletionResponse = serde_json::from_str(&body).map_err(|e| {
            LlmError::InvalidResponse(format!(
                "failed to parse completion envelope: {}, body: {}",
                e,
                preview(&body, 500)
            ))
        })?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::InvalidResponse("no choices in response".to_string()))?
            .message
            .content
            .ok_or_else(|| LlmError::InvalidResponse("first choice has no content".to_string()))?;

        tracing::info!(
            "Model response received ({} chars)",
            content.chars().count()
        );
        tracing::debug!("Full model response: {}", content);

        Ok(content)
    }

    async fn check_reachable(&self) -> bool {
        match self
            .client
            .get(self.models_url())
            .timeout(self.health_timeout)
            .send()
            .await
        {
            Ok(resp) => resp.status() == reqwest::StatusCode::OK,
            Err(e) => {
                tracing::debug!("Model endpoint probe failed: {}", e);
                false
            }
        }
    }
}

/// Chat completions request body.
#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
}

/// Chat completions response envelope (only the fields we read).
#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    #[serde(default)]
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::test_support::{spawn_server, unused_base_url};
    use axum::extract::State;
    use axum::http::StatusCode;
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use serde_json::{json, Value};
    use std::sync::{Arc, Mutex};

    fn client_for(base_url: &str) -> LmStudioClient {
        let config = Config::new("http://unused", base_url);
        LmStudioClient::new(&config.model).unwrap()
    }

    #[tokio::test]
    async fn test_chat_completion_returns_first_choice() {
        let seen: Arc<Mutex<Vec<Value>>> = Arc::new(Mutex::new(Vec::new()));
        let app = Router::new()
            .route(
                "/v1/chat/completions",
                post(
                    |State(seen): State<Arc<Mutex<Vec<Value>>>>, Json(body): Json<Value>| async move {
                        seen.lock().unwrap().push(body);
                        Json(json!({
                            "choices": [
                                {"message": {"role": "assistant", "content": "[]"}},
                                {"message": {"role": "assistant", "content": "ignored"}}
                            ]
                        }))
                    },
                ),
            )
            .with_state(Arc::clone(&seen));
        let base = spawn_server(app).await;

        let text = client_for(&base)
            .complete("prompt", "system", Some("qwen"))
            .await
            .unwrap();
        assert_eq!(text, "[]");

        let bodies = seen.lock().unwrap();
        assert_eq!(bodies.len(), 1);
        assert_eq!(bodies[0]["model"], "qwen");
        assert_eq!(bodies[0]["messages"][0]["role"], "system");
        assert_eq!(bodies[0]["messages"][1]["content"], "prompt");
    }

    #[tokio::test]
    async fn test_missing_model_uses_default() {
        let seen: Arc<Mutex<Vec<Value>>> = Arc::new(Mutex::new(Vec::new()));
        let app = Router::new()
            .route(
                "/v1/chat/completions",
                post(
                    |State(seen): State<Arc<Mutex<Vec<Value>>>>, Json(body): Json<Value>| async move {
                        seen.lock().unwrap().push(body);
                        Json(json!({"choices": [{"message": {"content": "ok"}}]}))
                    },
                ),
            )
            .with_state(Arc::clone(&seen));
        let base = spawn_server(app).await;
        let client = client_for(&base);

        client.complete("p", "", None).await.unwrap();
        client.complete("p", "", Some("  ")).await.unwrap();

        let bodies = seen.lock().unwrap();
        assert_eq!(bodies[0]["model"], "default");
        assert_eq!(bodies[1]["model"], "default");
    }

    #[tokio::test]
    async fn test_non_success_status_is_rejected() {
        let app = Router::new().route(
            "/v1/chat/completions",
            post(|| async { (StatusCode::SERVICE_UNAVAILABLE, "model not loaded") }),
        );
        let base = spawn_server(app).await;

        let err = client_for(&base).complete("p", "s", None).await.unwrap_err();
        match err {
            LlmError::Rejected { status, body } => {
                assert_eq!(status, 503);
                assert_eq!(body, "model not loaded");
            }
            other => panic!("expected Rejected, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_empty_choices_is_invalid_response() {
        let app = Router::new().route(
            "/v1/chat/completions",
            post(|| async { Json(json!({"choices": []})) }),
        );
        let base = spawn_server(app).await;

        let err = client_for(&base).complete("p", "s", None).await.unwrap_err();
        assert!(matches!(err, LlmError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint() {
        let base = unused_base_url().await;
        let client = client_for(&base);

        let err = client.complete("p", "s", None).await.unwrap_err();
        assert!(matches!(err, LlmError::Unreachable(_)));
        assert!(!client.check_reachable().await);
    }

    #[tokio::test]
    async fn test_check_reachable_requires_200() {
        let ok = spawn_server(Router::new().route(
            "/v1/models",
            get(|| async { Json(json!({"data": []})) }),
        ))
        .await;
        assert!(client_for(&ok).check_reachable().await);

        let broken = spawn_server(Router::new().route(
            "/v1/models",
            get(|| async { StatusCode::INTERNAL_SERVER_ERROR }),
        ))
        .await;
        assert!(!client_for(&broken).check_reachable().await);
    }
}
