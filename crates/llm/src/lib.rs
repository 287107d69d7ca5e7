//! # Hearth LLM
//!
//! [`LanguageModel`] implementation for an OpenAI-compatible local
//! inference endpoint — a llama.cpp server, Ollama, vLLM, or anything
//! else exposing `/v1/chat/completions`. One client is constructed at
//! start-up and shared for the life of the process; only one generation
//! is in flight at a time (the agent loop serialises calls).
//!
//! Token counting uses the 4-chars-per-token heuristic from
//! [`LanguageModel`]'s default; the context window is configured to match
//! the served model.

use async_trait::async_trait;
use hearth_core::error::ModelError;
use hearth_core::message::{Message, Role};
use hearth_core::model::{GenerateRequest, LanguageModel};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, trace};

/// An OpenAI-compatible chat-completions client.
pub struct LocalEndpointModel {
    base_url: String,
    model: String,
    context_window: usize,
    client: reqwest::Client,
}

impl LocalEndpointModel {
    /// Create a client for `base_url` (e.g. `http://localhost:8080/v1`).
    pub fn new(base_url: impl Into<String>, model: impl Into<String>, context_window: usize) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(300))
            .build()
            .unwrap_or_default();
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            context_window,
            client,
        }
    }

    /// Convenience constructor for a default llama.cpp server.
    pub fn llama_cpp(context_window: usize) -> Self {
        Self::new("http://localhost:8080/v1", "local", context_window)
    }

    fn to_api_messages(messages: &[Message]) -> Vec<ApiMessage> {
        messages
            .iter()
            .map(|m| ApiMessage {
                role: match m.role {
                    Role::User => "user",
                    Role::Assistant => "assistant",
                    Role::System => "system",
                    // Observations travel as user turns: small local
                    // models rarely support a distinct tool role.
                    Role::Tool => "user",
                }
                .to_string(),
                content: m.content.clone(),
            })
            .collect()
    }
}

#[derive(Debug, Serialize)]
struct ApiMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    choices: Vec<ApiChoice>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ApiChoiceMessage {
    #[serde(default)]
    content: String,
}

#[async_trait]
impl LanguageModel for LocalEndpointModel {
    fn name(&self) -> &str {
        &self.model
    }

    fn context_window(&self) -> usize {
        self.context_window
    }

    async fn generate(&self, request: GenerateRequest) -> Result<String, ModelError> {
        let url = format!("{}/chat/completions", self.base_url);

        let mut body = serde_json::json!({
            "model": self.model,
            "messages": Self::to_api_messages(&request.messages),
            "temperature": request.temperature,
            "max_tokens": request.max_tokens,
            "stream": false,
        });
        if !request.stop.is_empty() {
            body["stop"] = serde_json::json!(request.stop);
        }

        debug!(model = %self.model, messages = request.messages.len(), max_tokens = request.max_tokens, "completion request");
        trace!(body = %body, "request body");

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| ModelError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ModelError::Endpoint {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: ApiResponse = response
            .json()
            .await
            .map_err(|e| ModelError::Request(format!("bad response body: {e}")))?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or(ModelError::EmptyResponse)
    }
}
