// =============================================================================
// services/assistant.rs - THE SMALL-TALK ENGINE
// =============================================================================
//
// When the user types something that is not a company we know, or asks a
// question the structured path cannot answer, the conversation goes to an
// OpenAI-compatible chat completion endpoint. This is the only module that
// knows what that wire format looks like.
// =============================================================================

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use super::ConversationalFallback;
use crate::circuit_breaker::{BreakerSettings, CircuitBreaker};
use crate::error::ServiceError;
use crate::models::ChatTurn;

const SERVICE: &str = "assistant";

/// What the user sees when the model answers with nothing at all.
pub const EMPTY_REPLY: &str = "Sorry, I could not generate a reply to that.";

/// Model parameters sent with every completion request.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionSettings {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for CompletionSettings {
    fn default() -> Self {
        Self {
            model: "gpt-3.5-turbo".to_string(),
            max_tokens: 800,
            temperature: 0.7,
        }
    }
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatTurn],
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    #[serde(default)]
    message: Option<CompletionMessage>,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    #[serde(default)]
    content: Option<String>,
}

/// The first choice's content, or [`EMPTY_REPLY`] when there is none.
fn reply_text(response: CompletionResponse) -> String {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message)
        .and_then(|message| message.content)
        .filter(|content| !content.trim().is_empty())
        .unwrap_or_else(|| EMPTY_REPLY.to_string())
}

/// Chat completion client.
pub struct ChatAssistant {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    settings: CompletionSettings,
    request_timeout: Duration,
    breaker: CircuitBreaker,
}

impl ChatAssistant {
    /// `endpoint` is the full chat completions URL.
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        settings: CompletionSettings,
        request_timeout: Duration,
        breaker: BreakerSettings,
    ) -> Result<Self, ServiceError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("distress_radar/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ServiceError::transport(SERVICE, e))?;
        Ok(Self {
            http,
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            settings,
            request_timeout,
            breaker: CircuitBreaker::new(SERVICE, breaker),
        })
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }
}

#[async_trait]
impl ConversationalFallback for ChatAssistant {
    async fn reply(&self, turns: &[ChatTurn]) -> Result<String, ServiceError> {
        let request = CompletionRequest {
            model: &self.settings.model,
            messages: turns,
            max_tokens: self.settings.max_tokens,
            temperature: self.settings.temperature,
        };
        debug!(model = %self.settings.model, turns = turns.len(), "Asking the assistant");

        self.breaker
            .call(self.request_timeout, async {
                let response = self
                    .http
                    .post(&self.endpoint)
                    .bearer_auth(&self.api_key)
                    .json(&request)
                    .send()
                    .await
                    .map_err(|e| ServiceError::transport(SERVICE, e))?;

                let status = response.status();
                if !status.is_success() {
                    return Err(ServiceError::Status {
                        service: SERVICE,
                        status: status.as_u16(),
                    });
                }

                let body = response
                    .text()
                    .await
                    .map_err(|e| ServiceError::transport(SERVICE, e))?;
                let decoded: CompletionResponse =
                    serde_json::from_str(&body).map_err(|e| ServiceError::decode(SERVICE, e))?;
                Ok(reply_text(decoded))
            })
            .await
    }
}
