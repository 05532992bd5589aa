//! Classifier collaborator
//!
//! Expert routing classifies a request by asking a (usually small, fast)
//! LLM for a category. The engine owns prompt construction and response
//! parsing; this module owns the transport seam and ships an
//! OpenAI-compatible chat-completions client. Every call carries an explicit
//! timeout so a hung classifier degrades to the fallback path instead of
//! blocking the request.

use crate::core::types::ProviderRecord;
use crate::utils::endpoint::build_chat_completions_endpoint;
use async_trait::async_trait;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::debug;

/// One classification call
#[derive(Debug, Clone)]
pub struct ClassifierRequest {
    pub provider: ProviderRecord,
    pub model: String,
    pub system_prompt: String,
    pub user_prompt: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout: Duration,
    /// Request `response_format: json_object` from the backend
    pub structured_output: bool,
}

/// Classifier transport failure
#[derive(Debug, thiserror::Error)]
pub enum ClassifierError {
    #[error("classifier request timed out after {0:?}")]
    Timeout(Duration),

    #[error("classifier returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("classifier transport error: {0}")]
    Transport(String),

    #[error("classifier returned empty content")]
    EmptyContent,
}

/// External classification backend; returns the raw text content
#[async_trait]
pub trait Classifier: Send + Sync {
    async fn complete(&self, request: ClassifierRequest) -> Result<String, ClassifierError>;
}

/// OpenAI-compatible chat-completions classifier client
#[derive(Debug, Clone, Default)]
pub struct HttpClassifier {
    client: reqwest::Client,
}

impl HttpClassifier {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Classifier for HttpClassifier {
    async fn complete(&self, request: ClassifierRequest) -> Result<String, ClassifierError> {
        let endpoint = build_chat_completions_endpoint(&request.provider.base_url);

        let mut body = json!({
            "model": request.model,
            "messages": [
                {"role": "system", "content": request.system_prompt},
                {"role": "user", "content": request.user_prompt}
            ],
            "temperature": request.temperature,
            "max_tokens": request.max_tokens,
        });
        if request.structured_output {
            body["response_format"] = json!({"type": "json_object"});
        }

        debug!(
            endpoint = %endpoint,
            model = %request.model,
            "calling classifier backend"
        );

        let response = self
            .client
            .post(&endpoint)
            .bearer_auth(&request.provider.api_key)
            .json(&body)
            .timeout(request.timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ClassifierError::Timeout(request.timeout)
                } else {
                    ClassifierError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let truncated: String = body.chars().take(200).collect();
            return Err(ClassifierError::Http {
                status: status.as_u16(),
                body: truncated,
            });
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|e| ClassifierError::Transport(e.to_string()))?;

        let content = payload
            .get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("message"))
            .and_then(|m| m.get("content"))
            .and_then(Value::as_str)
            .map(str::trim)
            .unwrap_or_default();

        if content.is_empty() {
            return Err(ClassifierError::EmptyContent);
        }

        Ok(content.to_string())
    }
}
