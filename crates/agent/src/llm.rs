use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::warn;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const COMPLETION_TEMPERATURE: f32 = 0.5;
const COMPLETION_MAX_TOKENS: u32 = 300;

#[derive(Clone, Debug, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: "system".to_string(), content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: "user".to_string(), content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: "assistant".to_string(), content: content.into() }
    }
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String>;
}

/// Chat-completions client for an OpenAI-compatible endpoint.
pub struct OpenAiChatClient {
    client: Client,
    base_url: String,
    api_key: SecretString,
    model: String,
    max_retries: u32,
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Deserialize)]
struct CompletionMessage {
    content: Option<String>,
}

impl OpenAiChatClient {
    pub fn new(
        api_key: SecretString,
        base_url: Option<String>,
        model: String,
        timeout: Duration,
        max_retries: u32,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("building the llm http client")?;
        let base_url = base_url
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();
        Ok(Self { client, base_url, api_key, model, max_retries })
    }

    async fn request_once(&self, messages: &[ChatMessage]) -> Result<String> {
        let body = CompletionRequest {
            model: &self.model,
            messages,
            temperature: COMPLETION_TEMPERATURE,
            max_tokens: COMPLETION_MAX_TOKENS,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(self.api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .context("sending the completion request")?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(anyhow!("completion endpoint returned {status}: {detail}"));
        }

        let parsed: CompletionResponse =
            response.json().await.context("decoding the completion response")?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .ok_or_else(|| anyhow!("completion response carried no message content"))
    }
}

#[async_trait]
impl LlmClient for OpenAiChatClient {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        let mut last_error = None;
        for attempt in 0..=self.max_retries {
            match self.request_once(messages).await {
                Ok(content) => return Ok(content),
                Err(error) => {
                    warn!(
                        event_name = "llm.completion.attempt_failed",
                        attempt,
                        error = %error,
                    );
                    last_error = Some(error);
                    if attempt < self.max_retries {
                        tokio::time::sleep(Duration::from_millis(250 * (attempt as u64 + 1)))
                            .await;
                    }
                }
            }
        }
        Err(last_error.unwrap_or_else(|| anyhow!("completion failed with no attempts made")))
    }
}
