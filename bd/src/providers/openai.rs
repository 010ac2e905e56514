//! OpenAI chat completions analyzer (fallback provider)

use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use super::anthropic::ANALYSIS_SYSTEM_PROMPT;
use super::{Analyzer, ProviderError};
use crate::config::LlmConfig;
use async_trait::async_trait;

/// OpenAI chat completions analyzer
pub struct OpenAiAnalyzer {
    model: String,
    api_key: String,
    base_url: String,
    max_tokens: u32,
    http: Client,
}

impl OpenAiAnalyzer {
    /// Create a new analyzer from configuration
    pub fn from_config(config: &LlmConfig) -> Result<Self, ProviderError> {
        let api_key = std::env::var(&config.api_key_env)
            .map_err(|_| ProviderError::Config(format!("{} not set", config.api_key_env)))?;

        let http = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()?;

        Ok(Self {
            model: config.model.clone(),
            api_key,
            base_url: config.base_url.clone(),
            max_tokens: config.max_tokens,
            http,
        })
    }

    fn build_request_body(&self, text: &str) -> serde_json::Value {
        serde_json::json!({
            "model": self.model,
            "max_tokens": self.max_tokens,
            "messages": [
                { "role": "system", "content": ANALYSIS_SYSTEM_PROMPT },
                { "role": "user", "content": text }
            ],
        })
    }
}

#[async_trait]
impl Analyzer for OpenAiAnalyzer {
    async fn analyze(&self, text: &str) -> Result<String, ProviderError> {
        debug!(model = %self.model, chars = text.len(), "analyze: called");

        let url = format!("{}/v1/chat/completions", self.base_url);
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&self.build_request_body(text))
            .send()
            .await?;

        let status = response.status().as_u16();

        if status == 429 {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(60);
            debug!(retry_after, "analyze: rate limited (429)");
            return Err(ProviderError::RateLimited {
                retry_after: Duration::from_secs(retry_after),
            });
        }

        if !response.status().is_success() {
            let message = response.text().await.unwrap_or_default();
            debug!(status, "analyze: API error");
            return Err(ProviderError::Api { status, message });
        }

        let api_response: ChatResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Parse(e.to_string()))?;

        let analysis = api_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();

        if analysis.trim().is_empty() {
            return Err(ProviderError::Parse("empty completion".to_string()));
        }

        debug!(chars = analysis.len(), "analyze: success");
        Ok(analysis)
    }

    fn name(&self) -> &str {
        "openai"
    }
}

// OpenAI API response types

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}
