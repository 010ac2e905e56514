//! Anthropic Messages API analyzer (primary provider)
//!
//! Single-attempt client: rate limits and failures are surfaced as typed
//! errors so the pipeline's retry/fallback state machine owns the policy.

use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use super::{Analyzer, ProviderError};
use crate::config::LlmConfig;
use async_trait::async_trait;

/// System prompt shared by both analyzers
pub(crate) const ANALYSIS_SYSTEM_PROMPT: &str = "You are an equity research analyst. \
     Given the transcript of an earnings call, produce a concise brief: \
     headline numbers (revenue, margins, profit), management guidance, \
     notable analyst questions, and key risks called out on the call. \
     Use short plain-text sections. Do not speculate beyond the transcript.";

/// Anthropic Messages API analyzer
pub struct AnthropicAnalyzer {
    model: String,
    api_key: String,
    base_url: String,
    max_tokens: u32,
    http: Client,
}

impl AnthropicAnalyzer {
    /// Create a new analyzer from configuration
    ///
    /// Reads the API key from the environment variable named in config.
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
            "system": ANALYSIS_SYSTEM_PROMPT,
            "messages": [
                { "role": "user", "content": text }
            ],
        })
    }
}

#[async_trait]
impl Analyzer for AnthropicAnalyzer {
    async fn analyze(&self, text: &str) -> Result<String, ProviderError> {
        debug!(model = %self.model, chars = text.len(), "analyze: called");

        let url = format!("{}/v1/messages", self.base_url);
        let response = self
            .http
            .post(&url)
            .header("x-api-key", self.api_key.clone())
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
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

        let api_response: MessagesResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Parse(e.to_string()))?;

        let analysis = extract_text(api_response.content);

        if analysis.trim().is_empty() {
            return Err(ProviderError::Parse("empty completion".to_string()));
        }

        debug!(chars = analysis.len(), "analyze: success");
        Ok(analysis)
    }

    fn name(&self) -> &str {
        "anthropic"
    }
}

// Anthropic API response types

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    /// Any other block type (tool use, thinking, ...); carried so an
    /// unexpected block never fails the whole-body parse
    #[serde(other)]
    Other,
}

/// Concatenate the text blocks of a response, ignoring other block types
fn extract_text(content: Vec<ContentBlock>) -> String {
    content
        .into_iter()
        .filter_map(|block| match block {
            ContentBlock::Text { text } => Some(text),
            ContentBlock::Other => None,
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_client() -> AnthropicAnalyzer {
        AnthropicAnalyzer {
            model: "claude-sonnet-4-20250514".to_string(),
            api_key: "test-key".to_string(),
            base_url: "https://api.anthropic.com".to_string(),
            max_tokens: 4096,
            http: Client::new(),
        }
    }

    #[test]
    fn test_build_request_body() {
        let client = test_client();
        let body = client.build_request_body("transcript text");

        assert_eq!(body["model"], "claude-sonnet-4-20250514");
        assert_eq!(body["max_tokens"], 4096);
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["messages"][0]["content"], "transcript text");
        assert!(body["system"].as_str().unwrap().contains("equity research"));
    }

    #[test]
    fn test_parse_messages_response() {
        let raw = r#"{
            "content": [
                { "type": "text", "text": "Revenue up 12%." }
            ],
            "stop_reason": "end_turn"
        }"#;

        let response: MessagesResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(response.content.len(), 1);
    }

    #[test]
    fn test_non_text_blocks_are_skipped_not_fatal() {
        let raw = r#"{
            "content": [
                { "type": "thinking", "thinking": "considering the numbers" },
                { "type": "text", "text": "Revenue up 12%." },
                { "type": "tool_use", "id": "t1", "name": "calc", "input": {} },
                { "type": "text", "text": "Margins flat." }
            ],
            "stop_reason": "end_turn"
        }"#;

        let response: MessagesResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(extract_text(response.content), "Revenue up 12%.\nMargins flat.");
    }
}
