//! Transcript service client
//!
//! Talks to a self-hosted transcript HTTP service. The service returns the
//! transcript as timed segments; this client joins them into one plain-text
//! body. A 404 from the service means "no transcript for this video" and
//! maps to an empty string, the documented not-found signal; everything
//! else non-2xx is a transport/provider failure.

use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use super::{ProviderError, TranscriptSource};
use crate::config::TranscriptConfig;
use async_trait::async_trait;

/// HTTP transcript client
pub struct TranscriptClient {
    base_url: String,
    languages: Vec<String>,
    http: Client,
}

impl TranscriptClient {
    /// Create a new client from configuration
    pub fn from_config(config: &TranscriptConfig) -> Result<Self, ProviderError> {
        let http = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            languages: config.languages.clone(),
            http,
        })
    }
}

#[async_trait]
impl TranscriptSource for TranscriptClient {
    async fn fetch_transcript(&self, video_id: &str) -> Result<String, ProviderError> {
        debug!(%video_id, "fetch_transcript: called");

        let url = format!("{}/transcript/{}", self.base_url, video_id);
        let langs = self.languages.join(",");
        let response = self.http.get(&url).query(&[("languages", langs.as_str())]).send().await?;

        let status = response.status().as_u16();
        if status == 404 {
            debug!(%video_id, "fetch_transcript: no transcript available");
            return Ok(String::new());
        }
        if !response.status().is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ProviderError::Api { status, message });
        }

        let body: TranscriptResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Parse(e.to_string()))?;

        let text = join_segments(&body.segments);
        debug!(%video_id, chars = text.len(), "fetch_transcript: returning");
        Ok(text)
    }
}

#[derive(Debug, Deserialize)]
struct TranscriptResponse {
    #[serde(default)]
    segments: Vec<TranscriptSegment>,
}

#[derive(Debug, Deserialize)]
struct TranscriptSegment {
    #[serde(default)]
    text: String,
}

/// Join segment texts with single spaces, dropping empty segments
fn join_segments(segments: &[TranscriptSegment]) -> String {
    segments
        .iter()
        .map(|s| s.text.trim())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_segments() {
        let raw = r#"{
            "segments": [
                { "text": "revenue grew " },
                { "text": "" },
                { "text": "12 percent" },
                { "text": "  year on year  " }
            ]
        }"#;

        let body: TranscriptResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(join_segments(&body.segments), "revenue grew 12 percent year on year");
    }

    #[test]
    fn test_empty_segments_join_to_empty_string() {
        let body: TranscriptResponse = serde_json::from_str(r#"{ "segments": [] }"#).unwrap();
        assert_eq!(join_segments(&body.segments), "");

        let body: TranscriptResponse = serde_json::from_str(r#"{}"#).unwrap();
        assert_eq!(join_segments(&body.segments), "");
    }
}
