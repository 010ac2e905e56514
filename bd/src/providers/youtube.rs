//! YouTube Data API v3 listing client
//!
//! Discovers recently published videos on the watched channel, then fills
//! in durations with a second `videos` call. Duration failures degrade to
//! `None` rather than failing discovery.

use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

use super::{ProviderError, VideoCandidate, VideoListing};
use crate::config::ListingConfig;
use async_trait::async_trait;

/// YouTube Data API listing client
pub struct YoutubeListing {
    api_key: String,
    channel_id: String,
    base_url: String,
    max_results: u32,
    http: Client,
}

impl YoutubeListing {
    /// Create a new client from configuration
    ///
    /// Reads the API key from the environment variable named in config.
    pub fn from_config(config: &ListingConfig) -> Result<Self, ProviderError> {
        let api_key = std::env::var(&config.api_key_env)
            .map_err(|_| ProviderError::Config(format!("{} not set", config.api_key_env)))?;

        let http = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()?;

        Ok(Self {
            api_key,
            channel_id: config.channel_id.clone(),
            base_url: config.base_url.clone(),
            max_results: config.max_results,
            http,
        })
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ProviderError> {
        let status = response.status().as_u16();
        if status == 429 {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(60);
            return Err(ProviderError::RateLimited {
                retry_after: Duration::from_secs(retry_after),
            });
        }
        if !response.status().is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ProviderError::Api { status, message });
        }
        Ok(response)
    }

    /// Fetch durations for a batch of video ids
    async fn fetch_durations(&self, ids: &[String]) -> Result<Vec<(String, Option<u64>)>, ProviderError> {
        let url = format!("{}/videos", self.base_url);
        let response = self
            .http
            .get(&url)
            .query(&[
                ("key", self.api_key.as_str()),
                ("id", ids.join(",").as_str()),
                ("part", "contentDetails"),
            ])
            .send()
            .await?;
        let response = Self::check_status(response).await?;

        let body: VideosResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Parse(e.to_string()))?;

        Ok(body
            .items
            .into_iter()
            .map(|item| {
                let secs = parse_iso8601_duration(&item.content_details.duration);
                (item.id, secs)
            })
            .collect())
    }
}

#[async_trait]
impl VideoListing for YoutubeListing {
    async fn list_videos(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<VideoCandidate>, ProviderError> {
        debug!(%from, %to, channel = %self.channel_id, "list_videos: called");

        let url = format!("{}/search", self.base_url);
        let max_results = self.max_results.to_string();
        let response = self
            .http
            .get(&url)
            .query(&[
                ("key", self.api_key.as_str()),
                ("channelId", self.channel_id.as_str()),
                ("part", "snippet"),
                ("type", "video"),
                ("order", "date"),
                ("maxResults", max_results.as_str()),
                ("publishedAfter", from.to_rfc3339().as_str()),
                ("publishedBefore", to.to_rfc3339().as_str()),
            ])
            .send()
            .await?;
        let response = Self::check_status(response).await?;

        let body: SearchResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Parse(e.to_string()))?;

        let mut candidates: Vec<VideoCandidate> = body
            .items
            .into_iter()
            .filter_map(|item| {
                let id = item.id.video_id?;
                Some(VideoCandidate {
                    url: format!("https://www.youtube.com/watch?v={}", id),
                    id,
                    title: item.snippet.title,
                    published_at: item.snippet.published_at,
                    duration_secs: None,
                })
            })
            .collect();

        if !candidates.is_empty() {
            let ids: Vec<String> = candidates.iter().map(|c| c.id.clone()).collect();
            match self.fetch_durations(&ids).await {
                Ok(durations) => {
                    for (id, secs) in durations {
                        if let Some(candidate) = candidates.iter_mut().find(|c| c.id == id) {
                            candidate.duration_secs = secs;
                        }
                    }
                }
                Err(e) => {
                    warn!(error = %e, "Failed to fetch video durations, continuing without them");
                }
            }
        }

        debug!(count = candidates.len(), "list_videos: returning candidates");
        Ok(candidates)
    }
}

// YouTube API response types

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    id: SearchItemId,
    snippet: Snippet,
}

#[derive(Debug, Deserialize)]
struct SearchItemId {
    #[serde(rename = "videoId")]
    video_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Snippet {
    title: String,
    #[serde(rename = "publishedAt")]
    published_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct VideosResponse {
    #[serde(default)]
    items: Vec<VideoItem>,
}

#[derive(Debug, Deserialize)]
struct VideoItem {
    id: String,
    #[serde(rename = "contentDetails")]
    content_details: ContentDetails,
}

#[derive(Debug, Deserialize)]
struct ContentDetails {
    duration: String,
}

/// Parse an ISO-8601 duration like `PT1H2M3S` into seconds
fn parse_iso8601_duration(raw: &str) -> Option<u64> {
    let rest = raw.strip_prefix('P')?;
    let (days_part, time_part) = match rest.split_once('T') {
        Some((d, t)) => (d, t),
        None => (rest, ""),
    };

    let mut total: u64 = 0;
    let mut value = String::new();

    for c in days_part.chars() {
        if c.is_ascii_digit() {
            value.push(c);
        } else if c == 'D' {
            total += value.parse::<u64>().ok()? * 86_400;
            value.clear();
        } else {
            return None;
        }
    }
    if !value.is_empty() {
        return None;
    }

    for c in time_part.chars() {
        if c.is_ascii_digit() {
            value.push(c);
        } else {
            let parsed = value.parse::<u64>().ok()?;
            value.clear();
            match c {
                'H' => total += parsed * 3600,
                'M' => total += parsed * 60,
                'S' => total += parsed,
                _ => return None,
            }
        }
    }
    if !value.is_empty() {
        return None;
    }

    Some(total)
}

/// Render seconds as `"1h 5m"`, or `"12m"` under an hour
pub fn format_hms(seconds: u64) -> String {
    let h = seconds / 3600;
    let m = (seconds % 3600) / 60;
    if h > 0 { format!("{h}h {m}m") } else { format!("{m}m") }
}
