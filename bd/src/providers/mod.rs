//! External collaborator interfaces
//!
//! Trait seams for the four unreliable services the pipeline coordinates:
//! video listing, transcript fetching, AI analysis (primary + fallback) and
//! email dispatch. Each concrete client lives in its own module; the
//! pipeline only ever sees `Arc<dyn ...>` handles.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

mod anthropic;
mod email;
mod error;
mod openai;
mod transcript;
mod youtube;

pub use anthropic::AnthropicAnalyzer;
pub use email::{EmailDispatcher, brief_subject, render_brief};
pub use error::ProviderError;
pub use openai::OpenAiAnalyzer;
pub use transcript::TranscriptClient;
pub use youtube::{YoutubeListing, format_hms};

/// An item discovered by the listing stage, before filtering
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoCandidate {
    pub id: String,
    pub title: String,
    pub published_at: DateTime<Utc>,
    pub url: String,
    /// Video length when the listing provider reports it
    pub duration_secs: Option<u64>,
}

/// A candidate carried through analysis
///
/// An item with no transcript or no analysis text is excluded from dispatch
/// but retained for logging and summary counts.
#[derive(Debug, Clone)]
pub struct AnalysisResult {
    pub candidate: VideoCandidate,
    pub transcript_present: bool,
    pub analysis_text: Option<String>,
}

/// Video-listing collaborator
#[async_trait]
pub trait VideoListing: Send + Sync {
    /// Fetch candidates published within `[from, to]`
    async fn list_videos(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<VideoCandidate>, ProviderError>;
}

/// Transcript collaborator
#[async_trait]
pub trait TranscriptSource: Send + Sync {
    /// Fetch the textual content for one video
    ///
    /// An empty string is the documented "no transcript available" signal,
    /// distinct from a transport failure.
    async fn fetch_transcript(&self, video_id: &str) -> Result<String, ProviderError>;
}

/// AI analysis collaborator
///
/// Implementations perform a single attempt; retry and fallback policy is
/// owned by the pipeline.
#[async_trait]
pub trait Analyzer: Send + Sync {
    async fn analyze(&self, text: &str) -> Result<String, ProviderError>;

    /// Short provider name for logs
    fn name(&self) -> &str;
}

/// Output-delivery collaborator
#[async_trait]
pub trait Dispatcher: Send + Sync {
    async fn send(&self, recipient: &str, subject: &str, body: &str) -> Result<(), ProviderError>;
}
