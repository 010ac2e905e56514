//! Briefdaemon configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Main Briefdaemon configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Primary AI analysis provider
    pub primary: LlmConfig,

    /// Fallback AI analysis provider
    pub fallback: LlmConfig,

    /// Video listing provider
    pub listing: ListingConfig,

    /// Transcript provider
    pub transcript: TranscriptConfig,

    /// Email delivery
    pub smtp: SmtpConfig,

    /// Pipeline behavior
    pub pipeline: PipelineConfig,

    /// Scheduler loop behavior
    pub scheduler: SchedulerConfig,

    /// Storage configuration
    pub storage: StorageConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            primary: LlmConfig::default(),
            fallback: LlmConfig::default_fallback(),
            listing: ListingConfig::default(),
            transcript: TranscriptConfig::default(),
            smtp: SmtpConfig::default(),
            pipeline: PipelineConfig::default(),
            scheduler: SchedulerConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}

impl Config {
    /// Validate configuration before use
    ///
    /// Checks that required environment variables are set. Call this early
    /// in startup to fail fast with clear error messages.
    pub fn validate(&self) -> Result<()> {
        if std::env::var(&self.primary.api_key_env).is_err() {
            return Err(eyre::eyre!(
                "Primary AI API key not found. Set the {} environment variable.",
                self.primary.api_key_env
            ));
        }
        if std::env::var(&self.listing.api_key_env).is_err() {
            return Err(eyre::eyre!(
                "Video listing API key not found. Set the {} environment variable.",
                self.listing.api_key_env
            ));
        }
        Ok(())
    }

    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try project-local config: .briefdaemon.yml
        let local_config = PathBuf::from(".briefdaemon.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // Try user config: ~/.config/briefdaemon/briefdaemon.yml
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("briefdaemon").join("briefdaemon.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        // No config file found, use defaults
        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

/// AI provider configuration (used for both primary and fallback)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Provider name ("anthropic" or "openai")
    pub provider: String,

    /// Model identifier
    pub model: String,

    /// Environment variable containing the API key
    #[serde(rename = "api-key-env")]
    pub api_key_env: String,

    /// API base URL
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Maximum tokens per response
    #[serde(rename = "max-tokens")]
    pub max_tokens: u32,

    /// Request timeout in milliseconds
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "anthropic".to_string(),
            model: "claude-sonnet-4-20250514".to_string(),
            api_key_env: "ANTHROPIC_API_KEY".to_string(),
            base_url: "https://api.anthropic.com".to_string(),
            max_tokens: 4096,
            timeout_ms: 180_000,
        }
    }
}

impl LlmConfig {
    /// Default configuration for the fallback provider
    pub fn default_fallback() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            base_url: "https://api.openai.com".to_string(),
            max_tokens: 4096,
            timeout_ms: 180_000,
        }
    }
}

/// Video listing provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ListingConfig {
    /// Channel to watch for new videos
    #[serde(rename = "channel-id")]
    pub channel_id: String,

    /// Environment variable containing the listing API key
    #[serde(rename = "api-key-env")]
    pub api_key_env: String,

    /// API base URL
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Maximum candidates returned per discovery
    #[serde(rename = "max-results")]
    pub max_results: u32,

    /// Request timeout in milliseconds
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,
}

impl Default for ListingConfig {
    fn default() -> Self {
        Self {
            channel_id: "UCkHecfDLcjDbpMT4Sn04o9A".to_string(),
            api_key_env: "YOUTUBE_API_KEY".to_string(),
            base_url: "https://www.googleapis.com/youtube/v3".to_string(),
            max_results: 50,
            timeout_ms: 30_000,
        }
    }
}

/// Transcript provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscriptConfig {
    /// Base URL of the transcript service
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Preferred transcript languages, in order
    pub languages: Vec<String>,

    /// Request timeout in milliseconds
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,
}

impl Default for TranscriptConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8090".to_string(),
            languages: vec!["en".to_string(), "en-IN".to_string()],
            timeout_ms: 60_000,
        }
    }
}

/// Email delivery configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SmtpConfig {
    /// SMTP relay host
    pub host: String,

    /// SMTP relay port (STARTTLS)
    pub port: u16,

    /// Environment variable containing the SMTP username
    #[serde(rename = "user-env")]
    pub user_env: String,

    /// Environment variable containing the SMTP password
    #[serde(rename = "pass-env")]
    pub pass_env: String,

    /// From address; defaults to the SMTP username when empty
    #[serde(rename = "from-address")]
    pub from_address: String,

    /// Display name on outgoing mail
    #[serde(rename = "from-name")]
    pub from_name: String,
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            host: "smtp.gmail.com".to_string(),
            port: 587,
            user_env: "SMTP_USER".to_string(),
            pass_env: "SMTP_PASS".to_string(),
            from_address: String::new(),
            from_name: "Briefdaemon".to_string(),
        }
    }
}

/// Pipeline behavior configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Title keywords for topic relevance (case-insensitive substring match)
    pub keywords: Vec<String>,

    /// When set, overrides `keywords` with a single strict phrase match
    #[serde(rename = "strict-phrase")]
    pub strict_phrase: Option<String>,

    /// Truncate transcripts to this many characters before analysis
    #[serde(rename = "max-transcript-chars")]
    pub max_transcript_chars: usize,

    /// Minimum delay between successive analysis calls, in seconds
    #[serde(rename = "analysis-gap-secs")]
    pub analysis_gap_secs: u64,

    /// Minimum delay between successive dispatches, in seconds
    #[serde(rename = "dispatch-gap-secs")]
    pub dispatch_gap_secs: u64,

    /// Maximum primary-analyzer attempts while rate limited
    #[serde(rename = "max-analysis-attempts")]
    pub max_analysis_attempts: u32,

    /// Linear backoff step between rate-limited attempts, in seconds
    #[serde(rename = "backoff-step-secs")]
    pub backoff_step_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            keywords: vec![
                "earnings".to_string(),
                "q1".to_string(),
                "q2".to_string(),
                "q3".to_string(),
                "q4".to_string(),
                "quarterly".to_string(),
                "results".to_string(),
                "concall".to_string(),
                "analyst".to_string(),
                "investor".to_string(),
            ],
            strict_phrase: None,
            max_transcript_chars: 12_000,
            analysis_gap_secs: 6,
            dispatch_gap_secs: 2,
            max_analysis_attempts: 3,
            backoff_step_secs: 10,
        }
    }
}

/// Scheduler loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Poll tick in seconds
    #[serde(rename = "tick-secs")]
    pub tick_secs: u64,

    /// Document id for the persisted schedule
    #[serde(rename = "schedule-doc")]
    pub schedule_doc: String,

    /// Document id for the activity log
    #[serde(rename = "log-doc")]
    pub log_doc: String,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_secs: 30,
            schedule_doc: "schedule".to_string(),
            log_doc: "activity".to_string(),
        }
    }
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory for DocStore data
    #[serde(rename = "store-dir")]
    pub store_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        // Use XDG data directory (~/.local/share/briefdaemon on Linux)
        let store_dir = dirs::data_dir()
            .map(|d| d.join("briefdaemon"))
            .unwrap_or_else(|| PathBuf::from(".docstore"))
            .to_string_lossy()
            .into_owned();

        Self { store_dir }
    }
}
