//! Retry/fallback state machine for AI analysis
//!
//! The primary analyzer is retried only while rate limited, with linear
//! backoff and a fixed attempt ceiling. Any other failure, or exhaustion of
//! the ceiling, moves to the fallback exactly once. Fallback failure is an
//! item-level failure handled by the caller's skip policy.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::providers::{Analyzer, ProviderError};

/// Retry policy for the primary analyzer
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum primary attempts while rate limited
    pub max_attempts: u32,

    /// Linear backoff step; attempt n waits `step * n` before retrying
    pub backoff_step: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_step: Duration::from_secs(10),
        }
    }
}

/// Run one text through the primary analyzer with rate-limit retry, falling
/// back to the secondary provider when the primary is exhausted or fails
pub async fn analyze_with_fallback(
    primary: &Arc<dyn Analyzer>,
    fallback: Option<&Arc<dyn Analyzer>>,
    text: &str,
    policy: &RetryPolicy,
) -> Result<String, ProviderError> {
    let mut primary_error = None;

    for attempt in 1..=policy.max_attempts {
        match primary.analyze(text).await {
            Ok(analysis) => {
                debug!(attempt, provider = primary.name(), "analysis succeeded");
                return Ok(analysis);
            }
            Err(e) if e.is_rate_limit() => {
                warn!(attempt, provider = primary.name(), "analysis rate limited");
                primary_error = Some(e);
                if attempt < policy.max_attempts {
                    let backoff = policy.backoff_step * attempt;
                    debug!(?backoff, "backing off before retrying primary");
                    tokio::time::sleep(backoff).await;
                }
            }
            Err(e) => {
                // Generic failures do not retry the primary
                warn!(attempt, provider = primary.name(), error = %e, "primary analysis failed");
                primary_error = Some(e);
                break;
            }
        }
    }

    let primary_error = primary_error.unwrap_or_else(|| ProviderError::Parse("no attempt made".to_string()));

    let Some(fallback) = fallback else {
        return Err(primary_error);
    };

    debug!(provider = fallback.name(), "trying fallback analyzer");
    match fallback.analyze(text).await {
        Ok(analysis) => {
            debug!(provider = fallback.name(), "fallback analysis succeeded");
            Ok(analysis)
        }
        Err(e) => {
            warn!(provider = fallback.name(), error = %e, "fallback analysis failed");
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Scripted analyzer: pops one response per call, counts invocations
    struct ScriptedAnalyzer {
        name: &'static str,
        calls: AtomicUsize,
        script: std::sync::Mutex<Vec<Result<String, ProviderError>>>,
    }

    impl ScriptedAnalyzer {
        fn new(name: &'static str, script: Vec<Result<String, ProviderError>>) -> Arc<Self> {
            Arc::new(Self {
                name,
                calls: AtomicUsize::new(0),
                script: std::sync::Mutex::new(script),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Analyzer for ScriptedAnalyzer {
        async fn analyze(&self, _text: &str) -> Result<String, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut script = self.script.lock().unwrap();
            if script.is_empty() {
                Ok("default".to_string())
            } else {
                script.remove(0)
            }
        }

        fn name(&self) -> &str {
            self.name
        }
    }

    fn rate_limited() -> ProviderError {
        ProviderError::RateLimited {
            retry_after: Duration::from_secs(1),
        }
    }

    fn zero_backoff() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            backoff_step: Duration::ZERO,
        }
    }

    #[tokio::test]
    async fn test_rate_limited_twice_then_success_never_falls_back() {
        let primary = ScriptedAnalyzer::new(
            "primary",
            vec![Err(rate_limited()), Err(rate_limited()), Ok("brief".to_string())],
        );
        let fallback = ScriptedAnalyzer::new("fallback", vec![]);

        let primary_dyn: Arc<dyn Analyzer> = primary.clone();
        let fallback_dyn: Arc<dyn Analyzer> = fallback.clone();

        let result = analyze_with_fallback(&primary_dyn, Some(&fallback_dyn), "text", &zero_backoff()).await;

        assert_eq!(result.unwrap(), "brief");
        assert_eq!(primary.calls(), 3);
        assert_eq!(fallback.calls(), 0);
    }

    #[tokio::test]
    async fn test_exhausted_ceiling_invokes_fallback_once() {
        let primary = ScriptedAnalyzer::new(
            "primary",
            vec![Err(rate_limited()), Err(rate_limited()), Err(rate_limited())],
        );
        let fallback = ScriptedAnalyzer::new("fallback", vec![Ok("fallback brief".to_string())]);

        let primary_dyn: Arc<dyn Analyzer> = primary.clone();
        let fallback_dyn: Arc<dyn Analyzer> = fallback.clone();

        let result = analyze_with_fallback(&primary_dyn, Some(&fallback_dyn), "text", &zero_backoff()).await;

        assert_eq!(result.unwrap(), "fallback brief");
        assert_eq!(primary.calls(), 3);
        assert_eq!(fallback.calls(), 1);
    }

    #[tokio::test]
    async fn test_generic_failure_falls_back_without_retrying() {
        let primary = ScriptedAnalyzer::new(
            "primary",
            vec![Err(ProviderError::Api {
                status: 500,
                message: "boom".to_string(),
            })],
        );
        let fallback = ScriptedAnalyzer::new("fallback", vec![Ok("fallback brief".to_string())]);

        let primary_dyn: Arc<dyn Analyzer> = primary.clone();
        let fallback_dyn: Arc<dyn Analyzer> = fallback.clone();

        let result = analyze_with_fallback(&primary_dyn, Some(&fallback_dyn), "text", &zero_backoff()).await;

        assert_eq!(result.unwrap(), "fallback brief");
        assert_eq!(primary.calls(), 1);
        assert_eq!(fallback.calls(), 1);
    }

    #[tokio::test]
    async fn test_fallback_failure_propagates() {
        let primary = ScriptedAnalyzer::new(
            "primary",
            vec![Err(ProviderError::Parse("garbled".to_string()))],
        );
        let fallback = ScriptedAnalyzer::new(
            "fallback",
            vec![Err(ProviderError::Api {
                status: 503,
                message: "down".to_string(),
            })],
        );

        let primary_dyn: Arc<dyn Analyzer> = primary.clone();
        let fallback_dyn: Arc<dyn Analyzer> = fallback.clone();

        let result = analyze_with_fallback(&primary_dyn, Some(&fallback_dyn), "text", &zero_backoff()).await;

        assert!(matches!(result, Err(ProviderError::Api { status: 503, .. })));
    }

    #[tokio::test]
    async fn test_no_fallback_propagates_primary_error() {
        let primary = ScriptedAnalyzer::new(
            "primary",
            vec![Err(ProviderError::Api {
                status: 500,
                message: "boom".to_string(),
            })],
        );

        let primary_dyn: Arc<dyn Analyzer> = primary.clone();
        let result = analyze_with_fallback(&primary_dyn, None, "text", &zero_backoff()).await;

        assert!(matches!(result, Err(ProviderError::Api { status: 500, .. })));
        assert_eq!(primary.calls(), 1);
    }
}
