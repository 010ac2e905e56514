//! SMTP dispatch via async lettre
//!
//! Sends one plain-text brief per analyzed video over a STARTTLS relay.

use lettre::message::Mailbox;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::debug;

use super::{AnalysisResult, Dispatcher, ProviderError, youtube::format_hms};
use crate::config::SmtpConfig;
use async_trait::async_trait;

/// SMTP email dispatcher
pub struct EmailDispatcher {
    host: String,
    port: u16,
    username: String,
    password: String,
    from_address: String,
    from_name: String,
}

impl EmailDispatcher {
    /// Create a new dispatcher from configuration
    ///
    /// Reads credentials from the environment variables named in config.
    pub fn from_config(config: &SmtpConfig) -> Result<Self, ProviderError> {
        let username = std::env::var(&config.user_env)
            .map_err(|_| ProviderError::Config(format!("{} not set", config.user_env)))?;
        let password = std::env::var(&config.pass_env)
            .map_err(|_| ProviderError::Config(format!("{} not set", config.pass_env)))?;

        let from_address = if config.from_address.is_empty() {
            username.clone()
        } else {
            config.from_address.clone()
        };

        Ok(Self {
            host: config.host.clone(),
            port: config.port,
            username,
            password,
            from_address,
            from_name: config.from_name.clone(),
        })
    }
}

#[async_trait]
impl Dispatcher for EmailDispatcher {
    async fn send(&self, recipient: &str, subject: &str, body: &str) -> Result<(), ProviderError> {
        debug!(%recipient, %subject, "send: called");

        let from: Mailbox = format!("{} <{}>", self.from_name, self.from_address)
            .parse()
            .map_err(|e| ProviderError::Dispatch(format!("invalid from address: {e}")))?;
        let to: Mailbox = recipient
            .parse()
            .map_err(|e| ProviderError::Dispatch(format!("invalid recipient: {e}")))?;

        let email = Message::builder()
            .from(from)
            .to(to)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())
            .map_err(|e| ProviderError::Dispatch(format!("build message: {e}")))?;

        let creds = Credentials::new(self.username.clone(), self.password.clone());
        let mailer = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.host)
            .map_err(|e| ProviderError::Dispatch(format!("smtp relay: {e}")))?
            .port(self.port)
            .credentials(creds)
            .build();

        mailer
            .send(email)
            .await
            .map_err(|e| ProviderError::Dispatch(format!("smtp send: {e}")))?;

        debug!(%recipient, "send: delivered");
        Ok(())
    }
}

/// Subject line for one analyzed video
pub fn brief_subject(result: &AnalysisResult) -> String {
    format!("Earnings brief: {}", result.candidate.title)
}

/// Plain-text body for one analyzed video
pub fn render_brief(result: &AnalysisResult) -> String {
    let candidate = &result.candidate;
    let duration = candidate
        .duration_secs
        .map(format_hms)
        .unwrap_or_else(|| "unknown".to_string());

    let mut body = String::new();
    body.push_str(&format!("{}\n", candidate.title));
    body.push_str(&format!(
        "Published: {} | Duration: {}\n",
        candidate.published_at.format("%d %b %Y"),
        duration
    ));
    body.push_str(&format!("{}\n\n", candidate.url));
    body.push_str(result.analysis_text.as_deref().unwrap_or("No analysis available."));
    body.push_str(
        "\n\n--\nAuto-generated AI analysis of a public earnings call transcript.\n\
         Not financial advice. Conduct your own due diligence.\n",
    );
    body
}
