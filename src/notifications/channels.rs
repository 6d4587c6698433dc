use anyhow::{Context, Result};
use async_trait::async_trait;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Tokio1Executor,
    message::{Mailbox, Message, header::ContentType},
    transport::smtp::{authentication::Credentials, client::TlsParametersBuilder},
};
use reqwest::Client;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::tenant::{ChannelConfig, ChannelKind};

/// An outbound notification channel
#[async_trait]
pub trait ChannelSender: Send + Sync {
    fn kind(&self) -> ChannelKind;

    /// Deliver a rendered message; any error is a failed delivery
    async fn send(&self, message: &str) -> Result<()>;
}

/// Chat webhook (Discord, Slack, Teams)
pub struct WebhookChannel {
    kind: ChannelKind,
    url: Option<String>,
    client: Client,
}

impl WebhookChannel {
    pub fn new(kind: ChannelKind, url: Option<String>, client: Client) -> Self {
        Self { kind, url, client }
    }

    /// Request body in the shape each service expects
    pub fn payload(&self, message: &str) -> serde_json::Value {
        match self.kind {
            ChannelKind::Discord => json!({ "content": message }),
            _ => json!({ "text": message }),
        }
    }
}

#[async_trait]
impl ChannelSender for WebhookChannel {
    fn kind(&self) -> ChannelKind {
        self.kind
    }

    async fn send(&self, message: &str) -> Result<()> {
        let url = match self.url.as_deref().map(str::trim) {
            Some(url) if !url.is_empty() => url,
            _ => anyhow::bail!("No webhook URL configured"),
        };

        let response = self
            .client
            .post(url)
            .json(&self.payload(message))
            .send()
            .await
            .with_context(|| format!("Failed to post to {} webhook", self.kind))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("{} webhook returned {}: {}", self.kind, status, body);
        }
        Ok(())
    }
}

/// SMTP transport shared by every email channel
pub struct SmtpMailer {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    /// Build the transport from `SMTP_*` / `FROM_*` environment variables
    pub fn from_env() -> Result<Self> {
        let smtp_server = std::env::var("SMTP_SERVER")
            .map_err(|_| anyhow::anyhow!("SMTP_SERVER environment variable not set"))?;

        let smtp_port: u16 = std::env::var("SMTP_PORT")
            .unwrap_or_else(|_| "587".to_string())
            .parse()
            .map_err(|_| anyhow::anyhow!("Invalid SMTP_PORT"))?;

        let smtp_username = std::env::var("SMTP_USERNAME")
            .map_err(|_| anyhow::anyhow!("SMTP_USERNAME environment variable not set"))?;

        let smtp_password = std::env::var("SMTP_PASSWORD")
            .map_err(|_| anyhow::anyhow!("SMTP_PASSWORD environment variable not set"))?;

        let from_email = std::env::var("FROM_EMAIL")
            .map_err(|_| anyhow::anyhow!("FROM_EMAIL environment variable not set"))?;

        let from_name = std::env::var("FROM_NAME").unwrap_or_else(|_| "Tailwatch".to_string());

        let creds = Credentials::new(smtp_username, smtp_password);

        // Port 1025: plain local relay (Mailpit)
        // Port 465: implicit TLS
        // Anything else: STARTTLS
        let mailer = if smtp_port == 1025 {
            info!("Using insecure SMTP connection for port 1025 without TLS");
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&smtp_server)
                .port(smtp_port)
                .tls(lettre::transport::smtp::client::Tls::None)
                .build()
        } else if smtp_port == 465 {
            info!("Using implicit TLS (SMTPS) for port 465");
            let tls_params = TlsParametersBuilder::new(smtp_server.clone())
                .build()
                .map_err(|e| anyhow::anyhow!("Failed to create TLS parameters: {}", e))?;
            AsyncSmtpTransport::<Tokio1Executor>::relay(&smtp_server)?
                .port(smtp_port)
                .credentials(creds)
                .tls(lettre::transport::smtp::client::Tls::Wrapper(tls_params))
                .build()
        } else {
            info!("Using STARTTLS for port {}", smtp_port);
            let tls_params = TlsParametersBuilder::new(smtp_server.clone())
                .build()
                .map_err(|e| anyhow::anyhow!("Failed to create TLS parameters: {}", e))?;
            AsyncSmtpTransport::<Tokio1Executor>::relay(&smtp_server)?
                .port(smtp_port)
                .credentials(creds)
                .tls(lettre::transport::smtp::client::Tls::Required(tls_params))
                .build()
        };

        let from = Mailbox::new(
            Some(from_name),
            from_email.parse().context("Invalid FROM_EMAIL address")?,
        );

        Ok(Self { mailer, from })
    }
}

/// Plain-text email to one recipient
pub struct EmailChannel {
    to: String,
    to_name: Option<String>,
    mailer: Option<Arc<SmtpMailer>>,
}

impl EmailChannel {
    pub fn new(to: String, to_name: Option<String>, mailer: Option<Arc<SmtpMailer>>) -> Self {
        Self { to, to_name, mailer }
    }

    /// First line of the message without markdown emphasis
    fn subject(message: &str) -> String {
        let first = message.lines().next().unwrap_or_default();
        let subject = first.replace("**", "");
        let subject = subject.trim();
        if subject.is_empty() {
            "Tailwatch notification".to_string()
        } else {
            subject.to_string()
        }
    }
}

#[async_trait]
impl ChannelSender for EmailChannel {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Email
    }

    async fn send(&self, message: &str) -> Result<()> {
        let Some(smtp) = &self.mailer else {
            anyhow::bail!("SMTP is not configured");
        };

        let to = Mailbox::new(
            self.to_name.clone(),
            self.to
                .parse()
                .with_context(|| format!("Invalid recipient address '{}'", self.to))?,
        );

        let email = Message::builder()
            .from(smtp.from.clone())
            .to(to)
            .subject(Self::subject(message))
            .header(ContentType::TEXT_PLAIN)
            .body(message.replace("**", ""))
            .context("Failed to build email")?;

        smtp.mailer
            .send(email)
            .await
            .with_context(|| format!("Failed to send email to {}", self.to))?;
        Ok(())
    }
}

/// Builds channel senders from tenant channel settings
#[derive(Clone)]
pub struct ChannelFactory {
    http: Client,
    mailer: Option<Arc<SmtpMailer>>,
}

impl ChannelFactory {
    pub fn new(http: Client, mailer: Option<Arc<SmtpMailer>>) -> Self {
        Self { http, mailer }
    }

    /// HTTP client bounded by the channel timeout, SMTP from the environment when available
    pub fn from_env(channel_timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(channel_timeout)
            .build()
            .context("Failed to build webhook HTTP client")?;

        let mailer = match SmtpMailer::from_env() {
            Ok(mailer) => Some(Arc::new(mailer)),
            Err(e) => {
                warn!(error = %e, "Email channels disabled: SMTP not configured");
                None
            }
        };

        Ok(Self { http, mailer })
    }

    pub fn build(&self, config: &ChannelConfig) -> Arc<dyn ChannelSender> {
        match config {
            ChannelConfig::Discord { webhook_url, .. }
            | ChannelConfig::Slack { webhook_url, .. }
            | ChannelConfig::Teams { webhook_url, .. } => Arc::new(WebhookChannel::new(
                config.kind(),
                webhook_url.clone(),
                self.http.clone(),
            )),
            ChannelConfig::Email { to, to_name, .. } => Arc::new(EmailChannel::new(
                to.clone(),
                to_name.clone(),
                self.mailer.clone(),
            )),
        }
    }

    /// Senders for every enabled channel
    pub fn build_enabled(&self, configs: &[ChannelConfig]) -> Vec<Arc<dyn ChannelSender>> {
        configs
            .iter()
            .filter(|c| c.enabled())
            .map(|c| self.build(c))
            .collect()
    }
}
