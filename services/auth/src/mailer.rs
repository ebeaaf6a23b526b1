//! Outgoing transactional email

use anyhow::Result;
use async_trait::async_trait;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Mailbox, header::ContentType},
    transport::smtp::authentication::Credentials,
};
use thiserror::Error;
use tracing::info;

/// Mail delivery errors
#[derive(Error, Debug)]
pub enum MailError {
    /// An address could not be parsed
    #[error("Invalid mailbox {0}: {1}")]
    Address(String, String),

    /// The message could not be assembled
    #[error("Failed to build message: {0}")]
    Build(String),

    /// The SMTP exchange failed
    #[error("SMTP transport error: {0}")]
    Transport(String),
}

/// Result of a best-effort delivery
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered,
    Failed(String),
}

impl DeliveryOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, DeliveryOutcome::Delivered)
    }
}

impl From<Result<(), MailError>> for DeliveryOutcome {
    fn from(result: Result<(), MailError>) -> Self {
        match result {
            Ok(()) => DeliveryOutcome::Delivered,
            Err(e) => DeliveryOutcome::Failed(e.to_string()),
        }
    }
}

/// Sends plain-text mail
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_mail(&self, to: &str, subject: &str, body: &str) -> Result<(), MailError>;
}

/// SMTP configuration
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    /// SMTP relay host
    pub host: String,
    /// SMTP port
    pub port: u16,
    /// Login user, if the relay requires authentication
    pub username: Option<String>,
    /// Login password
    pub password: Option<String>,
    /// Sender mailbox, e.g. `Sign-in <no-reply@example.com>`
    pub from: String,
    /// Upgrade the connection with STARTTLS
    pub starttls: bool,
}

impl SmtpConfig {
    /// Create a new SmtpConfig from environment variables
    ///
    /// # Environment Variables
    /// - `SMTP_HOST`: SMTP relay host (required)
    /// - `SMTP_PORT`: SMTP port (default: 587)
    /// - `SMTP_USERNAME`: Login user (optional)
    /// - `SMTP_PASSWORD`: Login password (optional)
    /// - `SMTP_FROM`: Sender mailbox (required)
    /// - `SMTP_STARTTLS`: Use STARTTLS (default: true)
    pub fn from_env() -> Result<Self> {
        let host = std::env::var("SMTP_HOST")
            .map_err(|_| anyhow::anyhow!("SMTP_HOST environment variable not set"))?;

        let from = std::env::var("SMTP_FROM")
            .map_err(|_| anyhow::anyhow!("SMTP_FROM environment variable not set"))?;

        let port = std::env::var("SMTP_PORT")
            .unwrap_or_else(|_| "587".to_string())
            .parse()
            .unwrap_or(587);

        let starttls = std::env::var("SMTP_STARTTLS")
            .map(|v| v != "false" && v != "0")
            .unwrap_or(true);

        Ok(SmtpConfig {
            host,
            port,
            username: std::env::var("SMTP_USERNAME").ok(),
            password: std::env::var("SMTP_PASSWORD").ok(),
            from,
            starttls,
        })
    }
}

/// [`Mailer`] over an async SMTP connection
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    /// Build the SMTP transport. No connection is opened until the first send.
    pub fn new(config: &SmtpConfig) -> Result<Self> {
        let from: Mailbox = config
            .from
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid SMTP_FROM {}: {}", config.from, e))?;

        let mut builder = if config.starttls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host)
        };
        builder = builder.port(config.port);

        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        info!(
            "SMTP mailer configured for {}:{} (starttls: {})",
            config.host, config.port, config.starttls
        );

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send_mail(&self, to: &str, subject: &str, body: &str) -> Result<(), MailError> {
        let to: Mailbox = to
            .parse()
            .map_err(|e: lettre::address::AddressError| {
                MailError::Address(to.to_string(), e.to_string())
            })?;

        let message = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())
            .map_err(|e| MailError::Build(e.to_string()))?;

        self.transport
            .send(message)
            .await
            .map_err(|e| MailError::Transport(e.to_string()))?;

        Ok(())
    }
}
