//! # ab-mail
//!
//! `Mailer` implementations: a log-only backend for development, an SMTP
//! backend built on lettre, and an in-memory outbox for tests.

use std::sync::{Arc, Mutex};

use ab_core::notifications::EmailMessage;
use ab_core::traits::Mailer;
use anyhow::Context;
use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use secrecy::{ExposeSecret, SecretString};

/// Writes every message to the log instead of delivering it.
#[derive(Debug, Default, Clone)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, message: &EmailMessage) -> anyhow::Result<()> {
        tracing::info!(
            to = %message.to,
            from = %message.from,
            subject = %message.subject,
            body = %message.body,
            "email (log backend)"
        );
        Ok(())
    }
}

/// Connection settings for [`SmtpMailer`].
#[derive(Debug, Clone)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<SecretString>,
    /// Upgrade the connection with STARTTLS. Disable only for local relays.
    pub starttls: bool,
}

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpMailer {
    pub fn new(settings: &SmtpSettings) -> anyhow::Result<Self> {
        let mut builder = if settings.starttls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&settings.host)
                .with_context(|| format!("invalid smtp relay {}", settings.host))?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&settings.host)
        };
        builder = builder.port(settings.port);

        if let (Some(user), Some(password)) = (&settings.username, &settings.password) {
            builder = builder.credentials(Credentials::new(
                user.clone(),
                password.expose_secret().to_string(),
            ));
        }

        tracing::info!(host = %settings.host, port = settings.port, "smtp mailer configured");
        Ok(Self {
            transport: builder.build(),
        })
    }
}

fn build_message(message: &EmailMessage) -> anyhow::Result<Message> {
    Message::builder()
        .from(message.from.parse::<Mailbox>().context("invalid sender address")?)
        .to(message.to.parse::<Mailbox>().context("invalid recipient address")?)
        .subject(message.subject.clone())
        .header(ContentType::TEXT_PLAIN)
        .body(message.body.clone())
        .context("failed to build email")
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, message: &EmailMessage) -> anyhow::Result<()> {
        let email = build_message(message)?;
        self.transport
            .send(email)
            .await
            .with_context(|| format!("smtp delivery to {} failed", message.to))?;
        Ok(())
    }
}

/// Keeps sent messages in memory. Clones share the same outbox.
#[derive(Debug, Default, Clone)]
pub struct MemoryMailer {
    outbox: Arc<Mutex<Vec<EmailMessage>>>,
}

impl MemoryMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<EmailMessage> {
        self.outbox
            .lock()
            .map(|outbox| outbox.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Mailer for MemoryMailer {
    async fn send(&self, message: &EmailMessage) -> anyhow::Result<()> {
        self.outbox
            .lock()
            .map_err(|_| anyhow::anyhow!("outbox lock poisoned"))?
            .push(message.clone());
        Ok(())
    }
}
