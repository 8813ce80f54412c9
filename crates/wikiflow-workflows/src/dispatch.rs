//! Mail transports for the email channel.

use async_trait::async_trait;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor, message::Mailbox,
    message::header::ContentType, transport::smtp::authentication::Credentials,
};
use std::sync::Arc;

use wikiflow_core::WikiflowConfig;
use wikiflow_core::config::EmailConfig;
use wikiflow_core::error::{Result, WikiflowError};
use wikiflow_core::traits::MailTransport;

/// SMTP delivery over STARTTLS.
pub struct SmtpTransport {
    from: Mailbox,
    mailer: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpTransport {
    pub fn new(config: &EmailConfig) -> Result<Self> {
        let from: Mailbox = config
            .from
            .parse()
            .map_err(|e| WikiflowError::mail(format!("Invalid from: {e}")))?;

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)
            .map_err(|e| WikiflowError::mail(format!("SMTP relay: {e}")))?
            .port(config.smtp_port);
        if !config.username.is_empty() {
            builder = builder.credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ));
        }

        Ok(Self {
            from,
            mailer: builder.build(),
        })
    }
}

#[async_trait]
impl MailTransport for SmtpTransport {
    fn name(&self) -> &str {
        "smtp"
    }

    async fn send_mail(&self, to: &str, subject: &str, body: &str) -> Result<()> {
        let to_mailbox: Mailbox = to
            .parse()
            .map_err(|e| WikiflowError::mail(format!("Invalid to: {e}")))?;

        let email = Message::builder()
            .from(self.from.clone())
            .to(to_mailbox)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())
            .map_err(|e| WikiflowError::mail(format!("Build email: {e}")))?;

        self.mailer
            .send(email)
            .await
            .map_err(|e| WikiflowError::mail(format!("SMTP send: {e}")))?;

        tracing::info!("📤 Email sent to: {to}");
        Ok(())
    }
}

/// Used when no `[email]` section is configured. Records the delivery in
/// the log and reports success.
pub struct LogTransport;

#[async_trait]
impl MailTransport for LogTransport {
    fn name(&self) -> &str {
        "log"
    }

    async fn send_mail(&self, to: &str, subject: &str, _body: &str) -> Result<()> {
        tracing::info!("📧 [log transport] email to {to}: {subject}");
        Ok(())
    }
}

/// Pick the mail transport for a config.
pub fn transport_from_config(config: &WikiflowConfig) -> Result<Arc<dyn MailTransport>> {
    match &config.email {
        Some(email) => {
            let transport = SmtpTransport::new(email)?;
            tracing::info!("📧 Email channel: SMTP via {}:{}", email.smtp_host, email.smtp_port);
            Ok(Arc::new(transport))
        }
        None => {
            tracing::warn!("⚠️ No [email] section configured, emails will only be logged");
            Ok(Arc::new(LogTransport))
        }
    }
}
