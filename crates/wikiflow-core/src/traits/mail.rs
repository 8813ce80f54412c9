//! Mail transport port for the email channel.

use async_trait::async_trait;

use crate::error::Result;

/// Delivers one plain-text email.
#[async_trait]
pub trait MailTransport: Send + Sync {
    /// Transport name, for logs.
    fn name(&self) -> &str;

    /// Send a message to a single recipient address.
    async fn send_mail(&self, to: &str, subject: &str, body: &str) -> Result<()>;
}
