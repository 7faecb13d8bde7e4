//! Logger transport that only logs emails.
//!
//! Useful for staging environments, or to see what would be sent without
//! an SMTP server.

use async_trait::async_trait;
use std::sync::Arc;

use crate::email::Email;
use crate::error::MailError;
use crate::options::TransportOptions;
use crate::transport::{DeliveryResult, Transport, TransportFactory};

/// Transport that emits tracing events instead of sending.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggerTransport {
    /// If true, log full email details. If false, just log recipient summary.
    log_full: bool,
}

impl LoggerTransport {
    /// Brief output (just recipients).
    pub fn new() -> Self {
        Self { log_full: false }
    }

    /// Full email details.
    pub fn full() -> Self {
        Self { log_full: true }
    }
}

#[async_trait]
impl Transport for LoggerTransport {
    async fn send(&self, email: &Email) -> Result<DeliveryResult, MailError> {
        let message_id = uuid::Uuid::new_v4().to_string();

        if self.log_full {
            tracing::info!(
                message_id = %message_id,
                from = ?email.from.as_ref().map(|a| a.formatted()),
                to = ?email.to.iter().map(|a| a.formatted()).collect::<Vec<_>>(),
                cc = ?email.cc.iter().map(|a| a.formatted()).collect::<Vec<_>>(),
                bcc = ?email.bcc.iter().map(|a| a.formatted()).collect::<Vec<_>>(),
                subject = %email.subject,
                has_html = email.html_body.is_some(),
                has_text = email.text_body.is_some(),
                "Email logged (full)"
            );
            if let Some(ref text) = email.text_body {
                tracing::debug!(body = %text, "Text body");
            }
            if let Some(ref html) = email.html_body {
                tracing::debug!(body = %html, "HTML body");
            }
        } else {
            tracing::info!(
                message_id = %message_id,
                to = ?email.to.iter().map(|a| &a.email).collect::<Vec<_>>(),
                subject = %email.subject,
                "Email logged"
            );
        }

        Ok(DeliveryResult::new(message_id))
    }

    async fn close(&self) -> Result<(), MailError> {
        tracing::info!("Logger transport closed");
        Ok(())
    }

    fn provider_name(&self) -> &'static str {
        "logger"
    }
}

impl TransportFactory for LoggerTransport {
    fn create(&self, _options: &TransportOptions) -> Result<Arc<dyn Transport>, MailError> {
        Ok(Arc::new(*self))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_logger_brief() {
        let transport = LoggerTransport::new();
        let email = Email::new()
            .from("sender@example.com")
            .to("recipient@example.com")
            .subject("Test Subject");

        let delivery = transport.send(&email).await.unwrap();
        assert!(!delivery.message_id.is_empty());
    }

    #[tokio::test]
    async fn test_logger_full() {
        let transport = LoggerTransport::full();
        let email = Email::new()
            .from(("Alice", "alice@example.com"))
            .to("bob@example.com")
            .cc("charlie@example.com")
            .text_body("Plain text")
            .html_body("<p>HTML</p>");

        assert!(transport.send(&email).await.is_ok());
        assert!(transport.close().await.is_ok());
    }

    #[test]
    fn test_default_is_brief() {
        assert!(!LoggerTransport::default().log_full);
        assert_eq!(LoggerTransport::default().provider_name(), "logger");
    }
}
