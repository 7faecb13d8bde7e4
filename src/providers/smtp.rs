//! SMTP transport using lettre.
//!
//! # Example
//!
//! ```rust,ignore
//! use mailbridge::providers::SmtpTransport;
//! use mailbridge::TransportOptions;
//! use serde_json::json;
//!
//! let options = TransportOptions::from_value(json!({
//!     "host": "smtp.example.com",
//!     "port": 587,
//!     "pool": true,
//!     "auth": { "user": "username", "pass": "password" }
//! }))?;
//! let transport = SmtpTransport::from_options(&options)?;
//! ```

use async_trait::async_trait;
use lettre::{
    message::{
        header::{ContentType, HeaderName, HeaderValue},
        Mailbox, MultiPart,
    },
    transport::smtp::{
        authentication::Credentials,
        client::{Tls, TlsParameters},
        extension::ClientId,
        PoolConfig,
    },
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use parking_lot::RwLock;
use std::sync::Arc;

use crate::address::Address;
use crate::email::Email;
use crate::error::MailError;
use crate::options::{SmtpOptions, TransportOptions};
use crate::transport::{DeliveryResult, Transport, TransportFactory};

type Inner = AsyncSmtpTransport<Tokio1Executor>;

/// SMTP transport backed by lettre's async client.
///
/// lettre keeps connections in a pool. In pooled mode the pool is sized from
/// the options. In single mode it parks nothing, so every connection sends
/// `QUIT` as soon as its message is delivered. Closing shuts the pool down and
/// waits until its parked connections have quit.
pub struct SmtpTransport {
    inner: RwLock<Option<Inner>>,
    host: String,
    port: u16,
}

impl SmtpTransport {
    /// Build a transport from resolved options. Does not connect.
    pub fn from_options(options: &TransportOptions) -> Result<Self, MailError> {
        let smtp = options.smtp();
        let port = smtp.effective_port();

        let mut builder = Inner::builder_dangerous(smtp.host.as_str())
            .port(port)
            .tls(tls_mode(smtp)?)
            .pool_config(pool_config(options));

        if let Some(timeout) = smtp.connection_timeout() {
            builder = builder.timeout(Some(timeout));
        }
        if let Some(auth) = &smtp.auth {
            builder = builder.credentials(Credentials::new(auth.user.clone(), auth.pass.clone()));
        }
        if let Some(name) = &smtp.name {
            builder = builder.hello_name(ClientId::Domain(name.clone()));
        }

        tracing::debug!(
            host = %smtp.host,
            port,
            pooled = options.is_pooled(),
            "Built SMTP transport"
        );

        Ok(Self {
            inner: RwLock::new(Some(builder.build())),
            host: smtp.host.clone(),
            port,
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    fn client(&self) -> Result<Inner, MailError> {
        self.inner.read().clone().ok_or(MailError::Closed)
    }
}

#[async_trait]
impl Transport for SmtpTransport {
    async fn send(&self, email: &Email) -> Result<DeliveryResult, MailError> {
        let message = build_message(email)?;
        let client = self.client()?;

        let response = client
            .send(message)
            .await
            .map_err(|e| MailError::SendError(e.to_string()))?;

        // The server's acceptance line usually carries its queue id
        let message_id = response
            .message()
            .next()
            .and_then(|m| m.lines().next())
            .map(|s| s.to_string())
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        Ok(DeliveryResult::new(message_id))
    }

    async fn close(&self) -> Result<(), MailError> {
        let client = self.inner.write().take();
        if let Some(client) = client {
            client.shutdown().await;
            tracing::debug!(host = %self.host, port = self.port, "SMTP pool shut down");
        }
        Ok(())
    }

    async fn verify(&self) -> Result<bool, MailError> {
        let client = self.client()?;
        Ok(client.test_connection().await?)
    }

    fn provider_name(&self) -> &'static str {
        "smtp"
    }
}

/// Creates [`SmtpTransport`]s. The default factory of
/// [`NodemailerPlugin`](crate::NodemailerPlugin).
#[derive(Debug, Clone, Copy, Default)]
pub struct SmtpFactory;

impl TransportFactory for SmtpFactory {
    fn create(&self, options: &TransportOptions) -> Result<Arc<dyn Transport>, MailError> {
        Ok(Arc::new(SmtpTransport::from_options(options)?))
    }
}

fn tls_mode(smtp: &SmtpOptions) -> Result<Tls, MailError> {
    if smtp.ignore_tls && !smtp.secure {
        return Ok(Tls::None);
    }

    let domain = smtp
        .tls
        .servername
        .clone()
        .unwrap_or_else(|| smtp.host.clone());
    let parameters = TlsParameters::builder(domain)
        .dangerous_accept_invalid_certs(!smtp.tls.reject_unauthorized)
        .build()
        .map_err(|e| MailError::Configuration(format!("invalid TLS settings: {}", e)))?;

    Ok(if smtp.secure {
        Tls::Wrapper(parameters)
    } else if smtp.require_tls {
        Tls::Required(parameters)
    } else {
        Tls::Opportunistic(parameters)
    })
}

fn pool_config(options: &TransportOptions) -> PoolConfig {
    match options {
        TransportOptions::Pooled(pooled) => {
            let config = PoolConfig::new()
                .min_idle(0)
                .max_size(pooled.max_connections.max(1));
            match pooled.idle_timeout() {
                Some(timeout) => config.idle_timeout(timeout),
                None => config,
            }
        }
        // Nothing is parked; a connection quits right after its send
        TransportOptions::Single(_) => PoolConfig::new().min_idle(0).max_size(0),
    }
}

/// Build a lettre Message from our Email struct.
fn build_message(email: &Email) -> Result<Message, MailError> {
    let from = email
        .from
        .as_ref()
        .ok_or(MailError::MissingField("from"))?;

    let mut builder = Message::builder()
        .from(address_to_mailbox(from)?)
        .subject(&email.subject);

    for to in &email.to {
        builder = builder.to(address_to_mailbox(to)?);
    }
    for cc in &email.cc {
        builder = builder.cc(address_to_mailbox(cc)?);
    }
    for bcc in &email.bcc {
        builder = builder.bcc(address_to_mailbox(bcc)?);
    }
    if let Some(reply_to) = &email.reply_to {
        builder = builder.reply_to(address_to_mailbox(reply_to)?);
    }

    for (name, value) in &email.headers {
        let header_name = HeaderName::new_from_ascii(name.clone())
            .map_err(|e| MailError::BuildError(format!("{}: {:?}", e, name)))?;
        builder = builder.raw_header(HeaderValue::new(header_name, value.clone()));
    }

    let message = match (&email.html_body, &email.text_body) {
        (Some(html), Some(text)) => {
            builder.multipart(MultiPart::alternative_plain_html(text.clone(), html.clone()))?
        }
        (Some(html), None) => builder.header(ContentType::TEXT_HTML).body(html.clone())?,
        (None, Some(text)) => builder.header(ContentType::TEXT_PLAIN).body(text.clone())?,
        (None, None) => builder.header(ContentType::TEXT_PLAIN).body(String::new())?,
    };

    Ok(message)
}

/// Convert our Address to lettre's Mailbox.
fn address_to_mailbox(addr: &Address) -> Result<Mailbox, MailError> {
    let email: lettre::Address = addr.email.parse()?;
    Ok(Mailbox::new(addr.name.clone(), email))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn options(value: serde_json::Value) -> TransportOptions {
        TransportOptions::from_value(value).unwrap()
    }

    #[tokio::test]
    async fn test_builds_pooled_transport() {
        let transport = SmtpTransport::from_options(&options(json!({
            "host": "smtp.example.com",
            "port": 587,
            "pool": true,
            "maxConnections": 2,
            "idleTimeout": 30000,
            "auth": { "user": "u", "pass": "p" }
        })))
        .unwrap();

        assert_eq!(transport.host(), "smtp.example.com");
        assert_eq!(transport.port(), 587);
        assert_eq!(transport.provider_name(), "smtp");
    }

    #[tokio::test]
    async fn test_secure_defaults_to_465() {
        let transport =
            SmtpTransport::from_options(&options(json!({ "host": "smtp.example.com", "secure": true })))
                .unwrap();
        assert_eq!(transport.port(), 465);
    }

    #[tokio::test]
    async fn test_send_after_close_fails() {
        let transport = SmtpTransport::from_options(&options(json!({
            "host": "localhost",
            "port": 2525,
            "ignoreTLS": true,
            "pool": true
        })))
        .unwrap();

        transport.close().await.unwrap();
        // Second close is a no-op
        transport.close().await.unwrap();

        let email = Email::new()
            .from("sender@example.com")
            .to("recipient@example.com")
            .subject("Hello");
        let err = transport.send(&email).await.unwrap_err();
        assert!(matches!(err, MailError::Closed));
        assert!(matches!(transport.verify().await, Err(MailError::Closed)));
    }

    #[tokio::test]
    async fn test_factory_creates_smtp_transport() {
        let transport = SmtpFactory
            .create(&options(json!({ "host": "smtp.example.com" })))
            .unwrap();
        assert_eq!(transport.provider_name(), "smtp");
    }

    #[test]
    fn test_build_message() {
        let email = Email::new()
            .from(("Sender", "sender@example.com"))
            .to("recipient@example.com")
            .reply_to("reply@example.com")
            .subject("Greetings")
            .text_body("Plain")
            .html_body("<p>Rich</p>");

        let message = build_message(&email).unwrap();
        let raw = String::from_utf8(message.formatted()).unwrap();
        assert!(raw.contains("Subject: Greetings"));
        assert!(raw.contains("Reply-To: reply@example.com"));
        assert!(raw.contains("multipart/alternative"));
    }

    #[test]
    fn test_build_message_includes_custom_headers() {
        let email = Email::new()
            .from("sender@example.com")
            .to("recipient@example.com")
            .subject("Campaign")
            .header("X-Campaign", "spring-42")
            .text_body("Hi");

        let message = build_message(&email).unwrap();
        let raw = String::from_utf8(message.formatted()).unwrap();
        assert!(raw.contains("X-Campaign: spring-42"));
    }

    #[test]
    fn test_build_message_rejects_bad_header_name() {
        let email = Email::new()
            .from("sender@example.com")
            .to("recipient@example.com")
            .subject("Oops")
            .header("X Bad:Name", "value");

        assert!(matches!(build_message(&email), Err(MailError::BuildError(_))));
    }

    #[test]
    fn test_build_message_rejects_bad_address() {
        let email = Email::new()
            .from("sender@example.com")
            .to("not an address")
            .subject("Oops");
        assert!(matches!(
            build_message(&email),
            Err(MailError::InvalidAddress(_))
        ));
    }
}
