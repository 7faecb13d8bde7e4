//! Transport trait, factory and the client handed to the host.
//!
//! `#[async_trait]` is used instead of native async traits because the host
//! stores transports as `Arc<dyn Transport>`, which requires object safety.
//! Sending is I/O-bound, so the boxed future is not measurable.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::Instrument;

#[cfg(feature = "metrics")]
use std::time::Instant;

use crate::email::Email;
use crate::error::MailError;
use crate::options::TransportOptions;

/// Result of a successful delivery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryResult {
    /// Message ID assigned by the server (or generated locally)
    pub message_id: String,
    /// Optional provider-specific response data
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_response: Option<serde_json::Value>,
}

impl DeliveryResult {
    pub fn new(message_id: impl Into<String>) -> Self {
        Self {
            message_id: message_id.into(),
            provider_response: None,
        }
    }

    pub fn with_response(message_id: impl Into<String>, response: serde_json::Value) -> Self {
        Self {
            message_id: message_id.into(),
            provider_response: Some(response),
        }
    }
}

/// A mail transport: something that can send messages and release its
/// connections.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send a single email.
    async fn send(&self, email: &Email) -> Result<DeliveryResult, MailError>;

    /// Release pooled connections.
    ///
    /// Transports without a pool have nothing to release.
    async fn close(&self) -> Result<(), MailError> {
        Ok(())
    }

    /// Check that the server is reachable and accepts the configuration.
    async fn verify(&self) -> Result<bool, MailError> {
        Ok(true)
    }

    /// Get the provider name (for logging/debugging).
    fn provider_name(&self) -> &'static str {
        "unknown"
    }
}

/// Creates a transport from resolved options.
///
/// Closures implement this trait, so tests can hand the plugin any
/// construction logic:
///
/// ```rust,ignore
/// let factory = |_: &TransportOptions| -> Result<Arc<dyn Transport>, MailError> {
///     Ok(Arc::new(LocalTransport::new()))
/// };
/// ```
pub trait TransportFactory: Send + Sync {
    fn create(&self, options: &TransportOptions) -> Result<Arc<dyn Transport>, MailError>;
}

impl<F> TransportFactory for F
where
    F: Fn(&TransportOptions) -> Result<Arc<dyn Transport>, MailError> + Send + Sync,
{
    fn create(&self, options: &TransportOptions) -> Result<Arc<dyn Transport>, MailError> {
        (self)(options)
    }
}

/// The transport client attached to the host under
/// [`NODEMAILER`](crate::NODEMAILER).
///
/// Wraps a transport and tracks whether it has been closed. Once closed,
/// every send fails with [`MailError::Closed`].
pub struct Transporter {
    transport: Arc<dyn Transport>,
    pooled: bool,
    log_deliveries: bool,
    state: Mutex<State>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Open,
    Closed,
}

impl Transporter {
    /// Wrap a transport created from `options`.
    pub fn new(transport: Arc<dyn Transport>, options: &TransportOptions) -> Self {
        Self {
            transport,
            pooled: options.is_pooled(),
            log_deliveries: options.smtp().logger,
            state: Mutex::new(State::Open),
        }
    }

    /// Whether the underlying transport keeps a connection pool.
    pub fn is_pooled(&self) -> bool {
        self.pooled
    }

    pub fn is_closed(&self) -> bool {
        *self.state.lock() == State::Closed
    }

    pub fn provider_name(&self) -> &'static str {
        self.transport.provider_name()
    }

    /// The wrapped transport.
    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    /// Validate and send an email.
    pub async fn send_mail(&self, email: &Email) -> Result<DeliveryResult, MailError> {
        if self.is_closed() {
            return Err(MailError::Closed);
        }
        validate(email)?;

        let provider = self.transport.provider_name();
        let span = tracing::info_span!(
            "mailbridge.send",
            provider = provider,
            pooled = self.pooled,
            to = ?email.to.iter().map(|a| &a.email).collect::<Vec<_>>(),
            subject = %email.subject,
        );

        async move {
            tracing::debug!("Sending email");

            #[cfg(feature = "metrics")]
            let start = Instant::now();

            let result = self.transport.send(email).await;

            #[cfg(feature = "metrics")]
            {
                let duration = start.elapsed().as_secs_f64();
                let status = if result.is_ok() { "success" } else { "error" };
                metrics::counter!("mailbridge_emails_total", "provider" => provider, "status" => status)
                    .increment(1);
                metrics::histogram!("mailbridge_delivery_duration_seconds", "provider" => provider)
                    .record(duration);
            }

            match &result {
                Ok(r) if self.log_deliveries => {
                    tracing::info!(message_id = %r.message_id, "Email delivered")
                }
                Ok(r) => tracing::debug!(message_id = %r.message_id, "Email delivered"),
                Err(e) => tracing::error!(error = %e, "Email delivery failed"),
            }

            result
        }
        .instrument(span)
        .await
    }

    /// Test the connection to the server.
    pub async fn verify(&self) -> Result<bool, MailError> {
        if self.is_closed() {
            return Err(MailError::Closed);
        }
        self.transport.verify().await
    }

    /// Close the transport, releasing pooled connections.
    ///
    /// Only the first call reaches the transport; later calls return `Ok(())`.
    pub async fn close(&self) -> Result<(), MailError> {
        {
            let mut state = self.state.lock();
            if *state == State::Closed {
                return Ok(());
            }
            *state = State::Closed;
        }

        let provider = self.transport.provider_name();
        let result = self.transport.close().await;

        #[cfg(feature = "metrics")]
        {
            let status = if result.is_ok() { "success" } else { "error" };
            metrics::counter!("mailbridge_transport_closed_total", "provider" => provider, "status" => status)
                .increment(1);
        }

        match &result {
            Ok(()) => tracing::info!(provider, pooled = self.pooled, "Transport closed"),
            Err(e) => tracing::error!(provider, error = %e, "Failed to close transport"),
        }
        result
    }
}

impl fmt::Debug for Transporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transporter")
            .field("provider", &self.transport.provider_name())
            .field("pooled", &self.pooled)
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Validate an email has required fields.
fn validate(email: &Email) -> Result<(), MailError> {
    if email.from.is_none() {
        return Err(MailError::MissingField("from"));
    }
    if email.to.is_empty() && email.cc.is_empty() && email.bcc.is_empty() {
        return Err(MailError::MissingField("to"));
    }
    Ok(())
}
