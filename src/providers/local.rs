//! Local transport for development and testing.
//!
//! Stores emails in memory and records how often it was closed, so tests can
//! assert on the plugin's lifecycle without an SMTP server.
//!
//! ```rust,ignore
//! use mailbridge::providers::LocalFactory;
//! use mailbridge::{App, NodemailerPlugin};
//!
//! let factory = LocalFactory::new();
//! let app = App::new();
//! app.register(&NodemailerPlugin::with_factory(factory.clone()), json!({ "pool": true })).await?;
//!
//! app.close().await?;
//! assert_eq!(factory.transport().close_count(), 1);
//! ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::email::Email;
use crate::error::MailError;
use crate::options::TransportOptions;
use crate::transport::{DeliveryResult, Transport, TransportFactory};

/// An email captured by [`LocalTransport`].
#[derive(Debug, Clone)]
pub struct StoredEmail {
    pub id: String,
    pub email: Email,
    pub sent_at: DateTime<Utc>,
}

/// Transport that keeps emails in memory.
#[derive(Default)]
pub struct LocalTransport {
    emails: Mutex<Vec<StoredEmail>>,
    closes: AtomicUsize,
    /// If set, send() will return this error (for testing error paths).
    fail_with: RwLock<Option<String>>,
    /// If set, close() will return this error.
    fail_close_with: RwLock<Option<String>>,
}

impl LocalTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create storage wrapped in an Arc for sharing.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    // =========================================================================
    // Failure Simulation
    // =========================================================================

    /// Make every send fail with `message`.
    pub fn set_failure(&self, message: impl Into<String>) {
        *self.fail_with.write() = Some(message.into());
    }

    pub fn clear_failure(&self) {
        *self.fail_with.write() = None;
    }

    /// Make close fail with `message`.
    pub fn set_close_failure(&self, message: impl Into<String>) {
        *self.fail_close_with.write() = Some(message.into());
    }

    // =========================================================================
    // Inspection
    // =========================================================================

    /// All captured emails, newest first.
    pub fn emails(&self) -> Vec<StoredEmail> {
        self.emails.lock().iter().rev().cloned().collect()
    }

    pub fn last_email(&self) -> Option<StoredEmail> {
        self.emails.lock().last().cloned()
    }

    pub fn email_count(&self) -> usize {
        self.emails.lock().len()
    }

    /// Remove and return all captured emails, newest first.
    pub fn flush(&self) -> Vec<StoredEmail> {
        let mut emails = std::mem::take(&mut *self.emails.lock());
        emails.reverse();
        emails
    }

    /// Check if an email was sent to a specific address.
    pub fn sent_to(&self, email: &str) -> bool {
        self.emails.lock().iter().any(|stored| {
            stored
                .email
                .all_recipients()
                .iter()
                .any(|addr| addr.email.eq_ignore_ascii_case(email))
        })
    }

    /// How many times close() reached this transport.
    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.close_count() > 0
    }
}

#[async_trait]
impl Transport for LocalTransport {
    async fn send(&self, email: &Email) -> Result<DeliveryResult, MailError> {
        if let Some(ref message) = *self.fail_with.read() {
            return Err(MailError::SendError(message.clone()));
        }

        let id = uuid::Uuid::new_v4().to_string();
        self.emails.lock().push(StoredEmail {
            id: id.clone(),
            email: email.clone(),
            sent_at: Utc::now(),
        });
        Ok(DeliveryResult::new(id))
    }

    async fn close(&self) -> Result<(), MailError> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        match self.fail_close_with.read().clone() {
            Some(message) => Err(MailError::CloseError(message)),
            None => Ok(()),
        }
    }

    fn provider_name(&self) -> &'static str {
        "local"
    }
}

/// Factory handing out one shared [`LocalTransport`].
///
/// Clones share the transport, so a test can keep a handle and inspect what
/// the plugin attached.
#[derive(Clone, Default)]
pub struct LocalFactory {
    transport: Arc<LocalTransport>,
    created: Arc<AtomicUsize>,
    fail_with: Option<String>,
}

impl LocalFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// A factory whose every `create` call fails with `message`.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            fail_with: Some(message.into()),
            ..Self::default()
        }
    }

    pub fn transport(&self) -> Arc<LocalTransport> {
        Arc::clone(&self.transport)
    }

    /// How many transports this factory has handed out.
    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }
}

impl TransportFactory for LocalFactory {
    fn create(&self, _options: &TransportOptions) -> Result<Arc<dyn Transport>, MailError> {
        if let Some(message) = &self.fail_with {
            return Err(MailError::Configuration(message.clone()));
        }
        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(self.transport())
    }
}
