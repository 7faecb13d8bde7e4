//! # Mailbridge
//!
//! Attach a mail transport to an application host, and close its connection
//! pool when the host shuts down.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use mailbridge::{App, Email, NodemailerExt, NodemailerPlugin};
//! use serde_json::json;
//!
//! let app = App::new();
//! app.register(
//!     &NodemailerPlugin::new(),
//!     json!({
//!         "host": "smtp.example.com",
//!         "port": 587,
//!         "pool": true,
//!         "auth": { "user": "u", "pass": "p" }
//!     }),
//! )
//! .await?;
//!
//! // Anywhere the app is reachable:
//! let mailer = app.nodemailer().expect("nodemailer registered");
//! mailer
//!     .send_mail(
//!         &Email::new()
//!             .from("noreply@example.com")
//!             .to("user@example.com")
//!             .subject("Welcome!")
//!             .text_body("Hello"),
//!     )
//!     .await?;
//!
//! // Runs the close hook, which releases the SMTP pool.
//! app.close().await?;
//! ```
//!
//! ## Pooled mode
//!
//! Only `"pool": true` selects pooled mode. Other truthy values (`1`,
//! `"true"`) do not. Only pooled transports get a close hook. Single-connection
//! transports have nothing to release.
//!
//! ## Environment Variables
//!
//! [`TransportOptions::from_env`] builds options from:
//!
//! | Variable | Description |
//! |----------|-------------|
//! | `SMTP_HOST` | SMTP server host |
//! | `SMTP_PORT` | SMTP server port (default: 587, or 465 when secure) |
//! | `SMTP_SECURE` | Implicit TLS |
//! | `SMTP_USERNAME` | SMTP username |
//! | `SMTP_PASSWORD` | SMTP password |
//! | `SMTP_POOL` | Pooled mode |
//!
//! ## Feature Flags
//!
//! - `smtp` (default) - SMTP transport via lettre
//! - `metrics` - Prometheus-style metrics (counters/histograms)
//!
//! ## Metrics
//!
//! | Metric | Type | Labels | Description |
//! |--------|------|--------|-------------|
//! | `mailbridge_emails_total` | Counter | provider, status | Total emails sent |
//! | `mailbridge_delivery_duration_seconds` | Histogram | provider | Delivery duration |
//! | `mailbridge_transport_closed_total` | Counter | provider, status | Transport closes |

/// The version of the mailbridge crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

mod address;
mod email;
mod error;
mod host;
mod options;
mod plugin;
mod transport;

pub mod providers;

// Re-exports
pub use address::Address;
pub use email::Email;
pub use error::{MailError, PluginError};
pub use host::{App, CloseHook, Plugin, PluginMeta, DEFAULT_HOST_VERSION};
pub use options::{
    is_pooled_map, AuthOptions, PooledOptions, SmtpOptions, TlsOptions, TransportOptions, POOL_KEY,
};
pub use plugin::{
    handle_close, is_pooled_options, NodemailerExt, NodemailerPlugin, HOST_VERSION_REQ,
    NODEMAILER, PLUGIN_NAME,
};
pub use transport::{DeliveryResult, Transport, TransportFactory, Transporter};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::Address;
    pub use crate::App;
    pub use crate::DeliveryResult;
    pub use crate::Email;
    pub use crate::MailError;
    pub use crate::NodemailerExt;
    pub use crate::NodemailerPlugin;
    pub use crate::Plugin;
    pub use crate::PluginError;
    pub use crate::Transport;
    pub use crate::TransportOptions;
    pub use crate::Transporter;
}
