//! Transport implementations.
//!
//! Each provider implements [`Transport`](crate::Transport) and
//! [`TransportFactory`](crate::TransportFactory).
//!
//! | Provider | Feature Flag | Description |
//! |----------|-------------|-------------|
//! | [`SmtpTransport`] | `smtp` | SMTP via lettre, pooled or single-connection |
//! | [`LocalTransport`] | (none) | In-memory capture for dev/testing |
//! | [`LoggerTransport`] | (none) | Logs emails without sending |

#[cfg(feature = "smtp")]
mod smtp;
#[cfg(feature = "smtp")]
pub use smtp::{SmtpFactory, SmtpTransport};

mod local;
pub use local::{LocalFactory, LocalTransport, StoredEmail};

mod logger;
pub use logger::LoggerTransport;
