//! Transport configuration.
//!
//! Options arrive as a loosely-typed JSON map (the shape callers already use
//! for SMTP transports: `host`, `port`, `auth`, `tls`, `pool`, ...). They are
//! resolved once, at the boundary, into [`TransportOptions`]: either
//! [`Pooled`](TransportOptions::Pooled) or [`Single`](TransportOptions::Single).
//!
//! Pooled mode is selected only when the map holds `"pool": true`. Any other
//! value (`false`, `0`, `1`, `"true"`, `null`) or a missing key selects
//! single-connection mode.
//!
//! ```
//! use mailbridge::TransportOptions;
//! use serde_json::json;
//!
//! let options = TransportOptions::from_value(json!({
//!     "host": "smtp.example.com",
//!     "port": 587,
//!     "pool": true,
//!     "auth": { "user": "u", "pass": "p" }
//! })).unwrap();
//! assert!(options.is_pooled());
//! ```

use serde::Deserialize;
use serde_json::{Map, Value};
use std::env;
use std::time::Duration;

use crate::error::MailError;

/// Key that selects pooled mode.
pub const POOL_KEY: &str = "pool";

/// Resolved transport configuration.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportOptions {
    /// Keep a pool of reusable connections. Must be closed on shutdown.
    Pooled(PooledOptions),
    /// Open connections on demand; nothing to release on shutdown.
    Single(SmtpOptions),
}

/// Connection settings shared by both modes.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SmtpOptions {
    pub host: String,
    /// Defaults to 465 when `secure`, otherwise 587.
    pub port: Option<u16>,
    /// Connect with implicit TLS.
    pub secure: bool,
    /// Never upgrade with STARTTLS.
    #[serde(rename = "ignoreTLS")]
    pub ignore_tls: bool,
    /// Fail unless STARTTLS succeeds.
    #[serde(rename = "requireTLS")]
    pub require_tls: bool,
    /// Client hostname announced in EHLO.
    pub name: Option<String>,
    pub auth: Option<AuthOptions>,
    pub tls: TlsOptions,
    /// Milliseconds.
    pub connection_timeout: Option<u64>,
    /// Log every delivery at info level.
    pub logger: bool,
}

impl Default for SmtpOptions {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: None,
            secure: false,
            ignore_tls: false,
            require_tls: false,
            name: None,
            auth: None,
            tls: TlsOptions::default(),
            connection_timeout: None,
            logger: false,
        }
    }
}

impl SmtpOptions {
    /// Port to connect to, after applying the `secure` default.
    pub fn effective_port(&self) -> u16 {
        self.port.unwrap_or(if self.secure { 465 } else { 587 })
    }

    pub fn connection_timeout(&self) -> Option<Duration> {
        self.connection_timeout.map(Duration::from_millis)
    }
}

/// SMTP credentials.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AuthOptions {
    pub user: String,
    pub pass: String,
}

/// TLS settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TlsOptions {
    /// Set to `false` to accept invalid certificates.
    pub reject_unauthorized: bool,
    /// Override the domain used for SNI and certificate checks.
    pub servername: Option<String>,
}

impl Default for TlsOptions {
    fn default() -> Self {
        Self {
            reject_unauthorized: true,
            servername: None,
        }
    }
}

/// Settings for pooled mode.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PooledOptions {
    #[serde(flatten)]
    pub smtp: SmtpOptions,
    /// Upper bound on simultaneous connections.
    pub max_connections: u32,
    /// Milliseconds an idle connection is kept open.
    pub idle_timeout: Option<u64>,
}

impl Default for PooledOptions {
    fn default() -> Self {
        Self {
            smtp: SmtpOptions::default(),
            max_connections: 5,
            idle_timeout: None,
        }
    }
}

impl PooledOptions {
    pub fn idle_timeout(&self) -> Option<Duration> {
        self.idle_timeout.map(Duration::from_millis)
    }
}

impl TransportOptions {
    /// Resolve a raw options value.
    ///
    /// Fails with [`MailError::Configuration`] when the value is not an
    /// object or a field has the wrong shape.
    pub fn from_value(value: Value) -> Result<Self, MailError> {
        let map = match value {
            Value::Object(map) => map,
            other => {
                return Err(MailError::Configuration(format!(
                    "transport options must be an object, got {}",
                    kind(&other)
                )))
            }
        };

        let pooled = is_pooled_map(&map);
        let value = Value::Object(map);
        let options = if pooled {
            serde_json::from_value(value).map(TransportOptions::Pooled)
        } else {
            serde_json::from_value(value).map(TransportOptions::Single)
        };
        options.map_err(|e| MailError::Configuration(format!("invalid transport options: {}", e)))
    }

    /// Load options from `SMTP_*` environment variables.
    ///
    /// | Variable | Description |
    /// |----------|-------------|
    /// | `SMTP_HOST` | SMTP server host (required) |
    /// | `SMTP_PORT` | SMTP server port |
    /// | `SMTP_SECURE` | `true` for implicit TLS |
    /// | `SMTP_USERNAME` | SMTP username |
    /// | `SMTP_PASSWORD` | SMTP password |
    /// | `SMTP_POOL` | `true` for pooled mode |
    pub fn from_env() -> Result<Self, MailError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> Result<Self, MailError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let host = lookup("SMTP_HOST")
            .ok_or_else(|| MailError::Configuration("SMTP_HOST not set".into()))?;

        let mut map = Map::new();
        map.insert("host".into(), Value::String(host));

        if let Some(port) = lookup("SMTP_PORT") {
            let port: u16 = port.trim().parse().map_err(|_| {
                MailError::Configuration(format!("SMTP_PORT is not a valid port: {}", port))
            })?;
            map.insert("port".into(), port.into());
        }
        if let Some(secure) = lookup("SMTP_SECURE") {
            map.insert("secure".into(), parse_flag("SMTP_SECURE", &secure)?.into());
        }
        if let Some(pool) = lookup("SMTP_POOL") {
            map.insert(POOL_KEY.into(), parse_flag("SMTP_POOL", &pool)?.into());
        }

        let username = lookup("SMTP_USERNAME").unwrap_or_default();
        if !username.is_empty() {
            let password = lookup("SMTP_PASSWORD").unwrap_or_default();
            map.insert(
                "auth".into(),
                serde_json::json!({ "user": username, "pass": password }),
            );
        }

        Self::from_value(Value::Object(map))
    }

    pub fn is_pooled(&self) -> bool {
        matches!(self, TransportOptions::Pooled(_))
    }

    /// Connection settings, regardless of mode.
    pub fn smtp(&self) -> &SmtpOptions {
        match self {
            TransportOptions::Pooled(pooled) => &pooled.smtp,
            TransportOptions::Single(smtp) => smtp,
        }
    }
}

/// Pooled mode: the `pool` key is present and is the boolean `true`.
pub fn is_pooled_map(map: &Map<String, Value>) -> bool {
    matches!(map.get(POOL_KEY), Some(Value::Bool(true)))
}

fn parse_flag(var: &str, raw: &str) -> Result<bool, MailError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" | "" => Ok(false),
        _ => Err(MailError::Configuration(format!(
            "{} must be a boolean, got {}",
            var, raw
        ))),
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    #[test]
    fn test_pool_true_is_pooled() {
        let options = TransportOptions::from_value(json!({
            "host": "smtp.example.com",
            "port": 587,
            "pool": true,
            "maxConnections": 3,
            "auth": { "user": "u", "pass": "p" }
        }))
        .unwrap();

        let TransportOptions::Pooled(pooled) = options else {
            panic!("expected pooled options");
        };
        assert_eq!(pooled.smtp.host, "smtp.example.com");
        assert_eq!(pooled.max_connections, 3);
        assert_eq!(pooled.smtp.auth.unwrap().user, "u");
    }

    #[test]
    fn test_truthy_non_boolean_pool_is_single() {
        for pool in [json!(1), json!("true"), json!(0), json!(false), json!(null)] {
            let options =
                TransportOptions::from_value(json!({ "host": "smtp.example.com", "pool": pool }))
                    .unwrap();
            assert!(!options.is_pooled(), "pool={} should not be pooled", pool);
        }
    }

    #[test]
    fn test_missing_pool_is_single() {
        let options = TransportOptions::from_value(json!({ "host": "smtp.example.com" })).unwrap();
        assert!(!options.is_pooled());
        assert_eq!(options.smtp().effective_port(), 587);
    }

    #[test]
    fn test_defaults() {
        let options = TransportOptions::from_value(json!({ "secure": true })).unwrap();
        let smtp = options.smtp();
        assert_eq!(smtp.host, "localhost");
        assert_eq!(smtp.effective_port(), 465);
        assert!(smtp.tls.reject_unauthorized);
    }

    #[test]
    fn test_camel_case_keys() {
        let options = TransportOptions::from_value(json!({
            "host": "mail.local",
            "ignoreTLS": true,
            "connectionTimeout": 1500,
            "tls": { "rejectUnauthorized": false, "servername": "mx.local" },
            "unknownKey": "ignored"
        }))
        .unwrap();
        let smtp = options.smtp();
        assert!(smtp.ignore_tls);
        assert!(!smtp.tls.reject_unauthorized);
        assert_eq!(smtp.tls.servername.as_deref(), Some("mx.local"));
        assert_eq!(smtp.connection_timeout(), Some(Duration::from_millis(1500)));
    }

    #[test]
    fn test_malformed_port_fails() {
        let err = TransportOptions::from_value(json!({ "host": "smtp.example.com", "port": "abc" }))
            .unwrap_err();
        assert!(matches!(err, MailError::Configuration(_)));

        let err = TransportOptions::from_value(json!({ "port": 70000, "pool": true })).unwrap_err();
        assert!(matches!(err, MailError::Configuration(_)));
    }

    #[test]
    fn test_non_object_fails() {
        for value in [json!("smtp://localhost"), json!(42), json!(null), json!([1, 2])] {
            let err = TransportOptions::from_value(value).unwrap_err();
            assert!(err.to_string().contains("must be an object"));
        }
    }

    #[test]
    fn test_from_lookup() {
        let vars: HashMap<&str, &str> = [
            ("SMTP_HOST", "smtp.example.com"),
            ("SMTP_PORT", "2525"),
            ("SMTP_USERNAME", "user"),
            ("SMTP_PASSWORD", "secret"),
            ("SMTP_POOL", "true"),
        ]
        .into_iter()
        .collect();

        let options =
            TransportOptions::from_lookup(|key| vars.get(key).map(|v| v.to_string())).unwrap();
        assert!(options.is_pooled());
        assert_eq!(options.smtp().effective_port(), 2525);
        assert_eq!(
            options.smtp().auth,
            Some(AuthOptions {
                user: "user".into(),
                pass: "secret".into()
            })
        );
    }

    #[test]
    fn test_from_lookup_errors() {
        let err = TransportOptions::from_lookup(|_| None).unwrap_err();
        assert!(err.to_string().contains("SMTP_HOST"));

        let err = TransportOptions::from_lookup(|key| match key {
            "SMTP_HOST" => Some("localhost".into()),
            "SMTP_PORT" => Some("not-a-port".into()),
            _ => None,
        })
        .unwrap_err();
        assert!(err.to_string().contains("SMTP_PORT"));

        let err = TransportOptions::from_lookup(|key| match key {
            "SMTP_HOST" => Some("localhost".into()),
            "SMTP_POOL" => Some("maybe".into()),
            _ => None,
        })
        .unwrap_err();
        assert!(err.to_string().contains("SMTP_POOL"));
    }
}
