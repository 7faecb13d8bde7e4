//! Error types for mailbridge.

use thiserror::Error;

/// Errors raised by a mail transport or while building one.
#[derive(Debug, Clone, Error)]
pub enum MailError {
    /// Configuration error (non-object options, malformed field, bad env var, etc.)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Missing required field (e.g., from address).
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    /// Invalid email address format.
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    /// Error building the email message.
    #[error("Build error: {0}")]
    BuildError(String),

    /// Error sending the email.
    #[error("Send error: {0}")]
    SendError(String),

    /// The transport was closed and can no longer send.
    #[error("Transport is closed")]
    Closed,

    /// Error releasing the transport's connections.
    #[error("Close error: {0}")]
    CloseError(String),
}

#[cfg(feature = "smtp")]
impl From<lettre::error::Error> for MailError {
    fn from(err: lettre::error::Error) -> Self {
        Self::BuildError(err.to_string())
    }
}

#[cfg(feature = "smtp")]
impl From<lettre::transport::smtp::Error> for MailError {
    fn from(err: lettre::transport::smtp::Error) -> Self {
        Self::SendError(err.to_string())
    }
}

#[cfg(feature = "smtp")]
impl From<lettre::address::AddressError> for MailError {
    fn from(err: lettre::address::AddressError) -> Self {
        Self::InvalidAddress(err.to_string())
    }
}

/// Errors raised while registering a plugin with an [`App`](crate::App)
/// or while running the app's shutdown hooks.
#[derive(Debug, Clone, Error)]
pub enum PluginError {
    /// The transport factory rejected the options.
    #[error("Failed to create transport: {0}")]
    Construction(#[source] MailError),

    /// The host already carries a capability under this name.
    #[error("The decorator '{name}' has already been added")]
    DecorationConflict { name: String },

    /// The host version does not satisfy the plugin's requirement.
    #[error("Plugin {plugin} requires host version {required}, found {found}")]
    IncompatibleHost {
        plugin: &'static str,
        required: String,
        found: String,
    },

    /// A plugin with the same name was already registered.
    #[error("Plugin {name} is already registered")]
    DuplicatePlugin { name: &'static str },

    /// Invalid plugin metadata (e.g., unparsable version requirement).
    #[error("Invalid plugin metadata: {0}")]
    InvalidMeta(String),

    /// A shutdown hook failed to release its resource.
    #[error("Shutdown hook failed: {0}")]
    Close(#[source] MailError),

    /// The host has already been closed.
    #[error("Host is closed")]
    HostClosed,
}

impl From<semver::Error> for PluginError {
    fn from(err: semver::Error) -> Self {
        Self::InvalidMeta(err.to_string())
    }
}

impl From<MailError> for PluginError {
    fn from(err: MailError) -> Self {
        Self::Construction(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_construction_wraps_source() {
        let err: PluginError = MailError::Configuration("options must be an object".into()).into();
        assert!(matches!(err, PluginError::Construction(_)));
        assert_eq!(
            err.to_string(),
            "Failed to create transport: Configuration error: options must be an object"
        );
    }

    #[test]
    fn test_decoration_conflict_message() {
        let err = PluginError::DecorationConflict {
            name: "nodemailer".into(),
        };
        assert_eq!(
            err.to_string(),
            "The decorator 'nodemailer' has already been added"
        );
    }

    #[test]
    fn test_semver_error_is_invalid_meta() {
        let err: PluginError = semver::VersionReq::parse("not a req").unwrap_err().into();
        assert!(matches!(err, PluginError::InvalidMeta(_)));
    }
}
