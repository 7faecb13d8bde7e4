//! Email address type with optional display name.

use crate::error::MailError;
use email_address::EmailAddress;
use serde::{Deserialize, Serialize};
use std::fmt;

/// An email address with an optional display name.
///
/// ```
/// use mailbridge::Address;
///
/// let addr: Address = ("Alice", "alice@example.com").into();
/// assert_eq!(addr.formatted(), "Alice <alice@example.com>");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    /// Optional display name
    pub name: Option<String>,
    /// Email address
    pub email: String,
}

impl Address {
    /// Create an address with just an email.
    ///
    /// Logs a warning for obviously invalid input. Use [`Address::parse`]
    /// for strict validation.
    pub fn new(email: impl Into<String>) -> Self {
        let email = email.into();
        if !looks_like_email(&email) {
            tracing::warn!(email = %email, "Creating address with potentially invalid email");
        }
        Self { name: None, email }
    }

    /// Create an address with a display name.
    pub fn with_name(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::new(email)
        }
    }

    /// Parse and validate an email address.
    ///
    /// ```
    /// use mailbridge::Address;
    ///
    /// assert!(Address::parse("user@example.com").is_ok());
    /// assert!(Address::parse("not-an-email").is_err());
    /// ```
    pub fn parse(email: &str) -> Result<Self, MailError> {
        if !EmailAddress::is_valid(email) {
            return Err(MailError::InvalidAddress(format!(
                "'{}' is not a valid email address",
                email
            )));
        }
        Ok(Self {
            name: None,
            email: email.to_string(),
        })
    }

    /// Format as "Name <email>" or just "email" if no name.
    pub fn formatted(&self) -> String {
        match &self.name {
            Some(name) if !name.is_empty() => format!("{} <{}>", name, self.email),
            _ => self.email.clone(),
        }
    }
}

fn looks_like_email(email: &str) -> bool {
    !email.is_empty() && email.contains('@')
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.formatted())
    }
}

impl From<&str> for Address {
    fn from(email: &str) -> Self {
        Self::new(email)
    }
}

impl From<String> for Address {
    fn from(email: String) -> Self {
        Self::new(email)
    }
}

impl<N: Into<String>, E: Into<String>> From<(N, E)> for Address {
    fn from((name, email): (N, E)) -> Self {
        Self::with_name(name, email)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_str() {
        let addr: Address = "test@example.com".into();
        assert_eq!(addr.email, "test@example.com");
        assert_eq!(addr.name, None);
    }

    #[test]
    fn test_from_tuple() {
        let addr: Address = ("Alice", "alice@example.com").into();
        assert_eq!(addr.name.as_deref(), Some("Alice"));
    }

    #[test]
    fn test_formatted_empty_name() {
        let addr = Address::with_name("", "bob@example.com");
        assert_eq!(addr.formatted(), "bob@example.com");
        assert_eq!(addr.to_string(), "bob@example.com");
    }

    #[test]
    fn test_parse_rejects_invalid() {
        assert!(matches!(
            Address::parse("nope"),
            Err(MailError::InvalidAddress(_))
        ));
    }
}
