//! Secret values for step inputs
//!
//! API tokens are wrapped in [`Secret`] so they never end up in logs. Both
//! `Debug` and `Display` print a redaction marker; the cleartext is only
//! reachable through [`Secret::expose`], which the environment overlay uses
//! to hand the token to child processes.

use std::fmt;

const REDACTED: &str = "[REDACTED]";

/// A string that must not be logged in cleartext
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    /// Wrap a value, trimming surrounding whitespace
    pub fn new(value: impl Into<String>) -> Self {
        let value = value.into();
        Self(value.trim().to_string())
    }

    /// Whether the secret is unset
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Access the cleartext value
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Secret {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Secret {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            f.write_str("Secret(\"\")")
        } else {
            write!(f, "Secret({})", REDACTED)
        }
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            Ok(())
        } else {
            f.write_str(REDACTED)
        }
    }
}
