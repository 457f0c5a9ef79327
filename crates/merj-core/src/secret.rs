use std::fmt;

use serde::Deserialize;

/// Credential wrapper that never prints its value.
#[derive(Clone, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secret_expose_returns_inner() {
        let secret = Secret::new("pa-123");
        assert_eq!(secret.expose(), "pa-123");
    }

    #[test]
    fn secret_debug_and_display_are_redacted() {
        let secret = Secret::new("pa-123");
        assert_eq!(format!("{secret:?}"), "[REDACTED]");
        assert_eq!(format!("{secret}"), "[REDACTED]");
    }

    #[test]
    fn secret_deserializes_from_string() {
        let secret: Secret = serde_json::from_str("\"pa-xyz\"").unwrap();
        assert_eq!(secret.expose(), "pa-xyz");
    }
}
