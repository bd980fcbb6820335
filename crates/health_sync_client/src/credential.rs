//! OAuth credential held by one tokened client.

use secrecy::{ExposeSecret, SecretString};

pub(crate) fn secret(value: impl Into<String>) -> SecretString {
    SecretString::new(value.into().into_boxed_str())
}

/// Client registration plus the current token pair.
///
/// Secrets print as `[REDACTED]` through `Debug`.
#[derive(Clone, Debug)]
pub struct Credential {
    pub client_id: String,
    pub client_secret: SecretString,
    pub authorization_code: SecretString,
    pub access_token: SecretString,
    pub refresh_token: SecretString,
}

impl Credential {
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        access_token: impl Into<String>,
        refresh_token: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: secret(client_secret),
            authorization_code: secret(""),
            access_token: secret(access_token),
            refresh_token: secret(refresh_token),
        }
    }

    /// Credential carrying nothing but a bearer token.
    pub fn bearer(access_token: impl Into<String>) -> Self {
        Self::new("", "", access_token, "")
    }

    pub fn with_authorization_code(mut self, code: impl Into<String>) -> Self {
        self.authorization_code = secret(code);
        self
    }

    pub fn has_refresh_token(&self) -> bool {
        !self.refresh_token.expose_secret().is_empty()
    }
}

impl PartialEq for Credential {
    fn eq(&self, other: &Self) -> bool {
        self.client_id == other.client_id
            && self.client_secret.expose_secret() == other.client_secret.expose_secret()
            && self.authorization_code.expose_secret() == other.authorization_code.expose_secret()
            && self.access_token.expose_secret() == other.access_token.expose_secret()
            && self.refresh_token.expose_secret() == other.refresh_token.expose_secret()
    }
}

impl Eq for Credential {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_redacts_tokens() {
        let c = Credential::new("id", "shh", "access-123", "refresh-456");
        let dbg = format!("{c:?}");
        assert!(dbg.contains("id"));
        assert!(!dbg.contains("access-123"));
        assert!(!dbg.contains("refresh-456"));
        assert!(!dbg.contains("shh"));
    }

    #[test]
    fn equality_compares_secret_values() {
        let a = Credential::new("id", "s", "a", "r");
        let b = Credential::new("id", "s", "a", "r");
        assert_eq!(a, b);
        assert_ne!(a, b.clone().with_authorization_code("code"));
    }

    #[test]
    fn bearer_has_no_refresh_token() {
        assert!(!Credential::bearer("tok").has_refresh_token());
        assert!(Credential::new("i", "s", "a", "r").has_refresh_token());
    }
}
