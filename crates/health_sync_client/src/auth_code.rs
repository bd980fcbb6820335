//! Sources for the one-time OAuth authorization code.

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use url::Url;

use crate::HealthSyncError;

/// Produces the authorization code the user obtains from the consent page.
#[async_trait]
pub trait AuthorizationCodeProvider: Send + Sync {
    async fn authorization_code(&self, authorize_url: &Url) -> Result<String, HealthSyncError>;
}

/// Opens the consent page in a browser and reads the pasted code from stdin.
#[derive(Clone, Copy, Debug, Default)]
pub struct ConsoleAuthorizationCodeProvider;

#[async_trait]
impl AuthorizationCodeProvider for ConsoleAuthorizationCodeProvider {
    async fn authorization_code(&self, authorize_url: &Url) -> Result<String, HealthSyncError> {
        if let Err(e) = open::that(authorize_url.as_str()) {
            tracing::warn!("could not open a browser: {e}");
        }
        let mut stderr = tokio::io::stderr();
        stderr
            .write_all(
                format!(
                    "Open this URL and approve access:\n  {authorize_url}\n\
                     Enter authorization code (excluding \"#_=_\"): "
                )
                .as_bytes(),
            )
            .await?;
        stderr.flush().await?;

        let mut line = String::new();
        BufReader::new(tokio::io::stdin())
            .read_line(&mut line)
            .await?;
        Ok(line.trim().to_string())
    }
}

/// Hands out a code known in advance (headless runs, tests).
#[derive(Clone, Debug)]
pub struct StaticAuthorizationCodeProvider {
    code: String,
}

impl StaticAuthorizationCodeProvider {
    pub fn new(code: impl Into<String>) -> Self {
        Self { code: code.into() }
    }
}

#[async_trait]
impl AuthorizationCodeProvider for StaticAuthorizationCodeProvider {
    async fn authorization_code(&self, _authorize_url: &Url) -> Result<String, HealthSyncError> {
        Ok(self.code.clone())
    }
}

/// The provider appends `#_=_` to the redirect; users tend to paste it along.
pub fn clean_pasted_code(raw: &str) -> Result<String, HealthSyncError> {
    let code = raw.trim();
    let code = code.strip_suffix("#_=_").unwrap_or(code);
    if code.is_empty() {
        return Err(HealthSyncError::Validation(
            "authorization code must not be empty".into(),
        ));
    }
    Ok(code.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_pasted_code_strips_fragment() {
        assert_eq!(clean_pasted_code(" abc123#_=_\n").unwrap(), "abc123");
        assert_eq!(clean_pasted_code("abc123").unwrap(), "abc123");
    }

    #[test]
    fn clean_pasted_code_rejects_empty() {
        assert!(clean_pasted_code("#_=_").is_err());
        assert!(clean_pasted_code("   ").is_err());
    }

    #[tokio::test]
    async fn static_provider_returns_code() {
        let url = Url::parse("https://example.com/authorize").unwrap();
        let p = StaticAuthorizationCodeProvider::new("xyz");
        assert_eq!(p.authorization_code(&url).await.unwrap(), "xyz");
    }
}
