//! HTTP plumbing shared by every provider.
//!
//! [`TokenedApiClient`] owns one [`Credential`] and one `reqwest::Client`, and
//! knows how to attach the access token, map failed responses onto
//! [`HealthSyncError`], refresh the token pair and run the authorization-code
//! exchange. Provider modules only add paths and input validation on top.

use std::time::Duration;

use secrecy::ExposeSecret;
use serde::Deserialize;
use url::Url;

use crate::auth_code::{AuthorizationCodeProvider, clean_pasted_code};
use crate::credential::secret;
use crate::provider::{AuthScheme, ProviderProfile};
use crate::validation::{check_scope, parse_redirect_uri};
use crate::{Credential, HealthSyncError};

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
}

#[derive(Debug)]
pub struct TokenedApiClient {
    profile: ProviderProfile,
    credential: Credential,
    client: reqwest::Client,
}

impl TokenedApiClient {
    /// Create a client for `profile`. `timeout` bounds every request.
    pub fn new(
        profile: ProviderProfile,
        credential: Credential,
        timeout: Duration,
    ) -> Result<Self, HealthSyncError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            profile,
            credential,
            client,
        })
    }

    pub fn profile(&self) -> &ProviderProfile {
        &self.profile
    }

    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    /// The underlying client, for unauthenticated requests such as media
    /// downloads from a CDN.
    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.client
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.profile.base_url, path)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let token = self.credential.access_token.expose_secret();
        match self.profile.auth_scheme {
            AuthScheme::Bearer => request.bearer_auth(token),
            AuthScheme::QueryParam(name) => request.query(&[(name, token)]),
        }
    }

    /// Build an authenticated GET request.
    fn get_request(&self, path: &str) -> reqwest::RequestBuilder {
        self.authorize(self.client.get(self.url(path)))
    }

    /// Build an authenticated POST request.
    fn post_request(&self, path: &str) -> reqwest::RequestBuilder {
        self.authorize(self.client.post(self.url(path)))
    }

    pub async fn get_json(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<serde_json::Value, HealthSyncError> {
        tracing::debug!(provider = self.profile.name, path, "GET");
        self.execute_json(self.get_request(path).query(query)).await
    }

    pub async fn post_form(
        &self,
        path: &str,
        form: &[(&str, String)],
    ) -> Result<serde_json::Value, HealthSyncError> {
        tracing::debug!(provider = self.profile.name, path, "POST");
        self.execute_json(self.post_request(path).form(form)).await
    }

    /// Execute a request and expect a JSON response.
    async fn execute_json<T: serde::de::DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, HealthSyncError> {
        let resp = request.send().await?;
        handle_response(resp).await
    }

    /// Exchange the stored refresh token for a new token pair.
    ///
    /// On success the access token is replaced, and the refresh token too when
    /// the provider rotates it. On failure the credential is left untouched.
    pub async fn refresh_access_token(&mut self) -> Result<Credential, HealthSyncError> {
        let Some(token_url) = self.profile.token_url() else {
            return Err(HealthSyncError::Auth(format!(
                "{} does not support token refresh; re-authorize",
                self.profile.name
            )));
        };
        if !self.credential.has_refresh_token() {
            return Err(HealthSyncError::Auth(format!(
                "no refresh token stored for {}; re-authorize",
                self.profile.name
            )));
        }
        let form = [
            ("grant_type", "refresh_token".to_string()),
            (
                "refresh_token",
                self.credential.refresh_token.expose_secret().to_string(),
            ),
        ];
        let tokens = self.request_tokens(&token_url, &form).await?;
        self.store_tokens(tokens);
        tracing::info!(provider = self.profile.name, "access token refreshed");
        Ok(self.credential.clone())
    }

    /// Consent page URL for the interactive authorization-code flow.
    pub fn authorization_url(
        &self,
        scope: &[&str],
        redirect_uri: &str,
        expires_in: u64,
    ) -> Result<Url, HealthSyncError> {
        let base = self.profile.authorize_url.as_deref().ok_or_else(|| {
            HealthSyncError::Config(format!(
                "{} has no authorization endpoint",
                self.profile.name
            ))
        })?;
        check_scope(scope, self.profile.scopes)?;
        parse_redirect_uri(redirect_uri)?;
        if expires_in == 0 {
            return Err(HealthSyncError::Validation(
                r#""expires_in" must be greater than 0."#.into(),
            ));
        }
        let mut url = Url::parse(base)
            .map_err(|e| HealthSyncError::Config(format!("authorize url {base}: {e}")))?;
        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", &self.credential.client_id)
            .append_pair("redirect_uri", redirect_uri)
            .append_pair("scope", &scope.join(" "))
            .append_pair("expires_in", &expires_in.to_string());
        // Form encoding turns spaces into `+`; the consent page expects `%20`.
        // A literal `+` is already escaped as `%2B`, so every `+` left is a space.
        let query = url.query().map(|q| q.replace('+', "%20"));
        url.set_query(query.as_deref());
        Ok(url)
    }

    /// Obtain a fresh authorization code through `provider` and keep it in the
    /// credential for [`exchange_authorization_code`](Self::exchange_authorization_code).
    pub async fn fetch_authorization_code(
        &mut self,
        scope: &[&str],
        redirect_uri: &str,
        expires_in: u64,
        provider: &dyn AuthorizationCodeProvider,
    ) -> Result<String, HealthSyncError> {
        let url = self.authorization_url(scope, redirect_uri, expires_in)?;
        let raw = provider.authorization_code(&url).await?;
        let code = clean_pasted_code(&raw)?;
        self.credential.authorization_code = secret(code.clone());
        Ok(code)
    }

    /// Trade the stored authorization code for the first token pair.
    pub async fn exchange_authorization_code(
        &mut self,
        redirect_uri: &str,
    ) -> Result<Credential, HealthSyncError> {
        let token_url = self.profile.token_url().ok_or_else(|| {
            HealthSyncError::Config(format!("{} has no token endpoint", self.profile.name))
        })?;
        parse_redirect_uri(redirect_uri)?;
        let code = self.credential.authorization_code.expose_secret().to_string();
        if code.is_empty() {
            return Err(HealthSyncError::Validation(
                "no authorization code stored; fetch one first".into(),
            ));
        }
        let form = [
            ("clientId", self.credential.client_id.clone()),
            ("grant_type", "authorization_code".to_string()),
            ("redirect_uri", redirect_uri.to_string()),
            ("code", code),
        ];
        let tokens = self.request_tokens(&token_url, &form).await.map_err(|e| match e {
            HealthSyncError::Auth(body) => HealthSyncError::Auth(format!(
                "authorization code rejected, it may have expired: {body}"
            )),
            other => other,
        })?;
        self.store_tokens(tokens);
        tracing::info!(provider = self.profile.name, "authorization code exchanged");
        Ok(self.credential.clone())
    }

    async fn request_tokens(
        &self,
        token_url: &str,
        form: &[(&str, String)],
    ) -> Result<TokenResponse, HealthSyncError> {
        let resp = self
            .client
            .post(token_url)
            .basic_auth(
                &self.credential.client_id,
                Some(self.credential.client_secret.expose_secret()),
            )
            .form(form)
            .send()
            .await?;
        let status = resp.status().as_u16();
        if status == 400 {
            // A dead refresh token or code comes back as 400 invalid_grant.
            let body = resp.text().await.unwrap_or_default();
            if body.contains("invalid_grant") {
                return Err(HealthSyncError::Auth(snippet(&body)));
            }
            return Err(HealthSyncError::Status {
                status,
                body: snippet(&body),
            });
        }
        handle_response(resp).await
    }

    fn store_tokens(&mut self, tokens: TokenResponse) {
        self.credential.access_token = secret(tokens.access_token);
        if let Some(refresh) = tokens.refresh_token.filter(|r| !r.is_empty()) {
            self.credential.refresh_token = secret(refresh);
        }
    }
}

/// Handle a response, converting status codes to appropriate errors.
pub(crate) async fn handle_response<T: serde::de::DeserializeOwned>(
    resp: reqwest::Response,
) -> Result<T, HealthSyncError> {
    if !resp.status().is_success() {
        return Err(error_from_response(resp).await);
    }
    Ok(resp.json::<T>().await?)
}

/// Extract error information from a failed response.
pub(crate) async fn error_from_response(resp: reqwest::Response) -> HealthSyncError {
    let status = resp.status().as_u16();
    let body = snippet(&resp.text().await.unwrap_or_default());
    match status {
        401 => HealthSyncError::Auth(body),
        _ => HealthSyncError::Status { status, body },
    }
}

fn snippet(body: &str) -> String {
    body.chars().take(256).collect()
}
