//! Per-provider parameters for [`TokenedApiClient`](crate::http_client::TokenedApiClient).

pub const HEALTH_PLANET: &str = "health_planet";
pub const FITBIT: &str = "fitbit";
pub const TWITTER: &str = "twitter";

pub const FITBIT_SCOPES: &[&str] = &[
    "activity",
    "cardio_fitness",
    "electrocardiogram",
    "heartrate",
    "location",
    "nutrition",
    "oxygen_saturation",
    "profile",
    "respiratory_rate",
    "settings",
    "sleep",
    "social",
    "temperature",
    "weight",
];

/// How the access token travels with each request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AuthScheme {
    /// `Authorization: Bearer <token>`
    Bearer,
    /// `?<name>=<token>`
    QueryParam(&'static str),
}

#[derive(Clone, Debug)]
pub struct ProviderProfile {
    /// Also the credential-store section for this provider.
    pub name: &'static str,
    pub base_url: String,
    pub auth_scheme: AuthScheme,
    /// Token endpoint path under `base_url`; `None` when the provider never
    /// refreshes.
    pub token_path: Option<&'static str>,
    pub authorize_url: Option<String>,
    pub scopes: &'static [&'static str],
}

impl ProviderProfile {
    pub fn health_planet(base_url: &str) -> Self {
        Self {
            name: HEALTH_PLANET,
            base_url: base_url.trim_end_matches('/').to_string(),
            auth_scheme: AuthScheme::QueryParam("access_token"),
            token_path: None,
            authorize_url: None,
            scopes: &[],
        }
    }

    pub fn fitbit(base_url: &str, authorize_url: &str) -> Self {
        Self {
            name: FITBIT,
            base_url: base_url.trim_end_matches('/').to_string(),
            auth_scheme: AuthScheme::Bearer,
            token_path: Some("/oauth2/token"),
            authorize_url: Some(authorize_url.to_string()),
            scopes: FITBIT_SCOPES,
        }
    }

    pub fn twitter(base_url: &str) -> Self {
        Self {
            name: TWITTER,
            base_url: base_url.trim_end_matches('/').to_string(),
            auth_scheme: AuthScheme::Bearer,
            token_path: None,
            authorize_url: None,
            scopes: &[],
        }
    }

    pub fn token_url(&self) -> Option<String> {
        self.token_path.map(|p| format!("{}{}", self.base_url, p))
    }
}
