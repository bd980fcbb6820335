//! Fitness-tracker provider: daily trace data and body-log writes.

use async_trait::async_trait;

use crate::config::ClientConfig;
use crate::http_client::TokenedApiClient;
use crate::provider::ProviderProfile;
use crate::recovery::TokenedApi;
use crate::validation::{check_non_negative, parse_date, parse_time};
use crate::{BodyType, Credential, FetchRequest, HealthSyncError, TraceCategory};

/// Scopes requested by the interactive authorization flow.
pub const DEFAULT_SCOPES: &[&str] = &["activity", "heartrate", "nutrition", "sleep", "weight"];
pub const DEFAULT_REDIRECT_URI: &str = "http://localhost:8080";
/// Lifetime asked for on the consent page, in seconds (one week).
pub const DEFAULT_EXPIRES_IN: u64 = 604_800;

#[derive(Debug)]
pub struct FitbitClient {
    api: TokenedApiClient,
}

impl FitbitClient {
    pub fn new(config: &ClientConfig, credential: Credential) -> Result<Self, HealthSyncError> {
        let api = TokenedApiClient::new(
            ProviderProfile::fitbit(&config.fitbit_base_url, &config.fitbit_authorize_url),
            credential,
            config.timeout,
        )?;
        Ok(Self { api })
    }

    /// Access to the shared client, e.g. for the authorization-code flow.
    pub fn api_mut(&mut self) -> &mut TokenedApiClient {
        &mut self.api
    }

    /// One day of `activities`, `foods` or `sleep` data.
    pub async fn fetch_trace_data(
        &self,
        category: &str,
        date: &str,
    ) -> Result<serde_json::Value, HealthSyncError> {
        let category: TraceCategory = category.parse()?;
        let date = parse_date("date", date)?;
        let path = format!(
            "/1.2/user/-/{}/date/{}.json",
            category.api_path(),
            date.format("%Y-%m-%d")
        );
        self.api.get_json(&path, &[]).await
    }

    /// Log a weight (kg) or body-fat (%) value at `date` `time`.
    /// Returns the log entry echoed by the provider.
    pub async fn create_body_log(
        &self,
        body_type: &str,
        value: f64,
        date: &str,
        time: &str,
    ) -> Result<serde_json::Value, HealthSyncError> {
        let body_type: BodyType = body_type.parse()?;
        check_non_negative("value", value)?;
        parse_date("date", date)?;
        parse_time("time", time)?;

        let path = format!("/1/user/-/body/log/{}.json", body_type.as_str());
        let form = [
            (body_type.as_str(), value.to_string()),
            ("date", date.to_string()),
            ("time", time.to_string()),
        ];
        let entry = self.api.post_form(&path, &form).await?;
        tracing::info!(%body_type, value, date, time, "body log created");
        Ok(entry)
    }
}

#[async_trait]
impl TokenedApi for FitbitClient {
    fn section(&self) -> &'static str {
        self.api.profile().name
    }

    fn credential(&self) -> &Credential {
        self.api.credential()
    }

    async fn fetch(&self, request: &FetchRequest) -> Result<serde_json::Value, HealthSyncError> {
        match request {
            FetchRequest::Trace { category, date } => self.fetch_trace_data(category, date).await,
            FetchRequest::BodyComposition { .. } => Err(HealthSyncError::Validation(
                "fitbit serves trace data by category, not body composition ranges".into(),
            )),
        }
    }

    async fn refresh_access_token(&mut self) -> Result<Credential, HealthSyncError> {
        self.api.refresh_access_token().await
    }
}
