//! Body-scale provider: weight and body-fat readings.

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::config::ClientConfig;
use crate::http_client::TokenedApiClient;
use crate::provider::ProviderProfile;
use crate::recovery::TokenedApi;
use crate::validation::{check_body_composition_range, parse_date, today_in};
use crate::{BodyType, Credential, FetchRequest, HealthSyncError};

pub const WEIGHT_TAG: &str = "6021";
pub const FAT_TAG: &str = "6022";

/// One reading from the `data` array of an innerscan response.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct BodyCompositionRecord {
    /// Measurement time as `yyyyMMddHHmm`.
    pub date: String,
    pub keydata: String,
    #[serde(default)]
    pub model: String,
    pub tag: String,
}

impl BodyCompositionRecord {
    pub fn body_type(&self) -> BodyType {
        if self.tag == WEIGHT_TAG {
            BodyType::Weight
        } else {
            BodyType::Fat
        }
    }

    pub fn value(&self) -> Result<f64, HealthSyncError> {
        self.keydata.trim().parse::<f64>().map_err(|_| {
            HealthSyncError::Validation(format!("keydata {:?} is not a number", self.keydata))
        })
    }

    pub fn measured_at(&self) -> Result<NaiveDateTime, HealthSyncError> {
        NaiveDateTime::parse_from_str(&self.date, "%Y%m%d%H%M").map_err(|_| {
            HealthSyncError::Validation(format!("record date {:?} is not yyyyMMddHHmm", self.date))
        })
    }
}

/// Typed view of the `data` array of a body-composition payload.
pub fn records(payload: &serde_json::Value) -> Result<Vec<BodyCompositionRecord>, HealthSyncError> {
    let data = payload
        .get("data")
        .cloned()
        .unwrap_or(serde_json::Value::Array(Vec::new()));
    serde_json::from_value(data)
        .map_err(|e| HealthSyncError::Validation(format!("unexpected body composition data: {e}")))
}

#[derive(Debug)]
pub struct HealthPlanetClient {
    api: TokenedApiClient,
    timezone: Tz,
}

impl HealthPlanetClient {
    pub fn new(config: &ClientConfig, credential: Credential) -> Result<Self, HealthSyncError> {
        let api = TokenedApiClient::new(
            ProviderProfile::health_planet(&config.health_planet_base_url),
            credential,
            config.timeout,
        )?;
        Ok(Self {
            api,
            timezone: config.timezone,
        })
    }

    /// Weight and body-fat readings between `from` and `to`, both inclusive
    /// `YYYY-MM-DD` dates. The payload is returned as the provider sent it.
    ///
    /// An empty `data` array is reported as [`HealthSyncError::EmptyResult`].
    pub async fn fetch_body_composition(
        &self,
        from: &str,
        to: &str,
    ) -> Result<serde_json::Value, HealthSyncError> {
        let from_date = parse_date("from_date", from)?;
        let to_date = parse_date("to_date", to)?;
        check_body_composition_range(from_date, to_date, today_in(self.timezone))?;

        let from_param = range_bound(from_date, "000000");
        let to_param = range_bound(to_date, "235959");
        let query = [
            ("data", "1"),
            ("from", from_param.as_str()),
            ("to", to_param.as_str()),
            ("tag", "6021,6022"),
        ];
        let payload = self.api.get_json("/status/innerscan.json/", &query).await?;

        let is_empty = payload
            .get("data")
            .and_then(|d| d.as_array())
            .is_none_or(|d| d.is_empty());
        if is_empty {
            return Err(HealthSyncError::EmptyResult(format!(
                "no body composition data between {from} and {to}"
            )));
        }
        Ok(payload)
    }
}

fn range_bound(date: NaiveDate, time: &str) -> String {
    format!("{}{}", date.format("%Y%m%d"), time)
}

#[async_trait]
impl TokenedApi for HealthPlanetClient {
    fn section(&self) -> &'static str {
        self.api.profile().name
    }

    fn credential(&self) -> &Credential {
        self.api.credential()
    }

    async fn fetch(&self, request: &FetchRequest) -> Result<serde_json::Value, HealthSyncError> {
        match request {
            FetchRequest::BodyComposition { from, to } => {
                self.fetch_body_composition(from, to).await
            }
            FetchRequest::Trace { .. } => Err(HealthSyncError::Validation(
                "health_planet only serves body composition data".into(),
            )),
        }
    }

    async fn refresh_access_token(&mut self) -> Result<Credential, HealthSyncError> {
        self.api.refresh_access_token().await
    }
}
