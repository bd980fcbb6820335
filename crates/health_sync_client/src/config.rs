use std::time::Duration;

use chrono_tz::Tz;

use crate::HealthSyncError;

pub const DEFAULT_HEALTH_PLANET_BASE_URL: &str = "https://www.healthplanet.jp";
pub const DEFAULT_FITBIT_BASE_URL: &str = "https://api.fitbit.com";
pub const DEFAULT_FITBIT_AUTHORIZE_URL: &str = "https://www.fitbit.com/oauth2/authorize";
pub const DEFAULT_TWITTER_BASE_URL: &str = "https://api.twitter.com";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Clone, Debug)]
pub struct ClientConfig {
    pub health_planet_base_url: String,
    pub fitbit_base_url: String,
    pub fitbit_authorize_url: String,
    pub twitter_base_url: String,
    /// Zone used to decide what "today" and "yesterday" mean.
    pub timezone: Tz,
    pub timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            health_planet_base_url: DEFAULT_HEALTH_PLANET_BASE_URL.into(),
            fitbit_base_url: DEFAULT_FITBIT_BASE_URL.into(),
            fitbit_authorize_url: DEFAULT_FITBIT_AUTHORIZE_URL.into(),
            twitter_base_url: DEFAULT_TWITTER_BASE_URL.into(),
            timezone: chrono_tz::Asia::Tokyo,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> Result<Self, HealthSyncError> {
        Self::from_env_with(|k| std::env::var(k).ok())
    }

    /// Same as [`ClientConfig::from_env`] but reads values through `get`, so
    /// tests never touch the process environment.
    pub fn from_env_with<F>(mut get: F) -> Result<Self, HealthSyncError>
    where
        F: FnMut(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let timezone = match get("HEALTH_SYNC_TIMEZONE") {
            Some(name) => name.parse::<Tz>().map_err(|_| {
                HealthSyncError::Config(format!("HEALTH_SYNC_TIMEZONE: unknown zone {name}"))
            })?,
            None => defaults.timezone,
        };
        let timeout = match get("HEALTH_SYNC_HTTP_TIMEOUT_SECS") {
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .ok()
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs)
                .ok_or_else(|| {
                    HealthSyncError::Config(format!(
                        "HEALTH_SYNC_HTTP_TIMEOUT_SECS must be a positive integer, got {raw}"
                    ))
                })?,
            None => defaults.timeout,
        };
        Ok(Self {
            health_planet_base_url: get("HEALTH_PLANET_BASE_URL")
                .unwrap_or(defaults.health_planet_base_url),
            fitbit_base_url: get("FITBIT_API_BASE_URL").unwrap_or(defaults.fitbit_base_url),
            fitbit_authorize_url: get("FITBIT_AUTHORIZE_URL")
                .unwrap_or(defaults.fitbit_authorize_url),
            twitter_base_url: get("TWITTER_BASE_URL").unwrap_or(defaults.twitter_base_url),
            timezone,
            timeout,
        })
    }

    /// Point every provider at one base URL. Handy against a mock server.
    pub fn with_base_url(base_url: &str) -> Self {
        Self {
            health_planet_base_url: base_url.into(),
            fitbit_base_url: base_url.into(),
            fitbit_authorize_url: format!("{}/oauth2/authorize", base_url.trim_end_matches('/')),
            twitter_base_url: base_url.into(),
            ..Self::default()
        }
    }
}
