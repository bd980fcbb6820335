use std::path::PathBuf;

use health_sync_client::config::ClientConfig;
use health_sync_client::twitter::DEFAULT_HASHTAG;
use secrecy::SecretString;

use crate::error::{SyncError, SyncResult};

pub const DEFAULT_GCS_BASE_URL: &str = "https://storage.googleapis.com";

#[derive(Clone, Debug)]
pub struct GcsSettings {
    pub bucket: String,
    pub token: SecretString,
    pub base_url: String,
}

#[derive(Clone, Debug)]
pub struct TwitterSettings {
    pub user_id: String,
    pub hashtag: String,
}

/// Everything one run needs besides credentials.
#[derive(Clone, Debug)]
pub struct RunSettings {
    pub client: ClientConfig,
    pub credentials_path: PathBuf,
    pub data_dir: PathBuf,
    /// `None` keeps every blob in `data_dir` only.
    pub gcs: Option<GcsSettings>,
    /// Copy body-composition readings into the fitness tracker's body log.
    pub cross_post: bool,
    /// `None` skips the social-media step.
    pub twitter: Option<TwitterSettings>,
}

impl RunSettings {
    pub fn from_env() -> SyncResult<Self> {
        Self::from_env_with(|k| std::env::var(k).ok())
    }

    /// Testable helper that reads configuration values using the provided
    /// function instead of the process environment.
    pub fn from_env_with<F>(mut get: F) -> SyncResult<Self>
    where
        F: FnMut(&str) -> Option<String>,
    {
        let client = ClientConfig::from_env_with(&mut get)?;
        let credentials_path = get("HEALTH_SYNC_CREDENTIALS")
            .unwrap_or_else(|| "credentials.toml".into())
            .into();
        let data_dir = get("HEALTH_SYNC_DATA_DIR")
            .unwrap_or_else(|| "data".into())
            .into();

        let gcs = match get("HEALTH_SYNC_GCS_BUCKET").filter(|b| !b.is_empty()) {
            Some(bucket) => {
                let token = get("HEALTH_SYNC_GCS_TOKEN").ok_or_else(|| {
                    SyncError::Config(
                        "HEALTH_SYNC_GCS_TOKEN missing while HEALTH_SYNC_GCS_BUCKET is set".into(),
                    )
                })?;
                Some(GcsSettings {
                    bucket,
                    token: SecretString::new(token.into()),
                    base_url: get("HEALTH_SYNC_GCS_BASE_URL")
                        .unwrap_or_else(|| DEFAULT_GCS_BASE_URL.into()),
                })
            }
            None => None,
        };

        let cross_post = match get("HEALTH_SYNC_CROSS_POST") {
            Some(raw) => parse_flag(&raw).ok_or_else(|| {
                SyncError::Config(format!("HEALTH_SYNC_CROSS_POST must be true or false, got {raw}"))
            })?,
            None => false,
        };

        let twitter = get("TWITTER_USER_ID")
            .filter(|id| !id.is_empty())
            .map(|user_id| TwitterSettings {
                user_id,
                hashtag: get("TWITTER_HASHTAG").unwrap_or_else(|| DEFAULT_HASHTAG.into()),
            });

        Ok(Self {
            client,
            credentials_path,
            data_dir,
            gcs,
            cross_post,
            twitter,
        })
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}
