//! Social provider: images attached to the account's own tagged posts.

use std::path::Path;

use chrono::{TimeZone, Utc};
use chrono_tz::Tz;
use futures_util::{Stream, StreamExt};
use serde::Deserialize;
use tokio::io::AsyncWriteExt;

use crate::config::ClientConfig;
use crate::http_client::{TokenedApiClient, error_from_response};
use crate::provider::ProviderProfile;
use crate::validation::{check_recent_search_start, parse_date};
use crate::{Credential, HealthSyncError};

pub const DEFAULT_HASHTAG: &str = "RingFitAdventure";

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    includes: Option<Includes>,
}

#[derive(Deserialize)]
struct Includes {
    #[serde(default)]
    media: Vec<Media>,
}

#[derive(Deserialize)]
struct Media {
    #[serde(default)]
    url: Option<String>,
}

#[derive(Debug)]
pub struct TwitterClient {
    api: TokenedApiClient,
    user_id: String,
    hashtag: String,
    timezone: Tz,
}

impl TwitterClient {
    pub fn new(
        config: &ClientConfig,
        credential: Credential,
        user_id: impl Into<String>,
        hashtag: impl Into<String>,
    ) -> Result<Self, HealthSyncError> {
        let api = TokenedApiClient::new(
            ProviderProfile::twitter(&config.twitter_base_url),
            credential,
            config.timeout,
        )?;
        Ok(Self {
            api,
            user_id: user_id.into(),
            hashtag: hashtag.into().trim_start_matches('#').to_string(),
            timezone: config.timezone,
        })
    }

    /// URLs of the images attached to posts by the configured user carrying
    /// the configured hashtag, posted since midnight of `start_date`.
    pub async fn search_tagged_media(&self, start_date: &str) -> Result<Vec<String>, HealthSyncError> {
        let start = parse_date("start_date", start_date)?;

        let local_midnight = self
            .timezone
            .from_local_datetime(&start.and_hms_opt(0, 0, 0).unwrap_or_default())
            .earliest()
            .ok_or_else(|| {
                HealthSyncError::Validation(format!("{start_date} has no local midnight"))
            })?
            .with_timezone(&Utc);
        check_recent_search_start(local_midnight, Utc::now())?;
        let start_time = local_midnight.format("%Y-%m-%dT%H:%M:%SZ").to_string();
        let query = format!("from:{} #{}", self.user_id, self.hashtag);
        let params = [
            ("query", query.as_str()),
            ("expansions", "attachments.media_keys"),
            ("media.fields", "url"),
            ("start_time", start_time.as_str()),
        ];
        let payload = self.api.get_json("/2/tweets/search/recent", &params).await?;
        let parsed: SearchResponse = serde_json::from_value(payload).map_err(|e| {
            HealthSyncError::Validation(format!("unexpected search response: {e}"))
        })?;
        let urls: Vec<String> = parsed
            .includes
            .map(|i| i.media.into_iter().filter_map(|m| m.url).collect())
            .unwrap_or_default();
        if urls.is_empty() {
            tracing::info!(start_date, "no tagged media found");
        }
        Ok(urls)
    }

    /// Stream the file at `url` into `dest`, returning the bytes written.
    pub async fn download_media(&self, url: &str, dest: &Path) -> Result<u64, HealthSyncError> {
        let resp = self.api.http().get(url).send().await?;
        if !resp.status().is_success() {
            return Err(error_from_response(resp).await);
        }
        write_stream(resp.bytes_stream(), dest).await
    }
}

/// Write every chunk of `stream` to `dest`. A failed write or a broken
/// stream removes `dest` so no truncated file is left behind.
async fn write_stream<S, B, E>(mut stream: S, dest: &Path) -> Result<u64, HealthSyncError>
where
    S: Stream<Item = Result<B, E>> + Unpin,
    B: AsRef<[u8]>,
    HealthSyncError: From<E>,
{
    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let mut file = tokio::fs::File::create(dest).await?;
    let result = async {
        let mut written = 0u64;
        while let Some(chunk) = stream.next().await {
            let bytes = chunk?;
            file.write_all(bytes.as_ref()).await?;
            written += bytes.as_ref().len() as u64;
        }
        file.sync_all().await?;
        Ok::<u64, HealthSyncError>(written)
    }
    .await;
    if result.is_err() {
        drop(file);
        if let Err(e) = tokio::fs::remove_file(dest).await {
            tracing::warn!(dest = %dest.display(), "could not remove partial download: {e}");
        }
    }
    result
}

/// Last path segment of a media URL, used as its file name.
pub fn media_file_name(url: &str) -> String {
    let without_query = url.split(['?', '#']).next().unwrap_or(url);
    without_query
        .rsplit('/')
        .find(|s| !s.is_empty())
        .unwrap_or("media")
        .to_string()
}
