//! Object storage targets for exported blobs.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};

use crate::error::{SyncError, SyncResult};
use crate::settings::GcsSettings;

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Whether uploaded files live somewhere other than the local data dir.
    fn is_remote(&self) -> bool;

    /// Store the file at `local` under the relative `key`.
    async fn upload(&self, local: &Path, key: &str) -> SyncResult<()>;
}

/// Keeps objects in a directory tree. When `root` is the data dir itself the
/// upload is a no-op.
#[derive(Clone, Debug)]
pub struct LocalObjectStore {
    root: PathBuf,
}

impl LocalObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    fn is_remote(&self) -> bool {
        false
    }

    async fn upload(&self, local: &Path, key: &str) -> SyncResult<()> {
        let dest = self.root.join(key);
        if dest == local {
            return Ok(());
        }
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::copy(local, &dest).await?;
        Ok(())
    }
}

/// Cloud Storage bucket, written through the JSON API media upload.
#[derive(Debug)]
pub struct GcsObjectStore {
    client: reqwest::Client,
    base_url: String,
    bucket: String,
    token: SecretString,
}

impl GcsObjectStore {
    pub fn new(settings: &GcsSettings, timeout: Duration) -> SyncResult<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            bucket: settings.bucket.clone(),
            token: settings.token.clone(),
        })
    }
}

fn content_type(key: &str) -> &'static str {
    match Path::new(key).extension().and_then(|e| e.to_str()) {
        Some("json") => "application/json",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        _ => "application/octet-stream",
    }
}

#[async_trait]
impl ObjectStore for GcsObjectStore {
    fn is_remote(&self) -> bool {
        true
    }

    async fn upload(&self, local: &Path, key: &str) -> SyncResult<()> {
        let bytes = tokio::fs::read(local).await?;
        let url = format!("{}/upload/storage/v1/b/{}/o", self.base_url, self.bucket);
        let resp = self
            .client
            .post(&url)
            .bearer_auth(self.token.expose_secret())
            .query(&[("uploadType", "media"), ("name", key)])
            .header(reqwest::header::CONTENT_TYPE, content_type(key))
            .body(bytes)
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let body: String = resp
                .text()
                .await
                .unwrap_or_default()
                .chars()
                .take(256)
                .collect();
            return Err(SyncError::Storage(format!(
                "upload of {key} to gs://{} failed with {status}: {body}",
                self.bucket
            )));
        }
        tracing::debug!(bucket = %self.bucket, key, "uploaded");
        Ok(())
    }
}
