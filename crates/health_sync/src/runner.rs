//! The daily export job.
//!
//! One run pulls a single day from every provider, writes each payload under
//! the data dir using its object key as relative path, and hands the file to
//! the object store. A failing step is logged and recorded in the
//! [`RunReport`]; the remaining steps still run.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use chrono_tz::Tz;
use health_sync_client::fitbit::FitbitClient;
use health_sync_client::health_planet::{HealthPlanetClient, records};
use health_sync_client::provider::{FITBIT, HEALTH_PLANET, TWITTER};
use health_sync_client::twitter::{TwitterClient, media_file_name};
use health_sync_client::validation::today_in;
use health_sync_client::{
    CredentialStore, FetchRequest, HealthSyncError, TraceCategory, call_with_recovery,
    fetch_with_recovery,
};
use tracing::{error, info, warn};

use crate::error::SyncResult;
use crate::settings::RunSettings;
use crate::storage::ObjectStore;

/// Provider clients used by one run.
#[derive(Debug)]
pub struct Clients {
    pub health_planet: HealthPlanetClient,
    pub fitbit: FitbitClient,
    pub twitter: Option<TwitterClient>,
}

impl Clients {
    /// Build every client from the credentials saved in `store`.
    /// The social client is only built when a user id is configured.
    pub fn from_store(settings: &RunSettings, store: &dyn CredentialStore) -> SyncResult<Self> {
        let health_planet = HealthPlanetClient::new(&settings.client, store.load(HEALTH_PLANET)?)?;
        let fitbit = FitbitClient::new(&settings.client, store.load(FITBIT)?)?;
        let twitter = match &settings.twitter {
            Some(tw) => Some(TwitterClient::new(
                &settings.client,
                store.load(TWITTER)?,
                tw.user_id.clone(),
                tw.hashtag.clone(),
            )?),
            None => None,
        };
        Ok(Self {
            health_planet,
            fitbit,
            twitter,
        })
    }
}

/// Outcome of one run.
#[derive(Debug, Default)]
pub struct RunReport {
    /// Object keys that were stored.
    pub written: Vec<String>,
    /// `step: error` for every step that failed.
    pub failures: Vec<String>,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    fn fail(&mut self, step: &str, err: impl std::fmt::Display) {
        error!(step, error = %err, "step failed");
        self.failures.push(format!("{step}: {err}"));
    }
}

pub struct Runner<'a> {
    clients: Clients,
    credentials: &'a dyn CredentialStore,
    objects: &'a dyn ObjectStore,
    data_dir: PathBuf,
    cross_post: bool,
}

impl<'a> Runner<'a> {
    pub fn new(
        settings: &RunSettings,
        clients: Clients,
        credentials: &'a dyn CredentialStore,
        objects: &'a dyn ObjectStore,
    ) -> Self {
        Self {
            clients,
            credentials,
            objects,
            data_dir: settings.data_dir.clone(),
            cross_post: settings.cross_post,
        }
    }

    pub fn clients(&self) -> &Clients {
        &self.clients
    }

    pub async fn run(&mut self, day: NaiveDate) -> RunReport {
        let day = day.format("%Y-%m-%d").to_string();
        let mut report = RunReport::default();
        info!(%day, "sync started");

        let body = self.export_body_composition(&day, &mut report).await;
        self.export_traces(&day, &mut report).await;
        match body {
            Some(payload) if self.cross_post => {
                self.cross_post_body_composition(&payload, &mut report).await
            }
            _ => {}
        }
        self.export_media(&day, &mut report).await;

        info!(
            %day,
            written = report.written.len(),
            failed = report.failures.len(),
            "sync finished"
        );
        report
    }

    async fn export_body_composition(
        &mut self,
        day: &str,
        report: &mut RunReport,
    ) -> Option<serde_json::Value> {
        let request = FetchRequest::body_composition(day, day);
        match fetch_with_recovery(&mut self.clients.health_planet, self.credentials, &request).await
        {
            Ok(payload) => {
                let key = format!("{HEALTH_PLANET}/{day}.json");
                self.store_json(&key, &payload, report).await;
                Some(payload)
            }
            Err(HealthSyncError::EmptyResult(msg)) => {
                warn!(%day, "{msg}; nothing to export");
                None
            }
            Err(e) => {
                report.fail(HEALTH_PLANET, e);
                None
            }
        }
    }

    async fn export_traces(&mut self, day: &str, report: &mut RunReport) {
        for category in TraceCategory::ALL {
            let request = FetchRequest::trace(category.as_str(), day);
            match fetch_with_recovery(&mut self.clients.fitbit, self.credentials, &request).await {
                Ok(payload) => {
                    let key = format!("{FITBIT}/{category}/{day}.json");
                    self.store_json(&key, &payload, report).await;
                }
                Err(e) => report.fail(&format!("{FITBIT}/{category}"), e),
            }
        }
    }

    /// Copy each body-scale reading into the tracker's body log.
    async fn cross_post_body_composition(
        &mut self,
        payload: &serde_json::Value,
        report: &mut RunReport,
    ) {
        let readings = match records(payload) {
            Ok(r) => r,
            Err(e) => return report.fail("cross_post", e),
        };
        for reading in readings {
            let (value, measured_at) = match (reading.value(), reading.measured_at()) {
                (Ok(v), Ok(at)) => (v, at),
                (Err(e), _) | (_, Err(e)) => {
                    report.fail("cross_post", e);
                    continue;
                }
            };
            let body_type = reading.body_type().as_str();
            let date = measured_at.format("%Y-%m-%d").to_string();
            let time = measured_at.format("%H:%M:00").to_string();
            let result = call_with_recovery(&mut self.clients.fitbit, self.credentials, |c| {
                let (date, time) = (date.clone(), time.clone());
                Box::pin(async move { c.create_body_log(body_type, value, &date, &time).await })
            })
            .await;
            if let Err(e) = result {
                report.fail("cross_post", e);
            }
        }
    }

    async fn export_media(&self, day: &str, report: &mut RunReport) {
        let Some(twitter) = &self.clients.twitter else {
            return;
        };
        let urls = match twitter.search_tagged_media(day).await {
            Ok(urls) => urls,
            Err(e) => return report.fail(TWITTER, e),
        };
        for url in urls {
            let key = format!("ring_fit_adventure/{day}_{}", media_file_name(&url));
            let local = self.data_dir.join(&key);
            match twitter.download_media(&url, &local).await {
                Ok(bytes) => {
                    info!(%key, bytes, "media downloaded");
                    self.store_file(&local, &key, report).await;
                }
                Err(e) => report.fail(TWITTER, e),
            }
        }
    }

    async fn store_json(&self, key: &str, payload: &serde_json::Value, report: &mut RunReport) {
        match persist_json(&self.data_dir, key, payload).await {
            Ok(local) => self.store_file(&local, key, report).await,
            Err(e) => report.fail(key, e),
        }
    }

    async fn store_file(&self, local: &Path, key: &str, report: &mut RunReport) {
        match publish(self.objects, local, key).await {
            Ok(()) => {
                info!(%key, "stored");
                report.written.push(key.to_string());
            }
            Err(e) => report.fail(key, e),
        }
    }
}

/// Write `payload` to `data_dir/key`, creating parent directories.
pub async fn persist_json(
    data_dir: &Path,
    key: &str,
    payload: &serde_json::Value,
) -> SyncResult<PathBuf> {
    let path = data_dir.join(key);
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(&path, serde_json::to_vec_pretty(payload)?).await?;
    Ok(path)
}

/// Upload `local` under `key`, dropping the local copy once a remote store
/// holds it.
pub async fn publish(objects: &dyn ObjectStore, local: &Path, key: &str) -> SyncResult<()> {
    objects.upload(local, key).await?;
    if objects.is_remote() {
        tokio::fs::remove_file(local).await?;
    }
    Ok(())
}

pub fn yesterday(tz: Tz) -> NaiveDate {
    let today = today_in(tz);
    today.pred_opt().unwrap_or(today)
}
