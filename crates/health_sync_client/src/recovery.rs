//! Refresh-once-and-retry for calls rejected with an expired token.
//!
//! ```text
//! Idle -> Fetching -> Success
//!                  -> AuthFailed -> Refreshing -> RefreshedRetry -> (final result)
//!                                              -> RefreshFailed  (terminal)
//! ```
//!
//! A call is repeated at most once, and only after a successful refresh has
//! been persisted. A second authorization failure is returned as is.

use async_trait::async_trait;
use futures_util::future::BoxFuture;

use crate::store::CredentialStore;
use crate::{Credential, FetchRequest, HealthSyncError};

/// A provider client whose access token can be refreshed.
#[async_trait]
pub trait TokenedApi: Send + Sync {
    /// Credential-store section owning this client's credential.
    fn section(&self) -> &'static str;

    fn credential(&self) -> &Credential;

    async fn fetch(&self, request: &FetchRequest) -> Result<serde_json::Value, HealthSyncError>;

    async fn refresh_access_token(&mut self) -> Result<Credential, HealthSyncError>;
}

/// Run `op`; if it fails with [`HealthSyncError::Auth`], refresh the token,
/// persist the new credential and run `op` exactly once more.
pub async fn call_with_recovery<C, T, F>(
    client: &mut C,
    store: &dyn CredentialStore,
    mut op: F,
) -> Result<T, HealthSyncError>
where
    C: TokenedApi + ?Sized,
    F: for<'a> FnMut(&'a C) -> BoxFuture<'a, Result<T, HealthSyncError>>,
{
    match op(client).await {
        Err(HealthSyncError::Auth(reason)) => {
            let section = client.section();
            tracing::warn!(section, %reason, "access token rejected, refreshing");
            let credential = client
                .refresh_access_token()
                .await
                .inspect_err(|e| {
                    tracing::error!(section, "token refresh failed, manual re-authorization needed: {e}");
                })
                .map_err(|e| match e {
                    HealthSyncError::Auth(msg) => {
                        HealthSyncError::Auth(format!("{msg} (request rejected with: {reason})"))
                    }
                    other => other,
                })?;
            store.save(section, &credential)?;
            op(client).await
        }
        other => other,
    }
}

/// [`TokenedApi::fetch`] under the refresh-once policy.
pub async fn fetch_with_recovery<C>(
    client: &mut C,
    store: &dyn CredentialStore,
    request: &FetchRequest,
) -> Result<serde_json::Value, HealthSyncError>
where
    C: TokenedApi + ?Sized,
{
    call_with_recovery(client, store, |c| {
        let request = request.clone();
        Box::pin(async move { c.fetch(&request).await })
    })
    .await
}
