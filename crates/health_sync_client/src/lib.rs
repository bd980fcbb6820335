//! Token-authenticated clients for the body-scale, fitness-tracker and
//! social APIs, plus the credential store they refresh into.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

pub mod auth_code;
pub mod config;
pub mod credential;
pub mod fitbit;
pub mod health_planet;
pub mod http_client;
pub mod provider;
pub mod recovery;
pub mod store;
pub mod twitter;
pub mod validation;

pub use credential::Credential;
pub use recovery::{TokenedApi, call_with_recovery, fetch_with_recovery};
pub use store::{CredentialStore, FileCredentialStore, MemoryCredentialStore};

#[derive(Debug, Error)]
pub enum HealthSyncError {
    #[error("validation error: {0}")]
    Validation(String),
    #[error("authorization error: {0}")]
    Auth(String),
    #[error("empty result: {0}")]
    EmptyResult(String),
    #[error("http error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("configuration not found: {0}")]
    ConfigNotFound(String),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl HealthSyncError {
    /// True for failures that a token refresh may cure.
    pub fn is_auth(&self) -> bool {
        matches!(self, HealthSyncError::Auth(_))
    }
}

/// Kind of trace data served by the fitness tracker.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TraceCategory {
    Activities,
    Foods,
    Sleep,
}

impl TraceCategory {
    pub const ALL: [TraceCategory; 3] = [
        TraceCategory::Activities,
        TraceCategory::Foods,
        TraceCategory::Sleep,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TraceCategory::Activities => "activities",
            TraceCategory::Foods => "foods",
            TraceCategory::Sleep => "sleep",
        }
    }

    /// Path segment used by the trace endpoint.
    pub fn api_path(&self) -> &'static str {
        match self {
            TraceCategory::Activities => "activities",
            TraceCategory::Foods => "foods/log",
            TraceCategory::Sleep => "sleep",
        }
    }
}

impl FromStr for TraceCategory {
    type Err = HealthSyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "activities" => Ok(TraceCategory::Activities),
            "foods" => Ok(TraceCategory::Foods),
            "sleep" => Ok(TraceCategory::Sleep),
            _ => Err(HealthSyncError::Validation(
                r#"Please input "activities" or "foods" or "sleep""#.into(),
            )),
        }
    }
}

impl fmt::Display for TraceCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Body measurement accepted by the fitness tracker's body log.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BodyType {
    Weight,
    Fat,
}

impl BodyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BodyType::Weight => "weight",
            BodyType::Fat => "fat",
        }
    }
}

impl FromStr for BodyType {
    type Err = HealthSyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "weight" => Ok(BodyType::Weight),
            "fat" => Ok(BodyType::Fat),
            _ => Err(HealthSyncError::Validation(
                r#"Please input "weight" or "fat""#.into(),
            )),
        }
    }
}

impl fmt::Display for BodyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A read against one of the tokened APIs. Dates are `YYYY-MM-DD` strings
/// and are validated by the client that serves the request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FetchRequest {
    Trace { category: String, date: String },
    BodyComposition { from: String, to: String },
}

impl FetchRequest {
    pub fn trace(category: impl Into<String>, date: impl Into<String>) -> Self {
        FetchRequest::Trace {
            category: category.into(),
            date: date.into(),
        }
    }

    pub fn body_composition(from: impl Into<String>, to: impl Into<String>) -> Self {
        FetchRequest::BodyComposition {
            from: from.into(),
            to: to.into(),
        }
    }
}
