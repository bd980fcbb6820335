//! Input checks shared by the provider clients. Every check here runs
//! before a request is built, so a failure never reaches the network.

use std::sync::LazyLock;

use chrono::{DateTime, Days, NaiveDate, NaiveTime, TimeDelta, Utc};
use chrono_tz::Tz;
use regex::Regex;
use url::Url;

use crate::HealthSyncError;

/// Oldest start date the body-composition provider will serve.
pub const BODY_COMPOSITION_WINDOW_DAYS: u64 = 90;
/// How far back the social recent-search endpoint reaches.
pub const RECENT_SEARCH_WINDOW_DAYS: u64 = 7;

static DATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("date pattern compiles"));
static TIME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{2}:\d{2}:\d{2}$").expect("time pattern compiles"));

/// Today's calendar date in `tz`.
pub fn today_in(tz: Tz) -> NaiveDate {
    Utc::now().with_timezone(&tz).date_naive()
}

/// Parse a strict `YYYY-MM-DD` date; `field` names the argument in the error.
pub fn parse_date(field: &str, value: &str) -> Result<NaiveDate, HealthSyncError> {
    let invalid = || HealthSyncError::Validation(format!(r#""{field}" must be yyyy-mm-dd."#));
    if !DATE_RE.is_match(value) {
        return Err(invalid());
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| invalid())
}

/// Parse a strict `HH:MM:SS` time.
pub fn parse_time(field: &str, value: &str) -> Result<NaiveTime, HealthSyncError> {
    let invalid = || HealthSyncError::Validation(format!(r#""{field}" must be hh:mm:ss."#));
    if !TIME_RE.is_match(value) {
        return Err(invalid());
    }
    NaiveTime::parse_from_str(value, "%H:%M:%S").map_err(|_| invalid())
}

/// Reject inverted ranges and ranges that start before the provider window.
pub fn check_body_composition_range(
    from: NaiveDate,
    to: NaiveDate,
    today: NaiveDate,
) -> Result<(), HealthSyncError> {
    if from > to {
        return Err(HealthSyncError::Validation(
            "to_date is greater than from_date".into(),
        ));
    }
    let limit = today
        .checked_sub_days(Days::new(BODY_COMPOSITION_WINDOW_DAYS))
        .unwrap_or(NaiveDate::MIN);
    if from < limit {
        return Err(HealthSyncError::Validation(
            "from_date is over 3 month ago".into(),
        ));
    }
    Ok(())
}

/// The recent-search endpoint rejects a `start_time` older than seven days
/// before `now`.
pub fn check_recent_search_start(
    start: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Result<(), HealthSyncError> {
    if start < now - TimeDelta::days(RECENT_SEARCH_WINDOW_DAYS as i64) {
        return Err(HealthSyncError::Validation(
            "this method can search tweets from the last seven days".into(),
        ));
    }
    Ok(())
}

pub fn check_non_negative(field: &str, value: f64) -> Result<(), HealthSyncError> {
    if !value.is_finite() || value < 0.0 {
        return Err(HealthSyncError::Validation(format!(
            r#""{field}" must be a number greater than or equal to 0."#
        )));
    }
    Ok(())
}

/// Every requested scope must be one the provider knows about.
pub fn check_scope(scope: &[&str], allowed: &[&str]) -> Result<(), HealthSyncError> {
    if scope.is_empty() {
        return Err(HealthSyncError::Validation(
            r#""scope" must not be empty."#.into(),
        ));
    }
    if let Some(bad) = scope.iter().find(|s| !allowed.contains(s)) {
        return Err(HealthSyncError::Validation(format!(
            r#""scope" contains unknown value "{bad}"."#
        )));
    }
    Ok(())
}

pub fn parse_redirect_uri(value: &str) -> Result<Url, HealthSyncError> {
    match Url::parse(value) {
        Ok(url) if url.has_host() => Ok(url),
        _ => Err(HealthSyncError::Validation(
            r#""redirect_uri" must be a uri format."#.into(),
        )),
    }
}
