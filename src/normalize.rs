//! Normalization Helpers
//!
//! Shared by every connector and the upsert writer:
//! - Canonical URL form (the article natural key)
//! - Provider date parsing into one UTC timestamp type
//! - Label cleanup for names that feed entity resolution

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use std::collections::HashSet;
use url::Url;

use crate::error::{IngestionError, Result};

const TRACKING_PARAMS: &[&str] = &[
    "utm_source", "utm_medium", "utm_campaign", "utm_term", "utm_content",
    "fbclid", "gclid", "msclkid", "mc_cid", "mc_eid",
    "_ga", "_gl", "yclid", "twclid",
];

/// Normalizes URL to canonical form
/// - Removes fragments (#...)
/// - Removes tracking parameters (utm_*, fbclid, etc.)
/// - Lowercase scheme and host (path case is preserved)
/// - Sorts the remaining query parameters
pub fn canonicalize_url(url_str: &str) -> std::result::Result<String, url::ParseError> {
    let mut url = Url::parse(url_str.trim())?;

    url.set_fragment(None);

    let tracking: HashSet<&str> = TRACKING_PARAMS.iter().copied().collect();
    let mut params: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| !tracking.contains(key.as_ref()))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    url.set_query(None);
    if !params.is_empty() {
        params.sort();
        url.query_pairs_mut().extend_pairs(params);
    }

    Ok(url.to_string())
}

/// Parses a provider date into UTC.
///
/// Accepts RFC 3339 (all three providers), RFC 2822, and naive
/// `YYYY-MM-DD[ T]HH:MM:SS` / `YYYY-MM-DD` values which are taken as UTC.
pub fn parse_published_at(raw: &str) -> Result<DateTime<Utc>> {
    let value = raw.trim();
    if value.is_empty() {
        return Err(IngestionError::InvalidTimestamp(raw.to_string()));
    }

    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Ok(ts.with_timezone(&Utc));
    }
    if let Ok(ts) = DateTime::parse_from_rfc2822(value) {
        return Ok(ts.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return Ok(naive.and_utc());
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        if let Some(naive) = date.and_hms_opt(0, 0, 0) {
            return Ok(naive.and_utc());
        }
    }

    Err(IngestionError::InvalidTimestamp(raw.to_string()))
}

/// Trims a provider label; blank becomes `None`
pub fn clean_label(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Uppercases the first character, leaving the rest untouched
pub fn capitalize_first(value: &str) -> String {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
