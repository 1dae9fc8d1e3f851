//! Provider connectors
//!
//! Each connector speaks to one external news API and implements the
//! `Connector` trait: `fetch_articles` returns raw records, `normalize` maps
//! one raw record into the shared `NormalizedArticle` shape. Storage is the
//! aggregator's job.

pub mod guardian;
pub mod newsapi;
pub mod nyt;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{IngestionError, Result};
use crate::schemas::NormalizedArticle;

/// Metadata about a connector
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectorMetadata {
    /// Unique identifier for the provider
    pub id: String,
    /// Human-readable name
    pub name: String,
    /// Description
    pub description: String,
}

/// Inputs shared by every connector for one run
#[derive(Debug, Clone, Default)]
pub struct FetchContext {
    /// Pre-seeded category names, used as search terms
    pub categories: Vec<String>,
}

impl FetchContext {
    pub fn with_categories<I, S>(categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            categories: categories.into_iter().map(Into::into).collect(),
        }
    }
}

/// One provider record exactly as received, plus the query that produced it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawArticle {
    pub payload: serde_json::Value,
    /// Category name the query searched for, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
}

impl RawArticle {
    pub fn new(payload: serde_json::Value, query: Option<&str>) -> Self {
        Self {
            payload,
            query: query.map(str::to_string),
        }
    }

    /// Short identifying hint for log lines
    pub fn hint(&self) -> String {
        ["url", "webUrl", "title", "webTitle"]
            .iter()
            .find_map(|key| self.payload.get(*key).and_then(|v| v.as_str()))
            .unwrap_or("<unidentified record>")
            .to_string()
    }
}

/// A query that produced no records because the request failed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryFailure {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    pub error: String,
}

/// Result of one `fetch_articles` call
#[derive(Debug, Default)]
pub struct FetchBatch {
    pub records: Vec<RawArticle>,
    pub failed_queries: Vec<QueryFailure>,
}

impl FetchBatch {
    /// Creates an empty batch
    pub fn empty() -> Self {
        Self::default()
    }

    /// Creates a batch with records
    pub fn with_records(records: Vec<RawArticle>) -> Self {
        Self {
            records,
            failed_queries: vec![],
        }
    }

    /// Records a failed query without stopping the batch
    pub fn record_failure(&mut self, query: Option<&str>, error: &IngestionError) {
        self.failed_queries.push(QueryFailure {
            query: query.map(str::to_string),
            error: error.to_string(),
        });
    }
}

/// Trait for all provider connectors
#[async_trait]
pub trait Connector: Send + Sync {
    /// Gets metadata about this connector
    fn metadata(&self) -> &ConnectorMetadata;

    /// Fetches one finite batch of raw records.
    ///
    /// Failed queries are logged and listed in the batch rather than
    /// returned as errors.
    async fn fetch_articles(&self, ctx: &FetchContext) -> Result<FetchBatch>;

    /// Maps one raw record into the intermediate shape
    fn normalize(&self, raw: &RawArticle) -> Result<NormalizedArticle>;

    /// Gets the connector ID
    fn id(&self) -> &str {
        &self.metadata().id
    }

    /// Gets the connector name
    fn name(&self) -> &str {
        &self.metadata().name
    }
}

/// Decodes a raw payload into a provider wire type
pub(crate) fn decode_record<T: DeserializeOwned>(provider: &str, raw: &RawArticle) -> Result<T> {
    serde_json::from_value(raw.payload.clone())
        .map_err(|e| IngestionError::malformed(provider, e.to_string()))
}

/// Rejects a missing API key at construction
pub(crate) fn require_key(provider: &str, api_key: Option<String>) -> Result<String> {
    api_key
        .filter(|k| !k.trim().is_empty())
        .ok_or_else(|| IngestionError::SourceNotConfigured(format!("{provider}: missing API key")))
}

/// Rejects a missing base URL at construction
pub(crate) fn require_base_url(provider: &str, base_url: &str) -> Result<String> {
    let trimmed = base_url.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Err(IngestionError::SourceNotConfigured(format!(
            "{provider}: missing base URL"
        )));
    }
    Ok(trimmed.to_string())
}

/// Runs one query per category, pausing `cooldown` between requests.
///
/// A failed query is logged and recorded; the loop moves on to the next
/// category.
pub(crate) async fn fetch_per_category<F, Fut>(
    provider: &str,
    categories: &[String],
    cooldown: Duration,
    mut fetch: F,
) -> FetchBatch
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = Result<Vec<serde_json::Value>>>,
{
    let mut batch = FetchBatch::empty();

    if categories.is_empty() {
        warn!(provider = %provider, "No categories seeded, nothing to query");
        return batch;
    }

    for (index, category) in categories.iter().enumerate() {
        if index > 0 && !cooldown.is_zero() {
            tokio::time::sleep(cooldown).await;
        }

        match fetch(category.clone()).await {
            Ok(items) => {
                debug!(provider = %provider, category = %category, count = items.len(), "Fetched category");
                batch
                    .records
                    .extend(items.into_iter().map(|item| RawArticle::new(item, Some(category))));
            }
            Err(e) => {
                warn!(
                    provider = %provider,
                    category = %category,
                    error = %e,
                    "Category query failed"
                );
                batch.record_failure(Some(category), &e);
            }
        }
    }

    batch
}

pub use guardian::GuardianConnector;
pub use newsapi::NewsApiConnector;
pub use nyt::NytConnector;
