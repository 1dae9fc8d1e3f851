//! New York Times Connector
//!
//! Top stories per seeded category, using the category as the search term.
//! https://developer.nytimes.com/docs/top-stories-product/1/overview

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use validator::Validate;

use super::{
    decode_record, fetch_per_category, require_base_url, require_key, Connector,
    ConnectorMetadata, FetchBatch, FetchContext, RawArticle,
};
use crate::error::{IngestionError, Result};
use crate::http_client::ResilientHttpClient;
use crate::normalize::{capitalize_first, clean_label};
use crate::schemas::{NormalizedArticle, SourceLabel};

pub const NYT_ID: &str = "nyt";

/// Every NYT article is attributed to this publisher
pub const SOURCE_NAME: &str = "The New York Times";

/// Author used when the byline is missing or blank
pub const FALLBACK_AUTHOR: &str = "NYT Staff";

/// Title used when a story arrives without one
pub const FALLBACK_TITLE: &str = "Untitled";

/// Multimedia format carrying the largest image
const LARGE_IMAGE_FORMAT: &str = "superJumbo";

#[derive(Debug, Deserialize)]
struct NytResponse {
    status: Option<String>,
    #[serde(default)]
    results: Vec<serde_json::Value>,
    fault: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NytStory {
    pub section: Option<String>,
    pub title: Option<String>,
    #[serde(rename = "abstract")]
    pub summary: Option<String>,
    pub url: Option<String>,
    pub byline: Option<String>,
    pub published_date: Option<String>,
    pub multimedia: Option<Vec<NytMedia>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NytMedia {
    pub format: Option<String>,
    pub url: Option<String>,
}

/// URL of the first `superJumbo` image, if any
pub fn largest_image(multimedia: &[NytMedia]) -> Option<String> {
    multimedia
        .iter()
        .find(|media| media.format.as_deref() == Some(LARGE_IMAGE_FORMAT))
        .and_then(|media| clean_label(media.url.as_deref()))
}

/// Author name from a byline such as "By Cade Metz", or the staff fallback
pub fn byline_author(byline: Option<&str>) -> String {
    clean_label(byline)
        .map(|line| match line.get(..3) {
            Some(prefix) if prefix.eq_ignore_ascii_case("by ") => line[3..].trim().to_string(),
            _ => line,
        })
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| FALLBACK_AUTHOR.to_string())
}

/// Maps one top story into the intermediate shape.
///
/// `category` is the seeded category the query searched for; it is used when
/// the story carries no section of its own.
pub fn map_story(story: NytStory, category: Option<&str>) -> Result<NormalizedArticle> {
    let url = clean_label(story.url.as_deref())
        .ok_or_else(|| IngestionError::malformed(NYT_ID, "missing url"))?;
    let published_at = clean_label(story.published_date.as_deref())
        .ok_or_else(|| IngestionError::malformed(NYT_ID, "missing published_date"))?;

    let category = clean_label(story.section.as_deref())
        .or_else(|| clean_label(category))
        .map(|name| capitalize_first(&name));

    let normalized = NormalizedArticle {
        title: clean_label(story.title.as_deref()).unwrap_or_else(|| FALLBACK_TITLE.to_string()),
        description: story.summary.clone(),
        content: story.summary,
        url,
        image_url: story.multimedia.as_deref().and_then(largest_image),
        published_at,
        source: SourceLabel::named(SOURCE_NAME),
        author: Some(byline_author(story.byline.as_deref())),
        category,
    };

    normalized.validate()?;
    Ok(normalized)
}

/// New York Times connector
pub struct NytConnector {
    client: Arc<ResilientHttpClient>,
    api_key: String,
    base_url: String,
    metadata: ConnectorMetadata,
}

impl NytConnector {
    /// Creates a new NYT connector; fails without an API key or base URL
    pub fn new(
        client: Arc<ResilientHttpClient>,
        api_key: Option<String>,
        base_url: &str,
    ) -> Result<Self> {
        let api_key = require_key(NYT_ID, api_key)?;
        let base_url = require_base_url(NYT_ID, base_url)?;

        let metadata = ConnectorMetadata {
            id: NYT_ID.to_string(),
            name: SOURCE_NAME.to_string(),
            description: "Top stories searched per category".to_string(),
        };

        Ok(Self {
            client,
            api_key,
            base_url,
            metadata,
        })
    }

    /// Fetches top stories for one category
    pub async fn fetch_category(&self, category: &str) -> Result<Vec<serde_json::Value>> {
        let params: Vec<(&str, String)> = vec![
            ("api-key", self.api_key.clone()),
            ("q", category.to_string()),
        ];

        let response: NytResponse = self.client.get_json(&self.base_url, &params).await?;

        if let Some(fault) = response.fault {
            return Err(IngestionError::ApiError {
                code: "fault".to_string(),
                message: fault.to_string(),
            });
        }
        match response.status.as_deref() {
            Some(status) if status.eq_ignore_ascii_case("ok") => Ok(response.results),
            other => Err(IngestionError::ApiError {
                code: other.unwrap_or("unknown").to_string(),
                message: "unexpected NYT response status".to_string(),
            }),
        }
    }
}

#[async_trait]
impl Connector for NytConnector {
    fn metadata(&self) -> &ConnectorMetadata {
        &self.metadata
    }

    async fn fetch_articles(&self, ctx: &FetchContext) -> Result<FetchBatch> {
        let batch = fetch_per_category(
            NYT_ID,
            &ctx.categories,
            Duration::ZERO,
            |category| async move { self.fetch_category(&category).await },
        )
        .await;

        info!(
            provider = NYT_ID,
            articles = batch.records.len(),
            failed_queries = batch.failed_queries.len(),
            "Fetched NYT top stories"
        );

        Ok(batch)
    }

    fn normalize(&self, raw: &RawArticle) -> Result<NormalizedArticle> {
        let story: NytStory = decode_record(NYT_ID, raw)?;
        map_story(story, raw.query.as_deref())
    }
}
