//! NewsAPI Connector
//!
//! Keyword search against NewsAPI.org, one query per seeded category.
//! https://newsapi.org/docs/endpoints/everything

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use validator::Validate;

use super::{
    decode_record, fetch_per_category, require_base_url, require_key, Connector,
    ConnectorMetadata, FetchBatch, FetchContext, RawArticle,
};
use crate::error::{IngestionError, Result};
use crate::http_client::ResilientHttpClient;
use crate::normalize::clean_label;
use crate::schemas::{NormalizedArticle, SourceLabel};

pub const NEWSAPI_ID: &str = "newsapi";

/// Author used when NewsAPI omits the byline
pub const FALLBACK_AUTHOR: &str = "Unknown Author";

/// Source used when NewsAPI omits the publisher name
pub const FALLBACK_SOURCE: &str = "Unknown Source";

/// NewsAPI response envelope
#[derive(Debug, Deserialize)]
struct NewsApiResponse {
    status: String,
    #[serde(rename = "totalResults")]
    total_results: Option<u32>,
    articles: Option<Vec<serde_json::Value>>,
    code: Option<String>,
    message: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewsArticle {
    pub source: Option<ArticleSource>,
    pub author: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub url: Option<String>,
    #[serde(rename = "urlToImage")]
    pub url_to_image: Option<String>,
    #[serde(rename = "publishedAt")]
    pub published_at: Option<String>,
    pub content: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArticleSource {
    pub id: Option<String>,
    pub name: Option<String>,
}

/// Maps one NewsAPI article into the intermediate shape.
///
/// `category` is the seeded category the query searched for.
pub fn map_article(article: NewsArticle, category: Option<&str>) -> Result<NormalizedArticle> {
    let title = clean_label(article.title.as_deref())
        .ok_or_else(|| IngestionError::malformed(NEWSAPI_ID, "missing title"))?;
    let url = clean_label(article.url.as_deref())
        .ok_or_else(|| IngestionError::malformed(NEWSAPI_ID, "missing url"))?;
    let published_at = clean_label(article.published_at.as_deref())
        .ok_or_else(|| IngestionError::malformed(NEWSAPI_ID, "missing publishedAt"))?;

    let (source_name, source_id) = match article.source {
        Some(source) => (clean_label(source.name.as_deref()), clean_label(source.id.as_deref())),
        None => (None, None),
    };

    let normalized = NormalizedArticle {
        title,
        description: article.description,
        content: article.content,
        url,
        image_url: clean_label(article.url_to_image.as_deref()),
        published_at,
        source: SourceLabel {
            name: source_name.unwrap_or_else(|| FALLBACK_SOURCE.to_string()),
            external_id: source_id,
        },
        author: Some(
            clean_label(article.author.as_deref()).unwrap_or_else(|| FALLBACK_AUTHOR.to_string()),
        ),
        category: clean_label(category),
    };

    normalized.validate()?;
    Ok(normalized)
}

/// NewsAPI connector
pub struct NewsApiConnector {
    client: Arc<ResilientHttpClient>,
    api_key: String,
    base_url: String,
    page_size: u32,
    cooldown: Duration,
    metadata: ConnectorMetadata,
}

impl NewsApiConnector {
    /// Creates a new NewsAPI connector; fails without an API key or base URL
    pub fn new(
        client: Arc<ResilientHttpClient>,
        api_key: Option<String>,
        base_url: &str,
        page_size: u32,
        cooldown: Duration,
    ) -> Result<Self> {
        let api_key = require_key(NEWSAPI_ID, api_key)?;
        let base_url = require_base_url(NEWSAPI_ID, base_url)?;

        let metadata = ConnectorMetadata {
            id: NEWSAPI_ID.to_string(),
            name: "NewsAPI".to_string(),
            description: "Keyword search across global publishers".to_string(),
        };

        Ok(Self {
            client,
            api_key,
            base_url,
            page_size,
            cooldown,
            metadata,
        })
    }

    /// Fetches the newest articles matching one keyword
    pub async fn fetch_query(&self, query: &str) -> Result<Vec<serde_json::Value>> {
        let params: Vec<(&str, String)> = vec![
            ("apiKey", self.api_key.clone()),
            ("q", query.to_string()),
            ("sortBy", "publishedAt".to_string()),
            ("language", "en".to_string()),
            ("pageSize", self.page_size.to_string()),
        ];

        let url = format!("{}/everything", self.base_url);
        let api_response: NewsApiResponse = self.client.get_json(&url, &params).await?;

        if api_response.status != "ok" {
            return Err(IngestionError::ApiError {
                code: api_response.code.unwrap_or_else(|| "unknown".to_string()),
                message: api_response.message.unwrap_or_else(|| "Unknown error".to_string()),
            });
        }

        debug!(
            provider = NEWSAPI_ID,
            query = %query,
            total_results = ?api_response.total_results,
            "NewsAPI query answered"
        );

        Ok(api_response.articles.unwrap_or_default())
    }
}

#[async_trait]
impl Connector for NewsApiConnector {
    fn metadata(&self) -> &ConnectorMetadata {
        &self.metadata
    }

    async fn fetch_articles(&self, ctx: &FetchContext) -> Result<FetchBatch> {
        let batch = fetch_per_category(NEWSAPI_ID, &ctx.categories, self.cooldown, |category| async move {
            self.fetch_query(&category).await
        })
        .await;

        info!(
            provider = NEWSAPI_ID,
            articles = batch.records.len(),
            failed_queries = batch.failed_queries.len(),
            "Fetched news articles"
        );

        Ok(batch)
    }

    fn normalize(&self, raw: &RawArticle) -> Result<NormalizedArticle> {
        let article: NewsArticle = decode_record(NEWSAPI_ID, raw)?;
        map_article(article, raw.query.as_deref())
    }
}
