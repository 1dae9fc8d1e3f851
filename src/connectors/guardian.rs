//! The Guardian Connector
//!
//! Single newest-first query against the Guardian Content API with
//! contributor tags and article fields expanded.
//! https://open-platform.theguardian.com/documentation/search

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};
use validator::Validate;

use super::{
    decode_record, require_base_url, require_key, Connector, ConnectorMetadata, FetchBatch,
    FetchContext, RawArticle,
};
use crate::error::{IngestionError, Result};
use crate::http_client::ResilientHttpClient;
use crate::normalize::clean_label;
use crate::schemas::{NormalizedArticle, SourceLabel};

pub const GUARDIAN_ID: &str = "guardian";

/// Every Guardian article is attributed to this publisher
pub const SOURCE_NAME: &str = "The Guardian";

/// Author used when no contributor tag is present
pub const FALLBACK_AUTHOR: &str = "Guardian Staff";

const CONTRIBUTOR_TAG: &str = "contributor";
const SHOW_FIELDS: &str = "trailText,headline,thumbnail,body";

#[derive(Debug, Deserialize)]
struct GuardianEnvelope {
    response: GuardianResponse,
}

#[derive(Debug, Deserialize)]
struct GuardianResponse {
    status: Option<String>,
    message: Option<String>,
    #[serde(default)]
    results: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuardianItem {
    pub web_url: Option<String>,
    pub web_title: Option<String>,
    pub web_publication_date: Option<String>,
    pub pillar_name: Option<String>,
    pub fields: Option<GuardianFields>,
    #[serde(default)]
    pub tags: Vec<GuardianTag>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuardianFields {
    pub trail_text: Option<String>,
    pub headline: Option<String>,
    pub thumbnail: Option<String>,
    pub body: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuardianTag {
    #[serde(rename = "type")]
    pub tag_type: Option<String>,
    pub web_title: Option<String>,
}

/// Name of the first contributor tag, or the staff fallback
pub fn contributor_name(tags: &[GuardianTag]) -> String {
    tags.iter()
        .find(|tag| tag.tag_type.as_deref() == Some(CONTRIBUTOR_TAG))
        .and_then(|tag| clean_label(tag.web_title.as_deref()))
        .unwrap_or_else(|| FALLBACK_AUTHOR.to_string())
}

/// Maps one Guardian search result into the intermediate shape
pub fn map_item(item: GuardianItem) -> Result<NormalizedArticle> {
    let fields = item.fields.unwrap_or_default();

    let title = clean_label(item.web_title.as_deref())
        .or_else(|| clean_label(fields.headline.as_deref()))
        .ok_or_else(|| IngestionError::malformed(GUARDIAN_ID, "missing webTitle"))?;
    let url = clean_label(item.web_url.as_deref())
        .ok_or_else(|| IngestionError::malformed(GUARDIAN_ID, "missing webUrl"))?;
    let published_at = clean_label(item.web_publication_date.as_deref())
        .ok_or_else(|| IngestionError::malformed(GUARDIAN_ID, "missing webPublicationDate"))?;

    let normalized = NormalizedArticle {
        title,
        description: fields.trail_text,
        content: fields.body,
        url,
        image_url: clean_label(fields.thumbnail.as_deref()),
        published_at,
        source: SourceLabel::named(SOURCE_NAME),
        author: Some(contributor_name(&item.tags)),
        category: clean_label(item.pillar_name.as_deref()),
    };

    normalized.validate()?;
    Ok(normalized)
}

/// The Guardian connector
pub struct GuardianConnector {
    client: Arc<ResilientHttpClient>,
    api_key: String,
    base_url: String,
    page_size: u32,
    metadata: ConnectorMetadata,
}

impl GuardianConnector {
    /// Creates a new Guardian connector; fails without an API key or base URL
    pub fn new(
        client: Arc<ResilientHttpClient>,
        api_key: Option<String>,
        base_url: &str,
        page_size: u32,
    ) -> Result<Self> {
        let api_key = require_key(GUARDIAN_ID, api_key)?;
        let base_url = require_base_url(GUARDIAN_ID, base_url)?;

        let metadata = ConnectorMetadata {
            id: GUARDIAN_ID.to_string(),
            name: SOURCE_NAME.to_string(),
            description: "Most recent Guardian content with contributor tags".to_string(),
        };

        Ok(Self {
            client,
            api_key,
            base_url,
            page_size,
            metadata,
        })
    }

    /// Fetches the newest results
    pub async fn fetch_latest(&self) -> Result<Vec<serde_json::Value>> {
        let params: Vec<(&str, String)> = vec![
            ("api-key", self.api_key.clone()),
            ("order-by", "newest".to_string()),
            ("show-tags", CONTRIBUTOR_TAG.to_string()),
            ("page-size", self.page_size.to_string()),
            ("show-fields", SHOW_FIELDS.to_string()),
        ];

        let url = format!("{}/search", self.base_url);
        let envelope: GuardianEnvelope = self.client.get_json(&url, &params).await?;
        let response = envelope.response;

        if response.status.as_deref() != Some("ok") {
            return Err(IngestionError::ApiError {
                code: response.status.unwrap_or_else(|| "unknown".to_string()),
                message: response.message.unwrap_or_else(|| "Unknown error".to_string()),
            });
        }

        Ok(response.results)
    }
}

#[async_trait]
impl Connector for GuardianConnector {
    fn metadata(&self) -> &ConnectorMetadata {
        &self.metadata
    }

    async fn fetch_articles(&self, _ctx: &FetchContext) -> Result<FetchBatch> {
        let mut batch = FetchBatch::empty();

        match self.fetch_latest().await {
            Ok(results) => {
                batch.records = results
                    .into_iter()
                    .map(|item| RawArticle::new(item, None))
                    .collect();
            }
            Err(e) => {
                warn!(provider = GUARDIAN_ID, error = %e, "Guardian fetch failed");
                batch.record_failure(None, &e);
            }
        }

        info!(
            provider = GUARDIAN_ID,
            articles = batch.records.len(),
            "Fetched Guardian articles"
        );

        Ok(batch)
    }

    fn normalize(&self, raw: &RawArticle) -> Result<NormalizedArticle> {
        let item: GuardianItem = decode_record(GUARDIAN_ID, raw)?;
        map_item(item)
    }
}
