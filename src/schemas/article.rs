//! Article Schemas
//!
//! `NormalizedArticle` is the provider-agnostic record produced by every
//! connector. `ArticleRecord` is what the writer hands to the store after
//! entity resolution and timestamp parsing.

use serde::{Deserialize, Serialize};
use validator::Validate;

use super::common::Timestamp;
use super::entity::EntityId;

/// Publisher label as reported by a provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceLabel {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
}

impl SourceLabel {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            external_id: None,
        }
    }
}

/// Intermediate article record, before entity resolution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedArticle {
    #[validate(length(min = 1, message = "title must not be empty"))]
    pub title: String,
    pub description: Option<String>,
    pub content: Option<String>,
    #[validate(url(message = "url must be absolute"))]
    pub url: String,
    pub image_url: Option<String>,
    /// Provider-native date representation, parsed by the writer
    pub published_at: String,
    pub source: SourceLabel,
    pub author: Option<String>,
    pub category: Option<String>,
}

/// Fully resolved article ready for create-or-update
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticleRecord {
    pub title: String,
    pub description: Option<String>,
    pub content: Option<String>,
    pub url: String,
    pub image_url: Option<String>,
    pub published_at: Timestamp,
    pub source_id: EntityId,
    pub author_id: Option<EntityId>,
    pub category_id: Option<EntityId>,
}

/// Article row as stored
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct StoredArticle {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub content: Option<String>,
    pub url: String,
    pub image_url: Option<String>,
    pub published_at: Timestamp,
    pub source_id: EntityId,
    pub author_id: Option<EntityId>,
    pub category_id: Option<EntityId>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl StoredArticle {
    /// Overwrites the mutable fields in place
    pub fn apply(&mut self, record: &ArticleRecord, now: Timestamp) {
        self.title = record.title.clone();
        self.description = record.description.clone();
        self.content = record.content.clone();
        self.image_url = record.image_url.clone();
        self.published_at = record.published_at;
        self.source_id = record.source_id;
        self.author_id = record.author_id;
        self.category_id = record.category_id;
        self.updated_at = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> NormalizedArticle {
        NormalizedArticle {
            title: "T".to_string(),
            description: None,
            content: None,
            url: "https://x/1".to_string(),
            image_url: None,
            published_at: "2025-01-01T00:00:00Z".to_string(),
            source: SourceLabel::named("X"),
            author: Some("A".to_string()),
            category: None,
        }
    }

    #[test]
    fn test_valid_article() {
        assert!(sample().validate().is_ok());
    }

    #[test]
    fn test_empty_title_rejected() {
        let article = NormalizedArticle {
            title: String::new(),
            ..sample()
        };
        assert!(article.validate().is_err());
    }

    #[test]
    fn test_relative_url_rejected() {
        let article = NormalizedArticle {
            url: "/world/2025/story".to_string(),
            ..sample()
        };
        assert!(article.validate().is_err());
    }

    #[test]
    fn test_camel_case_serialization() {
        let json = serde_json::to_string(&sample()).unwrap();
        assert!(json.contains("publishedAt"));
        assert!(json.contains("imageUrl"));
    }
}
