//! Upsert Writer
//!
//! Create-or-update of articles keyed by canonical URL. The provider date is
//! parsed here; an unparseable date fails the record before anything is
//! written.

use std::sync::Arc;
use tracing::debug;

use crate::error::{IngestionError, Result};
use crate::normalize::{canonicalize_url, parse_published_at};
use crate::resolver::ResolvedEntities;
use crate::schemas::{ArticleRecord, EntityId, NormalizedArticle, UpsertOutcome};
use crate::storage::ArticleStore;

pub struct UpsertWriter {
    store: Arc<dyn ArticleStore>,
}

impl UpsertWriter {
    pub fn new(store: Arc<dyn ArticleStore>) -> Self {
        Self { store }
    }

    /// Builds the stored form of an article: canonical URL, parsed timestamp
    pub fn build_record(article: &NormalizedArticle, entities: &ResolvedEntities) -> Result<ArticleRecord> {
        let published_at = parse_published_at(&article.published_at)?;
        let url = canonicalize_url(&article.url).map_err(|e| {
            IngestionError::ValidationError(format!("invalid url {:?}: {}", article.url, e))
        })?;

        Ok(ArticleRecord {
            title: article.title.clone(),
            description: article.description.clone(),
            content: article.content.clone(),
            url,
            image_url: article.image_url.clone(),
            published_at,
            source_id: entities.source_id,
            author_id: entities.author_id,
            category_id: entities.category_id,
        })
    }

    /// Checks the parts of an article the writer would reject, without
    /// touching the store
    pub fn check(article: &NormalizedArticle) -> Result<()> {
        let placeholder = ResolvedEntities {
            source_id: EntityId(0),
            author_id: None,
            category_id: None,
        };
        Self::build_record(article, &placeholder).map(|_| ())
    }

    /// Creates the article or overwrites the existing row with the same URL
    pub async fn upsert(
        &self,
        article: &NormalizedArticle,
        source_id: EntityId,
        author_id: Option<EntityId>,
        category_id: Option<EntityId>,
    ) -> Result<UpsertOutcome> {
        let entities = ResolvedEntities {
            source_id,
            author_id,
            category_id,
        };
        let record = Self::build_record(article, &entities)?;
        let outcome = self.store.upsert_article(&record).await?;

        debug!(url = %record.url, outcome = ?outcome, "Upserted article");
        Ok(outcome)
    }
}
