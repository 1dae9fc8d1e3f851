//! In-process article store
//!
//! Used when no database URL is configured and by the test suite. A single
//! lock guards all tables so find-or-create is atomic.

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::HashMap;

use super::{ArticleStore, StoreCounts};
use crate::error::Result;
use crate::schemas::{
    ArticleRecord, Entity, EntityAttributes, EntityId, EntityKind, StoredArticle, UpsertOutcome,
};

#[derive(Default)]
struct MemoryState {
    entities: HashMap<(EntityKind, String), Entity>,
    articles: HashMap<String, StoredArticle>,
    next_entity_id: i64,
    next_article_id: i64,
}

/// Store backed by in-memory maps
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// All stored entities of one kind, ordered by id
    pub fn entities(&self, kind: EntityKind) -> Vec<Entity> {
        let state = self.state.lock();
        let mut entities: Vec<Entity> = state
            .entities
            .values()
            .filter(|e| e.kind == kind)
            .cloned()
            .collect();
        entities.sort_by_key(|e| e.id);
        entities
    }

    /// All stored articles, ordered by id
    pub fn articles(&self) -> Vec<StoredArticle> {
        let state = self.state.lock();
        let mut articles: Vec<StoredArticle> = state.articles.values().cloned().collect();
        articles.sort_by_key(|a| a.id);
        articles
    }
}

#[async_trait]
impl ArticleStore for MemoryStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn find_entity(&self, kind: EntityKind, name: &str) -> Result<Option<Entity>> {
        let state = self.state.lock();
        Ok(state.entities.get(&(kind, name.to_string())).cloned())
    }

    async fn find_or_create_entity(
        &self,
        kind: EntityKind,
        name: &str,
        attributes: &EntityAttributes,
    ) -> Result<EntityId> {
        let mut state = self.state.lock();
        let key = (kind, name.to_string());
        if let Some(existing) = state.entities.get(&key) {
            return Ok(existing.id);
        }

        state.next_entity_id += 1;
        let id = EntityId(state.next_entity_id);
        let external_id = match kind {
            EntityKind::Source => attributes.external_id.clone(),
            _ => None,
        };
        state.entities.insert(
            key,
            Entity {
                id,
                kind,
                name: name.to_string(),
                external_id,
            },
        );
        Ok(id)
    }

    async fn entity_names(&self, kind: EntityKind) -> Result<Vec<String>> {
        Ok(self.entities(kind).into_iter().map(|e| e.name).collect())
    }

    async fn find_article_by_url(&self, url: &str) -> Result<Option<StoredArticle>> {
        Ok(self.state.lock().articles.get(url).cloned())
    }

    async fn upsert_article(&self, record: &ArticleRecord) -> Result<UpsertOutcome> {
        let now = Utc::now();
        let mut state = self.state.lock();

        if let Some(existing) = state.articles.get_mut(&record.url) {
            existing.apply(record, now);
            return Ok(UpsertOutcome::Updated);
        }

        state.next_article_id += 1;
        let id = state.next_article_id;
        state.articles.insert(
            record.url.clone(),
            StoredArticle {
                id,
                title: record.title.clone(),
                description: record.description.clone(),
                content: record.content.clone(),
                url: record.url.clone(),
                image_url: record.image_url.clone(),
                published_at: record.published_at,
                source_id: record.source_id,
                author_id: record.author_id,
                category_id: record.category_id,
                created_at: now,
                updated_at: now,
            },
        );
        Ok(UpsertOutcome::Created)
    }

    async fn counts(&self) -> Result<StoreCounts> {
        let state = self.state.lock();
        let count_kind = |kind: EntityKind| {
            state.entities.keys().filter(|(k, _)| *k == kind).count() as u64
        };
        Ok(StoreCounts {
            articles: state.articles.len() as u64,
            sources: count_kind(EntityKind::Source),
            authors: count_kind(EntityKind::Author),
            categories: count_kind(EntityKind::Category),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record(url: &str, title: &str, source_id: EntityId) -> ArticleRecord {
        ArticleRecord {
            title: title.to_string(),
            description: None,
            content: None,
            url: url.to_string(),
            image_url: None,
            published_at: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
            source_id,
            author_id: None,
            category_id: None,
        }
    }

    #[tokio::test]
    async fn test_find_or_create_is_stable() {
        let store = MemoryStore::new();
        let a = store
            .find_or_create_entity(EntityKind::Author, "Jane", &EntityAttributes::none())
            .await
            .unwrap();
        let b = store
            .find_or_create_entity(EntityKind::Author, "Jane", &EntityAttributes::none())
            .await
            .unwrap();
        assert_eq!(a, b);
        assert_eq!(store.entities(EntityKind::Author).len(), 1);
    }

    #[tokio::test]
    async fn test_same_name_different_kind() {
        let store = MemoryStore::new();
        let source = store
            .find_or_create_entity(EntityKind::Source, "Science", &EntityAttributes::none())
            .await
            .unwrap();
        let category = store
            .find_or_create_entity(EntityKind::Category, "Science", &EntityAttributes::none())
            .await
            .unwrap();
        assert_ne!(source, category);
    }

    #[tokio::test]
    async fn test_first_write_wins_attributes() {
        let store = MemoryStore::new();
        store
            .find_or_create_entity(
                EntityKind::Source,
                "BBC News",
                &EntityAttributes::with_external_id(Some("bbc-news".to_string())),
            )
            .await
            .unwrap();
        store
            .find_or_create_entity(
                EntityKind::Source,
                "BBC News",
                &EntityAttributes::with_external_id(Some("other".to_string())),
            )
            .await
            .unwrap();

        let source = store.find_entity(EntityKind::Source, "BBC News").await.unwrap().unwrap();
        assert_eq!(source.external_id.as_deref(), Some("bbc-news"));
    }

    #[tokio::test]
    async fn test_upsert_overwrites() {
        let store = MemoryStore::new();
        let created = store.upsert_article(&record("https://x/1", "T", EntityId(1))).await.unwrap();
        let updated = store.upsert_article(&record("https://x/1", "T2", EntityId(1))).await.unwrap();

        assert_eq!(created, UpsertOutcome::Created);
        assert_eq!(updated, UpsertOutcome::Updated);

        let articles = store.articles();
        assert_eq!(articles.len(), 1);
        assert_eq!(articles[0].title, "T2");
        assert!(articles[0].updated_at >= articles[0].created_at);
    }

    #[tokio::test]
    async fn test_counts() {
        let store = MemoryStore::new();
        let source = store
            .find_or_create_entity(EntityKind::Source, "X", &EntityAttributes::none())
            .await
            .unwrap();
        store.upsert_article(&record("https://x/1", "T", source)).await.unwrap();
        store.upsert_article(&record("https://x/2", "U", source)).await.unwrap();

        let counts = store.counts().await.unwrap();
        assert_eq!(counts.articles, 2);
        assert_eq!(counts.sources, 1);
        assert_eq!(counts.authors, 0);
    }
}
