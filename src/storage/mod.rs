//! Storage layer for aggregated articles
//!
//! Only the entity resolver and the upsert writer mutate the store. Each
//! find-or-create and each article upsert is its own short unit of work.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::Result;
use crate::schemas::{
    ArticleRecord, Entity, EntityAttributes, EntityId, EntityKind, StoredArticle, UpsertOutcome,
};

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Row counts per table
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StoreCounts {
    pub articles: u64,
    pub sources: u64,
    pub authors: u64,
    pub categories: u64,
}

/// Persistent article store
#[async_trait]
pub trait ArticleStore: Send + Sync {
    /// Short backend name for logs
    fn backend(&self) -> &'static str;

    /// Looks up an entity by its natural key
    async fn find_entity(&self, kind: EntityKind, name: &str) -> Result<Option<Entity>>;

    /// Returns the id of the entity named `name`, creating it first if absent.
    ///
    /// Concurrent calls with the same key converge on one row; attributes
    /// are only applied by the call that creates it.
    async fn find_or_create_entity(
        &self,
        kind: EntityKind,
        name: &str,
        attributes: &EntityAttributes,
    ) -> Result<EntityId>;

    /// Names of every stored entity of `kind`, ordered by id
    async fn entity_names(&self, kind: EntityKind) -> Result<Vec<String>>;

    /// Looks up an article by canonical URL
    async fn find_article_by_url(&self, url: &str) -> Result<Option<StoredArticle>>;

    /// Creates or overwrites the article keyed by `record.url`
    async fn upsert_article(&self, record: &ArticleRecord) -> Result<UpsertOutcome>;

    /// Row counts for status output
    async fn counts(&self) -> Result<StoreCounts>;
}
