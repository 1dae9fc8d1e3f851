//! Entity Resolver
//!
//! Turns the source, author and category labels of an intermediate article
//! into stable ids, creating rows on first sight. The store performs each
//! find-or-create as one operation; resolved ids are memoized for the life
//! of the resolver so a run does not re-query names it already saw.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::error::{IngestionError, Result};
use crate::schemas::{EntityAttributes, EntityId, EntityKind, NormalizedArticle};
use crate::storage::ArticleStore;

/// Ids an article row points at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedEntities {
    pub source_id: EntityId,
    pub author_id: Option<EntityId>,
    pub category_id: Option<EntityId>,
}

/// Find-or-create front end over the store
pub struct EntityResolver {
    store: Arc<dyn ArticleStore>,
    resolved: RwLock<HashMap<(EntityKind, String), EntityId>>,
}

impl EntityResolver {
    pub fn new(store: Arc<dyn ArticleStore>) -> Self {
        Self {
            store,
            resolved: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the id for `natural_key`, creating the entity if absent.
    ///
    /// `attributes` only apply when this call creates the row.
    pub async fn resolve(
        &self,
        kind: EntityKind,
        natural_key: &str,
        attributes: &EntityAttributes,
    ) -> Result<EntityId> {
        let key = natural_key.trim();
        if key.is_empty() {
            return Err(IngestionError::ValidationError(format!("empty {kind} name")));
        }

        if let Some(id) = self.resolved.read().get(&(kind, key.to_string())) {
            return Ok(*id);
        }

        let id = self.store.find_or_create_entity(kind, key, attributes).await?;
        debug!(kind = %kind, name = %key, id = %id, "Resolved entity");

        self.resolved.write().insert((kind, key.to_string()), id);
        Ok(id)
    }

    /// Resolves every entity an intermediate article references
    pub async fn resolve_article(&self, article: &NormalizedArticle) -> Result<ResolvedEntities> {
        let source_id = self
            .resolve(
                EntityKind::Source,
                &article.source.name,
                &EntityAttributes::with_external_id(article.source.external_id.clone()),
            )
            .await?;

        let author_id = match article.author.as_deref() {
            Some(name) => Some(self.resolve(EntityKind::Author, name, &EntityAttributes::none()).await?),
            None => None,
        };

        let category_id = match article.category.as_deref() {
            Some(name) => Some(self.resolve(EntityKind::Category, name, &EntityAttributes::none()).await?),
            None => None,
        };

        Ok(ResolvedEntities {
            source_id,
            author_id,
            category_id,
        })
    }

    /// Number of memoized ids
    pub fn cached(&self) -> usize {
        self.resolved.read().len()
    }
}
