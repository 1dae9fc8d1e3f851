//! Reference Entities
//!
//! Sources, authors and categories are shared by many articles and resolved
//! by name. Their ids must stay stable across runs because user preferences
//! persist them as foreign keys.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Surrogate key of a stored row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct EntityId(pub i64);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kind of reference entity an article points at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Source,
    Author,
    Category,
}

impl EntityKind {
    /// Backing table name
    pub fn table(self) -> &'static str {
        match self {
            Self::Source => "sources",
            Self::Author => "authors",
            Self::Category => "categories",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Source => "source",
            Self::Author => "author",
            Self::Category => "category",
        };
        f.write_str(name)
    }
}

/// Supplementary attributes applied only when an entity is first created
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntityAttributes {
    /// Provider-side identifier (NewsAPI `source.id`)
    pub external_id: Option<String>,
}

impl EntityAttributes {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with_external_id(external_id: Option<String>) -> Self {
        Self { external_id }
    }
}

/// A stored source, author or category
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entity {
    pub id: EntityId,
    pub kind: EntityKind,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_tables() {
        assert_eq!(EntityKind::Source.table(), "sources");
        assert_eq!(EntityKind::Author.table(), "authors");
        assert_eq!(EntityKind::Category.table(), "categories");
        assert_eq!(EntityKind::Category.to_string(), "category");
    }
}
