//! PostgreSQL article store
//!
//! Relies on the unique constraints created by `migrations/` for both
//! natural keys: entity `name` and article `url`.

use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use tracing::{debug, info, warn};

use super::{ArticleStore, StoreCounts};
use crate::error::{IngestionError, Result};
use crate::schemas::{
    ArticleRecord, Entity, EntityAttributes, EntityId, EntityKind, StoredArticle, UpsertOutcome,
};

/// Attempts before giving up on a find-or-create that keeps losing races
const FIND_OR_CREATE_ATTEMPTS: u32 = 3;

/// Store backed by a PostgreSQL pool
#[derive(Clone)]
pub struct PgStore {
    db: PgPool,
}

impl PgStore {
    /// Connects and runs pending migrations
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        info!("Connecting to database...");

        let db = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;

        sqlx::migrate!("./migrations").run(&db).await?;

        info!("Storage initialized");
        Ok(Self { db })
    }

    fn insert_entity_sql(kind: EntityKind) -> &'static str {
        match kind {
            EntityKind::Source => {
                "INSERT INTO sources (name, external_id) VALUES ($1, $2) \
                 ON CONFLICT (name) DO NOTHING RETURNING id"
            }
            EntityKind::Author => {
                "INSERT INTO authors (name) VALUES ($1) \
                 ON CONFLICT (name) DO NOTHING RETURNING id"
            }
            EntityKind::Category => {
                "INSERT INTO categories (name) VALUES ($1) \
                 ON CONFLICT (name) DO NOTHING RETURNING id"
            }
        }
    }

    async fn select_entity_id(&self, kind: EntityKind, name: &str) -> Result<Option<EntityId>> {
        let sql = format!("SELECT id FROM {} WHERE name = $1", kind.table());
        let id: Option<EntityId> = sqlx::query_scalar(&sql)
            .bind(name)
            .fetch_optional(&self.db)
            .await?;
        Ok(id)
    }
}

#[async_trait]
impl ArticleStore for PgStore {
    fn backend(&self) -> &'static str {
        "postgres"
    }

    async fn find_entity(&self, kind: EntityKind, name: &str) -> Result<Option<Entity>> {
        let sql = match kind {
            EntityKind::Source => "SELECT id, name, external_id FROM sources WHERE name = $1",
            EntityKind::Author => "SELECT id, name, NULL::TEXT AS external_id FROM authors WHERE name = $1",
            EntityKind::Category => {
                "SELECT id, name, NULL::TEXT AS external_id FROM categories WHERE name = $1"
            }
        };

        let row = sqlx::query(sql).bind(name).fetch_optional(&self.db).await?;
        match row {
            Some(row) => Ok(Some(Entity {
                id: row.try_get("id")?,
                kind,
                name: row.try_get("name")?,
                external_id: row.try_get("external_id")?,
            })),
            None => Ok(None),
        }
    }

    async fn find_or_create_entity(
        &self,
        kind: EntityKind,
        name: &str,
        attributes: &EntityAttributes,
    ) -> Result<EntityId> {
        for attempt in 1..=FIND_OR_CREATE_ATTEMPTS {
            let mut query = sqlx::query_scalar::<_, EntityId>(Self::insert_entity_sql(kind)).bind(name);
            if kind == EntityKind::Source {
                query = query.bind(attributes.external_id.as_deref());
            }

            if let Some(id) = query.fetch_optional(&self.db).await? {
                debug!(kind = %kind, name = %name, id = %id, "Created entity");
                return Ok(id);
            }

            // Lost the insert to an existing row; read the winner
            if let Some(id) = self.select_entity_id(kind, name).await? {
                return Ok(id);
            }

            warn!(
                kind = %kind,
                name = %name,
                attempt = attempt,
                "Entity vanished between insert conflict and re-read, retrying"
            );
        }

        Err(IngestionError::ConnectionLost(format!(
            "could not resolve {} {:?}",
            kind, name
        )))
    }

    async fn entity_names(&self, kind: EntityKind) -> Result<Vec<String>> {
        let sql = format!("SELECT name FROM {} ORDER BY id", kind.table());
        let names: Vec<String> = sqlx::query_scalar(&sql).fetch_all(&self.db).await?;
        Ok(names)
    }

    async fn find_article_by_url(&self, url: &str) -> Result<Option<StoredArticle>> {
        let article = sqlx::query_as::<_, StoredArticle>(
            r#"
            SELECT id, title, description, content, url, image_url, published_at,
                   source_id, author_id, category_id, created_at, updated_at
            FROM articles
            WHERE url = $1
            "#,
        )
        .bind(url)
        .fetch_optional(&self.db)
        .await?;
        Ok(article)
    }

    async fn upsert_article(&self, record: &ArticleRecord) -> Result<UpsertOutcome> {
        // xmax is 0 only for a freshly inserted tuple
        let inserted: bool = sqlx::query_scalar(
            r#"
            INSERT INTO articles (title, description, content, url, image_url, published_at,
                                  source_id, author_id, category_id, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, NOW(), NOW())
            ON CONFLICT (url) DO UPDATE SET
                title = EXCLUDED.title,
                description = EXCLUDED.description,
                content = EXCLUDED.content,
                image_url = EXCLUDED.image_url,
                published_at = EXCLUDED.published_at,
                source_id = EXCLUDED.source_id,
                author_id = EXCLUDED.author_id,
                category_id = EXCLUDED.category_id,
                updated_at = NOW()
            RETURNING (xmax = 0) AS inserted
            "#,
        )
        .bind(&record.title)
        .bind(&record.description)
        .bind(&record.content)
        .bind(&record.url)
        .bind(&record.image_url)
        .bind(record.published_at)
        .bind(record.source_id)
        .bind(record.author_id)
        .bind(record.category_id)
        .fetch_one(&self.db)
        .await?;

        Ok(if inserted {
            UpsertOutcome::Created
        } else {
            UpsertOutcome::Updated
        })
    }

    async fn counts(&self) -> Result<StoreCounts> {
        let row = sqlx::query(
            r#"
            SELECT
                (SELECT COUNT(*) FROM articles) AS articles,
                (SELECT COUNT(*) FROM sources) AS sources,
                (SELECT COUNT(*) FROM authors) AS authors,
                (SELECT COUNT(*) FROM categories) AS categories
            "#,
        )
        .fetch_one(&self.db)
        .await?;

        let count = |column: &str| -> Result<u64> {
            let value: i64 = row.try_get(column)?;
            Ok(value.max(0) as u64)
        };

        Ok(StoreCounts {
            articles: count("articles")?,
            sources: count("sources")?,
            authors: count("authors")?,
            categories: count("categories")?,
        })
    }
}
