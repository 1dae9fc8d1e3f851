//! Aggregator
//!
//! Runs every connector, then normalizes, resolves and upserts each raw
//! record it returns. A failing provider or a malformed record only reduces
//! that provider's yield; `aggregate` itself cannot fail.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::connectors::{Connector, FetchContext, RawArticle};
use crate::error::Result;
use crate::resolver::EntityResolver;
use crate::schemas::{EntityAttributes, EntityKind, UpsertOutcome, DEFAULT_CATEGORIES};
use crate::storage::ArticleStore;
use crate::writer::UpsertWriter;

/// Options for one aggregation run
#[derive(Debug, Clone, Default)]
pub struct AggregatorOptions {
    /// Run connectors concurrently instead of one after another
    pub parallel: bool,
}

/// Overall result for one connector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    /// Every query and record succeeded
    Success,
    /// Some queries or records failed
    Partial,
    /// Nothing could be fetched
    Failed,
}

/// Per-connector outcome of a run
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectorOutcome {
    pub connector: String,
    pub status: RunStatus,
    /// Raw records returned by the provider
    pub fetched: usize,
    pub created: usize,
    pub updated: usize,
    /// Records dropped as malformed or unstorable
    pub skipped: usize,
    /// Queries that returned nothing because the request failed
    pub failed_queries: usize,
    /// Failure events logged for this connector
    pub failures: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl ConnectorOutcome {
    fn new(connector: &str) -> Self {
        Self {
            connector: connector.to_string(),
            status: RunStatus::Success,
            fetched: 0,
            created: 0,
            updated: 0,
            skipped: 0,
            failed_queries: 0,
            failures: 0,
            last_error: None,
        }
    }

    fn record_failure(&mut self, error: String) {
        self.failures += 1;
        self.last_error = Some(error);
    }

    /// Articles written (created or updated)
    pub fn stored(&self) -> usize {
        self.created + self.updated
    }

    fn finish(mut self, fetch_failed: bool) -> Self {
        self.status = if fetch_failed || (self.fetched == 0 && self.failed_queries > 0) {
            RunStatus::Failed
        } else if self.failures > 0 {
            RunStatus::Partial
        } else {
            RunStatus::Success
        };
        self
    }
}

/// Summary of one `aggregate` call
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub outcomes: Vec<ConnectorOutcome>,
}

impl AggregateReport {
    pub fn total_stored(&self) -> usize {
        self.outcomes.iter().map(ConnectorOutcome::stored).sum()
    }

    pub fn total_failures(&self) -> usize {
        self.outcomes.iter().map(|o| o.failures).sum()
    }

    pub fn outcome(&self, connector: &str) -> Option<&ConnectorOutcome> {
        self.outcomes.iter().find(|o| o.connector == connector)
    }
}

/// Orchestrates the connector list against one store
pub struct Aggregator {
    connectors: Vec<Arc<dyn Connector>>,
    store: Arc<dyn ArticleStore>,
    resolver: EntityResolver,
    writer: UpsertWriter,
    options: AggregatorOptions,
}

impl Aggregator {
    pub fn new(store: Arc<dyn ArticleStore>, connectors: Vec<Arc<dyn Connector>>) -> Self {
        Self::with_options(store, connectors, AggregatorOptions::default())
    }

    pub fn with_options(
        store: Arc<dyn ArticleStore>,
        connectors: Vec<Arc<dyn Connector>>,
        options: AggregatorOptions,
    ) -> Self {
        Self {
            resolver: EntityResolver::new(store.clone()),
            writer: UpsertWriter::new(store.clone()),
            connectors,
            store,
            options,
        }
    }

    /// Runs every connector once; always completes
    #[instrument(skip(self), fields(connectors = self.connectors.len(), parallel = self.options.parallel))]
    pub async fn aggregate(&self) -> AggregateReport {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        info!(run_id = %run_id, "Starting aggregation run");

        let ctx = FetchContext {
            categories: self.seeded_categories().await,
        };

        let outcomes = if self.options.parallel {
            futures::future::join_all(
                self.connectors
                    .iter()
                    .map(|connector| self.run_connector(connector.as_ref(), &ctx)),
            )
            .await
        } else {
            let mut outcomes = Vec::with_capacity(self.connectors.len());
            for connector in &self.connectors {
                outcomes.push(self.run_connector(connector.as_ref(), &ctx).await);
            }
            outcomes
        };

        let report = AggregateReport {
            run_id,
            started_at,
            finished_at: Utc::now(),
            outcomes,
        };

        info!(
            run_id = %run_id,
            stored = report.total_stored(),
            failures = report.total_failures(),
            "Aggregation run finished"
        );

        report
    }

    /// Category names that drive per-category queries, seeding the defaults
    /// into a store that has none of them.
    ///
    /// Only the canonical seed set is queried; categories created from
    /// provider labels (Guardian pillars, NYT sections) never become search
    /// terms.
    async fn seeded_categories(&self) -> Vec<String> {
        let stored = self
            .store
            .entity_names(EntityKind::Category)
            .await
            .map(|names| {
                names
                    .into_iter()
                    .filter(|name| DEFAULT_CATEGORIES.contains(&name.as_str()))
                    .collect::<Vec<_>>()
            });

        match stored {
            Ok(names) if !names.is_empty() => names,
            Ok(_) => match seed_default_categories(self.store.as_ref()).await {
                Ok(_) => DEFAULT_CATEGORIES.iter().map(|c| c.to_string()).collect(),
                Err(e) => {
                    warn!(error = %e, "Seeding categories failed, querying defaults unseeded");
                    DEFAULT_CATEGORIES.iter().map(|c| c.to_string()).collect()
                }
            },
            Err(e) => {
                warn!(error = %e, "Loading categories failed, falling back to defaults");
                DEFAULT_CATEGORIES.iter().map(|c| c.to_string()).collect()
            }
        }
    }

    async fn run_connector(&self, connector: &dyn Connector, ctx: &FetchContext) -> ConnectorOutcome {
        let mut outcome = ConnectorOutcome::new(connector.id());

        let batch = match connector.fetch_articles(ctx).await {
            Ok(batch) => batch,
            Err(e) => {
                error!(provider = %connector.id(), error = %e, "Fetch failed");
                outcome.record_failure(e.to_string());
                return outcome.finish(true);
            }
        };

        outcome.fetched = batch.records.len();
        outcome.failed_queries = batch.failed_queries.len();
        for failure in &batch.failed_queries {
            outcome.record_failure(failure.error.clone());
        }

        for raw in &batch.records {
            match self.store_record(connector, raw).await {
                Ok(UpsertOutcome::Created) => outcome.created += 1,
                Ok(UpsertOutcome::Updated) => outcome.updated += 1,
                Err(e) => {
                    error!(
                        provider = %connector.id(),
                        record = %raw.hint(),
                        query = ?raw.query,
                        record_level = e.is_record_level(),
                        error = %e,
                        "Skipping record"
                    );
                    outcome.skipped += 1;
                    outcome.record_failure(e.to_string());
                }
            }
        }

        info!(
            provider = %connector.id(),
            fetched = outcome.fetched,
            created = outcome.created,
            updated = outcome.updated,
            skipped = outcome.skipped,
            failed_queries = outcome.failed_queries,
            "Connector finished"
        );

        outcome.finish(false)
    }

    /// normalize → date check → resolve → upsert, for one record
    async fn store_record(&self, connector: &dyn Connector, raw: &RawArticle) -> Result<UpsertOutcome> {
        let article = connector.normalize(raw)?;
        // Fail bad dates before any entity row is created for them
        UpsertWriter::check(&article)?;
        let entities = self.resolver.resolve_article(&article).await?;
        self.writer
            .upsert(&article, entities.source_id, entities.author_id, entities.category_id)
            .await
    }
}

/// Inserts the default category set; existing names are left alone.
/// Returns the number of categories now guaranteed present.
pub async fn seed_default_categories(store: &dyn ArticleStore) -> Result<usize> {
    for name in DEFAULT_CATEGORIES {
        store
            .find_or_create_entity(EntityKind::Category, name, &EntityAttributes::none())
            .await?;
    }
    info!(count = DEFAULT_CATEGORIES.len(), "Default categories seeded");
    Ok(DEFAULT_CATEGORIES.len())
}
