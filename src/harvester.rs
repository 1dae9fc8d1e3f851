//! Service orchestration
//!
//! Wires configuration into a store, an HTTP client and the connector set,
//! then drives the aggregator once or on a fixed interval until shutdown.

use anyhow::Result;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{error, info, instrument, warn};

use crate::aggregator::{seed_default_categories, AggregateReport, Aggregator, AggregatorOptions};
use crate::config::Config;
use crate::connectors::{Connector, GuardianConnector, NewsApiConnector, NytConnector};
use crate::error::{IngestionError, Result as IngestionResult};
use crate::http_client::ResilientHttpClient;
use crate::storage::{ArticleStore, MemoryStore, PgStore, StoreCounts};

/// Snapshot for the `status` command
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HarvesterStatus {
    pub backend: &'static str,
    pub connectors: Vec<String>,
    pub counts: StoreCounts,
}

pub struct Harvester {
    config: Config,
    correlation_id: String,
    store: Arc<dyn ArticleStore>,
    connectors: Vec<Arc<dyn Connector>>,
}

impl Harvester {
    /// Builds the store and every configured connector
    #[instrument(skip(config, correlation_id), fields(correlation_id = %correlation_id))]
    pub async fn new(config: Config, correlation_id: String) -> Result<Self> {
        info!("Initializing harvester...");

        let store = build_store(&config).await?;
        let http_client = Arc::new(ResilientHttpClient::new(config.http_client_config())?);
        let connectors = build_connectors(&config, http_client);

        if connectors.is_empty() {
            warn!("No provider API keys configured, runs will store nothing");
        }

        Ok(Self::from_parts(config, correlation_id, store, connectors))
    }

    /// Assembles a harvester from already-built parts
    pub fn from_parts(
        config: Config,
        correlation_id: String,
        store: Arc<dyn ArticleStore>,
        connectors: Vec<Arc<dyn Connector>>,
    ) -> Self {
        Self {
            config,
            correlation_id,
            store,
            connectors,
        }
    }

    pub fn store(&self) -> Arc<dyn ArticleStore> {
        self.store.clone()
    }

    /// Ids of the connectors that were built
    pub fn connector_ids(&self) -> Vec<String> {
        self.connectors.iter().map(|c| c.id().to_string()).collect()
    }

    /// Connectors matching `provider`; `None` or `"all"` selects every one
    fn select(&self, provider: Option<&str>) -> IngestionResult<Vec<Arc<dyn Connector>>> {
        match provider {
            None | Some("all") => Ok(self.connectors.clone()),
            Some(id) => {
                let selected: Vec<_> = self
                    .connectors
                    .iter()
                    .filter(|c| c.id() == id)
                    .cloned()
                    .collect();
                if selected.is_empty() {
                    return Err(IngestionError::SourceNotConfigured(id.to_string()));
                }
                Ok(selected)
            }
        }
    }

    /// Runs one aggregation pass
    #[instrument(skip(self), fields(correlation_id = %self.correlation_id))]
    pub async fn run_once(&self, provider: Option<&str>, parallel: bool) -> Result<AggregateReport> {
        let connectors = self.select(provider)?;
        let options = AggregatorOptions {
            parallel: parallel || self.config.parallel_connectors,
        };

        let aggregator = Aggregator::with_options(self.store.clone(), connectors, options);
        Ok(aggregator.aggregate().await)
    }

    /// Runs aggregation every `every` until a shutdown signal arrives.
    ///
    /// A run in progress is allowed to finish; the signal is only observed
    /// between runs.
    #[instrument(skip(self, shutdown), fields(correlation_id = %self.correlation_id))]
    pub async fn run_continuous(
        &self,
        every: Duration,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<()> {
        if every.is_zero() {
            anyhow::bail!("aggregation interval must be non-zero");
        }
        info!(interval = ?every, "Starting continuous aggregation...");

        let mut ticker = interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.run_once(None, false).await {
                        Ok(report) => info!(
                            run_id = %report.run_id,
                            stored = report.total_stored(),
                            failures = report.total_failures(),
                            "Scheduled run complete"
                        ),
                        Err(e) => error!(error = %e, "Scheduled run failed"),
                    }
                }
                _ = shutdown.recv() => {
                    info!("Shutdown received, stopping scheduler");
                    break;
                }
            }
        }

        Ok(())
    }

    /// Inserts the default categories
    pub async fn seed_categories(&self) -> Result<usize> {
        Ok(seed_default_categories(self.store.as_ref()).await?)
    }

    pub async fn status(&self) -> Result<HarvesterStatus> {
        Ok(HarvesterStatus {
            backend: self.store.backend(),
            connectors: self.connector_ids(),
            counts: self.store.counts().await?,
        })
    }
}

/// Postgres when a database URL is configured, otherwise an in-process store
async fn build_store(config: &Config) -> IngestionResult<Arc<dyn ArticleStore>> {
    match config.database_url.as_deref() {
        Some(url) => {
            let store = PgStore::connect(url, config.db_max_connections).await?;
            info!("Postgres store initialized");
            Ok(Arc::new(store))
        }
        None => {
            warn!("No database URL configured - articles are kept in memory only");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

/// Builds each connector independently; one missing key does not disable
/// the others
pub fn build_connectors(config: &Config, client: Arc<ResilientHttpClient>) -> Vec<Arc<dyn Connector>> {
    let mut connectors: Vec<Arc<dyn Connector>> = Vec::new();

    match NewsApiConnector::new(
        client.clone(),
        config.newsapi_key.clone(),
        &config.newsapi_base_url,
        config.page_size,
        config.newsapi_cooldown(),
    ) {
        Ok(connector) => {
            connectors.push(Arc::new(connector));
            info!("NewsAPI connector initialized");
        }
        Err(e) => warn!(error = %e, "NewsAPI connector disabled"),
    }

    match GuardianConnector::new(
        client.clone(),
        config.guardian_api_key.clone(),
        &config.guardian_base_url,
        config.page_size,
    ) {
        Ok(connector) => {
            connectors.push(Arc::new(connector));
            info!("Guardian connector initialized");
        }
        Err(e) => warn!(error = %e, "Guardian connector disabled"),
    }

    match NytConnector::new(client, config.nyt_api_key.clone(), &config.nyt_base_url) {
        Ok(connector) => {
            connectors.push(Arc::new(connector));
            info!("NYT connector initialized");
        }
        Err(e) => warn!(error = %e, "NYT connector disabled"),
    }

    connectors
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> Arc<ResilientHttpClient> {
        Arc::new(ResilientHttpClient::with_defaults().unwrap())
    }

    #[test]
    fn test_missing_keys_disable_only_their_connector() {
        let config = Config {
            guardian_api_key: Some("g".to_string()),
            ..Config::default()
        };
        let connectors = build_connectors(&config, client());
        assert_eq!(connectors.len(), 1);
        assert_eq!(connectors[0].id(), "guardian");
    }

    #[test]
    fn test_all_keys_build_all_connectors() {
        let config = Config {
            newsapi_key: Some("n".to_string()),
            guardian_api_key: Some("g".to_string()),
            nyt_api_key: Some("y".to_string()),
            ..Config::default()
        };
        let ids: Vec<String> = build_connectors(&config, client())
            .iter()
            .map(|c| c.id().to_string())
            .collect();
        assert_eq!(ids, vec!["newsapi", "guardian", "nyt"]);
    }

    #[tokio::test]
    async fn test_unknown_provider_is_rejected() {
        let harvester = Harvester::new(Config::default(), "test".to_string()).await.unwrap();
        assert_eq!(harvester.status().await.unwrap().backend, "memory");
        assert!(harvester.run_once(Some("reuters"), false).await.is_err());
    }

    #[tokio::test]
    async fn test_seed_and_status() {
        let harvester = Harvester::from_parts(
            Config::default(),
            "test".to_string(),
            Arc::new(MemoryStore::new()),
            vec![],
        );
        harvester.seed_categories().await.unwrap();
        let status = harvester.status().await.unwrap();
        assert_eq!(status.counts.categories, 8);
        assert_eq!(status.counts.articles, 0);
        assert!(status.connectors.is_empty());
    }

    #[tokio::test]
    async fn test_zero_interval_is_an_error() {
        let harvester = Harvester::from_parts(
            Config::default(),
            "test".to_string(),
            Arc::new(MemoryStore::new()),
            vec![],
        );
        let (_tx, rx) = broadcast::channel(1);

        let result = harvester.run_continuous(Duration::ZERO, rx).await;
        assert!(result.is_err());
        assert_eq!(harvester.status().await.unwrap().counts.categories, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_continuous_stops_on_shutdown() {
        let harvester = Arc::new(Harvester::from_parts(
            Config::default(),
            "test".to_string(),
            Arc::new(MemoryStore::new()),
            vec![],
        ));
        let (tx, rx) = broadcast::channel(1);

        let task = {
            let harvester = harvester.clone();
            tokio::spawn(async move { harvester.run_continuous(Duration::from_secs(60), rx).await })
        };

        tokio::time::sleep(Duration::from_secs(150)).await;
        tx.send(()).unwrap();

        assert!(task.await.unwrap().is_ok());
        // First tick fires immediately, which seeds the categories
        assert_eq!(harvester.status().await.unwrap().counts.categories, 8);
    }
}
