//! News Aggregator
//!
//! Pulls articles from NewsAPI, The Guardian and The New York Times,
//! normalizes them into one shape and upserts them by URL, resolving
//! sources, authors and categories on the way in.

pub mod aggregator;
pub mod config;
pub mod connectors;
pub mod error;
pub mod harvester;
pub mod http_client;
pub mod normalize;
pub mod resolver;
pub mod schemas;
pub mod storage;
pub mod writer;

pub use aggregator::{AggregateReport, Aggregator, AggregatorOptions, ConnectorOutcome, RunStatus};
pub use error::{IngestionError, Result};
