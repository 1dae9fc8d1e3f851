//! News Aggregator Service
//! Periodic article aggregation from NewsAPI, The Guardian and The New York Times
//!
//! Features:
//! - Per-provider failure isolation
//! - Find-or-create of sources, authors and categories
//! - Upsert by canonical URL, safe to re-run
//! - Retry with jitter and semaphore-based concurrency limiting
//! - Postgres storage with embedded migrations (in-memory fallback)
//! - Graceful shutdown with SIGTERM handling
//! - Correlation IDs for distributed tracing

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::time::Duration;
use tokio::signal;
use tokio::sync::broadcast;
use tracing::{error, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use news_aggregator::aggregator::AggregateReport;
use news_aggregator::config::Config;
use news_aggregator::harvester::Harvester;

/// News Aggregator - article harvesting from public news APIs
#[derive(Parser, Debug)]
#[command(name = "news-aggregator")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Aggregates articles from NewsAPI, The Guardian and The New York Times")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info", global = true)]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, default_value = "false", global = true)]
    json_logs: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run one aggregation pass and exit
    Fetch {
        /// Provider to fetch from (newsapi, guardian, nyt, all)
        #[arg(short, long, default_value = "all")]
        provider: String,

        /// Output format (json, summary)
        #[arg(short, long, default_value = "summary")]
        output: String,

        /// Run connectors concurrently
        #[arg(long)]
        parallel: bool,
    },

    /// Aggregate on a fixed interval until stopped
    Run {
        /// Interval between runs (e.g. "1h", "30m"); defaults to FETCH_INTERVAL_SECS
        #[arg(short, long, value_parser = parse_interval)]
        interval: Option<Duration>,
    },

    /// Insert the default categories
    Seed,

    /// Show configured providers and stored row counts
    Status,
}

/// Parses a humantime interval, rejecting zero
fn parse_interval(value: &str) -> std::result::Result<Duration, String> {
    let interval = humantime::parse_duration(value).map_err(|e| e.to_string())?;
    if interval.is_zero() {
        return Err("interval must be greater than zero".to_string());
    }
    Ok(interval)
}

/// Generates a new correlation ID for the session
fn generate_correlation_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Sets up structured logging with tracing
fn setup_logging(log_level: &str, json_output: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    if json_output {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_thread_ids(true))
            .init();
    }
}

/// Handles graceful shutdown on SIGTERM/SIGINT
async fn shutdown_signal(shutdown_tx: broadcast::Sender<()>) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown...");
        }
    }

    let _ = shutdown_tx.send(());
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(&cli.log_level, cli.json_logs);

    let correlation_id = generate_correlation_id();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        correlation_id = %correlation_id,
        "Starting News Aggregator"
    );

    let config = Config::load()?;
    config.validate()?;

    info!(
        database = config.database_url.is_some(),
        newsapi = config.has_newsapi(),
        guardian = config.has_guardian(),
        nyt = config.has_nyt(),
        max_concurrent = config.max_concurrent_requests,
        "Configuration loaded"
    );

    match cli.command {
        Commands::Fetch {
            provider,
            output,
            parallel,
        } => {
            fetch_once(config, correlation_id, &provider, &output, parallel).await?;
        }

        Commands::Run { interval } => {
            run_daemon(config, correlation_id, interval).await?;
        }

        Commands::Seed => {
            let harvester = Harvester::new(config, correlation_id).await?;
            let count = harvester.seed_categories().await?;
            println!("Seeded {} categories", count);
        }

        Commands::Status => {
            show_status(config, correlation_id).await?;
        }
    }

    Ok(())
}

/// Runs the scheduler until a shutdown signal
async fn run_daemon(config: Config, correlation_id: String, every: Option<Duration>) -> Result<()> {
    let every = every.unwrap_or_else(|| config.fetch_interval());
    let harvester = Harvester::new(config, correlation_id).await?;

    let (shutdown_tx, shutdown_rx) = broadcast::channel::<()>(1);
    tokio::spawn(shutdown_signal(shutdown_tx));

    info!(interval = %humantime::format_duration(every), "Running in daemon mode");
    if let Err(e) = harvester.run_continuous(every, shutdown_rx).await {
        error!(error = %e, "Scheduler failed");
        return Err(e);
    }

    info!("News Aggregator stopped");
    Ok(())
}

/// Runs a single aggregation pass from the command line
async fn fetch_once(
    config: Config,
    correlation_id: String,
    provider: &str,
    output_format: &str,
    parallel: bool,
) -> Result<()> {
    info!(provider = %provider, parallel, "Starting fetch");

    let harvester = Harvester::new(config, correlation_id).await?;
    let report = harvester.run_once(Some(provider), parallel).await?;

    match output_format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        _ => print_summary(&report),
    }

    Ok(())
}

fn print_summary(report: &AggregateReport) {
    println!("\nAggregation Summary");
    println!("===================");
    println!("Run:      {}", report.run_id);
    println!(
        "Duration: {}",
        humantime::format_duration(
            (report.finished_at - report.started_at)
                .to_std()
                .unwrap_or_default()
        )
    );

    println!(
        "\n{:<10} {:<8} {:>7} {:>7} {:>7} {:>7} {:>8}",
        "Provider", "Status", "Fetched", "Created", "Updated", "Skipped", "Failures"
    );
    println!("{}", "-".repeat(62));
    for outcome in &report.outcomes {
        println!(
            "{:<10} {:<8} {:>7} {:>7} {:>7} {:>7} {:>8}",
            outcome.connector,
            format!("{:?}", outcome.status),
            outcome.fetched,
            outcome.created,
            outcome.updated,
            outcome.skipped,
            outcome.failures
        );
        if let Some(ref err) = outcome.last_error {
            println!("  last error: {}", err);
        }
    }

    println!("\nStored: {} articles", report.total_stored());
}

/// Shows configured providers and row counts
async fn show_status(config: Config, correlation_id: String) -> Result<()> {
    println!("\nNews Aggregator Status");
    println!("======================\n");

    println!("Configured Providers:");
    println!("  - NewsAPI:  {}", if config.has_newsapi() { "yes" } else { "no (no API key)" });
    println!("  - Guardian: {}", if config.has_guardian() { "yes" } else { "no (no API key)" });
    println!("  - NYT:      {}", if config.has_nyt() { "yes" } else { "no (no API key)" });
    println!("  - Interval: {}", humantime::format_duration(config.fetch_interval()));

    let harvester = Harvester::new(config, correlation_id).await?;
    let status = harvester.status().await?;

    println!("\nStorage:");
    println!("  Backend:    {}", status.backend);
    println!("  Articles:   {}", status.counts.articles);
    println!("  Sources:    {}", status.counts.sources);
    println!("  Authors:    {}", status.counts.authors);
    println!("  Categories: {}", status.counts.categories);

    Ok(())
}
