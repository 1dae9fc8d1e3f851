//! HTTP Client Module
//!
//! Provides the shared HTTP client every provider connector uses:
//! - Explicit request and connect timeouts
//! - Semaphore-based concurrency limiting
//! - Exponential backoff with jitter for transient failures
//! - JSON decoding with API-error mapping for non-success statuses

use std::sync::Arc;
use std::time::Duration;
use reqwest::{Client, Response, StatusCode};
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use crate::error::{IngestionError, Result};

/// Configuration for the HTTP client
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Maximum concurrent requests across all providers
    pub max_concurrent_requests: usize,
    /// Request timeout
    pub request_timeout: Duration,
    /// Connection timeout
    pub connect_timeout: Duration,
    /// Maximum retries for transient failures
    pub max_retries: u32,
    /// Initial retry delay
    pub initial_retry_delay: Duration,
    /// Maximum retry delay
    pub max_retry_delay: Duration,
    /// User agent string
    pub user_agent: String,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            max_concurrent_requests: 4,
            request_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            max_retries: 2,
            initial_retry_delay: Duration::from_millis(500),
            max_retry_delay: Duration::from_secs(10),
            user_agent: format!("news-aggregator/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Resilient HTTP client with concurrency limiting and retries
pub struct ResilientHttpClient {
    /// Inner reqwest client
    client: Client,
    /// Global concurrency semaphore
    semaphore: Arc<Semaphore>,
    /// Configuration
    config: HttpClientConfig,
}

impl ResilientHttpClient {
    /// Creates a new resilient HTTP client
    pub fn new(config: HttpClientConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .user_agent(&config.user_agent)
            .gzip(true)
            .brotli(true)
            .build()?;

        let semaphore = Arc::new(Semaphore::new(config.max_concurrent_requests.max(1)));

        Ok(Self {
            client,
            semaphore,
            config,
        })
    }

    /// Creates a client with default configuration
    pub fn with_defaults() -> Result<Self> {
        Self::new(HttpClientConfig::default())
    }

    /// Issues a GET with query parameters and decodes the JSON body.
    ///
    /// Non-success statuses become `ApiError` carrying the status and body.
    pub async fn get_json<T>(&self, url: &str, query: &[(&str, String)]) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        let response = self.get(url, query).await?;
        let text = response.text().await?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Issues a GET with query parameters, retrying transient failures
    pub async fn get(&self, url: &str, query: &[(&str, String)]) -> Result<Response> {
        let _permit = self.semaphore.acquire().await
            .map_err(|_| IngestionError::ConnectionLost("Semaphore closed".to_string()))?;

        debug!(url = %url, "Executing HTTP request");

        let mut attempt = 0u32;
        let mut delay = self.config.initial_retry_delay;
        let max_retries = self.config.max_retries;

        loop {
            attempt += 1;

            match self.client.get(url).query(query).send().await {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        debug!(status = %status, attempt = attempt, "Request succeeded");
                        return Ok(response);
                    } else if Self::is_retryable_status(status) && attempt <= max_retries {
                        warn!(
                            url = %url,
                            status = %status,
                            attempt = attempt,
                            max_retries = max_retries,
                            "Retryable error, will retry"
                        );
                        delay = self.backoff(delay).await;
                    } else {
                        let body = response.text().await.unwrap_or_default();
                        return Err(IngestionError::ApiError {
                            code: status.to_string(),
                            message: body,
                        });
                    }
                }
                Err(e) => {
                    if (e.is_timeout() || e.is_connect()) && attempt <= max_retries {
                        warn!(
                            url = %url,
                            error = %e,
                            attempt = attempt,
                            "Transient error, will retry"
                        );
                        delay = self.backoff(delay).await;
                    } else {
                        return Err(IngestionError::HttpError(e));
                    }
                }
            }
        }
    }

    /// Sleeps for `delay` with +/- 50% jitter and returns the next delay
    async fn backoff(&self, delay: Duration) -> Duration {
        let jitter = 0.5 + rand::random::<f64>();
        let jittered_delay = Duration::from_secs_f64(delay.as_secs_f64() * jitter);
        tokio::time::sleep(jittered_delay).await;
        std::cmp::min(delay * 2, self.config.max_retry_delay)
    }

    /// Checks if a status code should trigger a retry
    fn is_retryable_status(status: StatusCode) -> bool {
        matches!(
            status,
            StatusCode::TOO_MANY_REQUESTS |     // 429
            StatusCode::SERVICE_UNAVAILABLE |   // 503
            StatusCode::GATEWAY_TIMEOUT |       // 504
            StatusCode::BAD_GATEWAY |           // 502
            StatusCode::REQUEST_TIMEOUT         // 408
        )
    }

    /// Gets the number of available permits
    pub fn available_permits(&self) -> usize {
        self.semaphore.available_permits()
    }
}
