//! Configuration for the News Aggregator

use anyhow::Result;
use serde::Deserialize;
use std::time::Duration;

use crate::http_client::HttpClientConfig;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    // Database
    pub database_url: Option<String>,
    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,

    // NewsAPI
    pub newsapi_key: Option<String>,
    #[serde(default = "default_newsapi_base_url")]
    pub newsapi_base_url: String,
    /// Pause between per-category NewsAPI requests (milliseconds)
    #[serde(default = "default_newsapi_cooldown")]
    pub newsapi_cooldown_ms: u64,

    // The Guardian
    pub guardian_api_key: Option<String>,
    #[serde(default = "default_guardian_base_url")]
    pub guardian_base_url: String,

    // The New York Times
    pub nyt_api_key: Option<String>,
    #[serde(default = "default_nyt_base_url")]
    pub nyt_base_url: String,

    /// Articles requested per provider query
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    // HTTP
    #[serde(default = "default_max_concurrent_requests")]
    pub max_concurrent_requests: usize,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub http_max_retries: u32,

    // Scheduling
    #[serde(default = "default_fetch_interval")]
    pub fetch_interval_secs: u64,
    #[serde(default)]
    pub parallel_connectors: bool,
}

fn default_db_max_connections() -> u32 {
    5
}

fn default_newsapi_base_url() -> String {
    "https://newsapi.org/v2".to_string()
}

fn default_newsapi_cooldown() -> u64 {
    2000 // NewsAPI free tier: 100 requests/day
}

fn default_guardian_base_url() -> String {
    "https://content.guardianapis.com".to_string()
}

fn default_nyt_base_url() -> String {
    "https://api.nytimes.com/svc/topstories/v2/home.json".to_string()
}

fn default_page_size() -> u32 {
    10
}

fn default_max_concurrent_requests() -> usize {
    4
}

fn default_request_timeout() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    2
}

fn default_fetch_interval() -> u64 {
    3600 // hourly
}

impl Config {
    pub fn load() -> Result<Self> {
        // Load .env file
        dotenvy::dotenv().ok();

        // Build config from environment
        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .separator("__")
                    .try_parsing(true)
            )
            .build()?;

        let cfg: Config = config.try_deserialize()?;
        Ok(cfg)
    }

    /// Validates the configuration
    pub fn validate(&self) -> Result<()> {
        if self.page_size == 0 || self.page_size > 100 {
            anyhow::bail!("PAGE_SIZE must be between 1 and 100, got {}", self.page_size);
        }
        if self.request_timeout_secs == 0 {
            anyhow::bail!("REQUEST_TIMEOUT_SECS must be positive");
        }
        if self.fetch_interval_secs == 0 {
            anyhow::bail!("FETCH_INTERVAL_SECS must be positive");
        }
        Ok(())
    }

    /// Checks if NewsAPI is configured
    pub fn has_newsapi(&self) -> bool {
        self.newsapi_key.is_some()
    }

    /// Checks if The Guardian is configured
    pub fn has_guardian(&self) -> bool {
        self.guardian_api_key.is_some()
    }

    /// Checks if The New York Times is configured
    pub fn has_nyt(&self) -> bool {
        self.nyt_api_key.is_some()
    }

    pub fn newsapi_cooldown(&self) -> Duration {
        Duration::from_millis(self.newsapi_cooldown_ms)
    }

    pub fn fetch_interval(&self) -> Duration {
        Duration::from_secs(self.fetch_interval_secs)
    }

    /// HTTP client settings derived from this configuration
    pub fn http_client_config(&self) -> HttpClientConfig {
        HttpClientConfig {
            max_concurrent_requests: self.max_concurrent_requests,
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            max_retries: self.http_max_retries,
            ..Default::default()
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: None,
            db_max_connections: default_db_max_connections(),
            newsapi_key: None,
            newsapi_base_url: default_newsapi_base_url(),
            newsapi_cooldown_ms: default_newsapi_cooldown(),
            guardian_api_key: None,
            guardian_base_url: default_guardian_base_url(),
            nyt_api_key: None,
            nyt_base_url: default_nyt_base_url(),
            page_size: default_page_size(),
            max_concurrent_requests: default_max_concurrent_requests(),
            request_timeout_secs: default_request_timeout(),
            http_max_retries: default_max_retries(),
            fetch_interval_secs: default_fetch_interval(),
            parallel_connectors: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let config = Config::default();

        assert_eq!(config.newsapi_base_url, "https://newsapi.org/v2");
        assert_eq!(config.guardian_base_url, "https://content.guardianapis.com");
        assert_eq!(config.newsapi_cooldown(), Duration::from_secs(2));
        assert_eq!(config.page_size, 10);
        assert!(!config.has_newsapi());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_deserialize_from_source() {
        let source = config::Config::builder()
            .set_override("newsapi_key", "abc")
            .unwrap()
            .set_override("newsapi_cooldown_ms", 0)
            .unwrap()
            .set_override("page_size", 25)
            .unwrap()
            .build()
            .unwrap();

        let config: Config = source.try_deserialize().unwrap();
        assert!(config.has_newsapi());
        assert!(!config.has_guardian());
        assert_eq!(config.newsapi_cooldown(), Duration::ZERO);
        assert_eq!(config.page_size, 25);
        assert_eq!(config.nyt_base_url, default_nyt_base_url());
    }

    #[test]
    fn test_invalid_page_size() {
        let config = Config {
            page_size: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_fetch_interval_rejected() {
        let config = Config {
            fetch_interval_secs: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_http_client_config() {
        let config = Config {
            request_timeout_secs: 5,
            http_max_retries: 0,
            ..Config::default()
        };
        let http = config.http_client_config();
        assert_eq!(http.request_timeout, Duration::from_secs(5));
        assert_eq!(http.max_retries, 0);
    }
}
