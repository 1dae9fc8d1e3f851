//! Error types for the News Aggregator

use thiserror::Error;

#[derive(Error, Debug)]
pub enum IngestionError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("JSON parsing failed: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    MigrationError(#[from] sqlx::migrate::MigrateError),

    #[error("Configuration error: {0}")]
    ConfigError(#[from] config::ConfigError),

    #[error("API error: {code} - {message}")]
    ApiError {
        code: String,
        message: String,
    },

    #[error("Malformed {provider} record: {reason}")]
    MalformedRecord {
        provider: String,
        reason: String,
    },

    #[error("Invalid published timestamp: {0:?}")]
    InvalidTimestamp(String),

    #[error("Invalid data: {0}")]
    ValidationError(String),

    #[error("Connection lost: {0}")]
    ConnectionLost(String),

    #[error("Source not configured: {0}")]
    SourceNotConfigured(String),
}

impl IngestionError {
    /// Builds a record-level failure for one provider
    pub fn malformed(provider: &str, reason: impl Into<String>) -> Self {
        Self::MalformedRecord {
            provider: provider.to_string(),
            reason: reason.into(),
        }
    }

    /// True for failures that only affect a single record
    pub fn is_record_level(&self) -> bool {
        matches!(
            self,
            Self::MalformedRecord { .. } | Self::InvalidTimestamp(_) | Self::ValidationError(_)
        )
    }
}

impl From<validator::ValidationErrors> for IngestionError {
    fn from(errors: validator::ValidationErrors) -> Self {
        Self::ValidationError(errors.to_string())
    }
}

pub type Result<T> = std::result::Result<T, IngestionError>;
