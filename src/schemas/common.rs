//! Common Schema Primitives
//!
//! Shared types used across all schemas

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Normalized timestamp stored for every article
pub type Timestamp = DateTime<Utc>;

/// Result of writing one article
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum UpsertOutcome {
    /// First sighting of the URL
    Created,
    /// URL already stored; mutable fields overwritten
    Updated,
}

impl UpsertOutcome {
    pub fn is_created(self) -> bool {
        matches!(self, Self::Created)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_serialization() {
        let json = serde_json::to_string(&UpsertOutcome::Created).unwrap();
        assert_eq!(json, "\"created\"");
        assert!(UpsertOutcome::Created.is_created());
        assert!(!UpsertOutcome::Updated.is_created());
    }
}
