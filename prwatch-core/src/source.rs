//! Abstractions over the hosting API and the notification sink

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::record::PullRequestRecord;
use crate::Result;

/// Source of merged pull requests
#[async_trait]
pub trait PullRequestSource: Send + Sync {
    /// Pull requests merged into any of `branches`, most recent first, at most `limit`
    ///
    /// Fails with [`crate::Error::Access`] when the repository is missing or the
    /// credential lacks access, and [`crate::Error::RateLimited`] when throttled.
    async fn fetch_recent_merged_prs(
        &self,
        branches: &[String],
        limit: usize,
    ) -> Result<Vec<PullRequestRecord>>;
}

/// Result of a single delivery attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered,
    Failed { reason: String },
}

impl DeliveryOutcome {
    pub fn failed(reason: impl Into<String>) -> Self {
        DeliveryOutcome::Failed {
            reason: reason.into(),
        }
    }

    pub fn is_delivered(&self) -> bool {
        matches!(self, DeliveryOutcome::Delivered)
    }
}

/// Sink for merged-PR notifications
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver one notification; never errors, failures are reported in the outcome
    async fn notify(&self, record: &PullRequestRecord) -> DeliveryOutcome;
}

/// Snapshot of the hosting API's request budget
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitInfo {
    pub limit: u64,
    pub remaining: u64,
    pub used: u64,
    pub resets_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delivery_outcome() {
        assert!(DeliveryOutcome::Delivered.is_delivered());
        let failed = DeliveryOutcome::failed("HTTP 500");
        assert!(!failed.is_delivered());
        assert_eq!(
            failed,
            DeliveryOutcome::Failed {
                reason: "HTTP 500".to_string()
            }
        );
    }
}
