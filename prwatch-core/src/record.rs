//! Merged pull request data as seen by the monitor

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Repository-unique pull request identifier
pub type PrId = u64;

/// Author of a pull request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrAuthor {
    /// Login name
    pub login: String,
    /// Avatar image URL, if the API returned one
    pub avatar_url: Option<String>,
}

/// A merged pull request, fetched fresh each polling cycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestRecord {
    /// Identifier used for duplicate suppression
    pub id: PrId,
    /// PR number shown to humans
    pub number: u64,
    pub title: String,
    pub body: Option<String>,
    pub author: PrAuthor,
    /// Source branch
    pub head_branch: String,
    /// Branch the PR was merged into
    pub base_branch: String,
    pub merged_at: DateTime<Utc>,
    pub additions: u64,
    pub deletions: u64,
    pub changed_files: u64,
    pub commits: u64,
    /// Web URL of the PR
    pub url: String,
}

impl PullRequestRecord {
    /// Whether this PR landed on one of `branches`
    pub fn merged_into_any<S: AsRef<str>>(&self, branches: &[S]) -> bool {
        branches.iter().any(|b| b.as_ref() == self.base_branch)
    }
}
