//! GitHub API client using octocrab

use chrono::{DateTime, Duration, Utc};
use octocrab::Octocrab;
use prwatch_core::config::{GitHubSettings, DEFAULT_LOOKBACK_HOURS};
use prwatch_core::{RateLimitInfo, RepoId};
use tracing::{debug, info};
use url::Url;

use crate::{Error, Result};

/// GitHub API client for a single repository
pub struct GitHubClient {
    client: Octocrab,
    repo: RepoId,
    lookback: Duration,
}

impl GitHubClient {
    /// Create a new GitHub client for the specified repository
    pub fn new(repo: RepoId, token: impl Into<String>, api_url: Option<&Url>) -> Result<Self> {
        let token = token.into();
        if token.trim().is_empty() {
            return Err(Error::Auth("GitHub token is empty".to_string()));
        }

        let mut builder = Octocrab::builder().personal_token(token.trim().to_string());
        if let Some(api) = api_url {
            builder = builder
                .base_uri(api.as_str())
                .map_err(|e| Error::Parse(format!("invalid GITHUB_API_URL: {e}")))?;
        }
        let client = builder
            .build()
            .map_err(|e| Error::Auth(format!("Failed to create GitHub client: {}", e)))?;

        info!(repo = %repo, "Created GitHub client");

        Ok(Self {
            client,
            repo,
            lookback: Duration::hours(DEFAULT_LOOKBACK_HOURS as i64),
        })
    }

    /// Create a client from validated settings
    pub fn from_settings(settings: &GitHubSettings) -> Result<Self> {
        Self::new(
            settings.repo.clone(),
            settings.token.clone(),
            settings.api_url.as_ref(),
        )
    }

    /// Only report PRs merged within this window
    pub fn with_lookback(mut self, lookback: Duration) -> Self {
        self.lookback = lookback;
        self
    }

    /// Get the repository owner
    pub fn owner(&self) -> &str {
        &self.repo.owner
    }

    /// Get the repository name
    pub fn repo(&self) -> &str {
        &self.repo.name
    }

    pub(crate) fn client(&self) -> &Octocrab {
        &self.client
    }

    /// Oldest merge time still reported
    pub(crate) fn merged_since(&self) -> DateTime<Utc> {
        Utc::now() - self.lookback
    }

    pub(crate) fn describe(&self) -> String {
        format!("repository {}", self.repo)
    }

    /// Test the connection by fetching repository info
    pub async fn test_connection(&self) -> Result<()> {
        debug!(repo = %self.repo, "Testing GitHub connection");

        self.client
            .repos(self.owner(), self.repo())
            .get()
            .await
            .map_err(|e| Error::from_octocrab(e, &self.describe()))?;

        info!("GitHub connection successful");
        Ok(())
    }

    /// Current core API request budget
    pub async fn rate_limit(&self) -> Result<RateLimitInfo> {
        let limits = self
            .client
            .ratelimit()
            .get()
            .await
            .map_err(|e| Error::from_octocrab(e, "rate limit"))?;
        let core = limits.resources.core;

        Ok(RateLimitInfo {
            limit: core.limit as u64,
            remaining: core.remaining as u64,
            used: core.used as u64,
            resets_at: DateTime::<Utc>::from_timestamp(core.reset as i64, 0),
        })
    }
}

impl std::fmt::Debug for GitHubClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubClient")
            .field("repo", &self.repo)
            .field("lookback", &self.lookback)
            .finish_non_exhaustive()
    }
}
