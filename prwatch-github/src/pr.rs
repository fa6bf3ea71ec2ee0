//! Merged pull request polling

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use octocrab::models::pulls::PullRequest as OctocrabPR;
use octocrab::params;
use prwatch_core::{PrAuthor, PullRequestRecord, PullRequestSource};
use tracing::{debug, info, warn};

use crate::{Error, GitHubClient, Result};

/// GitHub's page size ceiling
const MAX_PER_PAGE: u8 = 100;

/// Convert an octocrab PR into a record; `None` unless it was merged
pub(crate) fn to_record(pr: &OctocrabPR) -> Option<PullRequestRecord> {
    let merged_at = pr.merged_at?;
    let author = pr
        .user
        .as_ref()
        .map(|u| PrAuthor {
            login: u.login.clone(),
            avatar_url: Some(u.avatar_url.to_string()),
        })
        .unwrap_or_else(|| PrAuthor {
            login: "ghost".to_string(),
            avatar_url: None,
        });

    Some(PullRequestRecord {
        id: pr.id.0,
        number: pr.number,
        title: pr.title.clone().unwrap_or_default(),
        body: pr.body.clone().filter(|b| !b.trim().is_empty()),
        author,
        head_branch: pr.head.ref_field.clone(),
        base_branch: pr.base.ref_field.clone(),
        merged_at,
        additions: pr.additions.unwrap_or(0),
        deletions: pr.deletions.unwrap_or(0),
        changed_files: pr.changed_files.unwrap_or(0),
        commits: pr.commits.unwrap_or(0),
        url: pr
            .html_url
            .as_ref()
            .map(|u| u.to_string())
            .unwrap_or_else(|| pr.url.clone()),
    })
}

/// Keep records merged into `branch` at or after `since`
pub(crate) fn retain_merged(
    records: Vec<PullRequestRecord>,
    branch: &str,
    since: DateTime<Utc>,
) -> Vec<PullRequestRecord> {
    records
        .into_iter()
        .filter(|r| r.base_branch == branch && r.merged_at >= since)
        .collect()
}

/// De-duplicate by id, order most recent first, cap at `limit`
pub(crate) fn newest_first(
    records: Vec<PullRequestRecord>,
    limit: usize,
) -> Vec<PullRequestRecord> {
    let mut seen = HashSet::new();
    let mut out: Vec<PullRequestRecord> = records
        .into_iter()
        .filter(|r| seen.insert(r.id))
        .collect();
    out.sort_by(|a, b| b.merged_at.cmp(&a.merged_at));
    out.truncate(limit);
    out
}

impl GitHubClient {
    /// Get a pull request by number
    pub async fn get_pr(&self, number: u64) -> Result<OctocrabPR> {
        debug!(number, "Fetching pull request");

        self.client()
            .pulls(self.owner(), self.repo())
            .get(number)
            .await
            .map_err(|e| Error::from_octocrab(e, &format!("pull request #{number}")))
    }

    /// Recently merged PRs targeting `branch`, at most `limit`
    ///
    /// Lists a full page of closed PRs by last update, keeps the merged ones
    /// inside the lookback window, then fetches each one's detail for diff
    /// statistics. Closed-but-unmerged PRs share the listing, so `limit` only
    /// applies after filtering.
    pub async fn merged_prs_for_branch(
        &self,
        branch: &str,
        limit: usize,
    ) -> Result<Vec<PullRequestRecord>> {
        debug!(branch, per_page = MAX_PER_PAGE, "Listing closed pull requests");

        let page = self
            .client()
            .pulls(self.owner(), self.repo())
            .list()
            .state(params::State::Closed)
            .base(branch)
            .sort(params::pulls::Sort::Updated)
            .direction(params::Direction::Descending)
            .per_page(MAX_PER_PAGE)
            .send()
            .await
            .map_err(|e| Error::from_octocrab(e, &self.describe()))?;

        let listed: Vec<PullRequestRecord> = page.items.iter().filter_map(to_record).collect();
        let merged = newest_first(retain_merged(listed, branch, self.merged_since()), limit);

        let mut detailed = Vec::with_capacity(merged.len());
        for record in merged {
            detailed.push(self.with_stats(record).await);
        }

        debug!(branch, count = detailed.len(), "Found merged pull requests");
        Ok(detailed)
    }

    /// Refill diff statistics from the detail endpoint
    ///
    /// The list endpoint omits them; a failed lookup keeps the listed record.
    async fn with_stats(&self, record: PullRequestRecord) -> PullRequestRecord {
        match self.get_pr(record.number).await {
            Ok(detail) => to_record(&detail).unwrap_or(record),
            Err(e) => {
                warn!(number = record.number, error = %e, "Failed to fetch PR details");
                record
            }
        }
    }

    /// Merged PRs across `branches`, most recent first, at most `limit`
    pub async fn fetch_recent_merged(
        &self,
        branches: &[String],
        limit: usize,
    ) -> Result<Vec<PullRequestRecord>> {
        let mut all = Vec::new();
        for branch in branches {
            all.extend(self.merged_prs_for_branch(branch, limit).await?);
        }
        let result = newest_first(all, limit);

        info!(
            count = result.len(),
            branches = branches.len(),
            "Fetched merged pull requests"
        );
        Ok(result)
    }
}

#[async_trait]
impl PullRequestSource for GitHubClient {
    async fn fetch_recent_merged_prs(
        &self,
        branches: &[String],
        limit: usize,
    ) -> prwatch_core::Result<Vec<PullRequestRecord>> {
        Ok(self.fetch_recent_merged(branches, limit).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_server::TestServer;
    use chrono::{Duration, TimeZone};
    use serde_json::{json, Value};

    const PULLS: &str = "/repos/acme/widgets/pulls";

    fn at(hours_ago: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap() - Duration::hours(hours_ago)
    }

    fn record(id: u64, base: &str, hours_ago: i64) -> PullRequestRecord {
        PullRequestRecord {
            id,
            number: id,
            title: format!("PR {id}"),
            body: None,
            author: PrAuthor {
                login: "octocat".into(),
                avatar_url: None,
            },
            head_branch: "feature".into(),
            base_branch: base.into(),
            merged_at: at(hours_ago),
            additions: 0,
            deletions: 0,
            changed_files: 0,
            commits: 0,
            url: format!("https://github.com/acme/widgets/pull/{id}"),
        }
    }

    #[test]
    fn test_retain_merged_filters_branch_and_window() {
        let records = vec![
            record(1, "staging", 1),
            record(2, "main", 1),
            record(3, "staging", 30),
        ];
        let kept = retain_merged(records, "staging", at(24));
        assert_eq!(kept.iter().map(|r| r.id).collect::<Vec<_>>(), vec![1]);
    }

    #[test]
    fn test_newest_first_merges_branches() {
        let records = vec![
            record(1, "staging", 5),
            record(2, "staging", 1),
            record(3, "main", 3),
            record(2, "staging", 1),
            record(4, "main", 0),
        ];
        let out = newest_first(records, 3);
        assert_eq!(out.iter().map(|r| r.id).collect::<Vec<_>>(), vec![4, 2, 3]);
    }

    #[test]
    fn test_newest_first_respects_limit() {
        let records = (1..=5).map(|i| record(i, "staging", i as i64)).collect();
        assert_eq!(newest_first(records, 2).len(), 2);
    }

    /// A closed PR as the list endpoint returns it
    fn listed(number: u64, base: &str, merged_hours_ago: Option<i64>) -> Value {
        json!({
            "url": format!("https://api.github.com{PULLS}/{number}"),
            "id": 1000 + number,
            "number": number,
            "title": format!("PR {number}"),
            "html_url": format!("https://github.com/acme/widgets/pull/{number}"),
            "merged_at": merged_hours_ago.map(|h| (Utc::now() - Duration::hours(h)).to_rfc3339()),
            "head": { "ref": "feature", "sha": "1111111" },
            "base": { "ref": base, "sha": "2222222" },
        })
    }

    fn route(path: &str, status: u16, body: Value) -> (String, u16, String) {
        (path.to_string(), status, body.to_string())
    }

    fn numbers(records: &[PullRequestRecord]) -> Vec<u64> {
        records.iter().map(|r| r.number).collect()
    }

    #[tokio::test]
    async fn test_unmerged_prs_do_not_crowd_out_merged_ones() {
        let page = json!([
            listed(1, "staging", None),
            listed(2, "staging", None),
            listed(3, "staging", Some(3)),
            listed(4, "staging", Some(2)),
            listed(5, "staging", Some(1)),
        ]);
        let server = TestServer::start(vec![route(PULLS, 200, page)]).await;

        let prs = server
            .client()
            .fetch_recent_merged(&["staging".to_string()], 2)
            .await
            .unwrap();

        assert_eq!(numbers(&prs), vec![5, 4]);
        let list = &server.requests()[0];
        assert!(list.starts_with(PULLS), "{list}");
        assert!(list.contains("state=closed"), "{list}");
        assert!(list.contains("base=staging"), "{list}");
        assert!(list.contains("per_page=100"), "{list}");
    }

    #[tokio::test]
    async fn test_detail_stats_and_fallback() {
        let page = json!([
            listed(7, "staging", Some(1)),
            listed(8, "staging", Some(2)),
            listed(9, "staging", Some(48)),
        ]);
        let mut detail = listed(7, "staging", Some(1));
        detail["additions"] = json!(120);
        detail["deletions"] = json!(30);
        detail["changed_files"] = json!(4);
        detail["commits"] = json!(3);
        let server = TestServer::start(vec![
            route(PULLS, 200, page),
            route(&format!("{PULLS}/7"), 200, detail),
        ])
        .await;

        let prs = server
            .client()
            .fetch_recent_merged(&["staging".to_string()], 10)
            .await
            .unwrap();

        // #9 is outside the lookback window; #8's detail lookup 404s
        assert_eq!(numbers(&prs), vec![7, 8]);
        assert_eq!(
            (prs[0].additions, prs[0].deletions, prs[0].changed_files, prs[0].commits),
            (120, 30, 4, 3)
        );
        assert_eq!((prs[1].additions, prs[1].commits), (0, 0));
        assert_eq!(prs[1].url, "https://github.com/acme/widgets/pull/8");

        let requests = server.requests();
        assert!(requests.iter().any(|r| r == &format!("{PULLS}/8")));
        assert!(!requests.iter().any(|r| r == &format!("{PULLS}/9")));
    }

    #[tokio::test]
    async fn test_details_fetched_only_within_limit() {
        let page = json!([
            listed(1, "staging", Some(1)),
            listed(2, "staging", Some(2)),
            listed(3, "staging", Some(3)),
        ]);
        let server = TestServer::start(vec![route(PULLS, 200, page)]).await;

        let prs = server
            .client()
            .merged_prs_for_branch("staging", 1)
            .await
            .unwrap();

        assert_eq!(numbers(&prs), vec![1]);
        assert_eq!(server.requests().len(), 2);
    }

    #[tokio::test]
    async fn test_source_maps_list_failures() {
        let server = TestServer::start(vec![route(
            PULLS,
            403,
            json!({ "message": "API rate limit exceeded for 127.0.0.1." }),
        )])
        .await;
        let err = server
            .client()
            .fetch_recent_merged_prs(&["staging".to_string()], 5)
            .await
            .unwrap_err();
        assert!(matches!(err, prwatch_core::Error::RateLimited(_)), "{err:?}");

        let server = TestServer::start(vec![route(
            PULLS,
            429,
            json!({ "message": "Too many requests" }),
        )])
        .await;
        let err = server
            .client()
            .fetch_recent_merged_prs(&["staging".to_string()], 5)
            .await
            .unwrap_err();
        assert!(matches!(err, prwatch_core::Error::RateLimited(_)), "{err:?}");

        let server = TestServer::start(Vec::new()).await;
        let err = server
            .client()
            .fetch_recent_merged_prs(&["staging".to_string()], 5)
            .await
            .unwrap_err();
        assert!(matches!(err, prwatch_core::Error::Access(_)), "{err:?}");
    }
}
