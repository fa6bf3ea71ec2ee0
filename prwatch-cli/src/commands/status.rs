//! Status command - tracked PRs and API budget

use chrono::Utc;
use clap::Args;
use prwatch_core::{PrTracker, RateLimitInfo, Settings};
use prwatch_github::GitHubClient;

/// Show tracked PR count and GitHub rate limit
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Don't query GitHub
    #[arg(long)]
    offline: bool,
}

impl StatusArgs {
    /// Execute the status command
    pub async fn execute(&self, settings: &Settings) -> anyhow::Result<()> {
        let tracker = PrTracker::open(&settings.state_file);

        println!();
        println!("Repository: {}", settings.github.repo);
        println!("Branches: {}", settings.monitor.branches().join(", "));
        println!("State file: {}", settings.state_file.display());
        println!("Tracked PRs: {}", tracker.seen_count());

        if self.offline {
            return Ok(());
        }

        let github = GitHubClient::from_settings(&settings.github)?;
        match github.rate_limit().await {
            Ok(info) => println!("Rate limit: {}", format_rate_limit(&info)),
            Err(e) => println!("Rate limit: unavailable ({})", e),
        }
        println!();

        Ok(())
    }
}

fn format_rate_limit(info: &RateLimitInfo) -> String {
    let mut out = format!("{}/{} remaining", info.remaining, info.limit);
    if let Some(reset) = info.resets_at {
        let mins = (reset - Utc::now()).num_minutes().max(0);
        out.push_str(&format!(", resets in {mins}m"));
    }
    out
}
