//! Check command - verify both ends before deploying

use clap::Args;
use prwatch_core::Settings;
use prwatch_discord::DiscordNotifier;
use prwatch_github::GitHubClient;

/// Verify GitHub access and webhook delivery
#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Skip sending the webhook test message
    #[arg(long)]
    no_webhook: bool,
}

impl CheckArgs {
    /// Execute the check command
    pub async fn execute(&self, settings: &Settings) -> anyhow::Result<()> {
        let mut failures = 0;

        let github = GitHubClient::from_settings(&settings.github)?;
        match github.test_connection().await {
            Ok(()) => println!("GitHub: {} is accessible", settings.github.repo),
            Err(e) => {
                failures += 1;
                println!("GitHub: {}", prwatch_core::Error::from(e));
            }
        }

        if self.no_webhook {
            println!("Discord: skipped");
        } else {
            let notifier = DiscordNotifier::from_settings(&settings.discord)?;
            match notifier.send_test_message().await {
                Ok(()) => println!("Discord: test message sent"),
                Err(e) => {
                    failures += 1;
                    println!("Discord: {}", e.reason());
                }
            }
        }

        if failures > 0 {
            anyhow::bail!("{failures} check(s) failed");
        }
        Ok(())
    }
}
