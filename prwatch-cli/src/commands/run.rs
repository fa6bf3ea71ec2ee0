//! Run command - the long-running monitor

use clap::Args;
use prwatch_core::{Monitor, PrTracker, Settings};
use prwatch_discord::DiscordNotifier;
use prwatch_github::GitHubClient;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Watch for merged PRs until interrupted
#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// Poll once and exit instead of looping
    #[arg(long)]
    once: bool,
}

impl RunArgs {
    /// Execute the run command
    pub async fn execute(&self, settings: &Settings) -> anyhow::Result<()> {
        info!("Starting GitHub PR Monitor Service");
        for line in settings.to_string().lines() {
            info!("{line}");
        }

        let source = GitHubClient::from_settings(&settings.github)?
            .with_lookback(settings.monitor.lookback());
        if let Err(e) = source.test_connection().await {
            // Access problems are retried every cycle rather than aborting startup
            warn!(error = %e, "GitHub connection check failed");
        }

        let notifier = DiscordNotifier::from_settings(&settings.discord)?;
        let tracker = PrTracker::open(&settings.state_file);
        let mut monitor = Monitor::new(settings.monitor.clone(), tracker, source, notifier);
        info!("Service initialized successfully");

        if self.once {
            if let Some(report) = monitor.poll().await {
                info!(?report, "Single poll complete");
            }
            return Ok(());
        }

        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>(1);
        let mut handle = tokio::spawn(async move {
            monitor.run(shutdown_rx).await;
        });

        let loop_exited = tokio::select! {
            result = wait_for_shutdown() => {
                result?;
                false
            }
            result = &mut handle => {
                result?;
                true
            }
        };

        if !loop_exited {
            let _ = shutdown_tx.send(()).await;
            handle.await?;
        }

        info!("GitHub PR Monitor Service stopped");
        Ok(())
    }
}

/// Resolve once SIGINT or SIGTERM (Ctrl+C elsewhere) arrives
async fn wait_for_shutdown() -> anyhow::Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigint = signal(SignalKind::interrupt())?;
        let mut sigterm = signal(SignalKind::terminate())?;

        tokio::select! {
            _ = sigint.recv() => warn!("SIGINT received, shutting down"),
            _ = sigterm.recv() => warn!("SIGTERM received, shutting down"),
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        warn!("Ctrl+C received, shutting down");
    }

    Ok(())
}
