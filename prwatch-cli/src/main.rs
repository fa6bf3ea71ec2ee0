//! prwatch CLI - merged pull request notifications
//!
//! Polls a GitHub repository for merged pull requests and announces each one
//! on a Discord webhook, once.

mod commands;
mod logging;

use std::collections::HashMap;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use prwatch_core::config::vars;
use prwatch_core::Settings;

use commands::{CheckArgs, RunArgs, StatusArgs};

/// prwatch: announce merged pull requests on Discord
#[derive(Parser, Debug)]
#[command(name = "prwatch")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to a TOML config file (default: ~/.config/prwatch/config.toml)
    #[arg(long, global = true, env = "PRWATCH_CONFIG")]
    config: Option<PathBuf>,

    /// Repository to watch (owner/repo or URL)
    #[arg(long, global = true, env = "GITHUB_REPO")]
    repo: Option<String>,

    /// Comma-separated target branches
    #[arg(long, global = true, env = "TARGET_BRANCHES")]
    branches: Option<String>,

    /// Seconds between polls
    #[arg(long, global = true, env = "POLLING_INTERVAL")]
    interval: Option<String>,

    /// Max merged PRs considered per poll
    #[arg(long, global = true, env = "MAX_PRS_PER_REQUEST")]
    max_prs: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "LOG_LEVEL")]
    log_level: Option<String>,

    /// Log file path
    #[arg(long, global = true, env = "LOG_FILE")]
    log_file: Option<PathBuf>,

    /// Seen-PR state file path
    #[arg(long, global = true, env = "SEEN_PRS_FILE")]
    state_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Watch for merged PRs until interrupted (default)
    #[command(visible_alias = "r")]
    Run(RunArgs),

    /// Verify GitHub access and send a test webhook message
    Check(CheckArgs),

    /// Show tracked PRs and GitHub rate limit
    Status(StatusArgs),

    /// Show the effective configuration
    Config,
}

impl Cli {
    /// Flags that override env and config file values
    fn overrides(&self) -> HashMap<&'static str, String> {
        let path = |p: &Option<PathBuf>| p.as_ref().map(|p| p.display().to_string());
        [
            (vars::GITHUB_REPO, self.repo.clone()),
            (vars::TARGET_BRANCHES, self.branches.clone()),
            (vars::POLLING_INTERVAL, self.interval.clone()),
            (vars::MAX_PRS_PER_REQUEST, self.max_prs.clone()),
            (vars::LOG_LEVEL, self.log_level.clone()),
            (vars::LOG_FILE, path(&self.log_file)),
            (vars::SEEN_PRS_FILE, path(&self.state_file)),
        ]
        .into_iter()
        .filter_map(|(var, value)| value.map(|v| (var, v)))
        .collect()
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let settings = match Settings::load(&cli.overrides(), cli.config.as_deref()) {
        Ok(settings) => settings,
        Err(e) => {
            logging::init_console(cli.verbose);
            tracing::error!("{e}");
            return Err(prwatch_core::Error::from(e).into());
        }
    };

    match cli.command {
        Some(Commands::Config) => {
            println!("{settings}");
            println!();
            let config_path = cli
                .config
                .clone()
                .or_else(prwatch_core::config::FileConfig::default_config_path);
            if let Some(path) = config_path {
                println!("Config file: {}", path.display());
                if path.exists() {
                    println!("  (exists)");
                } else {
                    println!("  (not found - using env and defaults)");
                }
            }
            Ok(())
        }
        Some(Commands::Check(args)) => {
            logging::init_console(cli.verbose);
            args.execute(&settings).await
        }
        Some(Commands::Status(args)) => {
            logging::init_console(cli.verbose);
            args.execute(&settings).await
        }
        Some(Commands::Run(args)) => {
            logging::init(&settings.log, cli.verbose)?;
            args.execute(&settings).await
        }
        None => {
            logging::init(&settings.log, cli.verbose)?;
            RunArgs::default().execute(&settings).await
        }
    }
}
