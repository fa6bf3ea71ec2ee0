//! Configuration management for prwatch
//!
//! Configuration is resolved with the following priority (highest to lowest):
//! 1. CLI flags
//! 2. Environment variables
//! 3. Config file (~/.config/prwatch/config.toml, or `--config`)
//! 4. Default values
//!
//! Validation happens once at startup. Every problem is collected so the
//! operator sees the full list in a single run.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::ConfigError;

/// Environment variable names
pub mod vars {
    pub const GITHUB_TOKEN: &str = "GITHUB_TOKEN";
    pub const GITHUB_REPO: &str = "GITHUB_REPO";
    pub const GITHUB_API_URL: &str = "GITHUB_API_URL";
    pub const DISCORD_WEBHOOK_URL: &str = "DISCORD_WEBHOOK_URL";
    pub const DISCORD_USERNAME: &str = "DISCORD_USERNAME";
    pub const TARGET_BRANCHES: &str = "TARGET_BRANCHES";
    /// Legacy single-branch alias, consulted only when TARGET_BRANCHES is unset
    pub const TARGET_BRANCH: &str = "TARGET_BRANCH";
    pub const POLLING_INTERVAL: &str = "POLLING_INTERVAL";
    pub const MAX_PRS_PER_REQUEST: &str = "MAX_PRS_PER_REQUEST";
    pub const LOOKBACK_HOURS: &str = "LOOKBACK_HOURS";
    pub const LOG_LEVEL: &str = "LOG_LEVEL";
    pub const LOG_FILE: &str = "LOG_FILE";
    pub const SEEN_PRS_FILE: &str = "SEEN_PRS_FILE";
}

pub const DEFAULT_BRANCH: &str = "staging";
pub const DEFAULT_POLLING_INTERVAL_SECS: u64 = 300;
/// GitHub's unauthenticated-friendly floor for polling
pub const MIN_POLLING_INTERVAL_SECS: u64 = 60;
pub const DEFAULT_MAX_PRS_PER_REQUEST: usize = 100;
pub const DEFAULT_LOOKBACK_HOURS: u64 = 24;
pub const DEFAULT_LOG_FILE: &str = "github_pr_monitor.log";
pub const DEFAULT_SEEN_PRS_FILE: &str = "seen_prs.json";
pub const DEFAULT_DISCORD_USERNAME: &str = "GitHub PR Monitor";
pub const DEFAULT_AVATAR_URL: &str =
    "https://github.githubassets.com/images/modules/logos_page/GitHub-Mark.png";

/// A GitHub repository reference
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepoId {
    pub owner: String,
    pub name: String,
}

impl RepoId {
    /// Parse a repository reference
    ///
    /// Supports formats:
    /// - owner/repo
    /// - https://github.com/owner/repo
    /// - git@github.com:owner/repo.git
    pub fn parse(input: &str) -> Result<Self, String> {
        let input = input.trim();

        let path = if input.starts_with("https://") || input.starts_with("http://") {
            let url = Url::parse(input).map_err(|e| e.to_string())?;
            url.path().trim_matches('/').to_string()
        } else if let Some(rest) = input.strip_prefix("git@") {
            rest.split_once(':')
                .map(|(_, path)| path.to_string())
                .ok_or_else(|| format!("invalid SSH URL: {input}"))?
        } else {
            input.to_string()
        };

        let path = path.trim_end_matches(".git");
        let mut parts = path.split('/');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(owner), Some(name), None) if !owner.is_empty() && !name.is_empty() => Ok(Self {
                owner: owner.to_string(),
                name: name.to_string(),
            }),
            _ => Err("expected format owner/repository".to_string()),
        }
    }
}

impl FromStr for RepoId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for RepoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// Log verbosity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Directive string understood by `tracing_subscriber::EnvFilter`
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" | "critical" => Ok(LogLevel::Error),
            other => Err(format!("unknown log level '{other}'")),
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Settings owned read-only by the monitor loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorConfig {
    branches: Vec<String>,
    polling_interval_secs: u64,
    max_prs_per_request: usize,
    lookback_hours: u64,
}

impl MonitorConfig {
    /// Build a validated monitor config
    ///
    /// Branch names are trimmed, blanks dropped, and duplicates ignored while
    /// keeping first-seen order.
    pub fn new<I, S>(
        branches: I,
        polling_interval_secs: u64,
        max_prs_per_request: usize,
    ) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let branches = normalize_branches(branches);
        if branches.is_empty() {
            return Err(ConfigError::invalid(
                vars::TARGET_BRANCHES,
                "",
                "at least one branch is required",
            ));
        }
        if polling_interval_secs < MIN_POLLING_INTERVAL_SECS {
            return Err(ConfigError::invalid(
                vars::POLLING_INTERVAL,
                polling_interval_secs.to_string(),
                format!(
                    "must be at least {MIN_POLLING_INTERVAL_SECS} seconds to respect GitHub API rate limits"
                ),
            ));
        }
        if max_prs_per_request == 0 {
            return Err(ConfigError::invalid(
                vars::MAX_PRS_PER_REQUEST,
                "0",
                "must be a positive integer",
            ));
        }
        Ok(Self {
            branches,
            polling_interval_secs,
            max_prs_per_request,
            lookback_hours: DEFAULT_LOOKBACK_HOURS,
        })
    }

    /// Override the merge lookback window
    pub fn with_lookback_hours(mut self, hours: u64) -> Result<Self, ConfigError> {
        if hours == 0 {
            return Err(ConfigError::invalid(
                vars::LOOKBACK_HOURS,
                "0",
                "must be a positive integer",
            ));
        }
        self.lookback_hours = hours;
        Ok(self)
    }

    pub fn branches(&self) -> &[String] {
        &self.branches
    }

    pub fn polling_interval_secs(&self) -> u64 {
        self.polling_interval_secs
    }

    pub fn polling_interval(&self) -> Duration {
        Duration::from_secs(self.polling_interval_secs)
    }

    pub fn max_prs_per_request(&self) -> usize {
        self.max_prs_per_request
    }

    pub fn lookback_hours(&self) -> u64 {
        self.lookback_hours
    }

    pub fn lookback(&self) -> chrono::Duration {
        chrono::Duration::hours(self.lookback_hours as i64)
    }
}

fn normalize_branches<I, S>(branches: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out: Vec<String> = Vec::new();
    for branch in branches {
        let branch = branch.as_ref().trim();
        if !branch.is_empty() && !out.iter().any(|b| b == branch) {
            out.push(branch.to_string());
        }
    }
    out
}

/// GitHub connection settings
#[derive(Clone, PartialEq, Eq)]
pub struct GitHubSettings {
    pub repo: RepoId,
    pub token: String,
    /// Alternative API root (GitHub Enterprise)
    pub api_url: Option<Url>,
}

impl fmt::Debug for GitHubSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GitHubSettings")
            .field("repo", &self.repo)
            .field("api_url", &self.api_url)
            .finish_non_exhaustive()
    }
}

/// Discord webhook settings
#[derive(Clone, PartialEq, Eq)]
pub struct DiscordSettings {
    pub webhook_url: Url,
    pub username: String,
    pub avatar_url: String,
}

impl fmt::Debug for DiscordSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Webhook URLs embed their own secret token
        f.debug_struct("DiscordSettings")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    pub level: LogLevel,
    pub file: PathBuf,
}

/// Fully validated startup configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub github: GitHubSettings,
    pub discord: DiscordSettings,
    pub monitor: MonitorConfig,
    pub log: LogSettings,
    /// JSON file backing the seen-PR tracker
    pub state_file: PathBuf,
}

impl Settings {
    /// Resolve settings from CLI overrides, the process environment and an
    /// optional config file
    ///
    /// `config_path` of `None` means the default location, which may be absent.
    pub fn load(
        overrides: &HashMap<&'static str, String>,
        config_path: Option<&Path>,
    ) -> Result<Self, ConfigError> {
        let file = match config_path {
            Some(path) => FileConfig::load_from_file(path)?,
            None => FileConfig::load()?,
        };

        Self::from_lookup(layered(overrides, |var| std::env::var(var).ok(), &file))
    }

    /// Resolve settings from an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |var: &str| {
            lookup(var)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let required = |var: &'static str| get(var).ok_or(ConfigError::Missing { var });

        let token = required(vars::GITHUB_TOKEN);
        let repo = required(vars::GITHUB_REPO).and_then(|raw| match RepoId::parse(&raw) {
            Ok(repo) => Ok(repo),
            Err(reason) => Err(ConfigError::invalid(vars::GITHUB_REPO, raw, reason)),
        });
        let api_url = get(vars::GITHUB_API_URL)
            .map(|raw| parse_url(vars::GITHUB_API_URL, raw))
            .transpose();
        let webhook_url = required(vars::DISCORD_WEBHOOK_URL)
            .and_then(|raw| parse_url(vars::DISCORD_WEBHOOK_URL, raw));

        let branches_raw = get(vars::TARGET_BRANCHES)
            .or_else(|| get(vars::TARGET_BRANCH))
            .unwrap_or_else(|| DEFAULT_BRANCH.to_string());
        let interval = parse_number(
            vars::POLLING_INTERVAL,
            get(vars::POLLING_INTERVAL),
            DEFAULT_POLLING_INTERVAL_SECS,
        );
        let max_prs = parse_number(
            vars::MAX_PRS_PER_REQUEST,
            get(vars::MAX_PRS_PER_REQUEST),
            DEFAULT_MAX_PRS_PER_REQUEST,
        );
        let lookback = parse_number(
            vars::LOOKBACK_HOURS,
            get(vars::LOOKBACK_HOURS),
            DEFAULT_LOOKBACK_HOURS,
        );
        let monitor = match (interval, max_prs, lookback) {
            (Ok(interval), Ok(max_prs), Ok(lookback)) => {
                MonitorConfig::new(branches_raw.split(','), interval, max_prs)
                    .and_then(|m| m.with_lookback_hours(lookback))
                    .map_err(|e| vec![e])
            }
            (interval, max_prs, lookback) => {
                let errors = [interval.err(), max_prs.err(), lookback.err()];
                Err(errors.into_iter().flatten().collect())
            }
        };

        let level = match get(vars::LOG_LEVEL) {
            None => Ok(LogLevel::default()),
            Some(raw) => raw
                .parse::<LogLevel>()
                .map_err(|reason| ConfigError::invalid(vars::LOG_LEVEL, raw.clone(), reason)),
        };

        match (token, repo, api_url, webhook_url, monitor, level) {
            (Ok(token), Ok(repo), Ok(api_url), Ok(webhook_url), Ok(monitor), Ok(level)) => {
                Ok(Self {
                    github: GitHubSettings {
                        repo,
                        token,
                        api_url,
                    },
                    discord: DiscordSettings {
                        webhook_url,
                        username: get(vars::DISCORD_USERNAME)
                            .unwrap_or_else(|| DEFAULT_DISCORD_USERNAME.to_string()),
                        avatar_url: DEFAULT_AVATAR_URL.to_string(),
                    },
                    monitor,
                    log: LogSettings {
                        level,
                        file: get(vars::LOG_FILE)
                            .map(PathBuf::from)
                            .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_FILE)),
                    },
                    state_file: get(vars::SEEN_PRS_FILE)
                        .map(PathBuf::from)
                        .unwrap_or_else(|| PathBuf::from(DEFAULT_SEEN_PRS_FILE)),
                })
            }
            (token, repo, api_url, webhook_url, monitor, level) => {
                let mut errors = Vec::new();
                errors.extend(token.err());
                errors.extend(repo.err());
                errors.extend(api_url.err());
                errors.extend(webhook_url.err());
                errors.extend(monitor.err().into_iter().flatten());
                errors.extend(level.err());
                Err(if errors.len() == 1 {
                    errors.remove(0)
                } else {
                    ConfigError::Multiple(errors)
                })
            }
        }
    }
}

/// One lookup over the CLI, environment and file layers, highest first
///
/// `TARGET_BRANCH` is an environment alias of `TARGET_BRANCHES`, resolved
/// inside the environment layer so it still outranks the file.
fn layered<'a, E>(
    overrides: &'a HashMap<&'static str, String>,
    env: E,
    file: &'a FileConfig,
) -> impl Fn(&str) -> Option<String> + 'a
where
    E: Fn(&str) -> Option<String> + 'a,
{
    let env = move |var: &str| env(var).filter(|v| !v.trim().is_empty());
    move |var: &str| {
        overrides
            .get(var)
            .cloned()
            .or_else(|| env(var))
            .or_else(|| {
                (var == vars::TARGET_BRANCHES)
                    .then(|| env(vars::TARGET_BRANCH))
                    .flatten()
            })
            .or_else(|| file.get(var))
    }
}

impl fmt::Display for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Config:")?;
        writeln!(f, "  GitHub Repo: {}", self.github.repo)?;
        if let Some(api) = &self.github.api_url {
            writeln!(f, "  GitHub API: {api}")?;
        }
        writeln!(f, "  Target Branches: {}", self.monitor.branches().join(", "))?;
        writeln!(f, "  Polling Interval: {}s", self.monitor.polling_interval_secs())?;
        writeln!(f, "  Max PRs per request: {}", self.monitor.max_prs_per_request())?;
        writeln!(f, "  Lookback: {}h", self.monitor.lookback_hours())?;
        writeln!(f, "  Discord Username: {}", self.discord.username)?;
        writeln!(f, "  Log Level: {}", self.log.level)?;
        writeln!(f, "  Log File: {}", self.log.file.display())?;
        write!(f, "  Seen PRs File: {}", self.state_file.display())
    }
}

fn parse_number<T: FromStr>(
    var: &'static str,
    raw: Option<String>,
    default: T,
) -> Result<T, ConfigError> {
    match raw {
        None => Ok(default),
        Some(raw) => raw
            .parse::<T>()
            .map_err(|_| ConfigError::invalid(var, raw.clone(), "must be a positive integer")),
    }
}

fn parse_url(var: &'static str, raw: String) -> Result<Url, ConfigError> {
    let url = match Url::parse(&raw) {
        Ok(url) => url,
        Err(e) => return Err(ConfigError::invalid(var, raw, e.to_string())),
    };
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::invalid(var, raw, "must be an http(s) URL"));
    }
    Ok(url)
}

/// Optional TOML config file, keyed like the environment variables in lowercase
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct FileConfig {
    pub github_token: Option<String>,
    pub github_repo: Option<String>,
    pub github_api_url: Option<String>,
    pub discord_webhook_url: Option<String>,
    pub discord_username: Option<String>,
    pub target_branches: Option<Vec<String>>,
    pub polling_interval: Option<u64>,
    pub max_prs_per_request: Option<u64>,
    pub lookback_hours: Option<u64>,
    pub log_level: Option<String>,
    pub log_file: Option<PathBuf>,
    pub seen_prs_file: Option<PathBuf>,
}

impl FileConfig {
    /// Load configuration from the default config file location
    ///
    /// Returns an empty config if the file doesn't exist
    pub fn load() -> Result<Self, ConfigError> {
        match Self::default_config_path() {
            Some(path) if path.exists() => Self::load_from_file(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let file_err = |reason: String| ConfigError::File {
            path: path.display().to_string(),
            reason,
        };
        let contents = std::fs::read_to_string(path).map_err(|e| file_err(e.to_string()))?;
        toml::from_str(&contents).map_err(|e| file_err(e.to_string()))
    }

    /// Get the default config file path
    ///
    /// Returns `~/.config/prwatch/config.toml` on Unix
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("prwatch").join("config.toml"))
    }

    /// Value for an environment variable name, rendered as the env would carry it
    pub fn get(&self, var: &str) -> Option<String> {
        let path = |p: &Option<PathBuf>| p.as_ref().map(|p| p.display().to_string());
        match var {
            vars::GITHUB_TOKEN => self.github_token.clone(),
            vars::GITHUB_REPO => self.github_repo.clone(),
            vars::GITHUB_API_URL => self.github_api_url.clone(),
            vars::DISCORD_WEBHOOK_URL => self.discord_webhook_url.clone(),
            vars::DISCORD_USERNAME => self.discord_username.clone(),
            vars::TARGET_BRANCHES => self.target_branches.as_ref().map(|b| b.join(",")),
            vars::POLLING_INTERVAL => self.polling_interval.map(|v| v.to_string()),
            vars::MAX_PRS_PER_REQUEST => self.max_prs_per_request.map(|v| v.to_string()),
            vars::LOOKBACK_HOURS => self.lookback_hours.map(|v| v.to_string()),
            vars::LOG_LEVEL => self.log_level.clone(),
            vars::LOG_FILE => path(&self.log_file),
            vars::SEEN_PRS_FILE => path(&self.seen_prs_file),
            _ => None,
        }
    }
}
