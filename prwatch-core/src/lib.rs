//! prwatch core - merged pull request monitoring
//!
//! This crate holds the data model, configuration, seen-PR tracker and the
//! polling loop. The hosting API and notification sink are reached through the
//! [`PullRequestSource`] and [`Notifier`] traits, implemented by the
//! `prwatch-github` and `prwatch-discord` crates.

pub mod config;
pub mod error;
pub mod monitor;
pub mod record;
pub mod source;
pub mod tracker;

pub use config::{MonitorConfig, RepoId, Settings};
pub use error::{ConfigError, Error, Result};
pub use monitor::{CycleReport, Monitor, MonitorPhase};
pub use record::{PrAuthor, PrId, PullRequestRecord};
pub use source::{DeliveryOutcome, Notifier, PullRequestSource, RateLimitInfo};
pub use tracker::{PrTracker, SeenSet};
