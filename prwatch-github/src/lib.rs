//! prwatch GitHub - merged pull request polling
//!
//! This crate implements [`prwatch_core::PullRequestSource`] on top of the
//! GitHub REST API.

mod client;
mod error;
mod pr;

pub use client::GitHubClient;
pub use error::{Error, Result};

#[cfg(test)]
mod test_server;
