//! Error types for Discord webhook delivery

use thiserror::Error;

/// Result type for webhook operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while posting to a webhook
#[derive(Error, Debug)]
pub enum Error {
    /// Request could not be built or sent
    #[error("Discord webhook request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Webhook answered with a non-success status
    #[error("Discord webhook failed with status {status}: {body}")]
    Status { status: u16, body: String },
}

impl Error {
    /// Short description for logs and delivery outcomes
    pub fn reason(&self) -> String {
        match self {
            Error::Http(e) if e.is_timeout() => "Discord webhook request timed out".to_string(),
            Error::Http(e) if e.is_connect() => "Failed to connect to Discord webhook".to_string(),
            other => other.to_string(),
        }
    }
}
