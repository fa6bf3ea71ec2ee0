//! Error types for prwatch

use thiserror::Error;

/// Result type alias for prwatch operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for prwatch operations
///
/// Only [`Error::Config`] stops startup. Everything else is raised per cycle
/// and the monitor loop logs it and carries on.
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Repository missing or credential lacks access
    #[error("Access error: {0}")]
    Access(String),

    /// Hosting API reported throttling
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Transport failure talking to a remote service
    #[error("Network error: {0}")]
    Network(String),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Whether the hosting API asked us to slow down
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, Error::RateLimited(_))
    }
}

/// Startup configuration problems, one variant per failure class
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A required variable is absent or blank
    #[error("{var} is required")]
    Missing { var: &'static str },

    /// A variable is present but cannot be used
    #[error("{var}={value:?} is invalid: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },

    /// Config file could not be read or parsed
    #[error("failed to load config file {path}: {reason}")]
    File { path: String, reason: String },

    /// Several problems found at once
    #[error("{}", format_multiple(.0))]
    Multiple(Vec<ConfigError>),
}

impl ConfigError {
    /// Build an [`ConfigError::Invalid`]
    pub fn invalid(var: &'static str, value: impl Into<String>, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            var,
            value: value.into(),
            reason: reason.into(),
        }
    }

    /// Variable names this error refers to
    pub fn vars(&self) -> Vec<&'static str> {
        match self {
            ConfigError::Missing { var } | ConfigError::Invalid { var, .. } => vec![var],
            ConfigError::File { .. } => Vec::new(),
            ConfigError::Multiple(errors) => errors.iter().flat_map(|e| e.vars()).collect(),
        }
    }
}

fn format_multiple(errors: &[ConfigError]) -> String {
    let mut out = String::from("configuration validation failed:");
    for error in errors {
        out.push_str("\n- ");
        out.push_str(&error.to_string());
    }
    out
}
