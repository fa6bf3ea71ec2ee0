//! Error types for GitHub operations

use thiserror::Error;

/// Result type for GitHub operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during GitHub operations
#[derive(Error, Debug)]
pub enum Error {
    /// GitHub API error
    #[error("GitHub API error: {0}")]
    Api(#[from] octocrab::Error),

    /// Authentication error
    #[error("GitHub authentication error: {0}")]
    Auth(String),

    /// Repository (or PR) missing, or hidden from this token
    #[error("{0}")]
    NotFound(String),

    /// Rate limit exceeded
    #[error("GitHub rate limit exceeded: {0}")]
    RateLimited(String),

    /// Could not reach GitHub
    #[error("GitHub request failed: {0}")]
    Network(String),

    /// Parse error
    #[error("Parse error: {0}")]
    Parse(String),

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// How an HTTP failure from GitHub should be treated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StatusClass {
    Auth,
    Forbidden,
    NotFound,
    RateLimited,
    Other,
}

pub(crate) fn classify_status(status: u16, message: &str) -> StatusClass {
    let lower = message.to_ascii_lowercase();
    match status {
        401 => StatusClass::Auth,
        429 => StatusClass::RateLimited,
        403 if lower.contains("rate limit") => StatusClass::RateLimited,
        403 => StatusClass::Forbidden,
        404 => StatusClass::NotFound,
        _ if lower.contains("bad credentials") => StatusClass::Auth,
        _ => StatusClass::Other,
    }
}

impl Error {
    /// Map an octocrab error onto our taxonomy
    ///
    /// `what` names the resource for messages, e.g. "repository acme/widgets".
    pub(crate) fn from_octocrab(err: octocrab::Error, what: &str) -> Self {
        match err {
            octocrab::Error::GitHub { source, .. } => {
                match classify_status(source.status_code.as_u16(), &source.message) {
                    StatusClass::Auth => {
                        Error::Auth(format!("GitHub authentication failed: {}", source.message))
                    }
                    StatusClass::Forbidden => Error::Auth(format!(
                        "GitHub API access forbidden for {what}. Check repository permissions"
                    )),
                    StatusClass::NotFound => {
                        Error::NotFound(format!("{what} not found or not accessible"))
                    }
                    StatusClass::RateLimited => Error::RateLimited(source.message.clone()),
                    StatusClass::Other => Error::Other(format!(
                        "GitHub API request failed with status {}: {}",
                        source.status_code, source.message
                    )),
                }
            }
            octocrab::Error::Hyper { source, .. } => Error::Network(source.to_string()),
            octocrab::Error::Service { source, .. } => Error::Network(source.to_string()),
            other => Error::Api(other),
        }
    }
}

impl From<Error> for prwatch_core::Error {
    fn from(err: Error) -> Self {
        match err {
            Error::Auth(msg) | Error::NotFound(msg) => prwatch_core::Error::Access(msg),
            Error::RateLimited(msg) => prwatch_core::Error::RateLimited(msg),
            Error::Network(msg) => prwatch_core::Error::Network(msg),
            other => prwatch_core::Error::Other(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_status() {
        assert_eq!(classify_status(401, "Bad credentials"), StatusClass::Auth);
        assert_eq!(classify_status(404, "Not Found"), StatusClass::NotFound);
        assert_eq!(classify_status(429, "slow down"), StatusClass::RateLimited);
        assert_eq!(
            classify_status(403, "API rate limit exceeded for user ID 1."),
            StatusClass::RateLimited
        );
        assert_eq!(
            classify_status(403, "Resource not accessible by integration"),
            StatusClass::Forbidden
        );
        assert_eq!(classify_status(500, "Server Error"), StatusClass::Other);
    }

    #[test]
    fn test_core_mapping() {
        let core: prwatch_core::Error = Error::NotFound("repository acme/x".into()).into();
        assert!(matches!(core, prwatch_core::Error::Access(_)));

        let core: prwatch_core::Error = Error::Auth("bad token".into()).into();
        assert!(matches!(core, prwatch_core::Error::Access(_)));

        let core: prwatch_core::Error = Error::RateLimited("later".into()).into();
        assert!(core.is_rate_limit());

        let core: prwatch_core::Error = Error::Network("reset".into()).into();
        assert!(matches!(core, prwatch_core::Error::Network(_)));

        let core: prwatch_core::Error = Error::Parse("bad".into()).into();
        assert!(matches!(core, prwatch_core::Error::Other(_)));
    }
}
