use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("GitHub authentication failed: {0}")]
    Authentication(String),

    #[error("GitHub API request failed: {0}")]
    ApiRequest(String),

    #[error("Commit {0} has not been pushed to the remote repository")]
    NotPushed(String),

    #[error("Repository error: {0}")]
    Repository(String),

    #[error("Git operation failed: {0}")]
    Git(String),

    #[error("Template error: {0}")]
    Template(String),

    #[error("Action failed: {0}")]
    Action(String),

    #[error("Command `{command}` timed out after {timeout:?}")]
    ActionTimeout { command: String, timeout: Duration },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Errors that must stop the monitor instead of being retried on the next tick.
    pub fn is_fatal(&self) -> bool {
        matches!(self, AppError::Authentication(_))
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, AppError::ActionTimeout { .. })
    }
}

impl From<octocrab::Error> for AppError {
    fn from(e: octocrab::Error) -> Self {
        match &e {
            octocrab::Error::GitHub { source, .. }
                if matches!(source.status_code.as_u16(), 401 | 403) =>
            {
                AppError::Authentication(source.message.clone())
            }
            _ => AppError::ApiRequest(e.to_string()),
        }
    }
}

impl From<git2::Error> for AppError {
    fn from(e: git2::Error) -> Self {
        AppError::Git(e.message().to_string())
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_authentication_is_fatal() {
        assert!(AppError::Authentication("bad credentials".into()).is_fatal());
        assert!(!AppError::ApiRequest("502".into()).is_fatal());
        assert!(!AppError::Config("x".into()).is_fatal());
    }

    #[test]
    fn test_timeout_message() {
        let err = AppError::ActionTimeout {
            command: "sleep".into(),
            timeout: Duration::from_millis(100),
        };
        assert!(err.is_timeout());
        assert_eq!(err.to_string(), "Command `sleep` timed out after 100ms");
    }
}
