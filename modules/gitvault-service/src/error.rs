//! Error taxonomy for the store.

use thiserror::Error;

/// Structural failure while splitting a record file into header and body.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("missing opening '---' delimiter")]
    MissingOpenDelimiter,
    #[error("missing closing '---' delimiter")]
    MissingCloseDelimiter,
}

#[derive(Debug, Error)]
pub enum StoreError {
    /// Missing or malformed repository/credential configuration
    #[error("configuration error: {0}")]
    Config(String),

    /// Non-success response from the object graph API
    #[error("{context} failed ({status}): {body}")]
    Remote {
        context: String,
        status: u16,
        body: String,
    },

    /// The request never produced a response
    #[error("transport error: {0}")]
    Transport(String),

    /// A record file exists but cannot be split into header and body
    #[error("file unreadable: {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: CodecError,
    },

    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("not found: {0}")]
    NotFound(String),

    /// The branch moved between reading its head and advancing it
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("invalid input: {0}")]
    Invalid(String),
}

impl From<reqwest::Error> for StoreError {
    fn from(err: reqwest::Error) -> Self {
        StoreError::Transport(err.to_string())
    }
}

impl StoreError {
    /// Whether a failed read may be re-issued.
    pub fn is_retryable(&self) -> bool {
        match self {
            StoreError::Transport(_) => true,
            StoreError::Remote { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(StoreError::Transport("reset".into()).is_retryable());
        assert!(StoreError::Remote {
            context: "Get content".into(),
            status: 502,
            body: String::new(),
        }
        .is_retryable());
        assert!(StoreError::Remote {
            context: "Get content".into(),
            status: 429,
            body: String::new(),
        }
        .is_retryable());
        assert!(!StoreError::Remote {
            context: "Get content".into(),
            status: 401,
            body: "Bad credentials".into(),
        }
        .is_retryable());
        assert!(!StoreError::Config("GITHUB_REPO not set".into()).is_retryable());
        assert!(!StoreError::Conflict("moved".into()).is_retryable());
    }

    #[test]
    fn test_remote_error_display_carries_status_and_body() {
        let err = StoreError::Remote {
            context: "Create tree".into(),
            status: 422,
            body: "tree.sha is invalid".into(),
        };
        assert_eq!(err.to_string(), "Create tree failed (422): tree.sha is invalid");
    }
}
