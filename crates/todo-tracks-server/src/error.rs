// crates/todo-tracks-server/src/error.rs
// Standardized error types for todo-tracks

use thiserror::Error;

/// Main error type for the todo-tracks library.
///
/// Variants split into two classes: validation errors describe a bad
/// user-supplied identifier and are recoverable; everything else means the
/// backend or its output could not be trusted and the request is aborted.
#[derive(Error, Debug)]
pub enum TrackError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("invalid revision: {0}")]
    InvalidRevision(String),

    #[error("path '{path}' not found at revision {revision}")]
    PathNotFound { path: String, revision: String },

    #[error("line #{line} not found at path {path} in revision {revision}")]
    LineOutOfRange {
        line: usize,
        path: String,
        revision: String,
    },

    #[error("git error: {0}")]
    Git(String),

    #[error("malformed git output: {0}")]
    MalformedOutput(String),

    #[error("no blob for '{path}' at revision {revision}")]
    BlobNotFound { path: String, revision: String },

    #[error("invalid pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("task cancelled")]
    Cancelled,

    #[error("unknown error: {0}")]
    Other(String),
}

/// Convenience type alias for Result using TrackError
pub type Result<T> = std::result::Result<T, TrackError>;

impl TrackError {
    /// True for errors caused by a bad user-supplied identifier
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            TrackError::InvalidInput(_)
                | TrackError::InvalidRevision(_)
                | TrackError::PathNotFound { .. }
                | TrackError::LineOutOfRange { .. }
        )
    }

    /// Convert to user-facing string for HTTP/CLI boundaries
    pub fn to_user_string(&self) -> String {
        self.to_string()
    }
}

impl From<tokio::task::JoinError> for TrackError {
    fn from(err: tokio::task::JoinError) -> Self {
        if err.is_cancelled() {
            TrackError::Cancelled
        } else {
            TrackError::Other(err.to_string())
        }
    }
}
