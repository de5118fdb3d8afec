//! Error types for journal-migrate.

use thiserror::Error;

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while migrating, validating or rolling back.
///
/// Per-record failures are not surfaced through this type directly: the
/// engines record them as failed outcomes. Anything returned as `Err` from an
/// engine aborted the whole run.
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid configuration or options.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The source (document) store failed or returned something unusable.
    #[error("Source store error: {0}")]
    SourceStore(String),

    /// The target (REST) store failed or returned something unusable.
    #[error("Target store error: {0}")]
    TargetStore(String),

    /// A record could not be converted between schemas.
    #[error("Transform error: {0}")]
    Transform(String),

    /// A record expected to exist was not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Rate limited by a remote store; retry after the given seconds.
    #[error("Rate limited, retry after {0}s")]
    RateLimit(u64),

    /// Credentials were rejected.
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// A store call did not settle in time.
    #[error("Timeout: {operation} did not complete within {secs}s")]
    Timeout {
        /// Store operation that timed out.
        operation: String,
        /// Configured limit in seconds.
        secs: u64,
    },

    /// Another migration, validation or rollback run is active.
    #[error("A run is already in progress")]
    RunInProgress,

    /// HTTP transport error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML error.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl Error {
    /// Whether this error aborted a run because of a store outage rather
    /// than a caller mistake.
    #[must_use]
    pub fn is_store_error(&self) -> bool {
        matches!(
            self,
            Self::SourceStore(_)
                | Self::TargetStore(_)
                | Self::RateLimit(_)
                | Self::Timeout { .. }
                | Self::Http(_)
        )
    }
}
