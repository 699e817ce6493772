//! Error taxonomy shared by the fetch layer, providers, and the engine.
//!
//! The variants separate failures the caller can do something about
//! (missing credentials) from transient upstream trouble (rate limits,
//! network) and from data that will never parse no matter how often it is
//! requested.

/// Common error type for mediaforge.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Required credentials or settings are missing or invalid. Never retried.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The upstream answered with a non-success status.
    #[error("Upstream returned HTTP {status}: {body}")]
    Upstream {
        /// HTTP status code.
        status: u16,
        /// Response body, as far as it could be read.
        body: String,
    },

    /// The upstream response did not match the expected shape. Never retried.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A transport-level failure (DNS, connect, timeout, reset).
    #[error("Network error: {0}")]
    Network(String),

    /// The requested entity was not found.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// The kind of entity (e.g. "provider", "item").
        entity: String,
        /// The identifier that was looked up.
        id: String,
    },

    /// Invalid input was provided.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// An I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// An internal error occurred.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// How a failure should be presented to the person driving the search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The feature cannot work until configuration changes.
    Unavailable,
    /// The upstream is busy; retrying shortly is likely to succeed.
    Busy,
    /// Anything else.
    Failed,
}

impl Error {
    /// Create a new Config error.
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new Upstream error.
    pub fn upstream<S: Into<String>>(status: u16, body: S) -> Self {
        Self::Upstream {
            status,
            body: body.into(),
        }
    }

    /// Create a new Validation error.
    pub fn validation<S: Into<String>>(msg: S) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a new Network error.
    pub fn network<S: Into<String>>(msg: S) -> Self {
        Self::Network(msg.into())
    }

    /// Create a new NotFound error.
    pub fn not_found(entity: impl Into<String>, id: impl std::fmt::Display) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    /// Create a new InvalidInput error.
    pub fn invalid_input<S: Into<String>>(msg: S) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a new Internal error.
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::Internal(msg.into())
    }

    /// Whether the fetch layer may retry after this error.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network(_) => true,
            Self::Upstream { status, .. } => matches!(status, 429 | 503 | 504),
            _ => false,
        }
    }

    /// Whether the upstream explicitly asked us to slow down.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::Upstream { status: 429, .. })
    }

    /// Classify for user-facing messaging.
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            Self::Config(_) => FailureKind::Unavailable,
            Self::Upstream { status, .. } if matches!(status, 429 | 503 | 504) => {
                FailureKind::Busy
            }
            _ => FailureKind::Failed,
        }
    }
}

/// Result type alias using the common Error type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::config("TMDB API key is not set");
        assert_eq!(err.to_string(), "Configuration error: TMDB API key is not set");

        let err = Error::upstream(404, "not here");
        assert_eq!(err.to_string(), "Upstream returned HTTP 404: not here");

        let err = Error::not_found("provider", "imdb");
        assert_eq!(err.to_string(), "provider not found: imdb");
    }

    #[test]
    fn test_retryable_classification() {
        assert!(Error::network("reset").is_retryable());
        assert!(Error::upstream(429, "").is_retryable());
        assert!(Error::upstream(503, "").is_retryable());
        assert!(Error::upstream(504, "").is_retryable());
        assert!(!Error::upstream(500, "").is_retryable());
        assert!(!Error::upstream(404, "").is_retryable());
        assert!(!Error::validation("bad shape").is_retryable());
        assert!(!Error::config("no key").is_retryable());
    }

    #[test]
    fn test_failure_kind() {
        assert_eq!(Error::config("x").failure_kind(), FailureKind::Unavailable);
        assert_eq!(Error::upstream(429, "").failure_kind(), FailureKind::Busy);
        assert_eq!(Error::upstream(500, "").failure_kind(), FailureKind::Failed);
        assert_eq!(Error::network("x").failure_kind(), FailureKind::Failed);
    }

    #[test]
    fn test_rate_limited() {
        assert!(Error::upstream(429, "").is_rate_limited());
        assert!(!Error::upstream(503, "").is_rate_limited());
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err = Error::from(io_err);
        assert!(matches!(err, Error::Io(_)));
    }
}
