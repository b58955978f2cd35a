//! Error types for the stampede cache

use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the stampede cache
#[derive(Error, Debug)]
pub enum Error {
    /// Origin fetch failed. Surfaces unchanged to the caller of `lookup`.
    #[error("Origin fetch failed for key {key}: {reason}")]
    Origin { key: String, reason: String },

    /// Shared store rejected or could not complete an operation
    #[error("Shared store error: {0}")]
    Store(String),

    /// Redis client error
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// Value could not be encoded or decoded between tiers
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// HTTP client error while talking to the origin
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Build an origin failure for `key`.
    pub fn origin(key: &str, reason: impl std::fmt::Display) -> Self {
        Error::Origin {
            key: key.to_string(),
            reason: reason.to_string(),
        }
    }

    /// True for failures of the shared store (Redis or otherwise).
    ///
    /// The coordinator degrades on these instead of propagating them.
    pub fn is_store_failure(&self) -> bool {
        matches!(self, Error::Store(_) | Error::Redis(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_origin_error_display() {
        let err = Error::origin("user:42", "connection refused");
        assert_eq!(
            err.to_string(),
            "Origin fetch failed for key user:42: connection refused"
        );
        assert!(!err.is_store_failure());
    }

    #[test]
    fn test_store_failure_classification() {
        assert!(Error::Store("timeout".into()).is_store_failure());
        assert!(!Error::Config("bad".into()).is_store_failure());

        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        assert!(!Error::from(json_err).is_store_failure());
    }
}
