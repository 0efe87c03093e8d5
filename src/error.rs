//! Error types for the query engine
//!
//! One taxonomy covers the whole pipeline: parse failures never execute,
//! resolution failures surface before any fetch, and everything observed
//! during execution aborts the query fail-fast. The single deliberate
//! exception is [`StorageError::NotFound`], which a worker absorbs as "no
//! data" for its own unit of work instead of failing the query.

use thiserror::Error;

/// Main error type for query execution
#[derive(Error, Debug)]
pub enum QueryError {
    /// Malformed query text; carries the offending token. The query never
    /// starts executing.
    #[error("parse error at '{token}': {message}")]
    Parse {
        /// The token that could not be parsed
        token: String,
        /// What was wrong with it
        message: String,
    },

    /// Group-by label absent from every matched series, or alias used with
    /// more than one output series. Surfaced before any fetch when possible.
    #[error("resolution error: {0}")]
    Resolution(String),

    /// Backend fetch failure, classified by the storage collaborator
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Chunk bytes violate the ordering/structure contract; indicates
    /// corruption and is always fatal.
    #[error("chunk decode error: {0}")]
    Decode(String),

    /// Query-level cancellation was observed
    #[error("query cancelled")]
    Cancelled,

    /// Invalid partitioning metadata or query parameters
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl QueryError {
    /// Create a parse error carrying the offending token
    pub fn parse(token: impl Into<String>, message: impl Into<String>) -> Self {
        QueryError::Parse {
            token: token.into(),
            message: message.into(),
        }
    }
}

/// Backend storage errors, as classified by the storage collaborator
///
/// The engine maps these onto its own policy: `NotFound` is absorbed per
/// unit of work, `Transient` and `Fatal` abort the whole query. Retry policy,
/// if any, belongs to the storage collaborator, never to the engine.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Requested item does not exist; treated as empty data, not a failure
    #[error("not found: {0}")]
    NotFound(String),

    /// Temporary backend failure (timeouts, throttling)
    #[error("transient backend error: {0}")]
    Transient(String),

    /// Permanent backend failure
    #[error("fatal backend error: {0}")]
    Fatal(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, QueryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_carries_token() {
        let err = QueryError::parse("foo", "unknown aggregate function");
        let display = err.to_string();
        assert!(display.contains("foo"));
        assert!(display.contains("unknown aggregate function"));
    }

    #[test]
    fn test_storage_error_conversion() {
        let err: QueryError = StorageError::Transient("connection reset".to_string()).into();
        assert!(matches!(
            err,
            QueryError::Storage(StorageError::Transient(_))
        ));
    }
}
