//! Error types for the Chronicle simulation
//!
//! This module provides structured error definitions using thiserror and
//! a conversion from anyhow for glue code.

use thiserror::Error;

/// Main error type for Chronicle operations
#[derive(Error, Debug)]
pub enum ChronicleError {
    /// Database operation failed
    #[error("Database error: {0}")]
    Database(rusqlite::Error),

    /// A stored row could not be decoded into its domain type
    #[error("Decode error: {0}")]
    Decode(String),

    /// Connection pool could not hand out or drive a connection
    #[error("Connection pool error: {0}")]
    Pool(String),

    /// Embedding generation failed
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// Character has no row in the reflections table
    #[error("Character not found: {0}")]
    CharacterNotFound(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// HTTP client error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl ChronicleError {
    /// Storage failures stop the world; everything else is scoped to the
    /// operation that raised it.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ChronicleError::Database(_) | ChronicleError::Pool(_))
    }
}

/// Result type alias for Chronicle operations
pub type Result<T> = std::result::Result<T, ChronicleError>;

/// Row decoding failures describe bad data, not an unavailable database
impl From<rusqlite::Error> for ChronicleError {
    fn from(err: rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::FromSqlConversionFailure(..)
            | rusqlite::Error::InvalidColumnType(..)
            | rusqlite::Error::IntegralValueOutOfRange(..) => {
                ChronicleError::Decode(err.to_string())
            }
            other => ChronicleError::Database(other),
        }
    }
}

/// Convert anyhow::Error to ChronicleError
impl From<anyhow::Error> for ChronicleError {
    fn from(err: anyhow::Error) -> Self {
        ChronicleError::Other(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ChronicleError::CharacterNotFound("Alice".to_string());
        assert_eq!(err.to_string(), "Character not found: Alice");
    }

    #[test]
    fn test_storage_errors_are_fatal() {
        let db_err: ChronicleError = rusqlite::Error::InvalidQuery.into();
        assert!(db_err.is_fatal());
        assert!(ChronicleError::Pool("gone".to_string()).is_fatal());
    }

    #[test]
    fn test_row_decode_errors_are_not_fatal() {
        let bad_value = rusqlite::Error::FromSqlConversionFailure(
            5,
            rusqlite::types::Type::Text,
            "not a timestamp".into(),
        );
        let err: ChronicleError = bad_value.into();
        assert!(matches!(err, ChronicleError::Decode(_)));
        assert!(!err.is_fatal());

        let err: ChronicleError =
            rusqlite::Error::InvalidColumnType(1, "turn".to_string(), rusqlite::types::Type::Text)
                .into();
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_embedding_errors_are_not_fatal() {
        let err = ChronicleError::Embedding("model offline".to_string());
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_anyhow_conversion() {
        let err: ChronicleError = anyhow::anyhow!("bad address").into();
        assert!(matches!(err, ChronicleError::Other(ref msg) if msg == "bad address"));
    }
}
