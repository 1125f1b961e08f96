use thiserror::Error;

use crate::engine::codes;
use crate::types::RowValues;

/// Raw failure reported by the embedded engine.
///
/// Kept `Clone` so it can be stored inside the shared readiness and factory futures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} (code {code})")]
pub struct BackendError {
    /// `SQLite` result code (extended where available)
    pub code: i32,
    /// Human readable message
    pub message: String,
}

impl BackendError {
    #[must_use]
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn misuse(message: impl Into<String>) -> Self {
        Self::new(codes::SQLITE_MISUSE, message)
    }

    #[must_use]
    pub fn range(message: impl Into<String>) -> Self {
        Self::new(codes::SQLITE_RANGE, message)
    }

    #[must_use]
    pub fn busy(message: impl Into<String>) -> Self {
        Self::new(codes::SQLITE_BUSY, message)
    }
}

impl From<rusqlite::Error> for BackendError {
    fn from(err: rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::SqliteFailure(inner, message) => {
                let message = message.unwrap_or_else(|| inner.to_string());
                BackendError::new(inner.extended_code, message)
            }
            other => BackendError::new(codes::SQLITE_ERROR, other.to_string()),
        }
    }
}

#[derive(Debug, Error)]
pub enum DriverError {
    #[error("SQLite backend module is not available: {0}")]
    BackendUnavailable(#[source] BackendError),

    #[error("Connection error: {message}")]
    ConnectionError {
        message: String,
        #[source]
        source: Option<BackendError>,
    },

    #[error("Query runner already released, cannot run queries anymore")]
    RunnerReleased,

    #[error("Query failed: {source}; query: {query}")]
    QueryFailed {
        query: String,
        parameters: Vec<RowValues>,
        #[source]
        source: BackendError,
    },

    #[error("Transaction is not started yet, start a transaction before committing or rolling it back")]
    TransactionNotStarted,

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl DriverError {
    pub(crate) fn connection(message: impl Into<String>, source: Option<BackendError>) -> Self {
        DriverError::ConnectionError {
            message: message.into(),
            source,
        }
    }

    /// Underlying engine failure, when there is one.
    #[must_use]
    pub fn backend_error(&self) -> Option<&BackendError> {
        match self {
            DriverError::BackendUnavailable(source)
            | DriverError::QueryFailed { source, .. } => Some(source),
            DriverError::ConnectionError { source, .. } => source.as_ref(),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for DriverError {
    fn from(err: serde_json::Error) -> Self {
        DriverError::ConfigError(format!("invalid driver settings: {err}"))
    }
}
