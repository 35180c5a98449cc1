//! Error types for wmbs-db.
//!
//! Every DAO, the schema creator and the connection layer report failures
//! through [`WmbsError`]; the binary prints [`WmbsError::category`] before the
//! message.

use thiserror::Error;

/// Failure of a bookkeeping database operation.
#[derive(Error, Debug)]
pub enum WmbsError {
    /// The pool could not be opened: unreachable server, rejected credentials,
    /// or a SQLite file that cannot be created.
    #[error("Connection error: {0}")]
    Connection(String),

    /// A DAO statement failed. Covers duplicate LFNs, unknown subscription
    /// types and foreign keys pointing at missing filesets or locations.
    #[error("Query error: {0}")]
    Query(String),

    /// A CREATE statement failed; the message names its key and SQL.
    #[error("Schema error: {0}")]
    Schema(String),

    /// Unreadable config file, missing database URL or unsupported URL scheme.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Anything else, e.g. JSON rendering of availability results.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl WmbsError {
    /// Creates a connection error with the given message.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// Creates a query error with the given message.
    pub fn query(msg: impl Into<String>) -> Self {
        Self::Query(msg.into())
    }

    /// Creates a schema error with the given message.
    pub fn schema(msg: impl Into<String>) -> Self {
        Self::Schema(msg.into())
    }

    /// Creates a configuration error with the given message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Creates an internal error with the given message.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Short label used as the prefix of fatal CLI errors.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Connection(_) => "Connection Error",
            Self::Query(_) => "Query Error",
            Self::Schema(_) => "Schema Error",
            Self::Config(_) => "Configuration Error",
            Self::Internal(_) => "Internal Error",
        }
    }
}

/// Result type alias using WmbsError.
pub type Result<T> = std::result::Result<T, WmbsError>;
