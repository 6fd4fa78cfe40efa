//! Error types for db-parity.
//!
//! Defines the main error enum used throughout the crate. The same type is
//! stored inside an `Outcome` when one side of a comparison fails.

use thiserror::Error;

/// Main error type for db-parity operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParityError {
    /// The handle is unusable (host unreachable, pool closed, broken pipe, etc.)
    #[error("Connection error: {0}")]
    Connection(String),

    /// The statement was rejected or failed mid-run (syntax errors, constraint violations, etc.)
    #[error("Query error: {0}")]
    Query(String),

    /// Configuration errors (invalid config file, unknown source, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// The mismatch reporter could not record a finding.
    #[error("Report error: {0}")]
    Report(String),

    /// A cancellable comparison was stopped before both sides finished.
    #[error("Comparison cancelled")]
    Cancelled,

    /// Internal errors (unexpected states, bugs, etc.)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ParityError {
    /// Creates a connection error with the given message.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// Creates a query error with the given message.
    pub fn query(msg: impl Into<String>) -> Self {
        Self::Query(msg.into())
    }

    /// Creates a configuration error with the given message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Creates a report error with the given message.
    pub fn report(msg: impl Into<String>) -> Self {
        Self::Report(msg.into())
    }

    /// Creates an internal error with the given message.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Returns true if the handle itself was unusable, as opposed to the
    /// statement failing on a working connection.
    pub fn is_connection(&self) -> bool {
        matches!(self, Self::Connection(_))
    }

    /// Returns the error category as a string for display purposes.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Connection(_) => "Connection Error",
            Self::Query(_) => "Query Error",
            Self::Config(_) => "Configuration Error",
            Self::Report(_) => "Report Error",
            Self::Cancelled => "Cancelled",
            Self::Internal(_) => "Internal Error",
        }
    }
}

impl From<std::io::Error> for ParityError {
    fn from(e: std::io::Error) -> Self {
        Self::Report(e.to_string())
    }
}

/// Result type alias using ParityError.
pub type Result<T> = std::result::Result<T, ParityError>;
