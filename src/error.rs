//! Error types for db-guard.
//!
//! `GuardError` covers operational failures (startup, configuration, backend
//! faults). Policy rejections have their own type in [`crate::safety`] and never
//! surface as a `GuardError` through the tool contract.

use thiserror::Error;

/// Main error type for db-guard operations.
#[derive(Error, Debug)]
pub enum GuardError {
    /// Database connection errors (host unreachable, auth failed, pool exhausted, etc.)
    #[error("Connection error: {0}")]
    Connection(String),

    /// Statement execution errors (syntax errors, missing tables, timeouts, etc.)
    #[error("Query error: {0}")]
    Query(String),

    /// Configuration errors (invalid config file, bad connection string, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal errors (unexpected states, I/O on the tool channel, etc.)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl GuardError {
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

    /// Creates an internal error with the given message.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Returns the error category as a string for display purposes.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Connection(_) => "Connection Error",
            Self::Query(_) => "Query Error",
            Self::Config(_) => "Configuration Error",
            Self::Internal(_) => "Internal Error",
        }
    }

    /// Returns the bare diagnostic without the category prefix.
    ///
    /// This is the text handed back to agents inside `ERROR: ...` results.
    pub fn diagnostic(&self) -> &str {
        match self {
            Self::Connection(msg) | Self::Query(msg) | Self::Config(msg) | Self::Internal(msg) => {
                msg
            }
        }
    }
}

/// Result type alias using GuardError.
pub type Result<T> = std::result::Result<T, GuardError>;
