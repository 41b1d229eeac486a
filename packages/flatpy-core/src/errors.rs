//! Error types for flatpy-core
//!
//! Provides unified error handling across the crate.

use thiserror::Error;

/// Main error type for flatpy operations
#[derive(Debug, Error)]
pub enum FlatpyError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The source text does not parse into a valid program tree
    #[error("parse error: {0}")]
    Parse(String),

    /// A node kind with no rewrite rule was reached from the input
    #[error("unsupported construct: {0}")]
    Unsupported(String),

    /// An internal contract was broken; fail fast rather than miscompile
    #[error("invariant violation: {0}")]
    Invariant(String),

    /// The sandbox failed while executing a generated program
    #[error("execution error: {0}")]
    Exec(String),

    /// A trace hook was removed that was never registered
    #[error("no {event} hook registered under id {id}")]
    HookNotRegistered { event: &'static str, id: u64 },

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),
}

impl FlatpyError {
    /// Create a parse error
    pub fn parse(msg: impl Into<String>) -> Self {
        FlatpyError::Parse(msg.into())
    }

    /// Create an unsupported-construct error from a node kind
    pub fn unsupported(kind: impl Into<String>) -> Self {
        FlatpyError::Unsupported(kind.into())
    }

    /// Create an invariant violation
    pub fn invariant(msg: impl Into<String>) -> Self {
        FlatpyError::Invariant(msg.into())
    }

    /// Create an execution error
    pub fn exec(msg: impl Into<String>) -> Self {
        FlatpyError::Exec(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        FlatpyError::Config(msg.into())
    }
}

/// Result type alias for flatpy operations
pub type Result<T> = std::result::Result<T, FlatpyError>;
