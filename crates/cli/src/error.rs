//! Error types for CLI operations.

use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// Configuration loading or validation error
    #[error("Invalid configuration: {message}")]
    ConfigInvalid { message: String },

    /// No built-in query with this name
    #[error("Unknown query '{name}' (available: {available})")]
    UnknownQuery { name: String, available: String },

    /// Query compilation error
    #[error("Failed to compile query '{query}': {message}")]
    Plan { query: String, message: String },

    /// Pipeline execution error
    #[error("Query execution failed: {message}")]
    Execution { message: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error wrapper
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl CliError {
    pub fn config_not_found(path: impl Into<String>) -> Self {
        Self::ConfigNotFound { path: path.into() }
    }

    pub fn config_invalid(message: impl Into<String>) -> Self {
        Self::ConfigInvalid {
            message: message.into(),
        }
    }

    pub fn unknown_query<'a>(
        name: impl Into<String>,
        available: impl IntoIterator<Item = &'a str>,
    ) -> Self {
        Self::UnknownQuery {
            name: name.into(),
            available: available.into_iter().collect::<Vec<_>>().join(", "),
        }
    }

    pub fn plan(query: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Plan {
            query: query.into(),
            message: message.into(),
        }
    }

    pub fn execution(message: impl Into<String>) -> Self {
        Self::Execution {
            message: message.into(),
        }
    }
}

/// Result type alias for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;
