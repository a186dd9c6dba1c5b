//! Error types for the RCA engine.
//!
//! Every error belongs to one behavioural [`ErrorKind`]. Only
//! [`ErrorKind::ProgrammerError`] is allowed to escape the collaborator; the
//! other kinds are absorbed into failed task results or advisory text.

use thiserror::Error;

/// Result type alias used across the workspace
pub type Result<T> = std::result::Result<T, Error>;

/// Behavioural error category
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Metrics, logs or topology source failed
    DataSourceFailure,
    /// Chat completion failed
    LlmFailure,
    /// Decision or output task was built without its required input
    MissingContextKey,
    /// The caller-supplied deadline expired during I/O
    DeadlineExpired,
    /// Misuse of the API; fatal for a run
    ProgrammerError,
}

/// Error type for the RCA engine
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid configuration value
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid caller input
    #[error("Validation error: {0}")]
    Validation(String),

    /// Data source failure
    #[error("Data source '{source_name}' failed: {message}")]
    DataSource {
        source_name: String,
        message: String,
    },

    /// LLM failure
    #[error("LLM error: {0}")]
    Llm(String),

    /// Required task input missing
    #[error("Missing context key: {0}")]
    MissingContext(String),

    /// No agent registered for a mandatory role
    #[error("No agent registered for role '{0}'")]
    UnregisteredRole(String),

    /// Deadline expired
    #[error("deadline")]
    Deadline,

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// File I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal invariant violation
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a data source error
    pub fn data_source(source_name: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::DataSource {
            source_name: source_name.into(),
            message: msg.into(),
        }
    }

    /// Create an LLM error
    pub fn llm(msg: impl Into<String>) -> Self {
        Self::Llm(msg.into())
    }

    /// Create a missing context error
    pub fn missing_context(key: impl Into<String>) -> Self {
        Self::MissingContext(key.into())
    }

    /// Create an unregistered role error
    pub fn unregistered_role(role: impl std::fmt::Display) -> Self {
        Self::UnregisteredRole(role.to_string())
    }

    /// Create a deadline error
    pub fn deadline() -> Self {
        Self::Deadline
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Behavioural category of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::DataSource { .. } | Error::Io(_) => ErrorKind::DataSourceFailure,
            Error::Llm(_) => ErrorKind::LlmFailure,
            Error::MissingContext(_) => ErrorKind::MissingContextKey,
            Error::Deadline => ErrorKind::DeadlineExpired,
            Error::Config(_)
            | Error::Validation(_)
            | Error::UnregisteredRole(_)
            | Error::Serialization(_)
            | Error::Internal(_) => ErrorKind::ProgrammerError,
        }
    }

    /// Whether this error must abort a collaboration run
    pub fn is_fatal(&self) -> bool {
        self.kind() == ErrorKind::ProgrammerError
    }
}
