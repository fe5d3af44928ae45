/// Centralized error types for knowledge-mcp using thiserror
///
/// Every failure in this crate is a typed, recoverable value. The MCP layer
/// translates these into user-facing tool-result messages; nothing here is
/// fatal to the process.
use thiserror::Error;

/// Main error type for the knowledge server
#[derive(Error, Debug)]
pub enum KnowledgeError {
    #[error("Search timed out after {timeout_seconds}s (query: '{query}')")]
    SearchTimeout { query: String, timeout_seconds: u64 },

    #[error("Search engine error: {stderr}")]
    SearchEngineError { stderr: String },

    #[error("Invalid search query: {reason}")]
    InvalidQuery { query: String, reason: String },

    #[error("Filter timeout running '{command}' (>{timeout_seconds}s)")]
    FilterTimeout { command: String, timeout_seconds: u64 },

    #[error("Filter failed: {command}: {reason}")]
    FilterExecutionError { command: String, reason: String },

    #[error("Filter command rejected by security policy: {reason}")]
    SecurityViolation { reason: String },

    #[error("Path not found: {0}")]
    PathNotFound(String),

    #[error("Document not found: {0}")]
    DocumentNotFound(String),

    #[error("Path escapes knowledge root: {0}")]
    PathTraversal(String),

    #[error("File too large: {size_mb:.1}MB (max: {max_mb}MB)")]
    FileTooLarge {
        path: String,
        size_mb: f64,
        max_mb: u64,
    },

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

/// Errors related to configuration loading and validation
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    #[error("Failed to load configuration file: {0}")]
    LoadFailed(String),

    #[error("Failed to parse configuration: {0}")]
    ParseFailed(String),

    #[error("Invalid configuration value for '{key}': {reason}")]
    InvalidValue { key: String, reason: String },
}

// Conversion from anyhow::Error at the server seam
impl From<anyhow::Error> for KnowledgeError {
    fn from(err: anyhow::Error) -> Self {
        KnowledgeError::Other(format!("{:#}", err))
    }
}

impl KnowledgeError {
    /// Create a new error from a string message
    pub fn other(msg: impl Into<String>) -> Self {
        KnowledgeError::Other(msg.into())
    }

    /// Check if the caller can reasonably retry (with a narrower scope)
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            KnowledgeError::SearchTimeout { .. } | KnowledgeError::FilterTimeout { .. }
        )
    }

    /// Check if this is a user error (bad input) vs a system error
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            KnowledgeError::InvalidQuery { .. }
                | KnowledgeError::PathNotFound(_)
                | KnowledgeError::DocumentNotFound(_)
                | KnowledgeError::PathTraversal(_)
                | KnowledgeError::FileTooLarge { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, KnowledgeError>;
