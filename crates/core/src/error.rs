//! Error types for the agent core.
//!
//! Uses `thiserror` for the definitions. Faults raised inside a capability
//! are [`ToolError`]s and never leave the registry boundary; only
//! [`BackendError`] and configuration faults reach the caller of a turn.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The top-level error type for agent operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, Error)]
pub enum BackendError {
    #[error("No model loaded: {0}")]
    NotLoaded(String),

    #[error("Generation failed: {0}")]
    Generation(String),

    #[error("Token stream interrupted: {0}")]
    StreamInterrupted(String),

    #[error("Generation timed out after {0}ms")]
    Timeout(u64),
}

/// Coarse classification of a tool fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    NotFound,
    Availability,
    Security,
    Timeout,
    ResourceLimit,
    Execution,
    Configuration,
}

#[derive(Debug, Clone, Error)]
pub enum ToolError {
    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),

    #[error("Missing required parameter: {0}")]
    MissingParameter(String),

    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Path not found: {0}")]
    PathNotFound(String),

    #[error("Tool not available: {0}")]
    Unavailable(String),

    #[error("Command blocked for security: {0}")]
    Blocked(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("{operation} timed out after {timeout_ms}ms")]
    Timeout { operation: String, timeout_ms: u64 },

    #[error("{what} too large: {size} bytes (limit {limit})")]
    ResourceLimit { what: String, size: u64, limit: u64 },

    #[error("Exit code: {0}")]
    ExitCode(i32),

    #[error("HTTP {0}")]
    HttpStatus(u16),

    #[error("Tool execution failed: {0}")]
    ExecutionFailed(String),

    #[error("Not configured: {0}")]
    NotConfigured(String),
}

impl ToolError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidArguments(_) | Self::MissingParameter(_) => ErrorKind::Validation,
            Self::UnknownTool(_) | Self::PathNotFound(_) => ErrorKind::NotFound,
            Self::Unavailable(_) => ErrorKind::Availability,
            Self::Blocked(_) | Self::PermissionDenied(_) => ErrorKind::Security,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::ResourceLimit { .. } => ErrorKind::ResourceLimit,
            Self::ExitCode(_) | Self::HttpStatus(_) | Self::ExecutionFailed(_) => {
                ErrorKind::Execution
            }
            Self::NotConfigured(_) => ErrorKind::Configuration,
        }
    }
}

impl From<std::io::Error> for ToolError {
    fn from(err: std::io::Error) -> Self {
        Self::ExecutionFailed(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_error_displays_correctly() {
        let err = Error::Backend(BackendError::Generation("device lost".into()));
        assert!(err.to_string().contains("Backend error"));
        assert!(err.to_string().contains("device lost"));
    }

    #[test]
    fn tool_error_kinds() {
        assert_eq!(ToolError::Blocked("mkfs".into()).kind(), ErrorKind::Security);
        assert_eq!(ToolError::UnknownTool("x".into()).kind(), ErrorKind::NotFound);
        assert_eq!(ToolError::ExitCode(2).kind(), ErrorKind::Execution);
        assert_eq!(
            ToolError::NotConfigured("ask_user".into()).kind(),
            ErrorKind::Configuration
        );
    }

    #[test]
    fn timeout_message_mentions_duration() {
        let err = ToolError::Timeout {
            operation: "Command".into(),
            timeout_ms: 250,
        };
        assert_eq!(err.to_string(), "Command timed out after 250ms");
    }
}
