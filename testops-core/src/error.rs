//! Error types and exit codes.

use std::path::PathBuf;
use std::process::ExitCode;

use thiserror::Error;

/// Main error type for migration, backup and rollback operations.
#[derive(Error, Debug)]
pub enum MigrationError {
    #[error("{method} {url} failed with status {status}: {body}")]
    Status {
        method: String,
        url: String,
        status: u16,
        body: String,
    },

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to build worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),

    #[error("Not found: {what}")]
    NotFound { what: String },

    #[error("Unexpected response: {message}")]
    Unexpected { message: String },

    #[error("Invalid configuration: {message}")]
    Config { message: String },

    #[error("Unsupported operation: {message}")]
    Unsupported { message: String },

    #[error("Task panicked: {message}")]
    Panic { message: String },
}

impl MigrationError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }

    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected {
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Convert error to a process exit code:
    /// - 1: local IO / serialization
    /// - 2: invalid configuration
    /// - 3: remote service failure
    /// - 4: internal failure
    pub fn exit_code(&self) -> ExitCode {
        match self {
            Self::Io { .. } | Self::Json(_) => ExitCode::from(1),
            Self::Config { .. } => ExitCode::from(2),
            Self::Status { .. }
            | Self::Transport(_)
            | Self::NotFound { .. }
            | Self::Unexpected { .. } => ExitCode::from(3),
            Self::Pool(_) | Self::Unsupported { .. } | Self::Panic { .. } => ExitCode::from(4),
        }
    }
}

/// Result type alias for migration operations.
pub type Result<T> = std::result::Result<T, MigrationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_error_message() {
        let err = MigrationError::Status {
            method: "GET".to_string(),
            url: "https://testops.local/api/rs/testcase/1".to_string(),
            status: 404,
            body: "no such test case".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "GET https://testops.local/api/rs/testcase/1 failed with status 404: no such test case"
        );
    }

    #[test]
    fn test_exit_codes() {
        let code = |err: MigrationError| format!("{:?}", err.exit_code());
        assert_eq!(code(MigrationError::config("x")), format!("{:?}", ExitCode::from(2)));
        assert_eq!(code(MigrationError::not_found("x")), format!("{:?}", ExitCode::from(3)));
        let io = MigrationError::io("/tmp/x", std::io::Error::other("boom"));
        assert_eq!(code(io), format!("{:?}", ExitCode::from(1)));
    }
}
