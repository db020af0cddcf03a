use std::path::PathBuf;

use thiserror::Error;

pub type RdResult<T> = Result<T, RdError>;

#[derive(Debug, Error)]
pub enum RdError {
    #[error("i/o failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("json failure: {0}")]
    Json(#[from] serde_json::Error),

    #[error("missing command `{command}` on PATH")]
    CommandMissing { command: String },

    #[error("command failed: `{command}` (status: {status}){stderr_suffix}")]
    CommandFailed {
        command: String,
        status: i32,
        stderr_suffix: String,
    },

    #[error("command timed out after {timeout_ms}ms: `{command}`{stderr_suffix}")]
    CommandTimedOut {
        command: String,
        timeout_ms: u64,
        stderr_suffix: String,
    },

    #[error("collaborator unavailable: {0}")]
    BackendUnavailable(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("unsupported language `{0}`")]
    UnsupportedLanguage(String),

    #[error("invalid interval: start {start} must be before end {end}")]
    InvalidInterval { start: f64, end: f64 },

    #[error("timeline partition violated: {0}")]
    PartitionInvariant(String),

    #[error("missing expected artifact at `{0}`")]
    MissingArtifact(PathBuf),

    #[error("pipeline cancelled: {0}")]
    Cancelled(String),
}

impl RdError {
    #[must_use]
    pub fn from_command_failure(command: String, status: i32, stderr: String) -> Self {
        let trimmed = stderr.trim();
        let stderr_suffix = if trimmed.is_empty() {
            String::new()
        } else {
            format!("; stderr: {trimmed}")
        };
        Self::CommandFailed {
            command,
            status,
            stderr_suffix,
        }
    }

    #[must_use]
    pub fn from_command_timeout(command: String, timeout_ms: u64, stderr: String) -> Self {
        let trimmed = stderr.trim();
        let stderr_suffix = if trimmed.is_empty() {
            String::new()
        } else {
            format!("; stderr: {trimmed}")
        };
        Self::CommandTimedOut {
            command,
            timeout_ms,
            stderr_suffix,
        }
    }

    /// Stable, unique, machine-readable error code for every variant.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::Io(_) => "RD-IO",
            Self::Json(_) => "RD-JSON",
            Self::CommandMissing { .. } => "RD-CMD-MISSING",
            Self::CommandFailed { .. } => "RD-CMD-FAILED",
            Self::CommandTimedOut { .. } => "RD-CMD-TIMEOUT",
            Self::BackendUnavailable(_) => "RD-BACKEND-UNAVAILABLE",
            Self::InvalidRequest(_) => "RD-INVALID-REQUEST",
            Self::UnsupportedLanguage(_) => "RD-UNSUPPORTED-LANGUAGE",
            Self::InvalidInterval { .. } => "RD-INVALID-INTERVAL",
            Self::PartitionInvariant(_) => "RD-PARTITION-INVARIANT",
            Self::MissingArtifact(_) => "RD-MISSING-ARTIFACT",
            Self::Cancelled(_) => "RD-CANCELLED",
        }
    }
}
