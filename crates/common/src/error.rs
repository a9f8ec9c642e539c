//! Error types shared across Clipweave crates.

use std::path::PathBuf;

/// Top-level error type for Clipweave operations.
#[derive(Debug, thiserror::Error)]
pub enum ClipweaveError {
    /// The encoding engine finished a request with a non-zero exit status.
    #[error("Encoding failed during {stage} (exit code {exit_code})")]
    Encoding { stage: String, exit_code: i32 },

    /// The engine could not run a request at all.
    #[error("Engine error: {message}")]
    Engine { message: String },

    #[error("Malformed input: {message}")]
    MalformedInput { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("Unsupported operation: {message}")]
    Unsupported { message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using ClipweaveError.
pub type ClipweaveResult<T> = Result<T, ClipweaveError>;

impl ClipweaveError {
    pub fn encoding(stage: impl Into<String>, exit_code: i32) -> Self {
        Self::Encoding {
            stage: stage.into(),
            exit_code,
        }
    }

    pub fn engine(msg: impl Into<String>) -> Self {
        Self::Engine {
            message: msg.into(),
        }
    }

    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedInput {
            message: msg.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::Unsupported {
            message: msg.into(),
        }
    }

    /// Stage name of an encoding failure, if this is one.
    pub fn failed_stage(&self) -> Option<&str> {
        match self {
            Self::Encoding { stage, .. } => Some(stage),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encoding_error_names_stage() {
        let err = ClipweaveError::encoding("concatenation", 1);
        assert_eq!(err.failed_stage(), Some("concatenation"));
        assert_eq!(
            err.to_string(),
            "Encoding failed during concatenation (exit code 1)"
        );
    }

    #[test]
    fn test_non_encoding_errors_have_no_stage() {
        assert_eq!(ClipweaveError::engine("spawn").failed_stage(), None);
        assert_eq!(ClipweaveError::malformed("end <= start").failed_stage(), None);
    }
}
