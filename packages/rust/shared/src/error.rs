//! Error types for GraphOps.
//!
//! Library crates use [`GraphOpsError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all GraphOps operations.
#[derive(Debug, thiserror::Error)]
pub enum GraphOpsError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// The external knowledge-graph tool exited with a failure status.
    #[error("tool failure: `{command}` exited with {}", format_tool_failure(.status, .stderr))]
    Tool {
        /// Rendered command line that was executed.
        command: String,
        /// Exit code, if the process exited normally.
        status: Option<i32>,
        /// Tail of captured standard error.
        stderr: String,
    },

    /// A source file could not be decoded with any supported encoding.
    #[error("decode error: could not decode {path:?} as utf-8 or windows-1252")]
    Decode { path: PathBuf },

    /// HTML parsing or content extraction error.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (malformed workspace, collisions, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, GraphOpsError>;

fn format_tool_failure(status: &Option<i32>, stderr: &str) -> String {
    let label = match status {
        Some(code) => code.to_string(),
        None => "signal".to_string(),
    };
    if stderr.is_empty() {
        label
    } else {
        format!("{label}\n{stderr}")
    }
}

impl GraphOpsError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = GraphOpsError::config("missing workspace directory");
        assert_eq!(err.to_string(), "config error: missing workspace directory");

        let err = GraphOpsError::validation("batch size must be at least 1");
        assert!(err.to_string().contains("batch size"));
    }

    #[test]
    fn tool_error_includes_command_and_stderr() {
        let err = GraphOpsError::Tool {
            command: "python -m graphrag index --root ws".into(),
            status: Some(1),
            stderr: "rate limit exceeded".into(),
        };
        let text = err.to_string();
        assert!(text.contains("graphrag index"));
        assert!(text.contains("exited with 1"));
        assert!(text.contains("rate limit exceeded"));
    }

    #[test]
    fn tool_error_killed_by_signal() {
        let err = GraphOpsError::Tool {
            command: "python -m graphrag init --root ws".into(),
            status: None,
            stderr: String::new(),
        };
        assert!(err.to_string().contains("signal"));
    }
}
