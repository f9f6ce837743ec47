//! Error types for rivalscope.
//!
//! Library crates use [`RivalscopeError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all rivalscope operations.
#[derive(Debug, thiserror::Error)]
pub enum RivalscopeError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// A required secret is not present in the environment.
    #[error("missing credential: set the {var} environment variable (or add it to .env)")]
    MissingCredential { var: String },

    /// Transport-level HTTP error (connect, timeout, body read).
    #[error("network error: {0}")]
    Network(String),

    /// A hosted provider answered with an error.
    #[error("{provider} error: {message}")]
    Provider { provider: String, message: String },

    /// Response or document parsing error.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Workflow construction or state-merge violation.
    #[error("pipeline error: {message}")]
    Pipeline { message: String },

    /// Data validation error (bad argument, schema mismatch, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },

    /// Vector index build, persist, or load error.
    #[error("index error: {0}")]
    Index(String),

    /// Report or CSV artifact export error.
    #[error("export error: {0}")]
    Export(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, RivalscopeError>;

impl RivalscopeError {
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

    /// Create a pipeline error from any displayable message.
    pub fn pipeline(msg: impl Into<String>) -> Self {
        Self::Pipeline {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Create a provider error tagged with the provider's name.
    pub fn provider(provider: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Provider {
            provider: provider.into(),
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
        let err = RivalscopeError::config("bad toml");
        assert_eq!(err.to_string(), "config error: bad toml");

        let err = RivalscopeError::provider("tavily", "HTTP 500");
        assert_eq!(err.to_string(), "tavily error: HTTP 500");

        let err = RivalscopeError::MissingCredential {
            var: "GEMINI_API_KEY".into(),
        };
        assert!(err.to_string().contains("GEMINI_API_KEY"));
    }
}
