//! Error types for scubuild.
//!
//! Library crates use [`ScuBuildError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all scubuild operations.
#[derive(Debug, thiserror::Error)]
pub enum ScuBuildError {
    /// Configuration or module table loading error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Precondition failure (wrong root folder, malformed module entry, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },

    /// Platform flag configuration cannot be satisfied.
    #[error("platform error: {0}")]
    Platform(String),

    /// Documentation packing failed (compression or header output).
    #[error("doc pack error: {0}")]
    Pack(String),
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, ScuBuildError>;

impl ScuBuildError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Create a platform error from any displayable message.
    pub fn platform(msg: impl Into<String>) -> Self {
        Self::Platform(msg.into())
    }

    /// Create a doc pack error from any displayable message.
    pub fn pack(msg: impl Into<String>) -> Self {
        Self::Pack(msg.into())
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
        let err = ScuBuildError::config("table has no modules");
        assert_eq!(err.to_string(), "config error: table has no modules");

        let err = ScuBuildError::validation("required directory 'core' not found");
        assert!(err.to_string().contains("'core'"));

        let err = ScuBuildError::platform("ThinLTO requires LLVM");
        assert_eq!(err.to_string(), "platform error: ThinLTO requires LLVM");
    }

    #[test]
    fn io_error_keeps_path() {
        let err = ScuBuildError::io(
            "/tmp/missing/.scu",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        let msg = err.to_string();
        assert!(msg.contains("/tmp/missing/.scu"));
        assert!(msg.contains("denied"));
    }
}
