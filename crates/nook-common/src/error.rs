//! Unified error type for the nook workspace.

use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type shared across the workspace.
#[derive(Debug, Error)]
pub enum NookError {
    /// An I/O operation failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path where the I/O error occurred.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A configuration or argument value is invalid.
    #[error("invalid configuration: {message}")]
    Config {
        /// Description of the invalid configuration.
        message: String,
    },

    /// A required resource was not found.
    #[error("{kind} not found: {id}")]
    NotFound {
        /// Type of the missing resource.
        kind: &'static str,
        /// Identifier of the missing resource.
        id: String,
    },

    /// A resource with the same key already exists.
    #[error("{kind} already exists: {id}")]
    AlreadyExists {
        /// Type of the conflicting resource.
        kind: &'static str,
        /// Identifier of the conflicting resource.
        id: String,
    },

    /// A kernel operation (mount, unmount, clone, setns, kill) failed.
    #[error("{operation} failed: {source}")]
    Kernel {
        /// Description of the attempted operation.
        operation: String,
        /// Underlying OS error.
        source: std::io::Error,
    },

    /// Launching or handing off to a container process failed.
    #[error("process error: {message}")]
    Process {
        /// Description of the failure.
        message: String,
    },

    /// Serialization or deserialization failed.
    #[error("serialization error: {source}")]
    Serialization {
        /// Underlying serialization error.
        #[from]
        source: serde_json::Error,
    },
}

impl NookError {
    /// Wraps an I/O error with the path it occurred at.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Wraps an OS error raised by a kernel operation.
    pub fn kernel(operation: impl Into<String>, source: impl Into<std::io::Error>) -> Self {
        Self::Kernel {
            operation: operation.into(),
            source: source.into(),
        }
    }

    /// Returns whether this error reports a missing resource.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, NookError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_is_distinguishable_from_io() {
        let missing = NookError::NotFound {
            kind: "container",
            id: "web".into(),
        };
        let io = NookError::io("/x", std::io::Error::from(std::io::ErrorKind::NotFound));
        assert!(missing.is_not_found());
        assert!(!io.is_not_found());
        assert_eq!(missing.to_string(), "container not found: web");
    }
}
