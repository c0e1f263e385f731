//! Error types for stagehand.
//!
//! Two severity classes matter to callers: fatal errors abort the current
//! lifecycle hook, warnings are recorded in the apply report and the hook
//! keeps going. `is_warning` is the classification used by the runner.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the stagehand engine.
#[derive(Debug, Error)]
pub enum StagehandError {
    // Static manifest problems
    #[error("Configuration error: {message}")]
    Config { message: String },

    // Placement failures
    #[error("Filesystem error: {message} (path {path:?})")]
    Io {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<std::io::Error>,
    },

    #[error("Staged file not found: {0}")]
    MissingSource(PathBuf),

    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),

    #[error("Could not symlink {src} to {dest}: {reason}")]
    SymlinkFailed {
        src: PathBuf,
        dest: PathBuf,
        reason: String,
    },

    #[error("JSON parse error: {message}")]
    Json {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    // Elevation outcomes, downgraded to report warnings by the runner
    #[error("No usable elevation mechanism: {reason}")]
    ElevationUnavailable { reason: String },

    #[error("Elevation request denied (exit status {status:?})")]
    ElevationDenied { status: Option<i32> },
}

/// Result type alias for stagehand operations.
pub type Result<T> = std::result::Result<T, StagehandError>;

impl From<std::io::Error> for StagehandError {
    fn from(err: std::io::Error) -> Self {
        StagehandError::Io {
            message: err.to_string(),
            path: None,
            source: Some(err),
        }
    }
}

impl From<serde_json::Error> for StagehandError {
    fn from(err: serde_json::Error) -> Self {
        StagehandError::Json {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl StagehandError {
    /// Attach the failing path to an I/O error.
    pub fn io_with_path(err: std::io::Error, path: impl Into<PathBuf>) -> Self {
        StagehandError::Io {
            message: err.to_string(),
            path: Some(path.into()),
            source: Some(err),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        StagehandError::Config {
            message: message.into(),
        }
    }

    /// Check if this error downgrades to a report warning.
    ///
    /// Elevation problems never abort an install: the unelevated artifacts
    /// have already been placed and are worth keeping. Everything else is
    /// fatal for the step that raised it.
    pub fn is_warning(&self) -> bool {
        matches!(
            self,
            StagehandError::ElevationUnavailable { .. } | StagehandError::ElevationDenied { .. }
        )
    }
}
