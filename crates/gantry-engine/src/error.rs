/// Engine error types
use std::path::PathBuf;
use thiserror::Error;

pub type EngineResult<T> = Result<T, EngineError>;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Invalid operation: {0}")]
    InvalidState(String),

    #[error("{what} must be {requirement}, got {value}")]
    OutOfRange {
        what: String,
        requirement: String,
        value: f64,
    },

    #[error("The operation was canceled")]
    Canceled,

    #[error("Invalid test package: {0}")]
    InvalidPackage(String),

    #[error("Failed to read package manifest at {path}: {error}")]
    ManifestReadError { path: PathBuf, error: String },

    #[error("Failed to load artifact '{path}': {cause}")]
    ArtifactLoad { path: PathBuf, cause: String },

    #[error("The session is closed")]
    SessionClosed,

    #[error("Unknown session: {0}")]
    UnknownSession(String),

    #[error("Report format '{0}' is not supported")]
    UnknownFormat(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    /// Create an invalid-state error
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState(message.into())
    }

    /// Create an out-of-range error for a numeric argument
    pub fn out_of_range(what: impl Into<String>, requirement: impl Into<String>, value: f64) -> Self {
        Self::OutOfRange {
            what: what.into(),
            requirement: requirement.into(),
            value,
        }
    }

    /// Create a manifest read error
    pub fn manifest_read(path: impl Into<PathBuf>, error: impl ToString) -> Self {
        Self::ManifestReadError {
            path: path.into(),
            error: error.to_string(),
        }
    }

    /// Create an artifact load error
    pub fn artifact_load(path: impl Into<PathBuf>, cause: impl ToString) -> Self {
        Self::ArtifactLoad {
            path: path.into(),
            cause: cause.to_string(),
        }
    }

    /// True if this error is the cooperative-cancellation signal
    pub fn is_canceled(&self) -> bool {
        matches!(self, Self::Canceled)
    }
}
