use std::path::PathBuf;
use thiserror::Error;

/// Central error type for the voxlift-core crate.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Missing or unreadable input file, or an invalid batch folder.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The separation backend failed (non-zero exit, missing vocals stream).
    #[error("separation failed: {0}")]
    Separation(String),

    /// An intermediate file the backend was expected to produce is absent.
    #[error("expected artifact not found: {}", .0.display())]
    ArtifactNotFound(PathBuf),

    /// One or more parallel chunks failed; partial output is never accepted.
    #[error("{failed} of {total} chunks failed: {detail}")]
    ChunkProcessing {
        failed: usize,
        total: usize,
        detail: String,
    },

    /// The cancellation token was observed set. A deliberate abort, not a
    /// generic error; callers should present it as such.
    #[error("processing cancelled")]
    Cancelled,

    /// A requested combination is not available in the current build.
    #[error("unsupported configuration: {0}")]
    Unsupported(String),

    // Generic fallback (wraps anyhow)
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl EngineError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, EngineError::Cancelled)
    }
}

// --- Implement From conversions for common errors ---
impl From<std::io::Error> for EngineError {
    fn from(e: std::io::Error) -> Self {
        EngineError::Other(e.into())
    }
}

impl From<serde_yaml::Error> for EngineError {
    fn from(e: serde_yaml::Error) -> Self {
        EngineError::Other(e.into())
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
