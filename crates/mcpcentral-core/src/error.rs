use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CentralError {
    #[error("invalid registry document: {0}")]
    Structural(String),

    #[error("schema check failed: {0}")]
    Schema(String),

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("server not found: {0}")]
    NotFound(String),

    #[error("server already exists: {0}")]
    AlreadyExists(String),

    #[error("rename conflict: target already exists: {0}")]
    RenameConflict(String),

    #[error("unknown target: {0}")]
    UnknownTarget(String),

    #[error("unknown template: {0}")]
    UnknownTemplate(String),

    #[error("unknown preset: {0}")]
    UnknownPreset(String),

    #[error("backup file does not exist: {}", .0.display())]
    BackupMissing(PathBuf),

    #[error("external command failed: {command} (exit {exit_code:?}): {stderr}")]
    CommandFailed {
        command: String,
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("external command timed out after {seconds}s: {command}")]
    CommandTimeout { command: String, seconds: u64 },
}

impl CentralError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
