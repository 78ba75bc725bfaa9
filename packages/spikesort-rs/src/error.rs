use crate::types::Stage;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SpikesortError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Layout(#[from] LayoutError),

    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error("Data folder not found: {0}")]
    DataFolderNotFound(PathBuf),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Configuration errors. Any of these stops the process before a session is touched.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read {path}: {source}")]
    Unreadable {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Malformed configuration file {path}: {source}")]
    Malformed {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Missing required configuration key: {0}")]
    MissingKey(String),

    #[error("Invalid configuration value for {key}: {reason}")]
    InvalidValue { key: String, reason: String },
}

/// Reasons the raw-data layout of a session could not be normalized.
#[derive(Error, Debug)]
pub enum LayoutError {
    #[error("No ephys data found in {0}")]
    NoData(PathBuf),

    #[error("More than one run found in {path} ({count} entries), not supported")]
    MultipleRuns { path: PathBuf, count: usize },

    #[error("Expected a run folder but found a file: {0}")]
    NotADirectory(PathBuf),

    #[error("Cannot move {from} to {to}: destination already exists")]
    Conflict { from: PathBuf, to: PathBuf },

    #[error("IO error while normalizing layout: {0}")]
    Io(#[from] std::io::Error),
}

impl LayoutError {
    /// Refusals leave the session untouched so it can be retried later.
    pub fn is_deferral(&self) -> bool {
        matches!(self, LayoutError::NoData(_))
    }
}

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("No auxiliary sync stream (*.nidq.*bin) found in {0}")]
    MissingAuxStream(PathBuf),

    #[error("Failed to write sync descriptor {path}: {source}")]
    DescriptorWrite {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid glob pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    #[error(transparent)]
    Registration(#[from] StageFailure),
}

/// Category of a delegate failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The delegate could not be started at all.
    Spawn,
    /// The delegate ran and exited unsuccessfully.
    ExitStatus,
    /// An input the stage needs is absent on disk.
    MissingInput,
    Io,
    Parse,
}

/// Typed failure returned by every stage adapter.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{stage} failed: {message}")]
pub struct StageFailure {
    pub stage: Stage,
    pub kind: FailureKind,
    pub message: String,
}

impl StageFailure {
    pub fn new(stage: Stage, kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            stage,
            kind,
            message: message.into(),
        }
    }

    pub fn missing_input(stage: Stage, message: impl Into<String>) -> Self {
        Self::new(stage, FailureKind::MissingInput, message)
    }

    pub fn io(stage: Stage, err: std::io::Error) -> Self {
        Self::new(stage, FailureKind::Io, err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, SpikesortError>;
