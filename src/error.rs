use std::path::PathBuf;
use thiserror::Error;

/// Fatal problems detected before any work begins
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Worker count must be at least 1 (got {0})")]
    InvalidWorkerCount(usize),

    #[error("Source directory does not exist: {0}")]
    MissingSourceDir(PathBuf),

    #[error("Script directory does not exist: {0}")]
    MissingScriptDir(PathBuf),

    #[error("Staging directory does not exist: {0}")]
    MissingStagingDir(PathBuf),

    #[error("Invalid file pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("Timeout must be greater than zero")]
    ZeroTimeout,

    #[error("{0} must not be empty")]
    EmptySetting(&'static str),

    #[error("Image directory must be a single folder name inside the destination (got '{0}')")]
    InvalidImageDir(String),

    #[error("Failed to load configuration: {0}")]
    Load(#[from] ::config::ConfigError),
}

/// Per-document failures; the directory driver logs these and moves on
#[derive(Error, Debug)]
pub enum TranspileError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Document has no file name: {0}")]
    NoFileName(PathBuf),
}

impl TranspileError {
    pub fn read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Read {
            path: path.into(),
            source,
        }
    }

    pub fn write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Write {
            path: path.into(),
            source,
        }
    }
}

/// A subprocess that never produced an exit status
#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("Failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed waiting for {program}: {source}")]
    Wait {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("Empty command line")]
    EmptyCommand,
}
