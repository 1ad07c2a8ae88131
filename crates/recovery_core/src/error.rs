//! Error types for the recovery core.

use std::path::PathBuf;

use thiserror::Error;

/// Reasons a host refused to register the periodic heal task.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScheduleError {
    /// The host scheduler is not accepting new tasks.
    #[error("scheduler rejected the task: {0}")]
    Rejected(String),

    /// All task slots are taken.
    #[error("scheduler is at capacity ({limit} tasks)")]
    CapacityExhausted { limit: usize },

    /// Repeating tasks need an interval of at least one tick.
    #[error("invalid repeat interval of {0} ticks")]
    InvalidInterval(u64),
}

/// Errors surfaced while loading or storing recovery settings.
#[derive(Debug, Error)]
pub enum RecoveryError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid settings file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize settings: {0}")]
    Serialize(#[from] toml::ser::Error),
}

pub type RecoveryResult<T> = Result<T, RecoveryError>;
