//! Watch Error Hierarchy
//!
//! Top-level error type returned by the crate's fallible entry points:
//! configuration loading, watch construction, and joining a finished watch.
//! Store failures keep their own [`StoreError`] type so the watch loop can
//! classify them without unwrapping this enum.

use config::ConfigError;
use tokio::task::JoinError;

use crate::StoreError;

#[doc(hidden)]
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Configuration source could not be read or deserialized
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Configuration was parsed but failed validation
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Watch target rejected before any request was sent
    #[error("Invalid watch target: {0}")]
    InvalidTarget(String),

    /// Failure reported by the store client
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The background watch task panicked or was aborted
    #[error("Background task failed: {0}")]
    TaskFailed(#[from] JoinError),

    /// OS signal registration failures
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Unrecoverable failures requiring process termination
    #[error("Fatal error: {0}")]
    Fatal(String),
}
