//! Error types for the window cache.

use chrono::NaiveDate;
use thiserror::Error;

/// Errors that can occur while mirroring a calendar window.
#[derive(Error, Debug)]
pub enum SyncError {
    /// No token could be obtained after the bounded retries.
    #[error("authentication failed")]
    Auth,

    #[error("not signed in")]
    NotSignedIn,

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Provider '{0}' not found in PATH")]
    ProviderNotInstalled(String),

    #[error("Storage error: {0}")]
    Storage(String),

    /// The job was superseded or explicitly cancelled. Not a user-visible failure.
    #[error("fetch cancelled")]
    Cancelled,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid date range: {start} is after {end}")]
    InvalidRange { start: NaiveDate, end: NaiveDate },

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl SyncError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, SyncError::Cancelled)
    }
}

/// Result type alias for window cache operations.
pub type SyncResult<T> = Result<T, SyncError>;
