//! Error types for lobby_sync

use std::path::PathBuf;
use thiserror::Error;

/// Errors reported by a coordinate store backend
#[derive(Debug, Clone, Error, PartialEq)]
pub enum StoreError {
    /// Update targeted a key that does not exist yet
    #[error("no entry {key} under coordinates/{lobby}")]
    KeyNotFound { lobby: String, key: String },

    /// Lobby, user or entry key is not a valid path segment
    #[error("invalid key {0:?}")]
    InvalidKey(String),

    /// Backend could not be reached
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// Backend refused the operation
    #[error("store rejected operation: {0}")]
    Rejected(String),
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors surfaced by the sync layer
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SyncError {
    /// Both the update and the fallback insert failed
    #[error("write for {user} in lobby {lobby} failed: update ({update}), insert ({insert})")]
    WriteFailed {
        lobby: String,
        user: String,
        update: StoreError,
        insert: StoreError,
    },

    #[error(transparent)]
    Store(#[from] StoreError),

    /// Bridge between the ECS and the store runtime went away
    #[error("bridge channel closed")]
    ChannelClosed,
}

/// Result type for sync operations
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors loading or validating a [`crate::SyncConfig`]
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config json: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}
