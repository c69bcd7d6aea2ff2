/*!
# Coordinate Store

Contract of the hosted realtime database that holds every lobby's positions
under `coordinates/<lobby>/<key>`, plus the adapter the sync path talks to.

- [`CoordinateStore`]: the backend seam (push, update, list, subscribe,
  lobbies, remove-all).
- [`InMemoryStore`]: a process-local backend with live full-snapshot
  subscriptions, used by the demo and tests.
- [`LobbyStore`]: write-with-fallback and key bookkeeping on top of any backend.
*/

pub mod adapter;
pub mod memory;

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};
use crate::sync::coordinate::Coordinate;

pub use adapter::{LobbyStore, WriteOutcome};
pub use memory::InMemoryStore;

/// Root collection all lobbies live under.
pub const COORDINATES_ROOT: &str = "coordinates";

/// One entry of a lobby collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredCoordinate {
    pub key: String,
    pub coordinate: Coordinate,
}

/// Full contents of one lobby at one point in time.
#[derive(Debug, Clone, PartialEq)]
pub struct LobbySnapshot {
    pub lobby: String,
    pub entries: Vec<StoredCoordinate>,
}

impl LobbySnapshot {
    pub fn coordinates(&self) -> impl Iterator<Item = &Coordinate> {
        self.entries.iter().map(|entry| &entry.coordinate)
    }
}

/// Live stream of full lobby snapshots; emits the current set first.
pub type SnapshotStream = BoxStream<'static, Vec<StoredCoordinate>>;

/// Backend holding the `coordinates/<lobby>` collections.
#[async_trait]
pub trait CoordinateStore: Send + Sync {
    /// Insert under a freshly generated key and return that key.
    async fn push(&self, lobby: &str, coordinate: &Coordinate) -> StoreResult<String>;

    /// Merge `coordinate` into the existing entry `key`.
    ///
    /// Fails with [`StoreError::KeyNotFound`] when the entry does not exist.
    async fn update(&self, lobby: &str, key: &str, coordinate: &Coordinate) -> StoreResult<()>;

    async fn list(&self, lobby: &str) -> StoreResult<Vec<StoredCoordinate>>;

    async fn subscribe(&self, lobby: &str) -> StoreResult<SnapshotStream>;

    /// Names of every lobby with at least one entry.
    async fn lobbies(&self) -> StoreResult<Vec<String>>;

    /// Delete every lobby. Irreversible.
    async fn remove_all(&self) -> StoreResult<()>;
}

/// Path of a lobby collection, e.g. `coordinates/lobby1`.
pub fn lobby_path(lobby: &str) -> StoreResult<String> {
    validate_key(lobby)?;
    Ok(format!("{COORDINATES_ROOT}/{lobby}"))
}

/// Reject keys that are empty or would break the path layout.
pub fn validate_key(key: &str) -> StoreResult<()> {
    const FORBIDDEN: [char; 6] = ['.', '$', '#', '[', ']', '/'];
    if key.is_empty() || key.contains(FORBIDDEN) || key.chars().any(char::is_control) {
        return Err(StoreError::InvalidKey(key.to_string()));
    }
    Ok(())
}
