use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use futures_util::StreamExt;
use rand::Rng;
use rand::distributions::Alphanumeric;
use tokio::sync::watch;
use tracing::debug;

use super::{CoordinateStore, SnapshotStream, StoredCoordinate, validate_key};
use crate::error::{StoreError, StoreResult};
use crate::sync::coordinate::Coordinate;

#[derive(Default)]
struct StoreState {
    lobbies: BTreeMap<String, BTreeMap<String, Coordinate>>,
    watchers: HashMap<String, watch::Sender<Vec<StoredCoordinate>>>,
}

impl StoreState {
    fn entries(&self, lobby: &str) -> Vec<StoredCoordinate> {
        self.lobbies
            .get(lobby)
            .map(|entries| {
                entries
                    .iter()
                    .map(|(key, coordinate)| StoredCoordinate {
                        key: key.clone(),
                        coordinate: coordinate.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    fn notify(&self, lobby: &str) {
        if let Some(sender) = self.watchers.get(lobby) {
            sender.send_replace(self.entries(lobby));
        }
    }
}

/// Process-local stand-in for the hosted realtime database.
///
/// Keeps last-write-wins per key and pushes a full snapshot to every
/// subscriber of a lobby on each change, like the hosted list API.
#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<StoreState>,
    push_counter: AtomicU64,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> StoreResult<MutexGuard<'_, StoreState>> {
        self.state
            .lock()
            .map_err(|_| StoreError::Unavailable("store state poisoned".to_string()))
    }

    /// Chronologically sortable push id: counter prefix plus random suffix.
    fn next_push_key(&self) -> String {
        let sequence = self.push_counter.fetch_add(1, Ordering::Relaxed);
        let suffix: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(8)
            .map(char::from)
            .collect();
        format!("-{sequence:012x}{suffix}")
    }
}

#[async_trait]
impl CoordinateStore for InMemoryStore {
    async fn push(&self, lobby: &str, coordinate: &Coordinate) -> StoreResult<String> {
        validate_key(lobby)?;
        let key = self.next_push_key();
        let mut state = self.state()?;
        state
            .lobbies
            .entry(lobby.to_string())
            .or_default()
            .insert(key.clone(), coordinate.clone());
        state.notify(lobby);
        debug!(lobby, %key, user = %coordinate.user, "pushed coordinate");
        Ok(key)
    }

    async fn update(&self, lobby: &str, key: &str, coordinate: &Coordinate) -> StoreResult<()> {
        validate_key(lobby)?;
        validate_key(key)?;
        let mut state = self.state()?;
        let entry = state
            .lobbies
            .get_mut(lobby)
            .and_then(|entries| entries.get_mut(key))
            .ok_or_else(|| StoreError::KeyNotFound {
                lobby: lobby.to_string(),
                key: key.to_string(),
            })?;
        *entry = coordinate.clone();
        state.notify(lobby);
        Ok(())
    }

    async fn list(&self, lobby: &str) -> StoreResult<Vec<StoredCoordinate>> {
        validate_key(lobby)?;
        Ok(self.state()?.entries(lobby))
    }

    async fn subscribe(&self, lobby: &str) -> StoreResult<SnapshotStream> {
        validate_key(lobby)?;
        let receiver = {
            let mut state = self.state()?;
            let current = state.entries(lobby);
            state
                .watchers
                .entry(lobby.to_string())
                .or_insert_with(|| watch::channel(current).0)
                .subscribe()
        };

        let stream = futures_util::stream::unfold((receiver, true), |(mut receiver, first)| async move {
            if !first && receiver.changed().await.is_err() {
                return None;
            }
            let snapshot = receiver.borrow_and_update().clone();
            Some((snapshot, (receiver, false)))
        });
        Ok(stream.boxed())
    }

    async fn lobbies(&self) -> StoreResult<Vec<String>> {
        Ok(self
            .state()?
            .lobbies
            .iter()
            .filter(|(_, entries)| !entries.is_empty())
            .map(|(lobby, _)| lobby.clone())
            .collect())
    }

    async fn remove_all(&self) -> StoreResult<()> {
        let mut state = self.state()?;
        state.lobbies.clear();
        for sender in state.watchers.values() {
            sender.send_replace(Vec::new());
        }
        debug!("removed every lobby");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn update_of_missing_key_fails() {
        let store = InMemoryStore::new();
        let err = store
            .update("lobby1", "bob", &Coordinate::new("bob", 1.0, 0.0, 0.0))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            StoreError::KeyNotFound {
                lobby: "lobby1".into(),
                key: "bob".into()
            }
        );
    }

    #[tokio::test]
    async fn push_then_update_overwrites_in_place() {
        let store = InMemoryStore::new();
        let key = store
            .push("lobby1", &Coordinate::new("bob", 1.0, 0.0, 0.0))
            .await
            .unwrap();
        store
            .update("lobby1", &key, &Coordinate::new("bob", 9.0, 0.0, 0.0))
            .await
            .unwrap();

        let entries = store.list("lobby1").await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].key, key);
        assert_eq!(entries[0].coordinate.x, 9.0);
    }

    #[tokio::test]
    async fn push_keys_sort_in_insertion_order() {
        let store = InMemoryStore::new();
        let mut keys = Vec::new();
        for user in ["a", "b", "c"] {
            keys.push(
                store
                    .push("lobby1", &Coordinate::new(user, 0.0, 0.0, 0.0))
                    .await
                    .unwrap(),
            );
        }
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);
    }

    #[tokio::test]
    async fn subscription_emits_full_snapshots() {
        let store = InMemoryStore::new();
        store
            .push("lobby1", &Coordinate::new("bob", 1.0, 0.0, 0.0))
            .await
            .unwrap();

        let mut stream = store.subscribe("lobby1").await.unwrap();
        let first = stream.next().await.unwrap();
        assert_eq!(first.len(), 1);

        store
            .push("lobby1", &Coordinate::new("carol", 2.0, 0.0, 0.0))
            .await
            .unwrap();
        let second = stream.next().await.unwrap();
        let users: Vec<&str> = second.iter().map(|e| e.coordinate.user.as_str()).collect();
        assert_eq!(users, vec!["bob", "carol"]);
    }

    #[tokio::test]
    async fn other_lobbies_are_isolated() {
        let store = InMemoryStore::new();
        store
            .push("lobby1", &Coordinate::new("bob", 1.0, 0.0, 0.0))
            .await
            .unwrap();
        store
            .push("lobby2", &Coordinate::new("carol", 1.0, 0.0, 0.0))
            .await
            .unwrap();

        assert_eq!(store.list("lobby2").await.unwrap().len(), 1);
        assert_eq!(store.lobbies().await.unwrap(), vec!["lobby1", "lobby2"]);
    }

    #[tokio::test]
    async fn remove_all_empties_every_lobby() {
        let store = InMemoryStore::new();
        store
            .push("lobby1", &Coordinate::new("bob", 1.0, 0.0, 0.0))
            .await
            .unwrap();
        let mut stream = store.subscribe("lobby1").await.unwrap();
        assert_eq!(stream.next().await.unwrap().len(), 1);

        store.remove_all().await.unwrap();

        assert!(stream.next().await.unwrap().is_empty());
        assert!(store.lobbies().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn invalid_lobby_names_are_rejected() {
        let store = InMemoryStore::new();
        let err = store
            .push("a/b", &Coordinate::new("bob", 0.0, 0.0, 0.0))
            .await
            .unwrap_err();
        assert_eq!(err, StoreError::InvalidKey("a/b".into()));
        assert!(store.subscribe("").await.is_err());
    }
}
