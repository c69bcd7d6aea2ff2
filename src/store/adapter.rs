use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, warn};

use super::{CoordinateStore, SnapshotStream, StoredCoordinate};
use crate::error::{StoreResult, SyncError, SyncResult};
use crate::sync::coordinate::{CacheKey, Coordinate};

/// How a successful [`LobbyStore::write`] landed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    /// Existing entry updated in place.
    Updated { key: String },
    /// Update failed; a new entry was pushed instead.
    Inserted { key: String },
}

impl WriteOutcome {
    pub fn key(&self) -> &str {
        match self {
            WriteOutcome::Updated { key } | WriteOutcome::Inserted { key } => key,
        }
    }
}

/// Lobby-scoped access to a [`CoordinateStore`] with update-else-insert writes.
///
/// Remembers the entry key each (lobby, user) landed under so later writes
/// update that entry instead of pushing a new one.
#[derive(Clone)]
pub struct LobbyStore {
    backend: Arc<dyn CoordinateStore>,
    keys: Arc<DashMap<CacheKey, String>>,
}

impl LobbyStore {
    pub fn new(backend: Arc<dyn CoordinateStore>) -> Self {
        Self {
            backend,
            keys: Arc::new(DashMap::new()),
        }
    }

    /// Update the user's entry, falling back to a single insert.
    ///
    /// The key is the one remembered for the pair, else the user id. When
    /// that update fails the lobby is searched for an entry another session
    /// pushed for the same user, and only if there is none is a new entry
    /// pushed. There is no transaction: two first-writes racing for the same
    /// user can both end up pushing.
    pub async fn write(&self, lobby: &str, coordinate: &Coordinate) -> SyncResult<WriteOutcome> {
        let cache_key = CacheKey::new(lobby, &coordinate.user);
        let key = self
            .keys
            .get(&cache_key)
            .map(|k| k.value().clone())
            .unwrap_or_else(|| coordinate.user.clone());

        let update_err = match self.backend.update(lobby, &key, coordinate).await {
            Ok(()) => {
                self.keys.insert(cache_key, key.clone());
                return Ok(WriteOutcome::Updated { key });
            }
            Err(e) => e,
        };
        debug!(lobby, user = %coordinate.user, %key, error = %update_err, "update failed, looking up entry");

        match self.find_user(lobby, &coordinate.user).await {
            Ok(Some(existing)) if existing.key != key => {
                match self.backend.update(lobby, &existing.key, coordinate).await {
                    Ok(()) => {
                        self.keys.insert(cache_key, existing.key.clone());
                        return Ok(WriteOutcome::Updated { key: existing.key });
                    }
                    Err(error) => {
                        debug!(lobby, key = %existing.key, %error, "update of existing entry failed")
                    }
                }
            }
            Ok(_) => {}
            Err(error) => debug!(lobby, %error, "entry lookup failed, inserting"),
        }

        match self.backend.push(lobby, coordinate).await {
            Ok(key) => {
                self.keys.insert(cache_key, key.clone());
                Ok(WriteOutcome::Inserted { key })
            }
            Err(insert_err) => {
                warn!(lobby, user = %coordinate.user, error = %insert_err, "fallback insert failed");
                Err(SyncError::WriteFailed {
                    lobby: lobby.to_string(),
                    user: coordinate.user.clone(),
                    update: update_err,
                    insert: insert_err,
                })
            }
        }
    }

    pub async fn subscribe(&self, lobby: &str) -> StoreResult<SnapshotStream> {
        self.backend.subscribe(lobby).await
    }

    /// Entry stored for `user` in `lobby`, if any.
    ///
    /// With duplicates the last one in listing order wins, the same entry the
    /// reconciler applies.
    pub async fn find_user(&self, lobby: &str, user: &str) -> StoreResult<Option<StoredCoordinate>> {
        Ok(self
            .backend
            .list(lobby)
            .await?
            .into_iter()
            .filter(|entry| entry.coordinate.user == user)
            .last())
    }

    pub async fn lobbies(&self) -> StoreResult<Vec<String>> {
        self.backend.lobbies().await
    }

    /// Delete every lobby and forget every remembered key.
    pub async fn clear_all(&self) -> StoreResult<()> {
        self.backend.remove_all().await?;
        self.keys.clear();
        warn!("cleared every lobby");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::store::InMemoryStore;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Push(String, Coordinate),
        Update(String, String, Coordinate),
    }

    /// Records calls and fails on demand.
    #[derive(Default)]
    struct RecordingStore {
        calls: Mutex<Vec<Call>>,
        fail_push: bool,
    }

    impl RecordingStore {
        fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl CoordinateStore for RecordingStore {
        async fn push(&self, lobby: &str, coordinate: &Coordinate) -> StoreResult<String> {
            self.calls
                .lock()
                .unwrap()
                .push(Call::Push(lobby.into(), coordinate.clone()));
            if self.fail_push {
                return Err(StoreError::Unavailable("offline".into()));
            }
            Ok("-generated".into())
        }

        async fn update(&self, lobby: &str, key: &str, coordinate: &Coordinate) -> StoreResult<()> {
            self.calls
                .lock()
                .unwrap()
                .push(Call::Update(lobby.into(), key.into(), coordinate.clone()));
            Err(StoreError::KeyNotFound {
                lobby: lobby.into(),
                key: key.into(),
            })
        }

        async fn list(&self, _lobby: &str) -> StoreResult<Vec<StoredCoordinate>> {
            Ok(Vec::new())
        }

        async fn subscribe(&self, _lobby: &str) -> StoreResult<SnapshotStream> {
            Err(StoreError::Unavailable("not supported".into()))
        }

        async fn lobbies(&self) -> StoreResult<Vec<String>> {
            Ok(Vec::new())
        }

        async fn remove_all(&self) -> StoreResult<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn missing_key_falls_back_to_one_insert() {
        let backend = Arc::new(RecordingStore::default());
        let store = LobbyStore::new(backend.clone());
        let coordinate = Coordinate::new("bob", 1.0, 2.0, 3.0);

        let outcome = store.write("lobby1", &coordinate).await.unwrap();

        assert_eq!(outcome, WriteOutcome::Inserted { key: "-generated".into() });
        assert_eq!(
            backend.calls(),
            vec![
                Call::Update("lobby1".into(), "bob".into(), coordinate.clone()),
                Call::Push("lobby1".into(), coordinate),
            ]
        );
    }

    #[tokio::test]
    async fn failed_insert_is_reported_not_retried() {
        let backend = Arc::new(RecordingStore {
            fail_push: true,
            ..Default::default()
        });
        let store = LobbyStore::new(backend.clone());

        let err = store
            .write("lobby1", &Coordinate::new("bob", 1.0, 2.0, 3.0))
            .await
            .unwrap_err();

        assert!(matches!(err, SyncError::WriteFailed { ref user, .. } if user == "bob"));
        assert_eq!(backend.calls().len(), 2);
    }

    #[tokio::test]
    async fn inserted_key_is_reused_for_later_writes() {
        let store = LobbyStore::new(Arc::new(InMemoryStore::new()));

        let first = store
            .write("lobby1", &Coordinate::new("bob", 1.0, 0.0, 0.0))
            .await
            .unwrap();
        let second = store
            .write("lobby1", &Coordinate::new("bob", 2.0, 0.0, 0.0))
            .await
            .unwrap();

        assert!(matches!(first, WriteOutcome::Inserted { .. }));
        assert_eq!(second, WriteOutcome::Updated { key: first.key().to_string() });

        let found = store.find_user("lobby1", "bob").await.unwrap().unwrap();
        assert_eq!(found.coordinate.x, 2.0);
        assert_eq!(store.lobbies().await.unwrap(), vec!["lobby1"]);
    }

    #[tokio::test]
    async fn fresh_session_updates_the_entry_left_by_an_earlier_one() {
        let backend = Arc::new(InMemoryStore::new());
        let first = LobbyStore::new(backend.clone());
        let inserted = first
            .write("lobby1", &Coordinate::new("alice", 1.0, 0.0, 0.0))
            .await
            .unwrap();

        let restarted = LobbyStore::new(backend.clone());
        let outcome = restarted
            .write("lobby1", &Coordinate::new("alice", 5.0, 0.0, 0.0))
            .await
            .unwrap();

        assert_eq!(outcome, WriteOutcome::Updated { key: inserted.key().to_string() });
        let entries = backend.list("lobby1").await.unwrap();
        assert_eq!(entries.len(), 1);
        let found = restarted.find_user("lobby1", "alice").await.unwrap().unwrap();
        assert_eq!(found.coordinate.x, 5.0);

        // The looked-up key is remembered: no second lookup, still one entry.
        let again = restarted
            .write("lobby1", &Coordinate::new("alice", 6.0, 0.0, 0.0))
            .await
            .unwrap();
        assert_eq!(again.key(), inserted.key());
        assert_eq!(backend.list("lobby1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn find_user_prefers_the_last_duplicate() {
        let backend = Arc::new(InMemoryStore::new());
        backend
            .push("lobby1", &Coordinate::new("alice", 1.0, 0.0, 0.0))
            .await
            .unwrap();
        let later = backend
            .push("lobby1", &Coordinate::new("alice", 2.0, 0.0, 0.0))
            .await
            .unwrap();
        let store = LobbyStore::new(backend);

        let found = store.find_user("lobby1", "alice").await.unwrap().unwrap();

        assert_eq!(found.key, later);
        assert_eq!(found.coordinate.x, 2.0);
    }

    #[tokio::test]
    async fn clear_all_forgets_keys() {
        let store = LobbyStore::new(Arc::new(InMemoryStore::new()));
        store
            .write("lobby1", &Coordinate::new("bob", 1.0, 0.0, 0.0))
            .await
            .unwrap();

        store.clear_all().await.unwrap();

        assert!(store.find_user("lobby1", "bob").await.unwrap().is_none());
        let outcome = store
            .write("lobby1", &Coordinate::new("bob", 1.0, 0.0, 0.0))
            .await
            .unwrap();
        assert!(matches!(outcome, WriteOutcome::Inserted { .. }));
    }
}
