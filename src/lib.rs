/*!
# Lobby Sync

Client-side position sync for lobby-based multiplayer scenes backed by a
hosted realtime key/value list.

## Architecture Overview

- **sync**: the coordinate type, the update throttler and the remote
  reconciler. Plain Rust, driven with explicit `Instant`s. Code without a
  fixed timestep of its own calls `UpdateThrottler::poll` instead of `flush`.
- **store**: the `CoordinateStore` backend seam, an in-memory backend, and
  the `LobbyStore` adapter with update-else-insert writes.
- **ecs**: Bevy plugins that drive the throttler every frame, flush it on a
  fixed timestep, run store I/O on a tokio runtime thread, and turn snapshots
  into remote avatar entities.

## How It Works

1. The local player's `Position` changes and is offered to the throttler
2. Sub-threshold moves are dropped; the rest wait in a single pending slot
3. Every flush tick the slot is written unless its user was written too recently
4. The store pushes a full lobby snapshot to every subscriber on each change
5. The reconciler spawns unseen users and moves known ones that really moved
*/

pub mod ecs;
pub mod error;
pub mod store;
pub mod sync;

pub use error::{ConfigError, StoreError, StoreResult, SyncError, SyncResult};
pub use store::{CoordinateStore, InMemoryStore, LobbySnapshot, LobbyStore, StoredCoordinate, WriteOutcome};
pub use sync::{
    AvatarSignal, CacheKey, Coordinate, EarlySamplePolicy, OfferOutcome, Reconciler, RetentionPolicy,
    SyncConfig, UpdateThrottler, WriteRequest,
};
