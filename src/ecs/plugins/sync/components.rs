use bevy::prelude::*;
use std::time::{Duration, Instant};

use crate::sync::{AvatarSignal, Reconciler, SyncConfig, UpdateThrottler};

/// Roster change for the visual layer.
#[derive(Event, Debug, Clone, PartialEq)]
pub struct RemoteAvatarSignal(pub AvatarSignal);

/// Ask the store to delete every lobby.
#[derive(Event, Debug, Clone, Copy, Default)]
pub struct ClearLobbiesEvent;

#[derive(Resource, Debug, Clone, Deref)]
pub struct SyncSettings(pub SyncConfig);

#[derive(Resource, Debug, Deref, DerefMut)]
pub struct PositionThrottler(pub UpdateThrottler);

#[derive(Resource, Debug, Deref, DerefMut)]
pub struct RemoteRoster(pub Reconciler);

/// Counters for what came back from the store runtime.
#[derive(Resource, Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SyncStats {
    pub writes_updated: u64,
    pub writes_inserted: u64,
    pub writes_failed: u64,
    pub snapshots_applied: u64,
}

/// Maps ECS elapsed time onto the `Instant`s the throttler and roster use.
#[derive(Resource, Debug, Clone, Copy)]
pub struct SyncClock {
    origin: Instant,
}

impl Default for SyncClock {
    fn default() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl SyncClock {
    pub fn at(&self, elapsed: Duration) -> Instant {
        self.origin + elapsed
    }
}
