/*!
# Remote Reconciler

Merges full lobby snapshots into the roster of other players and tells the
visual layer what changed.

Every snapshot carries the whole lobby, so reconciliation is a diff against
what was already applied: unknown users spawn, known users move only when an
axis changed by more than `move_threshold`, and replaying the same snapshot
is a no-op.

Users that vanish are kept or expired according to [`RetentionPolicy`].
*/

use std::collections::HashMap;
use std::time::{Duration, Instant};

use glam::Vec3;
use tracing::debug;

use crate::sync::config::SyncConfig;
use crate::sync::coordinate::Coordinate;

/// How long a remote user stays on the roster without activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RetentionPolicy {
    /// Never removed once seen.
    #[default]
    Sticky,
    /// Removed after `after` without appearing or moving.
    Expire { after: Duration },
}

/// Instruction for whoever owns the remote avatars.
#[derive(Debug, Clone, PartialEq)]
pub enum AvatarSignal {
    Spawn { user: String, position: Vec3 },
    Move { user: String, position: Vec3 },
    Expire { user: String },
}

impl AvatarSignal {
    pub fn user(&self) -> &str {
        match self {
            AvatarSignal::Spawn { user, .. }
            | AvatarSignal::Move { user, .. }
            | AvatarSignal::Expire { user } => user,
        }
    }
}

#[derive(Debug, Clone)]
struct KnownUser {
    /// Last position handed to the visual layer.
    applied: Vec3,
    /// Last raw position seen in a snapshot.
    observed: Vec3,
    last_active: Instant,
}

#[derive(Debug)]
pub struct Reconciler {
    local_user: String,
    move_threshold: f32,
    retention: RetentionPolicy,
    known: HashMap<String, KnownUser>,
    // Expired users whose stale entry is still in the store, keyed to the
    // position they expired at. They respawn only once that entry changes.
    tombstones: HashMap<String, Vec3>,
}

impl Reconciler {
    pub fn new(local_user: impl Into<String>, move_threshold: f32, retention: RetentionPolicy) -> Self {
        Self {
            local_user: local_user.into(),
            move_threshold,
            retention,
            known: HashMap::new(),
            tombstones: HashMap::new(),
        }
    }

    pub fn from_config(local_user: impl Into<String>, config: &SyncConfig) -> Self {
        Self::new(local_user, config.move_threshold, config.retention_policy())
    }

    /// Apply one full snapshot of the lobby.
    pub fn reconcile<'a, I>(&mut self, entries: I, now: Instant) -> Vec<AvatarSignal>
    where
        I: IntoIterator<Item = &'a Coordinate>,
    {
        // Last entry wins when the store holds duplicates for one user.
        let mut latest: Vec<&'a Coordinate> = Vec::new();
        let mut index: HashMap<&'a str, usize> = HashMap::new();
        for coordinate in entries {
            if coordinate.user == self.local_user {
                continue;
            }
            match index.get(coordinate.user.as_str()) {
                Some(&i) => latest[i] = coordinate,
                None => {
                    index.insert(coordinate.user.as_str(), latest.len());
                    latest.push(coordinate);
                }
            }
        }

        self.tombstones.retain(|user, _| index.contains_key(user.as_str()));

        let mut signals = Vec::new();
        for coordinate in latest {
            let position = coordinate.position();
            match self.known.get_mut(&coordinate.user) {
                Some(known) => {
                    if known.observed != position {
                        known.observed = position;
                        known.last_active = now;
                    }
                    if (position - known.applied).abs().max_element() > self.move_threshold {
                        known.applied = position;
                        signals.push(AvatarSignal::Move {
                            user: coordinate.user.clone(),
                            position,
                        });
                    }
                }
                None => {
                    if self.tombstones.get(&coordinate.user) == Some(&position) {
                        continue;
                    }
                    self.tombstones.remove(&coordinate.user);
                    debug!(user = %coordinate.user, ?position, "new remote user");
                    self.known.insert(
                        coordinate.user.clone(),
                        KnownUser {
                            applied: position,
                            observed: position,
                            last_active: now,
                        },
                    );
                    signals.push(AvatarSignal::Spawn {
                        user: coordinate.user.clone(),
                        position,
                    });
                }
            }
        }

        signals.extend(self.expire(now));
        signals
    }

    /// Remove users idle past the retention window. No-op for `Sticky`.
    pub fn expire(&mut self, now: Instant) -> Vec<AvatarSignal> {
        let RetentionPolicy::Expire { after } = self.retention else {
            return Vec::new();
        };

        let mut stale: Vec<String> = self
            .known
            .iter()
            .filter(|(_, known)| now.saturating_duration_since(known.last_active) >= after)
            .map(|(user, _)| user.clone())
            .collect();
        stale.sort();

        stale
            .into_iter()
            .filter_map(|user| {
                let known = self.known.remove(&user)?;
                debug!(%user, "expiring idle remote user");
                self.tombstones.insert(user.clone(), known.observed);
                Some(AvatarSignal::Expire { user })
            })
            .collect()
    }

    /// Drop a user from the roster without emitting a signal.
    pub fn forget(&mut self, user: &str) -> bool {
        self.tombstones.remove(user);
        self.known.remove(user).is_some()
    }

    pub fn known_users(&self) -> Vec<&str> {
        let mut users: Vec<&str> = self.known.keys().map(String::as_str).collect();
        users.sort_unstable();
        users
    }

    pub fn applied_position(&self, user: &str) -> Option<Vec3> {
        self.known.get(user).map(|known| known.applied)
    }

    pub fn local_user(&self) -> &str {
        &self.local_user
    }

    pub fn retention(&self) -> RetentionPolicy {
        self.retention
    }
}
