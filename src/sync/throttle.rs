/*!
# Update Throttler

Sits between the per-frame movement loop and the store adapter and decides
which local position changes are worth a remote write.

Three filters apply, in order:

1. **Magnitude**: a sample whose every axis is within `noise_threshold` of
   the last written position for its (lobby, user) is discarded.
2. **Sample-and-hold**: passing samples go into a single pending slot; a
   newer sample replaces the held one. The slot is flushed once per flush
   window, which caps writes across all users.
3. **Per-user interval**: a flushed sample whose (lobby, user) was written
   less than `min_user_interval` ago is held or dropped according to
   [`EarlySamplePolicy`].

The cache entry is overwritten before the request leaves [`UpdateThrottler::flush`],
so a write still in flight can never be duplicated by the same input.
*/

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tracing::trace;

use crate::sync::config::{EarlySamplePolicy, SyncConfig};
use crate::sync::coordinate::{CacheKey, Coordinate};

/// A throttled write ready for the store adapter.
#[derive(Debug, Clone, PartialEq)]
pub struct WriteRequest {
    pub lobby: String,
    pub coordinate: Coordinate,
}

impl WriteRequest {
    pub fn new(lobby: impl Into<String>, coordinate: Coordinate) -> Self {
        Self {
            lobby: lobby.into(),
            coordinate,
        }
    }

    pub fn key(&self) -> CacheKey {
        CacheKey::new(&self.lobby, &self.coordinate.user)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OfferOutcome {
    /// Below the noise threshold; nothing was queued.
    Discarded,
    /// Placed into an empty pending slot.
    Held,
    /// Replaced a sample that had not been flushed yet.
    Replaced,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ThrottleStats {
    pub offered: u64,
    pub discarded: u64,
    pub replaced: u64,
    pub deferred: u64,
    pub dropped: u64,
    pub dispatched: u64,
}

#[derive(Debug, Clone)]
struct CacheEntry {
    coordinate: Coordinate,
    updated_at: Instant,
}

#[derive(Debug)]
pub struct UpdateThrottler {
    noise_threshold: f32,
    flush_interval: Duration,
    min_user_interval: Duration,
    early_samples: EarlySamplePolicy,
    cache: HashMap<CacheKey, CacheEntry>,
    pending: Option<WriteRequest>,
    last_flush: Option<Instant>,
    stats: ThrottleStats,
}

impl Default for UpdateThrottler {
    fn default() -> Self {
        Self::from_config(&SyncConfig::default())
    }
}

impl UpdateThrottler {
    pub fn from_config(config: &SyncConfig) -> Self {
        Self {
            noise_threshold: config.noise_threshold,
            flush_interval: config.flush_interval(),
            min_user_interval: config.min_user_interval(),
            early_samples: config.early_samples,
            cache: HashMap::new(),
            pending: None,
            last_flush: None,
            stats: ThrottleStats::default(),
        }
    }

    /// Offer the local player's current position for `lobby`.
    pub fn offer(&mut self, lobby: &str, coordinate: Coordinate) -> OfferOutcome {
        self.stats.offered += 1;
        let key = CacheKey::new(lobby, &coordinate.user);

        if !self.is_significant(&key, &coordinate) {
            // Back within noise of the written position: a held sample for the
            // same pair is stale now.
            if self.pending.as_ref().is_some_and(|p| p.key() == key) {
                self.pending = None;
            }
            self.stats.discarded += 1;
            trace!(%key, "discarding sub-threshold sample");
            return OfferOutcome::Discarded;
        }

        match self.pending.replace(WriteRequest::new(lobby, coordinate)) {
            Some(_) => {
                self.stats.replaced += 1;
                OfferOutcome::Replaced
            }
            None => OfferOutcome::Held,
        }
    }

    /// Empty the pending slot, applying the per-user interval.
    ///
    /// Returns the request to dispatch, with the cache already updated.
    pub fn flush(&mut self, now: Instant) -> Option<WriteRequest> {
        let request = self.pending.take()?;
        let key = request.key();

        if let Some(entry) = self.cache.get(&key) {
            let since = now.saturating_duration_since(entry.updated_at);
            if since < self.min_user_interval {
                match self.early_samples {
                    EarlySamplePolicy::Hold => {
                        self.stats.deferred += 1;
                        self.pending = Some(request);
                    }
                    EarlySamplePolicy::Drop => {
                        self.stats.dropped += 1;
                        trace!(%key, ?since, "dropping sample inside per-user interval");
                    }
                }
                return None;
            }
        }

        self.cache.insert(
            key,
            CacheEntry {
                coordinate: request.coordinate.clone(),
                updated_at: now,
            },
        );
        self.stats.dispatched += 1;
        Some(request)
    }

    /// [`flush`](Self::flush), but at most once per flush window.
    ///
    /// Entry point for callers outside the ECS, which has its own fixed tick.
    pub fn poll(&mut self, now: Instant) -> Option<WriteRequest> {
        if let Some(last) = self.last_flush {
            if now.saturating_duration_since(last) < self.flush_interval {
                return None;
            }
        }
        self.last_flush = Some(now);
        self.flush(now)
    }

    pub fn cached(&self, lobby: &str, user: &str) -> Option<&Coordinate> {
        self.cache
            .get(&CacheKey::new(lobby, user))
            .map(|entry| &entry.coordinate)
    }

    pub fn pending(&self) -> Option<&WriteRequest> {
        self.pending.as_ref()
    }

    pub fn stats(&self) -> ThrottleStats {
        self.stats
    }

    pub fn flush_interval(&self) -> Duration {
        self.flush_interval
    }

    /// Forget everything written so far, e.g. after the store was cleared.
    pub fn clear(&mut self) {
        self.cache.clear();
        self.pending = None;
        self.last_flush = None;
    }

    fn is_significant(&self, key: &CacheKey, coordinate: &Coordinate) -> bool {
        self.cache.get(key).is_none_or(|entry| {
            coordinate.differs_from(entry.coordinate.position(), self.noise_threshold)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOBBY: &str = "lobby1";

    fn ms(millis: u64) -> Duration {
        Duration::from_millis(millis)
    }

    /// Throttler with alice already written at the origin at `t0`.
    fn seeded(config: &SyncConfig) -> (UpdateThrottler, Instant) {
        let mut throttler = UpdateThrottler::from_config(config);
        let t0 = Instant::now();
        throttler.offer(LOBBY, Coordinate::new("alice", 0.0, 0.0, 0.0));
        assert!(throttler.flush(t0).is_some());
        (throttler, t0)
    }

    #[test]
    fn first_sample_always_passes() {
        let mut throttler = UpdateThrottler::default();
        let outcome = throttler.offer(LOBBY, Coordinate::new("alice", 0.0, 0.0, 0.0));
        assert_eq!(outcome, OfferOutcome::Held);
        let request = throttler.flush(Instant::now()).unwrap();
        assert_eq!(request.lobby, LOBBY);
        assert_eq!(request.coordinate.user, "alice");
    }

    #[test]
    fn sub_threshold_move_produces_no_write() {
        let (mut throttler, t0) = seeded(&SyncConfig::default());

        let outcome = throttler.offer(LOBBY, Coordinate::new("alice", 0.05, 0.0, 0.0));

        assert_eq!(outcome, OfferOutcome::Discarded);
        assert!(throttler.flush(t0 + ms(500)).is_none());
        assert_eq!(throttler.stats().dispatched, 1);
    }

    #[test]
    fn large_move_produces_exactly_one_write() {
        let (mut throttler, t0) = seeded(&SyncConfig::default());

        throttler.offer(LOBBY, Coordinate::new("alice", 5.0, 0.0, 0.0));
        let request = throttler.flush(t0 + ms(200)).unwrap();

        assert_eq!(request.coordinate.x, 5.0);
        assert!(throttler.flush(t0 + ms(400)).is_none());
        assert_eq!(throttler.stats().dispatched, 2);
    }

    #[test]
    fn burst_inside_a_window_keeps_only_the_latest() {
        let (mut throttler, t0) = seeded(&SyncConfig::default());

        assert_eq!(throttler.offer(LOBBY, Coordinate::new("alice", 1.0, 0.0, 0.0)), OfferOutcome::Held);
        assert_eq!(throttler.offer(LOBBY, Coordinate::new("alice", 2.0, 0.0, 0.0)), OfferOutcome::Replaced);
        assert_eq!(throttler.offer(LOBBY, Coordinate::new("alice", 3.0, 0.0, 0.0)), OfferOutcome::Replaced);

        let request = throttler.flush(t0 + ms(150)).unwrap();
        assert_eq!(request.coordinate.x, 3.0);
        assert!(throttler.flush(t0 + ms(300)).is_none());
    }

    #[test]
    fn window_is_shared_across_users() {
        let mut throttler = UpdateThrottler::default();
        throttler.offer(LOBBY, Coordinate::new("alice", 1.0, 0.0, 0.0));
        throttler.offer("lobby2", Coordinate::new("bob", 2.0, 0.0, 0.0));

        let request = throttler.flush(Instant::now()).unwrap();
        assert_eq!(request.coordinate.user, "bob");
        assert_eq!(request.lobby, "lobby2");
        assert!(throttler.cached(LOBBY, "alice").is_none());
    }

    #[test]
    fn early_sample_is_held_until_interval_elapses() {
        let (mut throttler, t0) = seeded(&SyncConfig::default());

        throttler.offer(LOBBY, Coordinate::new("alice", 1.0, 0.0, 0.0));
        assert!(throttler.flush(t0 + ms(50)).is_none());
        throttler.offer(LOBBY, Coordinate::new("alice", 2.0, 0.0, 0.0));
        assert!(throttler.flush(t0 + ms(80)).is_none());

        let request = throttler.flush(t0 + ms(120)).unwrap();
        assert_eq!(request.coordinate.x, 2.0);
        assert!(throttler.flush(t0 + ms(300)).is_none());

        let stats = throttler.stats();
        assert_eq!(stats.deferred, 2);
        assert_eq!(stats.dispatched, 2);
    }

    #[test]
    fn early_sample_is_lost_under_drop_policy() {
        let config = SyncConfig {
            early_samples: EarlySamplePolicy::Drop,
            ..SyncConfig::default()
        };
        let (mut throttler, t0) = seeded(&config);

        throttler.offer(LOBBY, Coordinate::new("alice", 1.0, 0.0, 0.0));
        assert!(throttler.flush(t0 + ms(50)).is_none());
        assert!(throttler.flush(t0 + ms(150)).is_none());
        assert_eq!(throttler.stats().dropped, 1);
        assert_eq!(throttler.cached(LOBBY, "alice").unwrap().x, 0.0);
    }

    #[test]
    fn cache_is_updated_before_dispatch() {
        let mut throttler = UpdateThrottler::default();
        let t0 = Instant::now();
        let coordinate = Coordinate::new("alice", 4.0, 1.0, 4.0);

        throttler.offer(LOBBY, coordinate.clone());
        let request = throttler.flush(t0).unwrap();

        assert_eq!(throttler.cached(LOBBY, "alice"), Some(&request.coordinate));
        // Same input again while the write is still in flight.
        assert_eq!(throttler.offer(LOBBY, coordinate), OfferOutcome::Discarded);
    }

    #[test]
    fn returning_to_written_position_cancels_held_sample() {
        let (mut throttler, t0) = seeded(&SyncConfig::default());

        throttler.offer(LOBBY, Coordinate::new("alice", 1.0, 0.0, 0.0));
        throttler.offer(LOBBY, Coordinate::new("alice", 0.02, 0.0, 0.0));

        assert!(throttler.pending().is_none());
        assert!(throttler.flush(t0 + ms(200)).is_none());
    }

    #[test]
    fn poll_flushes_at_most_once_per_window() {
        let mut throttler = UpdateThrottler::default();
        let t0 = Instant::now();

        throttler.offer(LOBBY, Coordinate::new("alice", 1.0, 0.0, 0.0));
        assert!(throttler.poll(t0).is_some());

        throttler.offer(LOBBY, Coordinate::new("bob", 1.0, 0.0, 0.0));
        assert!(throttler.poll(t0 + ms(20)).is_none());
        assert!(throttler.pending().is_some());

        let request = throttler.poll(t0 + ms(50)).unwrap();
        assert_eq!(request.coordinate.user, "bob");
    }

    #[test]
    fn clear_forgets_written_positions() {
        let (mut throttler, _) = seeded(&SyncConfig::default());
        throttler.clear();

        assert!(throttler.cached(LOBBY, "alice").is_none());
        assert_eq!(
            throttler.offer(LOBBY, Coordinate::new("alice", 0.0, 0.0, 0.0)),
            OfferOutcome::Held
        );
    }
}
