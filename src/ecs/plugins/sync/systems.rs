use bevy::prelude::*;
use tracing::{debug, trace, warn};

use super::components::*;
use crate::ecs::components::{Position, SyncSession};
use crate::ecs::plugins::bridge::{BridgeCommand, StoreBridge};
use crate::ecs::plugins::player::components::LocalPlayer;
use crate::store::WriteOutcome;
use crate::sync::Coordinate;

/// System: Offer the local player's position whenever it changed this frame
pub fn sample_local_position_system(
    session: Res<SyncSession>,
    mut throttler: ResMut<PositionThrottler>,
    query: Query<&Position, (With<LocalPlayer>, Changed<Position>)>,
) {
    for position in query.iter() {
        let coordinate = Coordinate::from_vec3(&session.user, position.to_vec3());
        throttler.offer(&session.lobby, coordinate);
    }
}

/// System: Flush the sample-and-hold slot once per fixed tick
pub fn flush_position_updates_system(
    time: Res<Time>,
    clock: Res<SyncClock>,
    mut throttler: ResMut<PositionThrottler>,
    bridge: Res<StoreBridge>,
) {
    let Some(request) = throttler.flush(clock.at(time.elapsed())) else {
        return;
    };
    trace!(user = %request.coordinate.user, x = request.coordinate.x, z = request.coordinate.z, "dispatching position write");
    if let Err(error) = bridge.send(BridgeCommand::Write(request)) {
        warn!(%error, "position write lost");
    }
}

/// System: Reconcile every snapshot received since the last frame
pub fn apply_remote_snapshots_system(
    time: Res<Time>,
    clock: Res<SyncClock>,
    bridge: Res<StoreBridge>,
    session: Res<SyncSession>,
    mut roster: ResMut<RemoteRoster>,
    mut stats: ResMut<SyncStats>,
    mut signals: EventWriter<RemoteAvatarSignal>,
) {
    let now = clock.at(time.elapsed());
    while let Ok(snapshot) = bridge.snapshots.try_recv() {
        if snapshot.lobby != session.lobby {
            continue;
        }
        stats.snapshots_applied += 1;
        for signal in roster.reconcile(snapshot.coordinates(), now) {
            signals.send(RemoteAvatarSignal(signal));
        }
    }
}

/// System: Drop remote users idle past the retention window
pub fn expire_remote_avatars_system(
    time: Res<Time>,
    clock: Res<SyncClock>,
    mut roster: ResMut<RemoteRoster>,
    mut signals: EventWriter<RemoteAvatarSignal>,
) {
    for signal in roster.expire(clock.at(time.elapsed())) {
        signals.send(RemoteAvatarSignal(signal));
    }
}

/// System: Log write results; failures are swallowed after logging
pub fn drain_write_reports_system(bridge: Res<StoreBridge>, mut stats: ResMut<SyncStats>) {
    while let Ok(report) = bridge.reports.try_recv() {
        match report.result {
            Ok(WriteOutcome::Updated { .. }) => stats.writes_updated += 1,
            Ok(WriteOutcome::Inserted { key }) => {
                stats.writes_inserted += 1;
                debug!(user = %report.request.coordinate.user, %key, "created lobby entry");
            }
            Err(error) => {
                stats.writes_failed += 1;
                warn!(%error, "position write failed");
            }
        }
    }
}

/// System: Forward lobby resets to the store and forget local write state
pub fn clear_lobbies_system(
    mut events: EventReader<ClearLobbiesEvent>,
    mut throttler: ResMut<PositionThrottler>,
    bridge: Res<StoreBridge>,
) {
    if events.read().last().is_none() {
        return;
    }
    throttler.clear();
    if let Err(error) = bridge.send(BridgeCommand::ClearAll) {
        warn!(%error, "lobby reset lost");
    }
}
