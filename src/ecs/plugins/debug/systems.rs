/*!
# Debug Systems

Periodic roster and sync counters in the log, at `debug` level.
*/

use bevy::prelude::*;
use tracing::debug;

use crate::ecs::components::{Position, SyncSession};
use crate::ecs::plugins::player::components::{LocalPlayer, RemoteAvatar};
use crate::ecs::plugins::sync::{PositionThrottler, SyncSettings, SyncStats};

/// How often to log debug information (in seconds)
const DEBUG_PRINT_INTERVAL: f32 = 1.0;

#[derive(Resource, Default)]
pub struct DebugTimer {
    last_print_time: f32,
}

pub fn debug_system(
    local_query: Query<&Position, With<LocalPlayer>>,
    remote_query: Query<(&RemoteAvatar, &Position)>,
    session: Res<SyncSession>,
    throttler: Res<PositionThrottler>,
    settings: Res<SyncSettings>,
    stats: Res<SyncStats>,
    time: Res<Time>,
    mut debug_timer: ResMut<DebugTimer>,
) {
    let current_time = time.elapsed_secs();
    if current_time - debug_timer.last_print_time < DEBUG_PRINT_INTERVAL {
        return;
    }
    debug_timer.last_print_time = current_time;

    for position in local_query.iter() {
        debug!(
            lobby = %session.lobby,
            user = %session.user,
            "🎯 local ({:.1}, {:.1}, {:.1})",
            position.x, position.y, position.z
        );
    }

    let remote_count = remote_query.iter().count();
    if remote_count == 0 {
        debug!("📭 no remote avatars");
    }
    for (avatar, position) in remote_query.iter() {
        debug!(
            user = %avatar.user,
            "👤 remote ({:.1}, {:.1}, {:.1})",
            position.x, position.y, position.z
        );
    }

    let throttle = throttler.stats();
    debug!(
        offered = throttle.offered,
        discarded = throttle.discarded,
        replaced = throttle.replaced,
        deferred = throttle.deferred,
        dispatched = throttle.dispatched,
        dropped = throttle.dropped,
        max_writes_per_second = settings.max_writes_per_second(),
        updated = stats.writes_updated,
        inserted = stats.writes_inserted,
        failed = stats.writes_failed,
        snapshots = stats.snapshots_applied,
        "📡 sync counters at {:.1}s",
        current_time
    );
}
