use bevy::prelude::*;

use crate::ecs::components::SyncSession;
use crate::ecs::plugins::sync::components::*;
use crate::ecs::plugins::sync::systems::*;
use crate::sync::{Reconciler, SyncConfig, UpdateThrottler};

/// Throttles local position writes and reconciles remote snapshots.
///
/// Expects a [`crate::ecs::plugins::bridge::StoreBridge`] resource, normally
/// provided by [`crate::ecs::plugins::StoreBridgePlugin`].
pub struct SyncPlugin {
    pub session: SyncSession,
    pub config: SyncConfig,
}

impl SyncPlugin {
    pub fn new(session: SyncSession, config: SyncConfig) -> Self {
        Self { session, config }
    }
}

impl Plugin for SyncPlugin {
    fn build(&self, app: &mut App) {
        let flush_hz = 1_000.0 / self.config.flush_interval_ms as f64;
        app.insert_resource(self.session.clone())
            .insert_resource(SyncSettings(self.config.clone()))
            .insert_resource(PositionThrottler(UpdateThrottler::from_config(&self.config)))
            .insert_resource(RemoteRoster(Reconciler::from_config(
                &self.session.user,
                &self.config,
            )))
            .insert_resource(SyncStats::default())
            .insert_resource(SyncClock::default())
            .insert_resource(Time::<Fixed>::from_hz(flush_hz))
            .add_event::<RemoteAvatarSignal>()
            .add_event::<ClearLobbiesEvent>()
            .add_systems(Update, (
                clear_lobbies_system,
                sample_local_position_system.after(clear_lobbies_system),
                apply_remote_snapshots_system,
                expire_remote_avatars_system.after(apply_remote_snapshots_system),
                drain_write_reports_system,
            ))
            .add_systems(FixedUpdate, flush_position_updates_system);
    }
}
