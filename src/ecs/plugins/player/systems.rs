use bevy::prelude::*;
use glam::Vec3;
use tracing::{debug, info};

use super::components::*;
use crate::ecs::components::{Position, SyncSession};
use crate::ecs::plugins::sync::RemoteAvatarSignal;
use crate::sync::AvatarSignal;

/// System: Spawn the local player for this session
pub fn spawn_local_player_system(
    mut commands: Commands,
    session: Res<SyncSession>,
    settings: Res<LocalPlayerSettings>,
) {
    let mut entity = commands.spawn(LocalPlayerBundle::new(&session.user, settings.start));
    if let Some(wander) = settings.wander {
        entity.insert(wander);
    }
    info!(user = %session.user, lobby = %session.lobby, "🎮 local player spawned");
}

/// System: Move wandering entities along their circle
pub fn wander_system(time: Res<Time>, mut query: Query<(&mut Position, &mut Wander)>) {
    let dt = time.delta_secs();
    if dt <= 0.0 {
        return;
    }

    for (mut position, mut wander) in query.iter_mut() {
        wander.phase += wander.angular_speed * dt;
        let offset = Vec3::new(wander.phase.cos(), 0.0, wander.phase.sin()) * wander.radius;
        position.set_if_neq(Position::from_vec3(wander.center + offset));
    }
}

/// System: Create, move and remove remote avatar entities
pub fn apply_avatar_signals_system(
    mut commands: Commands,
    mut signals: EventReader<RemoteAvatarSignal>,
    mut registry: ResMut<AvatarRegistry>,
    mut positions: Query<&mut Position, With<RemoteAvatar>>,
) {
    for RemoteAvatarSignal(signal) in signals.read() {
        match signal {
            AvatarSignal::Spawn { user, position } => {
                if registry.get_avatar_entity(user).is_some() {
                    continue;
                }
                let entity = commands.spawn(RemoteAvatarBundle::new(user, *position)).id();
                registry.register_avatar(user, entity);
                info!(%user, x = position.x, y = position.y, z = position.z, "👤 remote avatar joined");
            }
            AvatarSignal::Move { user, position } => {
                let Some(entity) = registry.get_avatar_entity(user) else {
                    debug!(%user, "move for unknown avatar");
                    continue;
                };
                match positions.get_mut(entity) {
                    Ok(mut current) => *current = Position::from_vec3(*position),
                    // Spawned earlier this frame; commands have not been applied yet.
                    Err(_) => {
                        commands.entity(entity).insert(Position::from_vec3(*position));
                    }
                }
            }
            AvatarSignal::Expire { user } => {
                if let Some(entity) = registry.unregister_avatar(user) {
                    commands.entity(entity).despawn();
                    info!(%user, "👋 remote avatar expired");
                }
            }
        }
    }
}
