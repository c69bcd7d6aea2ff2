use bevy::prelude::*;

use crate::ecs::plugins::player::components::*;
use crate::ecs::plugins::player::systems::*;

/// Owns the local player entity and one entity per remote avatar.
#[derive(Default)]
pub struct PlayerPlugin {
    pub settings: LocalPlayerSettings,
}

impl PlayerPlugin {
    pub fn wandering(wander: Wander) -> Self {
        Self {
            settings: LocalPlayerSettings {
                start: wander.center + glam::Vec3::X * wander.radius,
                wander: Some(wander),
            },
        }
    }
}

impl Plugin for PlayerPlugin {
    fn build(&self, app: &mut App) {
        app.insert_resource(self.settings)
            .insert_resource(AvatarRegistry::default())
            .add_systems(Startup, spawn_local_player_system)
            .add_systems(Update, (wander_system, apply_avatar_signals_system));
    }
}
