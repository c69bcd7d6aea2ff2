use bevy::prelude::*;
use crate::ecs::plugins::debug::systems::*;

pub struct DebugPlugin;

impl Plugin for DebugPlugin {
    fn build(&self, app: &mut App) {
        app.insert_resource(DebugTimer::default())
            .add_systems(Update, debug_system);
    }
}
